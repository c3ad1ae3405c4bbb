//! Sitemap family and robots.txt generation.
//!
//! Assemblers are pure functions over pre-fetched lists; [`SitemapService`] does the
//! fetching through the cache-aside layer and substitutes empty lists when the content
//! source is unavailable, so every document keeps its envelope regardless of item count.

use std::fmt::Write as _;
use std::sync::Arc;

use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};
use tracing::warn;

use crate::application::cache_aside::CacheAside;
use crate::application::repos::ContentSource;
use crate::domain::content::{ContentItem, SlugEntry};
use crate::domain::site::SiteProfile;
use crate::util::xml::{XML_DECLARATION, escape};

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
const IMAGE_NS: &str = "http://www.google.com/schemas/sitemap-image/1.1";
const NEWS_NS: &str = "http://www.google.com/schemas/sitemap-news/0.9";

const SLUGS_CACHE_KEY: &str = "sitemap:slugs";
const IMAGES_CACHE_KEY: &str = "sitemap:images";
const NEWS_CACHE_KEY: &str = "sitemap:news";
pub const IMAGE_SITEMAP_TTL_SECONDS: u64 = 3600;
const NEWS_WINDOW: Duration = Duration::hours(48);
const NEWS_FETCH_LIMIT: u32 = 100;

pub const SUB_SITEMAPS: [&str; 3] = ["sitemap.xml", "image-sitemap.xml", "news-sitemap.xml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFrequency {
    Always,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl ChangeFrequency {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeFrequency::Always => "always",
            ChangeFrequency::Hourly => "hourly",
            ChangeFrequency::Daily => "daily",
            ChangeFrequency::Weekly => "weekly",
            ChangeFrequency::Monthly => "monthly",
            ChangeFrequency::Yearly => "yearly",
            ChangeFrequency::Never => "never",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticRoute {
    pub path: &'static str,
    pub change_frequency: ChangeFrequency,
    pub priority: f32,
}

pub const STATIC_ROUTES: [StaticRoute; 3] = [
    StaticRoute {
        path: "/",
        change_frequency: ChangeFrequency::Daily,
        priority: 1.0,
    },
    StaticRoute {
        path: "/blog",
        change_frequency: ChangeFrequency::Daily,
        priority: 0.9,
    },
    StaticRoute {
        path: "/guestbook",
        change_frequency: ChangeFrequency::Weekly,
        priority: 0.5,
    },
];

const POST_CHANGE_FREQUENCY: ChangeFrequency = ChangeFrequency::Weekly;
const POST_PRIORITY: f32 = 0.7;

/// One `<url>` of the plain sitemap.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub url: String,
    pub last_modified: OffsetDateTime,
    pub change_frequency: ChangeFrequency,
    pub priority: f32,
}

/// Allow/disallow rules for robots.txt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RobotsRules {
    pub disallow: Vec<String>,
}

impl Default for RobotsRules {
    fn default() -> Self {
        Self {
            disallow: vec!["/api/".to_string()],
        }
    }
}

#[derive(Clone)]
pub struct SitemapService {
    content: Arc<dyn ContentSource>,
    cache: CacheAside,
    site: Arc<SiteProfile>,
    robots: RobotsRules,
    sitemap_limit: u32,
    ttl_seconds: u64,
}

impl SitemapService {
    pub fn new(
        content: Arc<dyn ContentSource>,
        cache: CacheAside,
        site: Arc<SiteProfile>,
        robots: RobotsRules,
        sitemap_limit: u32,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            content,
            cache,
            site,
            robots,
            sitemap_limit,
            ttl_seconds,
        }
    }

    pub async fn sitemap_xml(&self) -> String {
        let content = self.content.clone();
        let limit = self.sitemap_limit;
        let slugs = self
            .cache
            .fetch_with_cache(SLUGS_CACHE_KEY, self.ttl_seconds, || async move {
                content.slugs(limit).await
            })
            .await
            .unwrap_or_else(|err| {
                warn!(target = "application::sitemap", error = %err, "failed to load slugs for sitemap");
                Vec::new()
            });

        let entries = sitemap_entries(&self.site, OffsetDateTime::now_utc(), &slugs);
        render_sitemap(&entries)
    }

    pub fn sitemap_index_xml(&self) -> String {
        render_sitemap_index(&self.site, OffsetDateTime::now_utc())
    }

    pub async fn image_sitemap_xml(&self) -> String {
        let content = self.content.clone();
        let limit = self.sitemap_limit;
        let items = self
            .cache
            .fetch_with_cache(IMAGES_CACHE_KEY, IMAGE_SITEMAP_TTL_SECONDS, || async move {
                content.recent(limit).await
            })
            .await
            .unwrap_or_else(|err| {
                warn!(target = "application::sitemap", error = %err, "failed to load posts for image sitemap");
                Vec::new()
            });

        render_image_sitemap(&self.site, &items)
    }

    pub async fn news_sitemap_xml(&self) -> String {
        let content = self.content.clone();
        let items = self
            .cache
            .fetch_with_cache(NEWS_CACHE_KEY, self.ttl_seconds, || async move {
                content.recent(NEWS_FETCH_LIMIT).await
            })
            .await
            .unwrap_or_else(|err| {
                warn!(target = "application::sitemap", error = %err, "failed to load posts for news sitemap");
                Vec::new()
            });

        render_news_sitemap(&self.site, &items, OffsetDateTime::now_utc())
    }

    pub fn robots_txt(&self) -> String {
        render_robots(&self.site, &self.robots)
    }
}

/// Static routes stamped with `generated_at`, followed by one entry per slug.
pub fn sitemap_entries(
    site: &SiteProfile,
    generated_at: OffsetDateTime,
    slugs: &[SlugEntry],
) -> Vec<SitemapEntry> {
    let statics = STATIC_ROUTES.iter().map(|route| SitemapEntry {
        url: site.url(route.path),
        last_modified: generated_at,
        change_frequency: route.change_frequency,
        priority: route.priority,
    });
    let posts = slugs.iter().map(|entry| SitemapEntry {
        url: site.url(&format!("/blog/{}", entry.slug)),
        last_modified: entry.updated_at,
        change_frequency: POST_CHANGE_FREQUENCY,
        priority: POST_PRIORITY,
    });
    statics.chain(posts).collect()
}

pub fn render_sitemap(entries: &[SitemapEntry]) -> String {
    let mut xml = String::from(XML_DECLARATION);
    let _ = writeln!(xml, "<urlset xmlns=\"{SITEMAP_NS}\">");
    for entry in entries {
        xml.push_str("  <url>\n");
        let _ = writeln!(xml, "    <loc>{}</loc>", escape(&entry.url));
        let _ = writeln!(xml, "    <lastmod>{}</lastmod>", rfc3339(entry.last_modified));
        let _ = writeln!(xml, "    <changefreq>{}</changefreq>", entry.change_frequency.as_str());
        let _ = writeln!(xml, "    <priority>{:.1}</priority>", entry.priority);
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

pub fn render_sitemap_index(site: &SiteProfile, generated_at: OffsetDateTime) -> String {
    let lastmod = rfc3339(generated_at);
    let mut xml = String::from(XML_DECLARATION);
    let _ = writeln!(xml, "<sitemapindex xmlns=\"{SITEMAP_NS}\">");
    for name in SUB_SITEMAPS {
        xml.push_str("  <sitemap>\n");
        let _ = writeln!(xml, "    <loc>{}</loc>", escape(&site.url(name)));
        let _ = writeln!(xml, "    <lastmod>{lastmod}</lastmod>");
        xml.push_str("  </sitemap>\n");
    }
    xml.push_str("</sitemapindex>\n");
    xml
}

/// Items without a main image are left out.
pub fn render_image_sitemap(site: &SiteProfile, items: &[ContentItem]) -> String {
    let mut xml = String::from(XML_DECLARATION);
    let _ = writeln!(xml, "<urlset xmlns=\"{SITEMAP_NS}\" xmlns:image=\"{IMAGE_NS}\">");
    for item in items {
        let Some(image) = item.main_image.as_deref().filter(|url| !url.is_empty()) else {
            continue;
        };
        xml.push_str("  <url>\n");
        let _ = writeln!(xml, "    <loc>{}</loc>", escape(&site.url(&item.path())));
        xml.push_str("    <image:image>\n");
        let _ = writeln!(xml, "      <image:loc>{}</image:loc>", escape(image));
        let _ = writeln!(xml, "      <image:title>{}</image:title>", escape(&item.title));
        if !item.description.is_empty() {
            let _ = writeln!(
                xml,
                "      <image:caption>{}</image:caption>",
                escape(&item.description)
            );
        }
        xml.push_str("    </image:image>\n");
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

/// Only posts published within the last 48 hours relative to `now` qualify.
pub fn render_news_sitemap(site: &SiteProfile, items: &[ContentItem], now: OffsetDateTime) -> String {
    let cutoff = now - NEWS_WINDOW;
    let mut xml = String::from(XML_DECLARATION);
    let _ = writeln!(xml, "<urlset xmlns=\"{SITEMAP_NS}\" xmlns:news=\"{NEWS_NS}\">");
    for item in items
        .iter()
        .filter(|item| item.published_at >= cutoff && item.published_at <= now)
    {
        xml.push_str("  <url>\n");
        let _ = writeln!(xml, "    <loc>{}</loc>", escape(&site.url(&item.path())));
        xml.push_str("    <news:news>\n");
        xml.push_str("      <news:publication>\n");
        let _ = writeln!(xml, "        <news:name>{}</news:name>", escape(&site.title));
        let _ = writeln!(
            xml,
            "        <news:language>{}</news:language>",
            escape(site.primary_language())
        );
        xml.push_str("      </news:publication>\n");
        let _ = writeln!(
            xml,
            "      <news:publication_date>{}</news:publication_date>",
            rfc3339(item.published_at)
        );
        let _ = writeln!(xml, "      <news:title>{}</news:title>", escape(&item.title));
        xml.push_str("    </news:news>\n");
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

pub fn render_robots(site: &SiteProfile, rules: &RobotsRules) -> String {
    let mut body = String::from("User-agent: *\nAllow: /\n");
    for path in &rules.disallow {
        let _ = writeln!(body, "Disallow: {path}");
    }
    let _ = write!(body, "\nSitemap: {}\n", site.url("/sitemap-index.xml"));
    body
}

fn rfc3339(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}
