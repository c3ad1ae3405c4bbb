//! RSS feed generation.
//!
//! The assembler is pure: it turns a list of already fetched items into an RSS 2.0
//! document. Fetching goes through the cache-aside layer in [`SyndicationService`].

use std::fmt::Write as _;
use std::sync::Arc;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc2822;
use tracing::warn;

use crate::application::cache_aside::CacheAside;
use crate::application::repos::ContentSource;
use crate::domain::content::ContentItem;
use crate::domain::site::SiteProfile;
use crate::util::xml::{XML_DECLARATION, escape};

pub const FEED_PATH: &str = "/feed.xml";
const FEED_CACHE_KEY: &str = "feed:posts";
const DEFAULT_ENCLOSURE_TYPE: &str = "image/jpeg";

#[derive(Clone)]
pub struct SyndicationService {
    content: Arc<dyn ContentSource>,
    cache: CacheAside,
    site: Arc<SiteProfile>,
    feed_limit: u32,
    ttl_seconds: u64,
}

impl SyndicationService {
    pub fn new(
        content: Arc<dyn ContentSource>,
        cache: CacheAside,
        site: Arc<SiteProfile>,
        feed_limit: u32,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            content,
            cache,
            site,
            feed_limit,
            ttl_seconds,
        }
    }

    /// Generate the RSS 2.0 document. Never fails: an unreachable content source yields
    /// a feed without items.
    pub async fn rss_feed(&self) -> String {
        let content = self.content.clone();
        let limit = self.feed_limit;
        let items = self
            .cache
            .fetch_with_cache(FEED_CACHE_KEY, self.ttl_seconds, || async move {
                content.recent(limit).await
            })
            .await
            .unwrap_or_else(|err| {
                warn!(
                    target = "application::syndication",
                    error = %err,
                    "failed to load posts for feed; serving empty feed"
                );
                Vec::new()
            });

        render_rss(
            &self.site,
            &self.site.url(FEED_PATH),
            &items,
            OffsetDateTime::now_utc(),
        )
    }
}

/// Render an RSS 2.0 channel for `items`.
pub fn render_rss(
    site: &SiteProfile,
    feed_url: &str,
    items: &[ContentItem],
    built_at: OffsetDateTime,
) -> String {
    let site_url = site.base_url();
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str("<rss version=\"2.0\" xmlns:atom=\"http://www.w3.org/2005/Atom\">\n");
    xml.push_str("  <channel>\n");
    let _ = writeln!(xml, "    <title>{}</title>", escape(&site.title));
    let _ = writeln!(xml, "    <link>{}</link>", escape(site_url));
    let _ = writeln!(xml, "    <description>{}</description>", escape(&site.description));
    let _ = writeln!(
        xml,
        "    <atom:link href=\"{}\" rel=\"self\" type=\"application/rss+xml\"/>",
        escape(feed_url)
    );
    let _ = writeln!(xml, "    <language>{}</language>", escape(&site.language));
    let _ = writeln!(xml, "    <lastBuildDate>{}</lastBuildDate>", rfc2822(built_at));
    if let Some(image) = site.image_url.as_deref() {
        xml.push_str("    <image>\n");
        let _ = writeln!(xml, "      <url>{}</url>", escape(image));
        let _ = writeln!(xml, "      <title>{}</title>", escape(&site.title));
        let _ = writeln!(xml, "      <link>{}</link>", escape(site_url));
        xml.push_str("    </image>\n");
    }

    for item in items {
        let link = site.url(&item.path());
        xml.push_str("    <item>\n");
        let _ = writeln!(xml, "      <title>{}</title>", escape(&item.title));
        let _ = writeln!(xml, "      <link>{}</link>", escape(&link));
        let _ = writeln!(xml, "      <guid isPermaLink=\"false\">{}</guid>", escape(&item.id));
        let _ = writeln!(xml, "      <description>{}</description>", escape(&item.description));
        let _ = writeln!(xml, "      <pubDate>{}</pubDate>", rfc2822(item.published_at));
        for category in &item.categories {
            let _ = writeln!(xml, "      <category>{}</category>", escape(category));
        }
        if let Some(image) = item.main_image.as_deref() {
            let _ = writeln!(
                xml,
                "      <enclosure url=\"{}\" length=\"0\" type=\"{}\"/>",
                escape(image),
                enclosure_type(image)
            );
        }
        xml.push_str("    </item>\n");
    }

    xml.push_str("  </channel>\n</rss>\n");
    xml
}

fn rfc2822(at: OffsetDateTime) -> String {
    at.format(&Rfc2822).unwrap_or_else(|_| at.to_string())
}

fn enclosure_type(image_url: &str) -> String {
    let path = url::Url::parse(image_url)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| image_url.to_string());
    mime_guess::from_path(path)
        .first()
        .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| DEFAULT_ENCLOSURE_TYPE.to_string())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn site() -> SiteProfile {
        SiteProfile::new("https://shop.example", "Shop & Blog", "News <weekly>")
            .with_image(Some("https://shop.example/logo.png".into()))
    }

    fn item(slug: &str, title: &str, image: Option<&str>) -> ContentItem {
        ContentItem {
            id: format!("id-{slug}"),
            title: title.to_string(),
            description: "desc".into(),
            slug: slug.to_string(),
            published_at: datetime!(2024-02-10 09:00 UTC),
            main_image: image.map(str::to_string),
            categories: vec!["launch".into()],
            reading_time: 3,
        }
    }

    #[test]
    fn channel_carries_site_metadata() {
        let xml = render_rss(
            &site(),
            "https://shop.example/feed.xml",
            &[],
            datetime!(2024-02-11 00:00 UTC),
        );
        assert!(xml.starts_with(XML_DECLARATION));
        assert!(xml.contains("<title>Shop &amp; Blog</title>"));
        assert!(xml.contains("<description>News &lt;weekly&gt;</description>"));
        assert!(xml.contains("<language>en-US</language>"));
        assert!(xml.contains("href=\"https://shop.example/feed.xml\" rel=\"self\""));
        assert!(xml.contains("<url>https://shop.example/logo.png</url>"));
        assert!(!xml.contains("<item>"));
        assert!(xml.trim_end().ends_with("</rss>"));
    }

    #[test]
    fn items_link_to_blog_and_escape_titles() {
        let items = vec![item("launch", "<New> & \"Improved\"", Some("https://cdn.example/a.webp?w=600"))];
        let xml = render_rss(
            &site(),
            "https://shop.example/feed.xml",
            &items,
            datetime!(2024-02-11 00:00 UTC),
        );
        assert!(xml.contains("<title>&lt;New&gt; &amp; &quot;Improved&quot;</title>"));
        assert!(xml.contains("<link>https://shop.example/blog/launch</link>"));
        assert!(xml.contains("<guid isPermaLink=\"false\">id-launch</guid>"));
        assert!(xml.contains("<pubDate>Sat, 10 Feb 2024 09:00:00 +0000</pubDate>"));
        assert!(xml.contains("<category>launch</category>"));
        assert!(xml.contains("url=\"https://cdn.example/a.webp?w=600\""));
        assert!(xml.contains("type=\"image/webp\""));
    }

    #[test]
    fn items_without_image_have_no_enclosure() {
        let xml = render_rss(
            &site(),
            "https://shop.example/feed.xml",
            &[item("plain", "Plain", None)],
            datetime!(2024-02-11 00:00 UTC),
        );
        assert!(xml.contains("<item>"));
        assert!(!xml.contains("<enclosure"));
    }

    #[test]
    fn unknown_extension_falls_back_to_jpeg() {
        assert_eq!(enclosure_type("https://cdn.example/image"), "image/jpeg");
        assert_eq!(enclosure_type("https://cdn.example/a.png"), "image/png");
    }
}
