//! Page metadata for `<head>`: canonical links, OpenGraph tags and JSON-LD.

use serde_json::json;
use time::format_description::well_known::Rfc3339;

use crate::domain::content::ContentItem;
use crate::domain::site::SiteProfile;

#[derive(Debug, Clone, PartialEq)]
pub struct PageMeta {
    pub title: String,
    pub description: String,
    pub canonical: String,
    pub image: Option<String>,
    pub og_type: &'static str,
    pub published_time: Option<String>,
    /// Serialized structured data, already safe to embed in a `<script>` element.
    pub json_ld: Option<String>,
}

impl PageMeta {
    pub fn site(site: &SiteProfile) -> Self {
        Self {
            title: site.title.clone(),
            description: site.description.clone(),
            canonical: site.url("/"),
            image: site.image_url.clone(),
            og_type: "website",
            published_time: None,
            json_ld: None,
        }
    }

    pub fn blog_index(site: &SiteProfile, page: u32) -> Self {
        let (title, canonical) = if page > 1 {
            (
                format!("Blog (page {page}) | {}", site.title),
                site.url(&format!("/blog?page={page}")),
            )
        } else {
            (format!("Blog | {}", site.title), site.url("/blog"))
        };
        Self {
            title,
            canonical,
            ..Self::site(site)
        }
    }

    pub fn not_found(site: &SiteProfile) -> Self {
        Self {
            title: format!("Not found | {}", site.title),
            ..Self::site(site)
        }
    }

    pub fn post(site: &SiteProfile, item: &ContentItem) -> Self {
        let canonical = site.url(&item.path());
        let published_time = item.published_at.format(&Rfc3339).ok();
        let image = item.main_image.clone().or_else(|| site.image_url.clone());

        let structured = json!({
            "@context": "https://schema.org",
            "@type": "BlogPosting",
            "headline": item.title,
            "description": item.description,
            "datePublished": published_time,
            "image": image,
            "url": canonical,
            "keywords": item.categories.join(", "),
            "author": { "@type": "Person", "name": site.author },
            "publisher": { "@type": "Organization", "name": site.title },
        });

        Self {
            title: format!("{} | {}", item.title, site.title),
            description: if item.description.is_empty() {
                site.description.clone()
            } else {
                item.description.clone()
            },
            canonical,
            image,
            og_type: "article",
            published_time,
            json_ld: Some(embed_json(&structured.to_string())),
        }
    }
}

/// `</script>` inside JSON would terminate the element early.
fn embed_json(raw: &str) -> String {
    raw.replace("</", "<\\/")
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn site() -> SiteProfile {
        SiteProfile::new("https://shop.example", "Shop", "Everything for the shop")
            .with_image(Some("https://shop.example/og.png".into()))
            .with_author("Shop Team")
    }

    #[test]
    fn blog_index_canonical_includes_page_after_first() {
        assert_eq!(PageMeta::blog_index(&site(), 1).canonical, "https://shop.example/blog");
        assert_eq!(
            PageMeta::blog_index(&site(), 3).canonical,
            "https://shop.example/blog?page=3"
        );
    }

    #[test]
    fn post_meta_falls_back_to_site_image_and_embeds_json_ld() {
        let item = ContentItem {
            id: "1".into(),
            title: "</script><b>".into(),
            description: String::new(),
            slug: "x".into(),
            published_at: datetime!(2024-04-01 10:00 UTC),
            main_image: None,
            categories: vec!["a".into(), "b".into()],
            reading_time: 2,
        };
        let meta = PageMeta::post(&site(), &item);
        assert_eq!(meta.og_type, "article");
        assert_eq!(meta.image.as_deref(), Some("https://shop.example/og.png"));
        assert_eq!(meta.description, "Everything for the shop");
        assert_eq!(meta.published_time.as_deref(), Some("2024-04-01T10:00:00Z"));

        let json_ld = meta.json_ld.expect("json-ld");
        assert!(!json_ld.contains("</script>"));
        assert!(json_ld.contains("\"BlogPosting\""));
        assert!(json_ld.contains("\"a, b\""));
    }
}
