//! Content items fetched from the headless CMS.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

const WORDS_PER_MINUTE: usize = 200;

/// A published post as seen by listings, feeds and sitemaps.
///
/// Owned by the content source; nothing in this crate mutates an item after fetching it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub slug: String,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
    #[serde(default)]
    pub main_image: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default = "default_reading_time")]
    pub reading_time: u32,
}

fn default_reading_time() -> u32 {
    1
}

impl ContentItem {
    pub fn path(&self) -> String {
        format!("/blog/{}", self.slug)
    }
}

/// A single post with its body, as rendered on the post page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDetail {
    pub item: ContentItem,
    pub body_html: String,
}

/// Slug plus last-modified timestamp, enough to emit one sitemap entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlugEntry {
    pub slug: String,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Estimated reading time in whole minutes, never less than one.
pub fn reading_time_minutes(body: &str) -> u32 {
    let words = body.split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}
