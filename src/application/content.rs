//! Blog listing and post lookup, with view counts kept in the key-value store.

use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::gateways::KvStore;
use crate::application::pagination::{
    PageMarker, PageWindow, compute_page_numbers, compute_page_window,
};
use crate::application::repos::{ContentSource, RepoError};
use crate::domain::content::{ContentItem, PostDetail};

const SOURCE: &str = "application::content";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("post `{slug}` not found")]
    NotFound { slug: String },
    #[error("content source unavailable: {0}")]
    Upstream(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct PostSummary {
    pub item: ContentItem,
    pub views: u64,
}

#[derive(Debug, Clone)]
pub struct BlogPage {
    pub posts: Vec<PostSummary>,
    pub window: PageWindow,
    pub numbers: Vec<PageMarker>,
}

#[derive(Clone)]
pub struct ContentService {
    content: Arc<dyn ContentSource>,
    kv: Arc<dyn KvStore>,
    page_size: u32,
}

pub fn views_key(slug: &str) -> String {
    format!("pageviews:posts:{slug}")
}

impl ContentService {
    pub fn new(content: Arc<dyn ContentSource>, kv: Arc<dyn KvStore>, page_size: u32) -> Self {
        Self {
            content,
            kv,
            page_size: page_size.max(1),
        }
    }

    /// Load one page of the blog index. An unreachable content source produces an empty
    /// page rather than an error.
    pub async fn list_page(&self, requested_page: u32) -> BlogPage {
        let total = match self.content.count_posts().await {
            Ok(total) => total,
            Err(err) => {
                warn!(target = SOURCE, error = %err, "failed to count posts");
                return empty_page(self.page_size);
            }
        };

        let window = compute_page_window(requested_page, total, self.page_size);
        let items = if total == 0 {
            Vec::new()
        } else {
            match self
                .content
                .list_posts(window.offset(), window.limit())
                .await
            {
                Ok(page) => page.items,
                Err(err) => {
                    warn!(
                        target = SOURCE,
                        page = window.current_page,
                        error = %err,
                        "failed to list posts"
                    );
                    Vec::new()
                }
            }
        };

        let views = join_all(items.iter().map(|item| self.views(&item.slug))).await;
        let posts = items
            .into_iter()
            .zip(views)
            .map(|(item, views)| PostSummary { item, views })
            .collect();

        BlogPage {
            posts,
            numbers: compute_page_numbers(window.current_page, window.total_pages),
            window,
        }
    }

    pub async fn post(&self, slug: &str) -> Result<PostDetail, ContentError> {
        self.content
            .post(slug)
            .await?
            .ok_or_else(|| ContentError::NotFound {
                slug: slug.to_string(),
            })
    }

    /// Current view count. Missing or unreadable counters read as zero.
    pub async fn views(&self, slug: &str) -> u64 {
        match self.kv.get(&views_key(slug)).await {
            Ok(Some(raw)) => raw.trim().parse().unwrap_or_else(|_| {
                debug!(target = SOURCE, slug, raw = %raw, "ignoring non-numeric view counter");
                0
            }),
            Ok(None) => 0,
            Err(err) => {
                warn!(target = SOURCE, slug, error = %err, "failed to read view counter");
                0
            }
        }
    }

    /// Count one view and return the new total, or zero when the counter is unavailable.
    pub async fn record_view(&self, slug: &str) -> u64 {
        self.kv.incr(&views_key(slug)).await.unwrap_or_else(|err| {
            warn!(target = SOURCE, slug, error = %err, "failed to record view");
            0
        })
    }
}

fn empty_page(page_size: u32) -> BlogPage {
    BlogPage {
        posts: Vec::new(),
        window: compute_page_window(1, 0, page_size),
        numbers: Vec::new(),
    }
}
