//! Repository traits describing persistence and content adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::comments::CommentRecord;
use crate::domain::content::{ContentItem, PostDetail, SlugEntry};
use crate::domain::guestbook::{GuestbookEntry, NewGuestbookEntry};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("upstream request failed: {0}")]
    Upstream(String),
    #[error("upstream returned malformed data: {0}")]
    Decode(String),
    #[error("resource not found")]
    NotFound,
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn from_upstream(err: impl std::fmt::Display) -> Self {
        Self::Upstream(err.to_string())
    }
}

/// One window of posts, newest first.
#[derive(Debug, Clone, Default)]
pub struct ContentPage {
    pub items: Vec<ContentItem>,
}

/// Read access to the headless content store.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn count_posts(&self) -> Result<u64, RepoError>;

    async fn list_posts(&self, offset: u64, limit: u32) -> Result<ContentPage, RepoError>;

    /// `Ok(None)` when no published post carries the slug.
    async fn post(&self, slug: &str) -> Result<Option<PostDetail>, RepoError>;

    async fn slugs(&self, limit: u32) -> Result<Vec<SlugEntry>, RepoError>;

    /// Most recent posts, newest first, capped at `limit`.
    async fn recent(&self, limit: u32) -> Result<Vec<ContentItem>, RepoError>;
}

#[async_trait]
pub trait GuestbookRepo: Send + Sync {
    /// Newest entries first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<GuestbookEntry>, RepoError>;

    async fn insert(&self, entry: NewGuestbookEntry) -> Result<GuestbookEntry, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// Oldest comments first.
    async fn list_for_post(&self, post_id: &str) -> Result<Vec<CommentRecord>, RepoError>;
}
