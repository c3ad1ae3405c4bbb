//! In-memory collaborators used by tests and as fallbacks when a service is not configured.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::application::gateways::{
    AuthError, Authenticator, Credentials, KvError, KvStore, Viewer,
};
use crate::application::repos::{
    CommentsRepo, ContentPage, ContentSource, GuestbookRepo, RepoError,
};
use crate::domain::comments::CommentRecord;
use crate::domain::content::{ContentItem, PostDetail, SlugEntry};
use crate::domain::guestbook::{GuestbookEntry, NewGuestbookEntry};

/// Key-value store with per-key expiry.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: DashMap<String, (String, Option<Instant>)>,
}

impl MemoryKvStore {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            None => return Ok(None),
            Some(entry) => match entry.1 {
                Some(deadline) if deadline <= now => true,
                _ => return Ok(Some(entry.0.clone())),
            },
        };
        if expired {
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), KvError> {
        let deadline = Instant::now() + Duration::from_secs(ttl_seconds.max(1));
        self.entries
            .insert(key.to_string(), (value.to_string(), Some(deadline)));
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<u64, KvError> {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| ("0".to_string(), None));
        if entry.1.is_some_and(|deadline| deadline <= now) {
            *entry = ("0".to_string(), None);
        }
        let current: u64 = entry
            .0
            .parse()
            .map_err(|_| KvError::Command(format!("value at `{key}` is not an integer")))?;
        let next = current + 1;
        entry.0 = next.to_string();
        Ok(next)
    }
}

/// Fixed set of posts, served newest first.
#[derive(Debug, Default)]
pub struct MemoryContentSource {
    posts: Vec<PostDetail>,
}

impl MemoryContentSource {
    pub fn new(mut posts: Vec<PostDetail>) -> Self {
        posts.sort_by(|a, b| b.item.published_at.cmp(&a.item.published_at));
        Self { posts }
    }

    fn items(&self) -> impl Iterator<Item = &ContentItem> {
        self.posts.iter().map(|post| &post.item)
    }
}

#[async_trait]
impl ContentSource for MemoryContentSource {
    async fn count_posts(&self) -> Result<u64, RepoError> {
        Ok(self.posts.len() as u64)
    }

    async fn list_posts(&self, offset: u64, limit: u32) -> Result<ContentPage, RepoError> {
        let items = self
            .items()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(ContentPage { items })
    }

    async fn post(&self, slug: &str) -> Result<Option<PostDetail>, RepoError> {
        Ok(self.posts.iter().find(|post| post.item.slug == slug).cloned())
    }

    async fn slugs(&self, limit: u32) -> Result<Vec<SlugEntry>, RepoError> {
        Ok(self
            .items()
            .take(limit as usize)
            .map(|item| SlugEntry {
                slug: item.slug.clone(),
                updated_at: item.published_at,
            })
            .collect())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<ContentItem>, RepoError> {
        Ok(self.items().take(limit as usize).cloned().collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryGuestbookRepo {
    entries: RwLock<Vec<GuestbookEntry>>,
    next_id: AtomicI64,
}

#[async_trait]
impl GuestbookRepo for MemoryGuestbookRepo {
    async fn list_recent(&self, limit: u32) -> Result<Vec<GuestbookEntry>, RepoError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().rev().take(limit as usize).cloned().collect())
    }

    async fn insert(&self, entry: NewGuestbookEntry) -> Result<GuestbookEntry, RepoError> {
        let stored = GuestbookEntry {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            message: entry.message.into_inner(),
            user_id: entry.user_id,
            user_name: entry.user_name,
            user_email: entry.user_email,
            user_image: entry.user_image,
            created_at: OffsetDateTime::now_utc(),
        };
        self.entries.write().await.push(stored.clone());
        Ok(stored)
    }
}

#[derive(Debug, Default)]
pub struct MemoryCommentsRepo {
    comments: Vec<CommentRecord>,
}

impl MemoryCommentsRepo {
    pub fn new(comments: Vec<CommentRecord>) -> Self {
        Self { comments }
    }
}

#[async_trait]
impl CommentsRepo for MemoryCommentsRepo {
    async fn list_for_post(&self, post_id: &str) -> Result<Vec<CommentRecord>, RepoError> {
        let mut comments: Vec<_> = self
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by_key(|comment| comment.created_at);
        Ok(comments)
    }
}

/// Maps bearer tokens to viewers. Cookies are ignored.
#[derive(Debug, Default)]
pub struct StaticAuthenticator {
    sessions: DashMap<String, Viewer>,
}

impl StaticAuthenticator {
    pub fn with_session(self, token: impl Into<String>, viewer: Viewer) -> Self {
        self.sessions.insert(token.into(), viewer);
        self
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn viewer(&self, credentials: &Credentials) -> Result<Option<Viewer>, AuthError> {
        Ok(credentials
            .bearer
            .as_deref()
            .and_then(|token| self.sessions.get(token).map(|viewer| viewer.clone())))
    }
}
