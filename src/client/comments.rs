//! Comment list kept in sync with `GET /api/comments/{post_id}` by polling.
//!
//! [`CommentState`] only deduplicates; it never reorders. A [`CommentSession`] owns one
//! state for one page view and is never shared between views.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use reqwest::{Client, StatusCode, Url};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::comments::CommentRecord;

const SOURCE: &str = "client::comments";

#[derive(Debug, Default, Clone)]
pub struct CommentState {
    post_id: Option<String>,
    comments: Vec<CommentRecord>,
    seen: HashSet<String>,
}

impl CommentState {
    pub fn new(post_id: impl Into<String>) -> Self {
        let mut state = Self::default();
        state.set_post_id(post_id);
        state
    }

    pub fn post_id(&self) -> Option<&str> {
        self.post_id.as_deref()
    }

    /// Switch to another post. Comments gathered for a different post are dropped.
    pub fn set_post_id(&mut self, post_id: impl Into<String>) {
        let post_id = post_id.into();
        if self.post_id.as_deref() == Some(post_id.as_str()) {
            return;
        }
        self.post_id = Some(post_id);
        self.comments.clear();
        self.seen.clear();
    }

    /// Append `comment` unless its id is already stored. Returns whether it was added.
    pub fn append_if_new(&mut self, comment: CommentRecord) -> bool {
        if !self.seen.insert(comment.id.clone()) {
            return false;
        }
        self.comments.push(comment);
        true
    }

    /// Append every unseen comment in source order. Returns how many were added.
    pub fn merge(&mut self, comments: impl IntoIterator<Item = CommentRecord>) -> usize {
        let mut added = 0;
        for comment in comments {
            if self.append_if_new(comment) {
                added += 1;
            }
        }
        added
    }

    pub fn list_comments(&self) -> &[CommentRecord] {
        &self.comments
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }
}

/// Where comments come from. Implementations never fail; problems yield an empty list.
#[async_trait]
pub trait CommentSource: Send + Sync {
    async fn fetch(&self, post_id: &str) -> Vec<CommentRecord>;
}

#[derive(Clone)]
pub struct HttpCommentSource {
    client: Client,
    base_url: String,
}

impl HttpCommentSource {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `post_id` becomes a single percent-encoded path segment.
    fn endpoint(&self, post_id: &str) -> Option<Url> {
        let mut url = Url::parse(&self.base_url).ok()?;
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend(["api", "comments", post_id]);
        Some(url)
    }
}

#[async_trait]
impl CommentSource for HttpCommentSource {
    async fn fetch(&self, post_id: &str) -> Vec<CommentRecord> {
        let Some(endpoint) = self.endpoint(post_id) else {
            warn!(target = SOURCE, post_id, base_url = %self.base_url, "invalid comments base url");
            return Vec::new();
        };
        let response = match self.client.get(endpoint).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(target = SOURCE, post_id, error = %err, "comment request failed");
                return Vec::new();
            }
        };

        if response.status() != StatusCode::OK {
            warn!(
                target = SOURCE,
                post_id,
                status = response.status().as_u16(),
                "comment request returned non-success status"
            );
            return Vec::new();
        }

        response
            .json::<Vec<CommentRecord>>()
            .await
            .unwrap_or_else(|err| {
                warn!(target = SOURCE, post_id, error = %err, "malformed comment payload");
                Vec::new()
            })
    }
}

/// One view's comment state plus the source that refreshes it.
#[derive(Clone)]
pub struct CommentSession {
    source: Arc<dyn CommentSource>,
    state: Arc<Mutex<CommentState>>,
}

impl CommentSession {
    pub fn new(source: Arc<dyn CommentSource>, post_id: impl Into<String>) -> Self {
        Self {
            source,
            state: Arc::new(Mutex::new(CommentState::new(post_id))),
        }
    }

    pub async fn set_post_id(&self, post_id: impl Into<String>) {
        self.state.lock().await.set_post_id(post_id);
    }

    pub async fn snapshot(&self) -> Vec<CommentRecord> {
        self.state.lock().await.list_comments().to_vec()
    }

    /// Fetch once and merge. Returns how many new comments arrived.
    pub async fn poll_once(&self) -> usize {
        let Some(post_id) = self.state.lock().await.post_id().map(str::to_string) else {
            return 0;
        };

        counter!("vitrine_comment_poll_total").increment(1);
        let fetched = self.source.fetch(&post_id).await;

        let mut state = self.state.lock().await;
        // The view may have moved to another post while the request was in flight.
        if state.post_id() != Some(post_id.as_str()) {
            return 0;
        }
        let added = state.merge(fetched);
        if added > 0 {
            debug!(target = SOURCE, post_id = %post_id, added, "merged new comments");
        }
        added
    }

    /// Poll on a fixed interval until the returned handle is stopped.
    pub fn spawn_polling(&self, interval: Duration) -> PollingHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let session = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        session.poll_once().await;
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });
        PollingHandle { stop_tx, task }
    }
}

pub struct PollingHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollingHandle {
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(err) = self.task.await {
            warn!(target = SOURCE, error = %err, "comment polling task ended abnormally");
        }
    }
}
