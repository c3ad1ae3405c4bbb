//! Read-only comments API.

use std::sync::Arc;

use tracing::warn;

use crate::application::repos::CommentsRepo;
use crate::domain::comments::CommentRecord;

#[derive(Clone)]
pub struct CommentsService {
    repo: Arc<dyn CommentsRepo>,
}

impl CommentsService {
    pub fn new(repo: Arc<dyn CommentsRepo>) -> Self {
        Self { repo }
    }

    /// Comments for `post_id`, oldest first. Storage failures yield an empty list.
    pub async fn list(&self, post_id: &str) -> Vec<CommentRecord> {
        match self.repo.list_for_post(post_id).await {
            Ok(mut comments) => {
                comments.sort_by_key(|comment| comment.created_at);
                comments
            }
            Err(err) => {
                warn!(
                    target = "application::comments",
                    post_id,
                    error = %err,
                    "failed to load comments"
                );
                Vec::new()
            }
        }
    }
}
