//! Guestbook reads and writes.
//!
//! Writes require a signed-in viewer, pass message validation and a per-user rate limit,
//! and may trigger a notification e-mail. Search-engine crawlers are answered with a
//! synthetic entry so indexing never trips the auth wall; nothing is stored for them.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};
use vitrine_api_types::{CreateGuestbookEntry, GuestbookEntryView};

use crate::application::gateways::{
    Mailer, OutgoingEmail, RateDecision, RateLimiter, Viewer,
};
use crate::application::repos::{GuestbookRepo, RepoError};
use crate::domain::guestbook::{
    GuestbookEntry, NewGuestbookEntry, ValidationError, validate_message,
};

const SOURCE: &str = "application::guestbook";
const LIST_LIMIT: u32 = 100;
const CRAWLER_MARKERS: [&str; 7] = [
    "googlebot",
    "bingbot",
    "slurp",
    "duckduckbot",
    "baiduspider",
    "yandexbot",
    "applebot",
];

#[derive(Debug, Error)]
pub enum GuestbookError {
    #[error("sign in to leave a message")]
    Unauthorized,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("too many requests; retry in {} seconds", retry_after.as_secs())]
    RateLimited { retry_after: Duration },
    #[error("guestbook storage unavailable: {0}")]
    Upstream(#[from] RepoError),
}

/// Who is asking, as far as rate limiting is concerned.
#[derive(Debug, Clone)]
pub struct Caller {
    /// Client address or another stable identity for anonymous callers.
    pub identity: String,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NotificationSettings {
    pub recipient: String,
    pub site_title: String,
}

#[derive(Clone)]
pub struct GuestbookService {
    repo: Arc<dyn GuestbookRepo>,
    read_limiter: Arc<dyn RateLimiter>,
    write_limiter: Arc<dyn RateLimiter>,
    mailer: Arc<dyn Mailer>,
    notification: Option<NotificationSettings>,
    id_salt: String,
}

impl GuestbookService {
    pub fn new(
        repo: Arc<dyn GuestbookRepo>,
        read_limiter: Arc<dyn RateLimiter>,
        write_limiter: Arc<dyn RateLimiter>,
        mailer: Arc<dyn Mailer>,
        notification: Option<NotificationSettings>,
        id_salt: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            read_limiter,
            write_limiter,
            mailer,
            notification,
            id_salt: id_salt.into(),
        }
    }

    pub async fn list(&self, caller: &Caller) -> Result<Vec<GuestbookEntryView>, GuestbookError> {
        self.enforce(
            self.read_limiter.as_ref(),
            &format!("guestbook:read:{}", caller.identity),
        )
        .await?;

        let entries = self.repo.list_recent(LIST_LIMIT).await?;
        Ok(entries
            .iter()
            .map(|entry| entry.to_view(&self.id_salt))
            .collect())
    }

    /// Create an entry from a raw JSON body.
    pub async fn create(
        &self,
        caller: &Caller,
        viewer: Option<Viewer>,
        body: &[u8],
    ) -> Result<GuestbookEntryView, GuestbookError> {
        if caller.user_agent.as_deref().is_some_and(is_search_crawler) {
            info!(target = SOURCE, "answering crawler with synthetic guestbook entry");
            return Ok(synthetic_entry(body));
        }

        let viewer = viewer.ok_or(GuestbookError::Unauthorized)?;
        let request: CreateGuestbookEntry = serde_json::from_slice(body).map_err(|err| {
            ValidationError::single("body", format!("expected JSON object with `message`: {err}"))
        })?;
        let message = validate_message(&request.message)?;

        self.enforce(
            self.write_limiter.as_ref(),
            &format!("guestbook:write:{}", viewer.id),
        )
        .await?;

        let entry = self
            .repo
            .insert(NewGuestbookEntry {
                message,
                user_id: viewer.id,
                user_name: viewer.name,
                user_email: viewer.email,
                user_image: viewer.image,
            })
            .await?;

        self.notify(&entry).await;

        Ok(entry.to_view(&self.id_salt))
    }

    async fn enforce(&self, limiter: &dyn RateLimiter, key: &str) -> Result<(), GuestbookError> {
        match limiter.check(key).await {
            Ok(RateDecision {
                allowed: false,
                retry_after,
                ..
            }) => {
                counter!("vitrine_rate_limited_total").increment(1);
                Err(GuestbookError::RateLimited { retry_after })
            }
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(target = SOURCE, key, error = %err, "rate limiter unavailable; allowing request");
                Ok(())
            }
        }
    }

    async fn notify(&self, entry: &GuestbookEntry) {
        let Some(settings) = self.notification.as_ref() else {
            return;
        };

        let email = OutgoingEmail {
            to: settings.recipient.clone(),
            subject: format!("New guestbook message on {}", settings.site_title),
            text: format!("{} wrote:\n\n{}", entry.user_name, entry.message),
        };

        if let Err(err) = self.mailer.send(email).await {
            warn!(
                target = SOURCE,
                entry_id = entry.id,
                error = %err,
                "guestbook notification failed"
            );
        }
    }
}

pub fn is_search_crawler(user_agent: &str) -> bool {
    let lowered = user_agent.to_ascii_lowercase();
    CRAWLER_MARKERS.iter().any(|marker| lowered.contains(marker))
}

fn synthetic_entry(body: &[u8]) -> GuestbookEntryView {
    let message = serde_json::from_slice::<CreateGuestbookEntry>(body)
        .map(|request| request.message)
        .unwrap_or_default();
    GuestbookEntryView {
        id: "0".to_string(),
        message,
        user_name: "Guest".to_string(),
        user_image: None,
        created_at: OffsetDateTime::now_utc(),
    }
}
