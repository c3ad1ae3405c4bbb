//! Narrow capability traits for third-party services: key-value cache, e-mail,
//! authentication and rate limiting.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache command failed: {0}")]
    Command(String),
}

/// Remote key-value store with per-key expiry.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// `Ok(None)` for absent or expired keys.
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), KvError>;

    /// Increment an integer counter, creating it at zero first. Returns the new value.
    async fn incr(&self, key: &str) -> Result<u64, KvError>;
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail request failed: {0}")]
    Transport(String),
    #[error("mail provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("session lookup failed: {0}")]
    Upstream(String),
}

/// Signed-in user as reported by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub image: Option<String>,
}

/// Raw credentials lifted off a request.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub bearer: Option<String>,
    pub cookie: Option<String>,
}

impl Credentials {
    pub fn is_empty(&self) -> bool {
        self.bearer.is_none() && self.cookie.is_none()
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `Ok(None)` when the credentials do not identify a session.
    async fn viewer(&self, credentials: &Credentials) -> Result<Option<Viewer>, AuthError>;
}

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("rate limiter backend failed: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after: Duration,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count one request against `key` and report whether it may proceed.
    async fn check(&self, key: &str) -> Result<RateDecision, RateLimitError>;
}
