//! [`Authenticator`] backed by the identity provider's session endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url, header};
use serde::Deserialize;

use crate::application::gateways::{AuthError, Authenticator, Credentials, Viewer};

#[derive(Debug, Deserialize)]
struct SessionResponse {
    user: Option<SessionUser>,
}

#[derive(Debug, Deserialize)]
struct SessionUser {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

impl From<SessionUser> for Viewer {
    fn from(user: SessionUser) -> Self {
        let name = user
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "Anonymous".to_string());
        Viewer {
            id: user.id,
            name,
            email: user.email,
            image: user.image,
        }
    }
}

/// Forwards the caller's cookie or bearer token and reads `{ user: {..} }` back.
#[derive(Clone)]
pub struct SessionAuthenticator {
    client: Client,
    session_url: Url,
}

impl SessionAuthenticator {
    pub fn new(session_url: Url, timeout: Duration) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AuthError::Upstream(err.to_string()))?;
        Ok(Self {
            client,
            session_url,
        })
    }
}

#[async_trait]
impl Authenticator for SessionAuthenticator {
    async fn viewer(&self, credentials: &Credentials) -> Result<Option<Viewer>, AuthError> {
        if credentials.is_empty() {
            return Ok(None);
        }

        let mut request = self.client.get(self.session_url.clone());
        if let Some(cookie) = credentials.cookie.as_deref() {
            request = request.header(header::COOKIE, cookie);
        }
        if let Some(token) = credentials.bearer.as_deref() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| AuthError::Upstream(err.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NO_CONTENT => {
                return Ok(None);
            }
            status if !status.is_success() => {
                return Err(AuthError::Upstream(format!("session endpoint returned {status}")));
            }
            _ => {}
        }

        let session: Option<SessionResponse> = response
            .json()
            .await
            .map_err(|err| AuthError::Upstream(err.to_string()))?;
        Ok(session.and_then(|session| session.user).map(Viewer::from))
    }
}
