use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Request, header};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use crate::application::gateways::{Credentials, Viewer};
use crate::application::guestbook::Caller;

use super::state::ApiState;

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";
const ANONYMOUS_CALLER: &str = "anonymous";

/// Viewer resolved for the current request, `None` for anonymous callers.
#[derive(Debug, Clone, Default)]
pub struct ResolvedViewer(pub Option<Viewer>);

/// Attach the [`Caller`] for rate limiting and, on writes, the signed-in viewer.
pub async fn resolve_caller(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    let caller = Caller {
        identity: caller_identity(request.headers(), peer),
        user_agent: request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    };

    let viewer = if request.method().is_safe() {
        None
    } else {
        let credentials = extract_credentials(request.headers());
        if credentials.is_empty() {
            None
        } else {
            match state.authenticator.viewer(&credentials).await {
                Ok(viewer) => viewer,
                Err(err) => {
                    warn!(
                        target = "vitrine::api::auth",
                        error = %err,
                        "session lookup failed; treating caller as anonymous"
                    );
                    None
                }
            }
        }
    };

    request.extensions_mut().insert(caller);
    request.extensions_mut().insert(ResolvedViewer(viewer));

    next.run(request).await
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the socket peer.
pub fn caller_identity(headers: &HeaderMap, peer: Option<String>) -> String {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| raw.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    header_value(FORWARDED_FOR)
        .or_else(|| header_value(REAL_IP))
        .or(peer)
        .unwrap_or_else(|| ANONYMOUS_CALLER.to_string())
}

pub fn extract_credentials(headers: &HeaderMap) -> Credentials {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string);
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .filter(|raw| !raw.trim().is_empty())
        .map(str::to_string);

    Credentials { bearer, cookie }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn identity_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            FORWARDED_FOR,
            HeaderValue::from_static(" 198.51.100.7 , 10.0.0.1"),
        );
        headers.insert(REAL_IP, HeaderValue::from_static("10.0.0.2"));
        assert_eq!(
            caller_identity(&headers, Some("127.0.0.1".into())),
            "198.51.100.7"
        );
    }

    #[test]
    fn identity_falls_back_to_peer_then_anonymous() {
        let headers = HeaderMap::new();
        assert_eq!(caller_identity(&headers, Some("127.0.0.1".into())), "127.0.0.1");
        assert_eq!(caller_identity(&headers, None), ANONYMOUS_CALLER);
    }

    #[test]
    fn credentials_read_bearer_and_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("session=xyz"));
        let credentials = extract_credentials(&headers);
        assert_eq!(credentials.bearer.as_deref(), Some("abc"));
        assert_eq!(credentials.cookie.as_deref(), Some("session=xyz"));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(extract_credentials(&headers).is_empty());
    }
}
