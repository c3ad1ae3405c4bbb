use std::time::Duration;

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use axum::response::{IntoResponse, Response};
use vitrine_api_types::{ApiErrorBody, ApiErrorMessage, ValidationIssue};

use crate::application::error::ErrorReport;
use crate::application::guestbook::GuestbookError;

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const RATE_LIMITED: &str = "rate_limited";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const UPSTREAM: &str = "upstream_unavailable";
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    issues: Vec<ValidationIssue>,
    retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            issues: Vec::new(),
            retry_after: None,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn invalid_input(issues: Vec<ValidationIssue>) -> Self {
        Self {
            issues,
            ..Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "Request body failed validation",
                None,
            )
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Sign in required",
            None,
        )
    }

    pub fn upstream(hint: String) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::UPSTREAM,
            "Service temporarily unavailable",
            Some(hint),
        )
    }

    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                codes::RATE_LIMITED,
                "Rate limit exceeded",
                Some(format!("Retry after {retry_after} seconds")),
            )
        }
    }
}

/// Whole seconds for `Retry-After`, never below one.
fn retry_after_seconds(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}

impl From<GuestbookError> for ApiError {
    fn from(error: GuestbookError) -> Self {
        match error {
            GuestbookError::Unauthorized => ApiError::unauthorized(),
            GuestbookError::Validation(err) => ApiError::invalid_input(err.issues),
            GuestbookError::RateLimited { retry_after } => {
                ApiError::rate_limited(retry_after_seconds(retry_after))
            }
            GuestbookError::Upstream(err) => ApiError::upstream(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = format!(
            "{}: {}",
            self.code,
            self.hint.as_deref().unwrap_or(self.message)
        );
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
                issues: self.issues,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(value) = self
            .retry_after
            .and_then(|secs| HeaderValue::from_str(&secs.to_string()).ok())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        ErrorReport::from_message("infra::http::api", self.status, detail).attach(&mut response);
        response
    }
}
