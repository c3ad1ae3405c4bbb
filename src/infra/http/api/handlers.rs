use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use crate::application::guestbook::Caller;

use super::error::ApiError;
use super::middleware::ResolvedViewer;
use super::state::ApiState;

const MAX_POST_ID_LEN: usize = 128;

pub async fn list_guestbook(
    State(state): State<ApiState>,
    Extension(caller): Extension<Caller>,
) -> Response {
    match state.guestbook.list(&caller).await {
        Ok(entries) => Json(entries).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn create_guestbook_entry(
    State(state): State<ApiState>,
    Extension(caller): Extension<Caller>,
    Extension(ResolvedViewer(viewer)): Extension<ResolvedViewer>,
    body: Bytes,
) -> Response {
    match state.guestbook.create(&caller, viewer, &body).await {
        Ok(entry) => (StatusCode::CREATED, Json(entry)).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn list_comments(
    State(state): State<ApiState>,
    Path(post_id): Path<String>,
) -> Response {
    let post_id = post_id.trim();
    if post_id.is_empty() || post_id.len() > MAX_POST_ID_LEN {
        return ApiError::bad_request(
            "Invalid post id",
            Some(format!("expected 1 to {MAX_POST_ID_LEN} bytes")),
        )
        .into_response();
    }

    Json(state.comments.list(post_id).await).into_response()
}
