pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use state::ApiState;

use axum::{Router, middleware as axum_middleware, routing::get};

use crate::infra::http::RouterState;

pub fn build_api_router(state: RouterState) -> Router<RouterState> {
    let caller_state = state.api.clone();

    Router::new()
        .route(
            "/api/guestbook",
            get(handlers::list_guestbook).post(handlers::create_guestbook_entry),
        )
        .route("/api/comments/{post_id}", get(handlers::list_comments))
        .route_layer(axum_middleware::from_fn_with_state(
            caller_state,
            middleware::resolve_caller,
        ))
}
