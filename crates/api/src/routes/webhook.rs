//! Route definitions for webhook ingress.
//!
//! ```text
//! POST /    receive_push
//! ```

use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;

use crate::handlers::webhook;
use crate::state::AppState;

/// GitHub caps delivery payloads at 25 MB.
pub const MAX_PAYLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(webhook::receive_push))
        .layer(DefaultBodyLimit::max(MAX_PAYLOAD_BYTES))
}
