//! Webhook ingress: turns a GitHub push delivery into a deployment run.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use axum::Json;
use hooktail_core::error::CoreError;
use hooktail_core::push_event::PushEvent;
use hooktail_core::signature::{self, SIGNATURE_HEADER};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Body returned once a deployment has been handed to the launcher.
#[derive(Debug, Serialize)]
pub struct DeploymentAccepted {
    pub status: &'static str,
    pub repository: String,
    pub branch: String,
    pub run_id: Uuid,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /
///
/// Checks run in a fixed order: content type, payload, target lookup,
/// signature. Nothing executes unless all of them pass. The deployment
/// itself runs after the response in background mode.
pub async fn receive_push(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<DataResponse<DeploymentAccepted>>> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !is_json_content_type(content_type) {
        tracing::warn!(content_type, "Rejected webhook with unsupported content type");
        return Err(AppError::UnsupportedMediaType(format!(
            "expected application/json, got {content_type:?}"
        )));
    }

    let event = PushEvent::parse(&body).map_err(|e| {
        tracing::warn!(error = %e, "Rejected webhook with malformed payload");
        AppError::BadRequest(format!("invalid push payload: {e}"))
    })?;

    let repository = event.ssh_url();
    tracing::info!(
        repository,
        git_ref = %event.git_ref,
        after = %event.after,
        pusher = %event.pusher.name,
        "Received push webhook",
    );

    let target = state.registry.find(repository).ok_or_else(|| {
        tracing::warn!(repository, "No deployment configured for repository");
        CoreError::NotFound {
            repository: repository.to_string(),
        }
    })?;

    if let Some(secret) = target.secret() {
        let presented = signature_from_headers(&headers);
        if !signature::verify(secret, &body, &presented) {
            tracing::warn!(repository, "Rejected webhook with invalid signature");
            return Err(CoreError::Unauthorized("invalid signature".to_string()).into());
        }
    }

    let launched = state.launcher.launch(target.clone()).await;
    tracing::info!(
        repository,
        run_id = %launched.run_id,
        "Deployment launched",
    );

    Ok(Json(DataResponse {
        data: DeploymentAccepted {
            status: "started",
            repository: target.repository.clone(),
            branch: target.branch.clone(),
            run_id: launched.run_id,
        },
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `application/json`, ignoring case and any parameters.
fn is_json_content_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// The first `X-Hub-Signature` value, without its `sha1=` prefix and
/// lower-cased. A missing or non-ASCII header yields an empty string, which
/// never verifies.
pub fn signature_from_headers(headers: &HeaderMap) -> String {
    headers
        .get_all(SIGNATURE_HEADER)
        .iter()
        .next()
        .and_then(|v| v.to_str().ok())
        .map(signature::normalize_signature)
        .unwrap_or_default()
}
