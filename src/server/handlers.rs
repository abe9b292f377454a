//! Request handlers. Thin adapters between HTTP and the notification core.
//!
//! Registry mutations do file I/O and run on the blocking pool.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use super::types::{
    ApiError, HealthResponse, PublicKeyResponse, PushResponse, Status, StatusResponse,
    UnsubscribeRequest,
};
use super::AppState;
use crate::notifications::{broadcast, evict, PushMessage, PushSubscription};

fn bad_json(what: &str, rejection: &JsonRejection) -> ApiError {
    ApiError::BadRequest(format!("invalid {what}: {}", rejection.body_text()))
}

/// `GET /api/vapid-public-key`
pub(super) async fn public_key(State(state): State<AppState>) -> Json<PublicKeyResponse> {
    Json(PublicKeyResponse {
        public_key: state.public_key.to_string(),
    })
}

/// `POST /api/subscribe`
pub(super) async fn subscribe(
    State(state): State<AppState>,
    payload: Result<Json<PushSubscription>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(subscription) = payload.map_err(|e| bad_json("subscription", &e))?;

    if subscription.endpoint.trim().is_empty() {
        return Err(ApiError::BadRequest("endpoint must not be empty".to_string()));
    }
    if subscription.keys.p256dh.is_empty() || subscription.keys.auth.is_empty() {
        return Err(ApiError::BadRequest(
            "keys.p256dh and keys.auth must not be empty".to_string(),
        ));
    }

    let registry = Arc::clone(&state.registry);
    tokio::task::spawn_blocking(move || registry.upsert(subscription))
        .await?
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok(Json(StatusResponse {
        status: Status::Success,
        message: "subscribed",
    }))
}

/// `POST /api/unsubscribe`
///
/// Unknown endpoints answer `not_found` with 200: unsubscribing twice is safe.
pub(super) async fn unsubscribe(
    State(state): State<AppState>,
    payload: Result<Json<UnsubscribeRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(UnsubscribeRequest { endpoint }) = payload.map_err(|e| bad_json("request", &e))?;

    if endpoint.trim().is_empty() {
        return Err(ApiError::BadRequest("endpoint must not be empty".to_string()));
    }

    let registry = Arc::clone(&state.registry);
    let existed = tokio::task::spawn_blocking(move || registry.remove(&endpoint)).await?;

    Ok(Json(if existed {
        StatusResponse {
            status: Status::Success,
            message: "unsubscribed",
        }
    } else {
        StatusResponse {
            status: Status::NotFound,
            message: "subscription not found",
        }
    }))
}

/// `POST /api/push`
///
/// Waits for every delivery to finish, then evicts gone subscriptions.
pub(super) async fn push(
    State(state): State<AppState>,
    payload: Result<Json<PushMessage>, JsonRejection>,
) -> Result<Json<PushResponse>, ApiError> {
    let Json(message) = payload.map_err(|e| bad_json("push message", &e))?;

    let snapshot = state.registry.snapshot();
    let report = broadcast(state.delivery.as_ref(), &message, &snapshot)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to serialize notification: {e}")))?;

    let registry = Arc::clone(&state.registry);
    let gone = report.gone.clone();
    let (removed, total) = tokio::task::spawn_blocking(move || {
        let removed = evict(&registry, &gone);
        (removed, registry.count())
    })
    .await?;

    Ok(Json(PushResponse {
        status: Status::Success,
        success: report.delivered,
        failed: report.failed,
        removed,
        total,
        message: format!(
            "Pushed to {} subscription(s): {} delivered, {} failed",
            report.attempted(),
            report.delivered,
            report.failed
        ),
    }))
}

/// `GET /health`
pub(super) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        subscriptions: state.registry.count(),
    })
}
