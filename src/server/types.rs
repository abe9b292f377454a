//! Request/response bodies for the HTTP API and the error type handlers return.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `POST /api/unsubscribe` body.
#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    /// Endpoint to remove.
    pub endpoint: String,
}

/// `GET /api/vapid-public-key` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    /// Base64url uncompressed P-256 point.
    pub public_key: String,
}

/// Outcome of a subscribe/unsubscribe call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The request took effect.
    Success,
    /// Unsubscribe named an endpoint that was not registered.
    NotFound,
}

/// Subscribe/unsubscribe response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Outcome.
    pub status: Status,
    /// Human-readable description.
    pub message: &'static str,
}

/// `POST /api/push` response.
#[derive(Debug, Serialize)]
pub struct PushResponse {
    /// Always `success` once the broadcast ran.
    pub status: Status,
    /// Deliveries accepted by push services.
    pub success: usize,
    /// Failed deliveries (gone included).
    pub failed: usize,
    /// Subscriptions evicted because their push service reported them gone.
    pub removed: usize,
    /// Subscriptions still registered after eviction.
    pub total: usize,
    /// Human-readable summary.
    pub message: String,
}

/// `GET /health` response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok`.
    pub status: &'static str,
    /// Registered subscription count.
    pub subscriptions: usize,
}

/// Error body for non-2xx responses.
#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

/// Handler failure, mapped onto an HTTP status.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing request fields.
    #[error("{0}")]
    BadRequest(String),
    /// Unexpected server-side failure.
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(message) => {
                log::debug!("Rejected request: {message}");
                StatusCode::BAD_REQUEST
            }
            Self::Internal(message) => {
                log::error!("Request failed: {message}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorBody {
            status: "error",
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("registry task failed: {e}"))
    }
}
