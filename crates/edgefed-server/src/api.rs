//! Shared plumbing for the HTTP handlers.

use crate::AppState;
use axum::{
    extract::Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use edgefed_federation::FederationError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Body returned by operations that have nothing else to report.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadGateway(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl From<FederationError> for ApiError {
    fn from(err: FederationError) -> Self {
        let message = err.to_string();
        match err {
            FederationError::InvalidArgument(_) | FederationError::NothingToUpdate => {
                ApiError::BadRequest(message)
            }
            FederationError::NotAuthorized(_) => ApiError::Forbidden(message),
            FederationError::NotFound(_) => ApiError::NotFound(message),
            FederationError::Conflict(_) | FederationError::AlreadyExists(_) => {
                ApiError::Conflict(message)
            }
            FederationError::PeerUnreachable { .. } | FederationError::PeerRejected { .. } => {
                ApiError::BadGateway(message)
            }
            FederationError::Store(_) => {
                tracing::error!(error = %message, "federation store failure");
                ApiError::InternalServerError(message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(serde_json::json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

/// Runs `f` on a blocking thread with a pooled connection.
///
/// Store access and outbound peer calls are synchronous, so every handler
/// funnels its work through here.
pub(crate) async fn blocking<T, F>(state: Arc<AppState>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&AppState, &mut rusqlite::Connection) -> Result<T, FederationError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut conn = state
            .pool
            .get()
            .map_err(|e| ApiError::InternalServerError(format!("db connection failed: {e}")))?;
        f(&state, &mut *conn).map_err(ApiError::from)
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("task join error: {e}")))?
}
