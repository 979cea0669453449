//! Audit log query API.

use crate::api::ApiError;
use crate::AppState;
use axum::extract::{Extension, Query};
use axum::Json;
use edgefed_observe::{query_events, AuditEvent, EventFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Query parameters for `GET /api/federation/events`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    /// Filter by event type (e.g. `PARTNER_ADDED`).
    pub event_type: Option<String>,
    /// Filter by entity type (`federator` or `zone`).
    pub entity_type: Option<String>,
    /// Filter by entity id (a federation id or zone id).
    pub entity_id: Option<String>,
    /// Return events that occurred at or after this `YYYY-MM-DD HH:MM:SS` timestamp.
    pub since: Option<String>,
    /// Maximum number of events to return (default: 100, max: 1000).
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventsResponse {
    /// The matching events in sequence order.
    pub events: Vec<AuditEvent>,
    pub count: usize,
}

/// Handler for `GET /api/federation/events`.
pub async fn get_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<EventsQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let filter = EventFilter {
        event_type: params.event_type,
        entity_type: params.entity_type,
        entity_id: params.entity_id,
        since: params.since,
        limit: Some(params.limit.unwrap_or(100).clamp(1, 1000)),
    };

    let events = tokio::task::spawn_blocking(move || {
        let conn = state
            .pool
            .get()
            .map_err(|e| ApiError::InternalServerError(format!("db connection failed: {e}")))?;
        query_events(&conn, &filter).map_err(|e| ApiError::InternalServerError(e.to_string()))
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("task join error: {e}")))??;

    let count = events.len();
    Ok(Json(EventsResponse { events, count }))
}
