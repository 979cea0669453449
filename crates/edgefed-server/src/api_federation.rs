//! Peer protocol endpoints: the receiving half of every federation exchange.
//!
//! These routes are not behind the management auth middleware. Peers are
//! identified by the federation ids in the body and checked against the
//! store by the inbound handlers.

use crate::api::{blocking, ApiError};
use crate::AppState;
use axum::extract::{Extension, Json};
use edgefed_federation::inbound;
use edgefed_federation::wire::{
    Ack, FederationRequest, PartnerRegistrationRequest, PartnerRegistrationResponse,
    PartnerUpdateRequest, ZoneNotifyRequest, ZoneRegisterRequest, ZoneRegisterResponse,
    ZoneRequest,
};
use std::sync::Arc;

/// Handler for `POST /operator/partner`.
pub async fn partner_handshake_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<PartnerRegistrationRequest>,
) -> Result<Json<PartnerRegistrationResponse>, ApiError> {
    tracing::debug!(
        request_id = %payload.request_id,
        orig = %payload.orig_federation_id,
        "inbound partner handshake"
    );
    let resp = blocking(state, move |_, conn| inbound::accept_partner(conn, &payload)).await?;
    Ok(Json(resp))
}

/// Handler for `PUT /operator/partner`.
pub async fn partner_update_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<PartnerUpdateRequest>,
) -> Result<Json<Ack>, ApiError> {
    blocking(state, move |_, conn| inbound::update_partner(conn, &payload)).await?;
    Ok(Json(Ack::new("partner updated")))
}

/// Handler for `DELETE /operator/partner`.
pub async fn partner_remove_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<FederationRequest>,
) -> Result<Json<Ack>, ApiError> {
    blocking(state, move |_, conn| inbound::remove_partner(conn, &payload)).await?;
    Ok(Json(Ack::new("partner removed")))
}

/// Handler for `POST /operator/zone`.
pub async fn zone_register_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<ZoneRegisterRequest>,
) -> Result<Json<ZoneRegisterResponse>, ApiError> {
    let resp = blocking(state, move |_, conn| inbound::register_zone(conn, &payload)).await?;
    Ok(Json(resp))
}

/// Handler for `DELETE /operator/zone`.
pub async fn zone_deregister_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<ZoneRequest>,
) -> Result<Json<Ack>, ApiError> {
    blocking(state, move |_, conn| inbound::deregister_zone(conn, &payload)).await?;
    Ok(Json(Ack::new("zone deregistered")))
}

/// Handler for `POST /operator/notify/zone`.
pub async fn zone_notify_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<ZoneNotifyRequest>,
) -> Result<Json<Ack>, ApiError> {
    blocking(state, move |_, conn| inbound::zone_shared(conn, &payload)).await?;
    Ok(Json(Ack::new("zone received")))
}

/// Handler for `DELETE /operator/notify/zone`.
pub async fn zone_withdraw_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<ZoneRequest>,
) -> Result<Json<Ack>, ApiError> {
    blocking(state, move |_, conn| inbound::zone_unshared(conn, &payload)).await?;
    Ok(Json(Ack::new("zone withdrawn")))
}
