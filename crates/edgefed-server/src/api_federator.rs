//! Management API: self federators, partners and zones.
//!
//! Every route is a `POST` with a JSON body (`{}` for an unfiltered
//! listing) and requires an authenticated actor. Authorization against the
//! operator organization happens inside the federation core.

use crate::api::{blocking, ApiError, MessageResponse};
use crate::middleware::ActorContext;
use crate::AppState;
use axum::extract::{Extension, Json};
use edgefed_federation::{
    AddPartnerRequest, CreateSelfRequest, CreateZoneRequest, PartnerView, PartnerZoneView,
    RemovePartnerRequest, ShowPartnerZonesRequest, ShowPartnersRequest, ShowSelfRequest,
    ShowZonesRequest, UpdateSelfRequest, ZoneKey, ZonePartnerRequest, ZoneView,
};
use edgefed_types::{Federator, FederatorZone, OperatorKey};
use std::sync::Arc;

/// Handler for `POST /api/federator/self/create`.
pub async fn create_self_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ActorContext(actor)): Extension<ActorContext>,
    Json(payload): Json<CreateSelfRequest>,
) -> Result<Json<Federator>, ApiError> {
    let fed = blocking(state, move |state, conn| {
        state.registry.create_self(conn, &actor, payload)
    })
    .await?;
    Ok(Json(fed))
}

/// Handler for `POST /api/federator/self/update`.
pub async fn update_self_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ActorContext(actor)): Extension<ActorContext>,
    Json(payload): Json<UpdateSelfRequest>,
) -> Result<Json<Federator>, ApiError> {
    let fed = blocking(state, move |state, conn| {
        state.registry.update_self(conn, &actor, payload)
    })
    .await?;
    Ok(Json(fed))
}

/// Handler for `POST /api/federator/self/delete`.
pub async fn delete_self_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ActorContext(actor)): Extension<ActorContext>,
    Json(payload): Json<OperatorKey>,
) -> Result<Json<MessageResponse>, ApiError> {
    let key = payload.to_string();
    blocking(state, move |state, conn| {
        state.registry.delete_self(conn, &actor, payload)
    })
    .await?;
    Ok(MessageResponse::new(format!("deleted self federator {key}")))
}

/// Handler for `POST /api/federator/self/show`.
pub async fn show_self_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ActorContext(actor)): Extension<ActorContext>,
    Json(filter): Json<ShowSelfRequest>,
) -> Result<Json<Vec<Federator>>, ApiError> {
    let feds = blocking(state, move |state, conn| {
        state.registry.show_self(conn, &actor, &filter)
    })
    .await?;
    Ok(Json(feds))
}

/// Handler for `POST /api/federator/partner/create`.
pub async fn add_partner_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ActorContext(actor)): Extension<ActorContext>,
    Json(payload): Json<AddPartnerRequest>,
) -> Result<Json<Federator>, ApiError> {
    let partner = blocking(state, move |state, conn| {
        state.registry.add_partner(conn, &actor, payload)
    })
    .await?;
    Ok(Json(partner))
}

/// Handler for `POST /api/federator/partner/delete`.
pub async fn remove_partner_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ActorContext(actor)): Extension<ActorContext>,
    Json(payload): Json<RemovePartnerRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let partner = OperatorKey::new(&payload.partner_operator_id, &payload.partner_country_code);
    blocking(state, move |state, conn| {
        state.registry.remove_partner(conn, &actor, payload)
    })
    .await?;
    Ok(MessageResponse::new(format!("removed partner {partner}")))
}

/// Handler for `POST /api/federator/partner/show`.
pub async fn show_partners_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ActorContext(actor)): Extension<ActorContext>,
    Json(filter): Json<ShowPartnersRequest>,
) -> Result<Json<Vec<PartnerView>>, ApiError> {
    let partners = blocking(state, move |state, conn| {
        state.registry.show_partners(conn, &actor, &filter)
    })
    .await?;
    Ok(Json(partners))
}

/// Handler for `POST /api/federator/zone/create`.
pub async fn create_zone_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ActorContext(actor)): Extension<ActorContext>,
    Json(payload): Json<CreateZoneRequest>,
) -> Result<Json<FederatorZone>, ApiError> {
    let zone = blocking(state, move |state, conn| {
        state.zones.create_zone(conn, &actor, payload)
    })
    .await?;
    Ok(Json(zone))
}

/// Handler for `POST /api/federator/zone/delete`.
pub async fn delete_zone_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ActorContext(actor)): Extension<ActorContext>,
    Json(payload): Json<ZoneKey>,
) -> Result<Json<MessageResponse>, ApiError> {
    let zone_id = payload.zone_id.clone();
    blocking(state, move |state, conn| {
        state.zones.delete_zone(conn, &actor, payload)
    })
    .await?;
    Ok(MessageResponse::new(format!("deleted zone {zone_id}")))
}

/// Handler for `POST /api/federator/zone/show`.
pub async fn show_zones_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ActorContext(actor)): Extension<ActorContext>,
    Json(filter): Json<ShowZonesRequest>,
) -> Result<Json<Vec<ZoneView>>, ApiError> {
    let zones = blocking(state, move |state, conn| {
        state.zones.show_zones(conn, &actor, &filter)
    })
    .await?;
    Ok(Json(zones))
}

/// Handler for `POST /api/federator/zone/share`.
pub async fn share_zone_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ActorContext(actor)): Extension<ActorContext>,
    Json(payload): Json<ZonePartnerRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let zone_id = payload.zone_id.clone();
    blocking(state, move |state, conn| {
        state.zones.share_zone(conn, &actor, payload)
    })
    .await?;
    Ok(MessageResponse::new(format!("shared zone {zone_id}")))
}

/// Handler for `POST /api/federator/zone/unshare`.
pub async fn unshare_zone_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ActorContext(actor)): Extension<ActorContext>,
    Json(payload): Json<ZonePartnerRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let zone_id = payload.zone_id.clone();
    blocking(state, move |state, conn| {
        state.zones.unshare_zone(conn, &actor, payload)
    })
    .await?;
    Ok(MessageResponse::new(format!("unshared zone {zone_id}")))
}

/// Handler for `POST /api/federator/zone/register`.
pub async fn register_zone_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ActorContext(actor)): Extension<ActorContext>,
    Json(payload): Json<ZonePartnerRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let zone_id = payload.zone_id.clone();
    blocking(state, move |state, conn| {
        state.zones.register_partner_zone(conn, &actor, payload)
    })
    .await?;
    Ok(MessageResponse::new(format!("registered partner zone {zone_id}")))
}

/// Handler for `POST /api/federator/zone/deregister`.
pub async fn deregister_zone_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ActorContext(actor)): Extension<ActorContext>,
    Json(payload): Json<ZonePartnerRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let zone_id = payload.zone_id.clone();
    blocking(state, move |state, conn| {
        state.zones.deregister_partner_zone(conn, &actor, payload)
    })
    .await?;
    Ok(MessageResponse::new(format!("deregistered partner zone {zone_id}")))
}

/// Handler for `POST /api/federator/zone/partner/show`.
pub async fn show_partner_zones_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ActorContext(actor)): Extension<ActorContext>,
    Json(filter): Json<ShowPartnerZonesRequest>,
) -> Result<Json<Vec<PartnerZoneView>>, ApiError> {
    let zones = blocking(state, move |state, conn| {
        state.zones.show_partner_zones(conn, &actor, &filter)
    })
    .await?;
    Ok(Json(zones))
}
