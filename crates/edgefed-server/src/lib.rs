//! Edge federation server library logic.

pub mod api;
pub mod api_events;
pub mod api_federation;
pub mod api_federator;
pub mod config;
pub mod controller;
pub mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use edgefed_db::DbPool;
use edgefed_federation::wire::{PARTNER_PATH, ZONE_NOTIFY_PATH, ZONE_PATH};
use edgefed_federation::{Authorizer, FederatorRegistry, PeerClient, RegionalController, ZoneManager};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Self federators and partners.
    pub registry: FederatorRegistry,
    /// Zones, sharing and partner zone registration.
    pub zones: ZoneManager,
}

impl AppState {
    /// Wires the federation core to one set of collaborators.
    ///
    /// `federation_addr` is the address partners use to reach this
    /// platform's peer endpoints.
    pub fn new(
        pool: DbPool,
        authz: Arc<dyn Authorizer>,
        controller: Arc<dyn RegionalController>,
        peer: Arc<dyn PeerClient>,
        federation_addr: impl Into<String>,
    ) -> Self {
        let registry = FederatorRegistry::new(
            Arc::clone(&authz),
            Arc::clone(&controller),
            Arc::clone(&peer),
            federation_addr,
        );
        let zones = ZoneManager::new(authz, controller, peer);
        Self {
            pool,
            registry,
            zones,
        }
    }
}

/// Maximum request body size (1 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/api/federator/self/create",
            post(api_federator::create_self_handler),
        )
        .route(
            "/api/federator/self/update",
            post(api_federator::update_self_handler),
        )
        .route(
            "/api/federator/self/delete",
            post(api_federator::delete_self_handler),
        )
        .route(
            "/api/federator/self/show",
            post(api_federator::show_self_handler),
        )
        .route(
            "/api/federator/partner/create",
            post(api_federator::add_partner_handler),
        )
        .route(
            "/api/federator/partner/delete",
            post(api_federator::remove_partner_handler),
        )
        .route(
            "/api/federator/partner/show",
            post(api_federator::show_partners_handler),
        )
        .route(
            "/api/federator/zone/create",
            post(api_federator::create_zone_handler),
        )
        .route(
            "/api/federator/zone/delete",
            post(api_federator::delete_zone_handler),
        )
        .route(
            "/api/federator/zone/show",
            post(api_federator::show_zones_handler),
        )
        .route(
            "/api/federator/zone/share",
            post(api_federator::share_zone_handler),
        )
        .route(
            "/api/federator/zone/unshare",
            post(api_federator::unshare_zone_handler),
        )
        .route(
            "/api/federator/zone/register",
            post(api_federator::register_zone_handler),
        )
        .route(
            "/api/federator/zone/deregister",
            post(api_federator::deregister_zone_handler),
        )
        .route(
            "/api/federator/zone/partner/show",
            post(api_federator::show_partner_zones_handler),
        )
        .route(
            "/api/federation/events",
            get(api_events::get_events_handler),
        )
        .layer(axum::middleware::from_fn(middleware::auth_middleware));

    let peer_routes = Router::new()
        .route(
            PARTNER_PATH,
            post(api_federation::partner_handshake_handler)
                .put(api_federation::partner_update_handler)
                .delete(api_federation::partner_remove_handler),
        )
        .route(
            ZONE_PATH,
            post(api_federation::zone_register_handler)
                .delete(api_federation::zone_deregister_handler),
        )
        .route(
            ZONE_NOTIFY_PATH,
            post(api_federation::zone_notify_handler)
                .delete(api_federation::zone_withdraw_handler),
        );

    Router::new()
        .route("/health", get(health))
        .merge(peer_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
