//! Edge federation server binary.
//!
//! Starts an axum HTTP server with structured logging, database initialization,
//! and graceful shutdown on SIGTERM/SIGINT.

use edgefed_federation::{HttpPeerClient, PeerClient, RegionalController};
use edgefed_server::{app, config, controller::RegionDirectory, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("EDGEFED_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration, the server cannot start without valid config");

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    let pool = edgefed_db::create_pool(
        &config.database.path,
        edgefed_db::DbRuntimeSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )
    .expect("failed to create database pool, check database.path in config");

    {
        let conn = pool
            .get()
            .expect("failed to get database connection for migrations");
        let applied = edgefed_db::run_migrations(&conn).expect("failed to run database migrations");
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }

        let pending = edgefed_federation::pending_intents(&conn)
            .expect("failed to read federation intents");
        for intent in &pending {
            tracing::warn!(
                intent_id = %intent.id,
                action = %intent.action,
                self_federation_id = %intent.self_federation_id,
                partner_federation_id = %intent.partner_federation_id,
                partner_addr = %intent.partner_addr,
                created_at = %intent.created_at,
                "federation intent left pending, partner state may need reconciling"
            );
        }
    }

    // The blocking reqwest clients may not be built or dropped on the runtime.
    let timeout = Duration::from_secs(config.federation.peer_timeout_secs);
    let regions = config.regions.clone();
    let (peer, controller) = tokio::task::spawn_blocking(move || {
        let peer: Arc<dyn PeerClient> = Arc::new(HttpPeerClient::new(timeout));
        let controller: Arc<dyn RegionalController> =
            Arc::new(RegionDirectory::from_config(&regions, timeout));
        (peer, controller)
    })
    .await
    .expect("failed to build outbound clients");

    let state = AppState::new(
        pool,
        Arc::new(config.policy()),
        Arc::clone(&controller),
        Arc::clone(&peer),
        config.federation.public_addr.clone(),
    );
    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(
        %addr,
        federation_addr = %config.federation.public_addr,
        "starting edgefed server"
    );

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address, is another process using this port?");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    let _ = tokio::task::spawn_blocking(move || drop((peer, controller))).await;

    tracing::info!("edgefed server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
