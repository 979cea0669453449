//! Test platforms whose peer calls travel through each other's routers.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use edgefed_db::{create_pool, run_migrations, DbPool, DbRuntimeSettings};
use edgefed_federation::wire::{
    FederationRequest, PartnerRegistrationRequest, PartnerRegistrationResponse,
    PartnerUpdateRequest, ZoneNotifyRequest, ZoneRegisterRequest, ZoneRegisterResponse,
    ZoneRequest, PARTNER_PATH, ZONE_NOTIFY_PATH, ZONE_PATH,
};
use edgefed_federation::{
    FederationError, GrantRole, OrgKind, PeerClient, StaticInventory, StaticPolicy,
};
use edgefed_server::{app, AppState};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tower::ServiceExt;

pub const ADMIN: &str = "admin";
pub const VIEWER: &str = "viewer";

/// [`PeerClient`] that serves each call with the router registered for the
/// address. Must be used from a blocking thread of a multi-thread runtime.
pub struct RouterPeer {
    routers: Mutex<HashMap<String, Router>>,
    handle: Handle,
}

impl RouterPeer {
    pub fn new() -> Self {
        Self {
            routers: Mutex::new(HashMap::new()),
            handle: Handle::current(),
        }
    }

    pub fn attach(&self, addr: &str, router: Router) {
        self.routers
            .lock()
            .unwrap()
            .insert(addr.to_string(), router);
    }

    pub fn detach(&self, addr: &str) {
        self.routers.lock().unwrap().remove(addr);
    }

    fn call<Req, Resp>(
        &self,
        method: Method,
        addr: &str,
        path: &str,
        body: &Req,
    ) -> Result<Resp, FederationError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let router = self
            .routers
            .lock()
            .unwrap()
            .get(addr)
            .cloned()
            .ok_or_else(|| FederationError::PeerUnreachable {
                addr: addr.to_string(),
                reason: "connection refused".to_string(),
            })?;
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap();

        let (status, bytes) = self.handle.block_on(async move {
            let response = router.oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            (status, bytes)
        });

        if status != StatusCode::OK {
            let message = serde_json::from_slice::<Value>(&bytes)
                .ok()
                .and_then(|v| v["error"].as_str().map(str::to_string))
                .unwrap_or_default();
            return Err(FederationError::PeerRejected {
                addr: addr.to_string(),
                status: status.as_u16(),
                message,
            });
        }
        Ok(serde_json::from_slice(&bytes).unwrap())
    }

    fn call_ack<Req: Serialize>(
        &self,
        method: Method,
        addr: &str,
        path: &str,
        body: &Req,
    ) -> Result<(), FederationError> {
        self.call::<Req, Value>(method, addr, path, body).map(|_| ())
    }
}

impl PeerClient for RouterPeer {
    fn register_partner(
        &self,
        addr: &str,
        req: &PartnerRegistrationRequest,
    ) -> Result<PartnerRegistrationResponse, FederationError> {
        self.call(Method::POST, addr, PARTNER_PATH, req)
    }

    fn update_partner(&self, addr: &str, req: &PartnerUpdateRequest) -> Result<(), FederationError> {
        self.call_ack(Method::PUT, addr, PARTNER_PATH, req)
    }

    fn remove_partner(&self, addr: &str, req: &FederationRequest) -> Result<(), FederationError> {
        self.call_ack(Method::DELETE, addr, PARTNER_PATH, req)
    }

    fn register_zone(
        &self,
        addr: &str,
        req: &ZoneRegisterRequest,
    ) -> Result<ZoneRegisterResponse, FederationError> {
        self.call(Method::POST, addr, ZONE_PATH, req)
    }

    fn deregister_zone(&self, addr: &str, req: &ZoneRequest) -> Result<(), FederationError> {
        self.call_ack(Method::DELETE, addr, ZONE_PATH, req)
    }

    fn notify_zone_shared(&self, addr: &str, req: &ZoneNotifyRequest) -> Result<(), FederationError> {
        self.call_ack(Method::POST, addr, ZONE_NOTIFY_PATH, req)
    }

    fn notify_zone_unshared(&self, addr: &str, req: &ZoneRequest) -> Result<(), FederationError> {
        self.call_ack(Method::DELETE, addr, ZONE_NOTIFY_PATH, req)
    }
}

pub fn policy() -> StaticPolicy {
    StaticPolicy::new()
        .with_organization("mexop", OrgKind::Operator)
        .with_organization("telco", OrgKind::Operator)
        .with_grant(ADMIN, "mexop", GrantRole::Manager)
        .with_grant(ADMIN, "telco", GrantRole::Manager)
        .with_grant(VIEWER, "mexop", GrantRole::Viewer)
}

pub fn inventory() -> StaticInventory {
    StaticInventory::new()
        .with_cloudlet("US-1", "mexop", "cloudlet1")
        .with_cloudlet("GB-1", "telco", "cloudlet-lon")
}

/// One platform: a file-backed pool and its router.
pub struct Platform {
    pub addr: String,
    pub pool: DbPool,
    pub router: Router,
    _dir: tempfile::TempDir,
}

impl Platform {
    pub fn new(addr: &str, peer: &Arc<RouterPeer>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edgefed.db");
        let pool = create_pool(path.to_str().unwrap(), DbRuntimeSettings::default()).unwrap();
        run_migrations(&pool.get().unwrap()).unwrap();

        let state = AppState::new(
            pool.clone(),
            Arc::new(policy()),
            Arc::new(inventory()),
            peer.clone(),
            addr,
        );
        let router = app(state);
        peer.attach(addr, router.clone());
        Self {
            addr: addr.to_string(),
            pool,
            router,
            _dir: dir,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("Authorization", format!("Bearer {user}"));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn post(&self, user: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(user), Some(body)).await
    }

    pub async fn get(&self, user: &str, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(user), None).await
    }

    pub fn count(&self, sql: &str) -> i64 {
        let conn = self.pool.get().unwrap();
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }
}

pub fn self_body(operator: &str, country: &str, region: &str) -> Value {
    serde_json::json!({
        "operatorId": operator,
        "countryCode": country,
        "mcc": "310",
        "mncs": ["260"],
        "regions": [region],
        "locatorEndpoint": format!("locator.{operator}.example.com"),
    })
}
