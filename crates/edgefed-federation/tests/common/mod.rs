//! Several in-memory platforms wired together through a loopback peer.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use edgefed_federation::wire::{
    FederationRequest, PartnerRegistrationRequest, PartnerRegistrationResponse,
    PartnerUpdateRequest, ZoneNotifyRequest, ZoneRegisterRequest, ZoneRegisterResponse,
    ZoneRequest,
};
use edgefed_federation::{
    inbound, CreateSelfRequest, FederationError, FederatorRegistry, GrantRole, OrgKind,
    PeerClient, StaticInventory, StaticPolicy, ZoneManager,
};
use edgefed_types::Federator;
use rusqlite::Connection;

pub type SharedConn = Arc<Mutex<Connection>>;

/// Routes each call to the inbound handlers of the platform at `addr`.
#[derive(Default)]
pub struct LoopbackPeer {
    platforms: Mutex<HashMap<String, SharedConn>>,
}

impl LoopbackPeer {
    pub fn attach(&self, addr: &str, conn: SharedConn) {
        self.platforms
            .lock()
            .expect("peer table lock")
            .insert(addr.to_string(), conn);
    }

    pub fn detach(&self, addr: &str) {
        self.platforms.lock().expect("peer table lock").remove(addr);
    }

    fn dispatch<T>(
        &self,
        addr: &str,
        handler: impl FnOnce(&mut Connection) -> Result<T, FederationError>,
    ) -> Result<T, FederationError> {
        let conn = self
            .platforms
            .lock()
            .expect("peer table lock")
            .get(addr)
            .cloned()
            .ok_or_else(|| FederationError::PeerUnreachable {
                addr: addr.to_string(),
                reason: "connection refused".to_string(),
            })?;
        let mut conn = conn.lock().expect("peer db lock");
        handler(&mut conn).map_err(|err| FederationError::PeerRejected {
            addr: addr.to_string(),
            status: status_of(&err),
            message: err.to_string(),
        })
    }
}

fn status_of(err: &FederationError) -> u16 {
    match err {
        FederationError::InvalidArgument(_) | FederationError::NothingToUpdate => 400,
        FederationError::NotAuthorized(_) => 403,
        FederationError::NotFound(_) => 404,
        FederationError::Conflict(_) | FederationError::AlreadyExists(_) => 409,
        FederationError::PeerUnreachable { .. } | FederationError::PeerRejected { .. } => 502,
        _ => 500,
    }
}

impl PeerClient for LoopbackPeer {
    fn register_partner(
        &self,
        addr: &str,
        req: &PartnerRegistrationRequest,
    ) -> Result<PartnerRegistrationResponse, FederationError> {
        self.dispatch(addr, |conn| inbound::accept_partner(conn, req))
    }

    fn update_partner(&self, addr: &str, req: &PartnerUpdateRequest) -> Result<(), FederationError> {
        self.dispatch(addr, |conn| inbound::update_partner(conn, req))
    }

    fn remove_partner(&self, addr: &str, req: &FederationRequest) -> Result<(), FederationError> {
        self.dispatch(addr, |conn| inbound::remove_partner(conn, req))
    }

    fn register_zone(
        &self,
        addr: &str,
        req: &ZoneRegisterRequest,
    ) -> Result<ZoneRegisterResponse, FederationError> {
        self.dispatch(addr, |conn| inbound::register_zone(conn, req))
    }

    fn deregister_zone(&self, addr: &str, req: &ZoneRequest) -> Result<(), FederationError> {
        self.dispatch(addr, |conn| inbound::deregister_zone(conn, req))
    }

    fn notify_zone_shared(&self, addr: &str, req: &ZoneNotifyRequest) -> Result<(), FederationError> {
        self.dispatch(addr, |conn| inbound::zone_shared(conn, req))
    }

    fn notify_zone_unshared(&self, addr: &str, req: &ZoneRequest) -> Result<(), FederationError> {
        self.dispatch(addr, |conn| inbound::zone_unshared(conn, req))
    }
}

pub fn policy() -> StaticPolicy {
    StaticPolicy::new()
        .with_organization("mexop", OrgKind::Operator)
        .with_organization("telco", OrgKind::Operator)
        .with_organization("bluecell", OrgKind::Operator)
        .with_grant("admin", "mexop", GrantRole::Manager)
        .with_grant("admin", "telco", GrantRole::Manager)
        .with_grant("admin", "bluecell", GrantRole::Manager)
}

pub fn inventory() -> StaticInventory {
    StaticInventory::new()
        .with_cloudlet("US-1", "mexop", "cloudlet1")
        .with_cloudlet("US-1", "mexop", "cloudlet2")
        .with_cloudlet("GB-1", "telco", "cloudlet-lon")
        .with_cloudlet("DE-1", "bluecell", "cloudlet-ber")
}

pub fn memory_db() -> Connection {
    let conn = Connection::open_in_memory().expect("in-memory db");
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .expect("foreign keys");
    edgefed_db::run_migrations(&conn).expect("migrations");
    conn
}

/// One federation platform: its store and its two managers.
pub struct Platform {
    pub addr: String,
    pub conn: SharedConn,
    pub registry: FederatorRegistry,
    pub zones: ZoneManager,
}

impl Platform {
    pub fn new(addr: &str, peer: &Arc<LoopbackPeer>) -> Self {
        let conn: SharedConn = Arc::new(Mutex::new(memory_db()));
        peer.attach(addr, conn.clone());
        let authz = Arc::new(policy());
        let controller = Arc::new(inventory());
        Self {
            addr: addr.to_string(),
            registry: FederatorRegistry::new(
                authz.clone(),
                controller.clone(),
                peer.clone(),
                addr,
            ),
            zones: ZoneManager::new(authz, controller, peer.clone()),
            conn,
        }
    }

    pub fn with<T>(&self, f: impl FnOnce(&mut Connection) -> T) -> T {
        let mut conn = self.conn.lock().expect("platform db lock");
        f(&mut conn)
    }

    pub fn create_self(&self, operator: &str, country: &str, region: &str) -> Federator {
        self.with(|conn| {
            self.registry.create_self(
                conn,
                "admin",
                CreateSelfRequest {
                    operator_id: operator.to_string(),
                    country_code: country.to_string(),
                    mcc: "310".to_string(),
                    mncs: vec!["260".to_string()],
                    regions: vec![region.to_string()],
                    locator_endpoint: format!("locator.{operator}.example.com"),
                },
            )
        })
        .expect("create self federator")
    }

    pub fn count(&self, sql: &str) -> i64 {
        self.with(|conn| conn.query_row(sql, [], |row| row.get(0)))
            .expect("count query")
    }
}
