//! Fixtures shared by the unit tests in this crate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use edgefed_types::{Federator, FederatorKind, FederatorZone};
use rusqlite::Connection;

use crate::authz::{GrantRole, OrgKind, StaticPolicy};
use crate::client::PeerClient;
use crate::controller::StaticInventory;
use crate::error::FederationError;
use crate::store;
use crate::wire::{
    FederationRequest, PartnerRegistrationRequest, PartnerRegistrationResponse,
    PartnerUpdateRequest, ZoneNotifyRequest, ZoneRegisterRequest, ZoneRegisterResponse,
    ZoneRegistration, ZoneRequest,
};

pub(crate) fn test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("should open in-memory db");
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .expect("should enable foreign keys");
    edgefed_db::run_migrations(&conn).expect("migrations should succeed");
    conn
}

fn federator(id: &str, kind: FederatorKind, operator: &str) -> Federator {
    Federator {
        federation_id: id.to_string(),
        federation_addr: format!("{id}.example.com"),
        kind,
        operator_id: operator.to_string(),
        country_code: "US".to_string(),
        regions: ["US-1".to_string()].into_iter().collect(),
        mcc: "310".to_string(),
        mncs: ["260".to_string()].into_iter().collect(),
        locator_endpoint: String::new(),
    }
}

pub(crate) fn seed_self(conn: &Connection, id: &str, operator: &str) -> Federator {
    let fed = federator(id, FederatorKind::SelfFederator, operator);
    store::insert_federator(conn, &fed).expect("should insert self federator");
    fed
}

pub(crate) fn seed_partner(conn: &Connection, id: &str, operator: &str) -> Federator {
    let fed = federator(id, FederatorKind::Partner, operator);
    store::insert_federator(conn, &fed).expect("should insert partner federator");
    fed
}

pub(crate) fn zone(zone_id: &str, owner: &str) -> FederatorZone {
    FederatorZone {
        federation_id: owner.to_string(),
        zone_id: zone_id.to_string(),
        geo_location: "37.77,-122.41".to_string(),
        city: "San Francisco".to_string(),
        state: "CA".to_string(),
        locality: String::new(),
        region: "US-1".to_string(),
        cloudlets: vec!["cloudlet1".to_string()],
        edge_count: 1,
    }
}

/// Peer double that records every call and answers from a script.
#[derive(Default)]
pub(crate) struct ScriptedPeer {
    pub calls: Mutex<Vec<String>>,
    pub unreachable: AtomicBool,
    pub handshake: Mutex<Option<PartnerRegistrationResponse>>,
}

impl ScriptedPeer {
    pub(crate) fn answering(handshake: PartnerRegistrationResponse) -> Self {
        let peer = Self::default();
        *peer.handshake.lock().expect("lock") = Some(handshake);
        peer
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    fn record(&self, call: &str, addr: &str) -> Result<(), FederationError> {
        self.calls.lock().expect("lock").push(format!("{call} {addr}"));
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(FederationError::PeerUnreachable {
                addr: addr.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

impl PeerClient for ScriptedPeer {
    fn register_partner(
        &self,
        addr: &str,
        _req: &PartnerRegistrationRequest,
    ) -> Result<PartnerRegistrationResponse, FederationError> {
        self.record("register_partner", addr)?;
        self.handshake
            .lock()
            .expect("lock")
            .clone()
            .ok_or_else(|| FederationError::PeerRejected {
                addr: addr.to_string(),
                status: 404,
                message: "no such federator".to_string(),
            })
    }

    fn update_partner(&self, addr: &str, _req: &PartnerUpdateRequest) -> Result<(), FederationError> {
        self.record("update_partner", addr)
    }

    fn remove_partner(&self, addr: &str, _req: &FederationRequest) -> Result<(), FederationError> {
        self.record("remove_partner", addr)
    }

    fn register_zone(
        &self,
        addr: &str,
        req: &ZoneRegisterRequest,
    ) -> Result<ZoneRegisterResponse, FederationError> {
        self.record("register_zone", addr)?;
        Ok(ZoneRegisterResponse {
            request_id: req.request_id.clone(),
            lead_operator_id: "partnerop".to_string(),
            partner_operator_id: req.operator.clone(),
            federation_id: req.dest_federation_id.clone(),
            zone: ZoneRegistration {
                zone_id: req.zones.first().cloned().unwrap_or_default(),
                registration_token: req.request_id.clone(),
            },
        })
    }

    fn deregister_zone(&self, addr: &str, _req: &ZoneRequest) -> Result<(), FederationError> {
        self.record("deregister_zone", addr)
    }

    fn notify_zone_shared(&self, addr: &str, _req: &ZoneNotifyRequest) -> Result<(), FederationError> {
        self.record("notify_zone_shared", addr)
    }

    fn notify_zone_unshared(&self, addr: &str, _req: &ZoneRequest) -> Result<(), FederationError> {
        self.record("notify_zone_unshared", addr)
    }
}

/// Policy where `admin` manages the `mexop` and `telco` operator orgs.
pub(crate) fn policy() -> StaticPolicy {
    StaticPolicy::new()
        .with_organization("mexop", OrgKind::Operator)
        .with_organization("telco", OrgKind::Operator)
        .with_organization("devco", OrgKind::Developer)
        .with_grant("admin", "mexop", GrantRole::Manager)
        .with_grant("admin", "telco", GrantRole::Manager)
        .with_grant("admin", "devco", GrantRole::Manager)
        .with_grant("viewer", "mexop", GrantRole::Viewer)
}

pub(crate) fn inventory() -> StaticInventory {
    StaticInventory::new()
        .with_cloudlet("US-1", "mexop", "cloudlet1")
        .with_cloudlet("US-1", "mexop", "cloudlet2")
        .with_region("US-2")
}
