//! Zone lifecycle: owned zones, sharing them out, registering partner zones.

use std::sync::Arc;

use edgefed_observe::{emit_event, EventPayload};
use edgefed_types::validate::{parse_geo_location, validate_zone_id};
use edgefed_types::{
    Federator, FederatorRole, FederatorZone, OperatorKey, RegisteredZone, SharedZone,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::authz::{Action, Authorizer, RESOURCE_CLOUDLETS};
use crate::client::PeerClient;
use crate::controller::RegionalController;
use crate::error::{require_field, FederationError};
use crate::registry::{matches_filter, partner_federator, self_federator};
use crate::roles;
use crate::store;
use crate::wire::{new_request_id, ZoneInfo, ZoneNotifyRequest, ZoneRegisterRequest, ZoneRequest};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateZoneRequest {
    pub operator_id: String,
    pub country_code: String,
    pub zone_id: String,
    pub geo_location: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub locality: String,
    pub region: String,
    pub cloudlets: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneKey {
    pub operator_id: String,
    pub country_code: String,
    pub zone_id: String,
}

/// Names a zone and the (self, partner) pair an operation applies to.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZonePartnerRequest {
    pub self_operator_id: String,
    pub self_country_code: String,
    pub partner_operator_id: String,
    pub partner_country_code: String,
    pub zone_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowZonesRequest {
    pub operator_id: Option<String>,
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowPartnerZonesRequest {
    pub self_operator_id: Option<String>,
    pub self_country_code: Option<String>,
    pub partner_operator_id: Option<String>,
    pub partner_country_code: Option<String>,
}

/// An owned zone with the partners it is shared with and registered by.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneView {
    #[serde(flatten)]
    pub zone: FederatorZone,
    pub operator_id: String,
    pub country_code: String,
    pub shared_with: Vec<OperatorKey>,
    pub registered_by: Vec<OperatorKey>,
}

/// A partner zone as known to one self federator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerZoneView {
    #[serde(flatten)]
    pub zone: FederatorZone,
    pub self_operator_id: String,
    pub self_country_code: String,
    pub partner_operator_id: String,
    pub partner_country_code: String,
    pub registered: bool,
}

pub struct ZoneManager {
    authz: Arc<dyn Authorizer>,
    controller: Arc<dyn RegionalController>,
    peer: Arc<dyn PeerClient>,
}

impl ZoneManager {
    pub fn new(
        authz: Arc<dyn Authorizer>,
        controller: Arc<dyn RegionalController>,
        peer: Arc<dyn PeerClient>,
    ) -> Self {
        Self {
            authz,
            controller,
            peer,
        }
    }

    /// Checks the operator may be managed, then resolves its self federator.
    /// Unauthorized callers cannot tell whether the federator exists.
    fn managed_self(
        &self,
        conn: &Connection,
        actor: &str,
        operator_id: &str,
        country_code: &str,
    ) -> Result<Federator, FederationError> {
        self.authz
            .authorized(actor, operator_id, RESOURCE_CLOUDLETS, Action::Manage)?;
        self_federator(conn, operator_id, country_code)
    }

    /// Self and partner for a zone operation, with `role` required.
    fn pair(
        &self,
        conn: &Connection,
        actor: &str,
        req: &ZonePartnerRequest,
        role: FederatorRole,
    ) -> Result<(Federator, Federator), FederationError> {
        require_field("zoneId", &req.zone_id)?;
        let me = self.managed_self(conn, actor, &req.self_operator_id, &req.self_country_code)?;
        let partner =
            partner_federator(conn, &req.partner_operator_id, &req.partner_country_code)?;
        roles::require_role(conn, &me.federation_id, &partner.federation_id, role)?;
        Ok((me, partner))
    }

    pub fn create_zone(
        &self,
        conn: &mut Connection,
        actor: &str,
        req: CreateZoneRequest,
    ) -> Result<FederatorZone, FederationError> {
        validate_zone_id(&req.zone_id)?;
        parse_geo_location(&req.geo_location)?;
        require_field("region", &req.region)?;
        let cloudlets: Vec<String> = req
            .cloudlets
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        match cloudlets.len() {
            0 => return Err(FederationError::InvalidArgument("missing cloudlets".into())),
            1 => {}
            _ => {
                return Err(FederationError::InvalidArgument(
                    "a zone holds exactly one cloudlet".into(),
                ))
            }
        }

        let me = self.managed_self(conn, actor, &req.operator_id, &req.country_code)?;
        if !me.regions.contains(&req.region) {
            return Err(FederationError::InvalidArgument(format!(
                "region {} is not a region of {}/{}",
                req.region, me.operator_id, me.country_code
            )));
        }
        let known = self.controller.list_cloudlets(&req.region, &me.operator_id)?;
        for cloudlet in &cloudlets {
            if !known.contains(cloudlet) {
                return Err(FederationError::NotFound(format!(
                    "cloudlet {cloudlet} of {} in region {}",
                    me.operator_id, req.region
                )));
            }
        }

        let zone = FederatorZone {
            federation_id: me.federation_id.clone(),
            zone_id: req.zone_id,
            geo_location: req.geo_location,
            city: req.city,
            state: req.state,
            locality: req.locality,
            region: req.region,
            edge_count: u32::try_from(cloudlets.len()).unwrap_or(u32::MAX),
            cloudlets,
        };

        let tx = conn.transaction()?;
        store::insert_zone(&tx, &zone).map_err(|e| {
            if e.is_unique() {
                FederationError::AlreadyExists(format!("zone {}", zone.zone_id))
            } else {
                e.into()
            }
        })?;
        emit_event(
            &tx,
            actor,
            &EventPayload::ZoneCreated {
                zone_id: zone.zone_id.clone(),
                federation_id: zone.federation_id.clone(),
                region: zone.region.clone(),
            },
        )?;
        tx.commit()?;

        tracing::info!(zone_id = %zone.zone_id, federation_id = %zone.federation_id, "zone created");
        Ok(zone)
    }

    /// Deletes an owned zone. Fails with `Conflict` while it is shared with
    /// or registered by any partner.
    pub fn delete_zone(
        &self,
        conn: &mut Connection,
        actor: &str,
        key: ZoneKey,
    ) -> Result<(), FederationError> {
        require_field("zoneId", &key.zone_id)?;
        let me = self.managed_self(conn, actor, &key.operator_id, &key.country_code)?;
        owned_zone(conn, &me, &key.zone_id)?;

        let tx = conn.transaction()?;
        let (shared, registered) = store::zone_references(&tx, &key.zone_id)?;
        if shared > 0 || registered > 0 {
            return Err(FederationError::Conflict(format!(
                "zone {} is shared with {shared} and registered by {registered} partner(s)",
                key.zone_id
            )));
        }
        store::delete_zone(&tx, &key.zone_id).map_err(|e| {
            if e.is_foreign_key() {
                FederationError::Conflict(format!("zone {} is still referenced", key.zone_id))
            } else {
                e.into()
            }
        })?;
        emit_event(
            &tx,
            actor,
            &EventPayload::ZoneDeleted {
                zone_id: key.zone_id.clone(),
                federation_id: me.federation_id.clone(),
            },
        )?;
        tx.commit()?;

        tracing::info!(zone_id = %key.zone_id, "zone deleted");
        Ok(())
    }

    pub fn show_zones(
        &self,
        conn: &Connection,
        actor: &str,
        filter: &ShowZonesRequest,
    ) -> Result<Vec<ZoneView>, FederationError> {
        let mut out = Vec::new();
        for me in self.visible_selves(conn, actor, &filter.operator_id, &filter.country_code)? {
            for zone in store::list_zones(conn, &me.federation_id)? {
                let shared_with = store::shared_with(conn, &zone.zone_id)?
                    .into_iter()
                    .map(|s| OperatorKey::new(s.operator_id, s.country_code))
                    .collect();
                let registered_by = store::registrations_of(conn, &zone.zone_id)?
                    .into_iter()
                    .map(|r| OperatorKey::new(r.operator_id, r.country_code))
                    .collect();
                out.push(ZoneView {
                    zone,
                    operator_id: me.operator_id.clone(),
                    country_code: me.country_code.clone(),
                    shared_with,
                    registered_by,
                });
            }
        }
        Ok(out)
    }

    /// Pushes an owned zone to a partner. Sharing an already shared zone
    /// succeeds without contacting the partner again.
    pub fn share_zone(
        &self,
        conn: &mut Connection,
        actor: &str,
        req: ZonePartnerRequest,
    ) -> Result<(), FederationError> {
        let (me, partner) = self.pair(conn, actor, &req, FederatorRole::ShareZonesWithPartner)?;
        let zone = owned_zone(conn, &me, &req.zone_id)?;
        if store::is_zone_shared(conn, &zone.zone_id, &partner.federation_id)? {
            tracing::debug!(zone_id = %zone.zone_id, partner_id = %partner.federation_id, "zone already shared");
            return Ok(());
        }

        let notify = ZoneNotifyRequest {
            request_id: new_request_id(),
            operator: me.operator_id.clone(),
            country: me.country_code.clone(),
            orig_federation_id: me.federation_id.clone(),
            dest_federation_id: partner.federation_id.clone(),
            partner_zone: ZoneInfo::from_zone(&zone),
        };
        self.peer.notify_zone_shared(&partner.federation_addr, &notify)?;

        let tx = conn.transaction()?;
        let inserted = store::insert_shared_zone(
            &tx,
            &SharedZone {
                zone_id: zone.zone_id.clone(),
                federation_id: partner.federation_id.clone(),
                operator_id: partner.operator_id.clone(),
                country_code: partner.country_code.clone(),
            },
        );
        match inserted {
            Ok(()) => {}
            Err(e) if e.is_unique() => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        emit_event(
            &tx,
            actor,
            &EventPayload::ZoneShared {
                zone_id: zone.zone_id.clone(),
                partner_federation_id: partner.federation_id.clone(),
            },
        )?;
        tx.commit()?;

        tracing::info!(zone_id = %zone.zone_id, partner_id = %partner.federation_id, "zone shared");
        Ok(())
    }

    pub fn unshare_zone(
        &self,
        conn: &mut Connection,
        actor: &str,
        req: ZonePartnerRequest,
    ) -> Result<(), FederationError> {
        let (me, partner) = self.pair(conn, actor, &req, FederatorRole::ShareZonesWithPartner)?;
        let zone = owned_zone(conn, &me, &req.zone_id)?;
        if store::is_zone_registered(conn, &zone.zone_id, &me.federation_id, &partner.federation_id)? {
            return Err(FederationError::Conflict(format!(
                "zone {} is registered by {}/{}",
                zone.zone_id, partner.operator_id, partner.country_code
            )));
        }
        if !store::is_zone_shared(conn, &zone.zone_id, &partner.federation_id)? {
            return Err(FederationError::NotFound(format!(
                "zone {} is not shared with {}/{}",
                zone.zone_id, partner.operator_id, partner.country_code
            )));
        }

        let notify = ZoneRequest {
            request_id: new_request_id(),
            operator: me.operator_id.clone(),
            country: me.country_code.clone(),
            orig_federation_id: me.federation_id.clone(),
            dest_federation_id: partner.federation_id.clone(),
            zone: zone.zone_id.clone(),
        };
        self.peer.notify_zone_unshared(&partner.federation_addr, &notify)?;

        let tx = conn.transaction()?;
        store::delete_shared_zone(&tx, &zone.zone_id, &partner.federation_id)?;
        emit_event(
            &tx,
            actor,
            &EventPayload::ZoneUnshared {
                zone_id: zone.zone_id.clone(),
                partner_federation_id: partner.federation_id.clone(),
            },
        )?;
        tx.commit()?;

        tracing::info!(zone_id = %zone.zone_id, partner_id = %partner.federation_id, "zone unshared");
        Ok(())
    }

    /// Declares that this self federator uses a zone the partner shared.
    pub fn register_partner_zone(
        &self,
        conn: &mut Connection,
        actor: &str,
        req: ZonePartnerRequest,
    ) -> Result<(), FederationError> {
        let (me, partner) = self.pair(conn, actor, &req, FederatorRole::AccessPartnerZones)?;
        let zone = owned_zone(conn, &partner, &req.zone_id)?;
        if store::is_zone_registered(conn, &zone.zone_id, &me.federation_id, &partner.federation_id)? {
            tracing::debug!(zone_id = %zone.zone_id, "partner zone already registered");
            return Ok(());
        }

        let register = ZoneRegisterRequest {
            request_id: new_request_id(),
            operator: me.operator_id.clone(),
            country: me.country_code.clone(),
            orig_federation_id: me.federation_id.clone(),
            dest_federation_id: partner.federation_id.clone(),
            zones: vec![zone.zone_id.clone()],
        };
        let resp = self.peer.register_zone(&partner.federation_addr, &register)?;

        let tx = conn.transaction()?;
        let inserted = store::insert_registered_zone(
            &tx,
            &RegisteredZone {
                zone_id: zone.zone_id.clone(),
                self_federation_id: me.federation_id.clone(),
                federation_id: partner.federation_id.clone(),
                operator_id: partner.operator_id.clone(),
                country_code: partner.country_code.clone(),
            },
        );
        match inserted {
            Ok(()) => {}
            Err(e) if e.is_unique() => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        emit_event(
            &tx,
            actor,
            &EventPayload::ZoneRegistered {
                zone_id: zone.zone_id.clone(),
                self_federation_id: me.federation_id.clone(),
                partner_federation_id: partner.federation_id.clone(),
            },
        )?;
        tx.commit()?;

        tracing::info!(
            zone_id = %zone.zone_id,
            partner_id = %partner.federation_id,
            token = %resp.zone.registration_token,
            "partner zone registered"
        );
        Ok(())
    }

    pub fn deregister_partner_zone(
        &self,
        conn: &mut Connection,
        actor: &str,
        req: ZonePartnerRequest,
    ) -> Result<(), FederationError> {
        let (me, partner) = self.pair(conn, actor, &req, FederatorRole::AccessPartnerZones)?;
        if !store::is_zone_registered(conn, &req.zone_id, &me.federation_id, &partner.federation_id)? {
            return Err(FederationError::NotFound(format!(
                "zone {} is not registered with {}/{}",
                req.zone_id, partner.operator_id, partner.country_code
            )));
        }

        let deregister = ZoneRequest {
            request_id: new_request_id(),
            operator: me.operator_id.clone(),
            country: me.country_code.clone(),
            orig_federation_id: me.federation_id.clone(),
            dest_federation_id: partner.federation_id.clone(),
            zone: req.zone_id.clone(),
        };
        self.peer.deregister_zone(&partner.federation_addr, &deregister)?;

        let tx = conn.transaction()?;
        store::delete_registered_zone(&tx, &req.zone_id, &me.federation_id, &partner.federation_id)?;
        emit_event(
            &tx,
            actor,
            &EventPayload::ZoneDeregistered {
                zone_id: req.zone_id.clone(),
                self_federation_id: me.federation_id.clone(),
                partner_federation_id: partner.federation_id.clone(),
            },
        )?;
        tx.commit()?;

        tracing::info!(zone_id = %req.zone_id, partner_id = %partner.federation_id, "partner zone deregistered");
        Ok(())
    }

    /// Zones of partners the visible self federators may access.
    pub fn show_partner_zones(
        &self,
        conn: &Connection,
        actor: &str,
        filter: &ShowPartnerZonesRequest,
    ) -> Result<Vec<PartnerZoneView>, FederationError> {
        let mut out = Vec::new();
        let selves =
            self.visible_selves(conn, actor, &filter.self_operator_id, &filter.self_country_code)?;
        for me in selves {
            for partner_id in
                roles::partners_with_role(conn, &me.federation_id, FederatorRole::AccessPartnerZones)?
            {
                let Some(partner) = store::get_federator(conn, &partner_id)? else {
                    continue;
                };
                if !matches_filter(
                    &partner,
                    &filter.partner_operator_id,
                    &filter.partner_country_code,
                ) {
                    continue;
                }
                for zone in store::list_zones(conn, &partner.federation_id)? {
                    let registered = store::is_zone_registered(
                        conn,
                        &zone.zone_id,
                        &me.federation_id,
                        &partner.federation_id,
                    )?;
                    out.push(PartnerZoneView {
                        zone,
                        self_operator_id: me.operator_id.clone(),
                        self_country_code: me.country_code.clone(),
                        partner_operator_id: partner.operator_id.clone(),
                        partner_country_code: partner.country_code.clone(),
                        registered,
                    });
                }
            }
        }
        Ok(out)
    }

    fn visible_selves(
        &self,
        conn: &Connection,
        actor: &str,
        operator_id: &Option<String>,
        country_code: &Option<String>,
    ) -> Result<Vec<Federator>, FederationError> {
        let orgs = self
            .authz
            .authorized_orgs(actor, RESOURCE_CLOUDLETS, Action::View);
        Ok(
            store::list_federators(conn, edgefed_types::FederatorKind::SelfFederator)?
                .into_iter()
                .filter(|fed| orgs.contains(&fed.operator_id))
                .filter(|fed| matches_filter(fed, operator_id, country_code))
                .collect(),
        )
    }
}

/// Loads `zone_id` and checks `owner` owns it.
fn owned_zone(
    conn: &Connection,
    owner: &Federator,
    zone_id: &str,
) -> Result<FederatorZone, FederationError> {
    store::get_zone(conn, zone_id)?
        .filter(|zone| zone.federation_id == owner.federation_id)
        .ok_or_else(|| {
            FederationError::NotFound(format!(
                "zone {zone_id} of {}/{}",
                owner.operator_id, owner.country_code
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        inventory, policy, seed_partner, seed_self, test_db, zone, ScriptedPeer,
    };
    use std::sync::atomic::Ordering;

    const SELF_ID: &str = "self-fed-0001";
    const PARTNER_ID: &str = "partner-fed-0001";

    fn manager(peer: Arc<ScriptedPeer>) -> ZoneManager {
        ZoneManager::new(Arc::new(policy()), Arc::new(inventory()), peer)
    }

    fn create_req(zone_id: &str) -> CreateZoneRequest {
        CreateZoneRequest {
            operator_id: "mexop".into(),
            country_code: "US".into(),
            zone_id: zone_id.into(),
            geo_location: "37.77,-122.41".into(),
            city: "San Francisco".into(),
            state: "CA".into(),
            locality: String::new(),
            region: "US-1".into(),
            cloudlets: vec!["cloudlet1".into()],
        }
    }

    fn pair_req(zone_id: &str) -> ZonePartnerRequest {
        ZonePartnerRequest {
            self_operator_id: "mexop".into(),
            self_country_code: "US".into(),
            partner_operator_id: "telco".into(),
            partner_country_code: "US".into(),
            zone_id: zone_id.into(),
        }
    }

    fn setup() -> Connection {
        let conn = test_db();
        seed_self(&conn, SELF_ID, "mexop");
        seed_partner(&conn, PARTNER_ID, "telco");
        conn
    }

    #[test]
    fn create_zone_validates_cloudlets_and_region() {
        let mut conn = setup();
        let mgr = manager(Arc::new(ScriptedPeer::default()));

        let zone = mgr.create_zone(&mut conn, "admin", create_req("zone-sfo")).unwrap();
        assert_eq!(zone.federation_id, SELF_ID);
        assert_eq!(zone.edge_count, 1);

        assert!(matches!(
            mgr.create_zone(&mut conn, "admin", create_req("zone-sfo")),
            Err(FederationError::AlreadyExists(_))
        ));

        let mut two = create_req("zone-two");
        two.cloudlets.push("cloudlet2".into());
        assert!(matches!(
            mgr.create_zone(&mut conn, "admin", two),
            Err(FederationError::InvalidArgument(_))
        ));

        let mut unknown = create_req("zone-unknown");
        unknown.cloudlets = vec!["cloudlet7".into()];
        assert!(matches!(
            mgr.create_zone(&mut conn, "admin", unknown),
            Err(FederationError::NotFound(_))
        ));

        let mut elsewhere = create_req("zone-east");
        elsewhere.region = "US-2".into();
        assert!(matches!(
            mgr.create_zone(&mut conn, "admin", elsewhere),
            Err(FederationError::InvalidArgument(_))
        ));

        let mut bad_geo = create_req("zone-geo");
        bad_geo.geo_location = "91,0".into();
        assert!(matches!(
            mgr.create_zone(&mut conn, "admin", bad_geo),
            Err(FederationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn share_requires_the_share_role() {
        let mut conn = setup();
        let mgr = manager(Arc::new(ScriptedPeer::default()));
        mgr.create_zone(&mut conn, "admin", create_req("zone-sfo")).unwrap();
        roles::grant_role(&conn, SELF_ID, PARTNER_ID, FederatorRole::AccessPartnerZones).unwrap();

        assert!(matches!(
            mgr.share_zone(&mut conn, "admin", pair_req("zone-sfo")),
            Err(FederationError::NotAuthorized(_))
        ));
        assert!(!store::is_zone_shared(&conn, "zone-sfo", PARTNER_ID).unwrap());
    }

    #[test]
    fn share_is_idempotent() {
        let mut conn = setup();
        let peer = Arc::new(ScriptedPeer::default());
        let mgr = manager(peer.clone());
        mgr.create_zone(&mut conn, "admin", create_req("zone-sfo")).unwrap();
        roles::grant_role(&conn, SELF_ID, PARTNER_ID, FederatorRole::ShareZonesWithPartner).unwrap();

        mgr.share_zone(&mut conn, "admin", pair_req("zone-sfo")).unwrap();
        mgr.share_zone(&mut conn, "admin", pair_req("zone-sfo")).unwrap();

        assert_eq!(store::shared_with(&conn, "zone-sfo").unwrap().len(), 1);
        let notifies = peer
            .calls()
            .iter()
            .filter(|c| c.starts_with("notify_zone_shared"))
            .count();
        assert_eq!(notifies, 1);
    }

    #[test]
    fn failed_notify_does_not_share() {
        let mut conn = setup();
        let peer = Arc::new(ScriptedPeer::default());
        let mgr = manager(peer.clone());
        mgr.create_zone(&mut conn, "admin", create_req("zone-sfo")).unwrap();
        roles::grant_role(&conn, SELF_ID, PARTNER_ID, FederatorRole::ShareZonesWithPartner).unwrap();

        peer.unreachable.store(true, Ordering::SeqCst);
        assert!(matches!(
            mgr.share_zone(&mut conn, "admin", pair_req("zone-sfo")),
            Err(FederationError::PeerUnreachable { .. })
        ));
        assert!(!store::is_zone_shared(&conn, "zone-sfo", PARTNER_ID).unwrap());
    }

    #[test]
    fn delete_zone_waits_for_unshare() {
        let mut conn = setup();
        let mgr = manager(Arc::new(ScriptedPeer::default()));
        mgr.create_zone(&mut conn, "admin", create_req("zone-sfo")).unwrap();
        roles::grant_role(&conn, SELF_ID, PARTNER_ID, FederatorRole::ShareZonesWithPartner).unwrap();
        mgr.share_zone(&mut conn, "admin", pair_req("zone-sfo")).unwrap();

        let key = || ZoneKey {
            operator_id: "mexop".into(),
            country_code: "US".into(),
            zone_id: "zone-sfo".into(),
        };
        assert!(matches!(
            mgr.delete_zone(&mut conn, "admin", key()),
            Err(FederationError::Conflict(_))
        ));

        mgr.unshare_zone(&mut conn, "admin", pair_req("zone-sfo")).unwrap();
        mgr.delete_zone(&mut conn, "admin", key()).unwrap();
        assert!(store::get_zone(&conn, "zone-sfo").unwrap().is_none());
    }

    #[test]
    fn unshare_refuses_while_registered() {
        let mut conn = setup();
        let mgr = manager(Arc::new(ScriptedPeer::default()));
        mgr.create_zone(&mut conn, "admin", create_req("zone-sfo")).unwrap();
        roles::grant_role(&conn, SELF_ID, PARTNER_ID, FederatorRole::ShareZonesWithPartner).unwrap();
        mgr.share_zone(&mut conn, "admin", pair_req("zone-sfo")).unwrap();
        store::insert_registered_zone(
            &conn,
            &RegisteredZone {
                zone_id: "zone-sfo".into(),
                self_federation_id: SELF_ID.into(),
                federation_id: PARTNER_ID.into(),
                operator_id: "telco".into(),
                country_code: "US".into(),
            },
        )
        .unwrap();

        assert!(matches!(
            mgr.unshare_zone(&mut conn, "admin", pair_req("zone-sfo")),
            Err(FederationError::Conflict(_))
        ));
    }

    #[test]
    fn register_requires_access_and_a_known_partner_zone() {
        let mut conn = setup();
        let peer = Arc::new(ScriptedPeer::default());
        let mgr = manager(peer.clone());
        store::insert_zone(&conn, &zone("zone-lon", PARTNER_ID)).unwrap();

        assert!(matches!(
            mgr.register_partner_zone(&mut conn, "admin", pair_req("zone-lon")),
            Err(FederationError::NotAuthorized(_))
        ));

        roles::grant_role(&conn, SELF_ID, PARTNER_ID, FederatorRole::AccessPartnerZones).unwrap();
        assert!(matches!(
            mgr.register_partner_zone(&mut conn, "admin", pair_req("zone-nowhere")),
            Err(FederationError::NotFound(_))
        ));

        mgr.register_partner_zone(&mut conn, "admin", pair_req("zone-lon")).unwrap();
        mgr.register_partner_zone(&mut conn, "admin", pair_req("zone-lon")).unwrap();
        assert!(store::is_zone_registered(&conn, "zone-lon", SELF_ID, PARTNER_ID).unwrap());
        assert_eq!(
            peer.calls()
                .iter()
                .filter(|c| c.starts_with("register_zone"))
                .count(),
            1
        );

        let views = mgr
            .show_partner_zones(&conn, "admin", &ShowPartnerZonesRequest::default())
            .unwrap();
        assert_eq!(views.len(), 1);
        assert!(views[0].registered);

        mgr.deregister_partner_zone(&mut conn, "admin", pair_req("zone-lon")).unwrap();
        assert!(!store::is_zone_registered(&conn, "zone-lon", SELF_ID, PARTNER_ID).unwrap());
        assert!(matches!(
            mgr.deregister_partner_zone(&mut conn, "admin", pair_req("zone-lon")),
            Err(FederationError::NotFound(_))
        ));
    }

    #[test]
    fn unauthorized_actor_cannot_tell_which_selves_exist() {
        let mut conn = setup();
        let mgr = manager(Arc::new(ScriptedPeer::default()));

        let mut missing = create_req("zone-mx");
        missing.country_code = "MX".into();
        for req in [create_req("zone-sfo"), missing] {
            let err = mgr.create_zone(&mut conn, "viewer", req).unwrap_err();
            assert!(matches!(err, FederationError::NotAuthorized(_)), "{err:?}");
        }
        assert!(store::get_zone(&conn, "zone-sfo").unwrap().is_none());
    }

    #[test]
    fn show_zones_lists_share_partners() {
        let mut conn = setup();
        let mgr = manager(Arc::new(ScriptedPeer::default()));
        mgr.create_zone(&mut conn, "admin", create_req("zone-sfo")).unwrap();
        roles::grant_role(&conn, SELF_ID, PARTNER_ID, FederatorRole::ShareZonesWithPartner).unwrap();
        mgr.share_zone(&mut conn, "admin", pair_req("zone-sfo")).unwrap();

        let views = mgr.show_zones(&conn, "viewer", &ShowZonesRequest::default()).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].shared_with, vec![OperatorKey::new("telco", "US")]);
        assert!(views[0].registered_by.is_empty());
        assert!(mgr.show_zones(&conn, "nobody", &ShowZonesRequest::default()).unwrap().is_empty());
    }
}
