//! Federator registry: self federator lifecycle and partner attachment.

use std::collections::BTreeSet;
use std::sync::Arc;

use edgefed_observe::{emit_event, EventPayload};
use edgefed_types::validate::{
    parse_geo_location, validate_country_code, validate_federation_id, validate_zone_id,
};
use edgefed_types::{Federator, FederatorKind, FederatorRole, OperatorKey, RoleSet};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::authz::{Action, Authorizer, OrgKind, RESOURCE_CLOUDLETS};
use crate::client::PeerClient;
use crate::controller::RegionalController;
use crate::error::{require_field, FederationError};
use crate::intents::{self, IntentAction};
use crate::roles;
use crate::store;
use crate::wire::{
    new_request_id, FederationRequest, PartnerRegistrationRequest, PartnerRegistrationResponse,
    PartnerUpdateRequest,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSelfRequest {
    pub operator_id: String,
    pub country_code: String,
    pub mcc: String,
    pub mncs: Vec<String>,
    pub regions: Vec<String>,
    pub locator_endpoint: String,
}

/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSelfRequest {
    pub operator_id: String,
    pub country_code: String,
    pub mcc: Option<String>,
    pub mncs: Option<Vec<String>>,
    pub regions: Option<Vec<String>>,
    pub locator_endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowSelfRequest {
    pub operator_id: Option<String>,
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPartnerRequest {
    pub self_operator_id: String,
    pub self_country_code: String,
    pub partner_federation_id: String,
    pub partner_federation_addr: String,
    pub partner_operator_id: String,
    pub partner_country_code: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovePartnerRequest {
    pub self_operator_id: String,
    pub self_country_code: String,
    pub partner_operator_id: String,
    pub partner_country_code: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowPartnersRequest {
    pub self_operator_id: Option<String>,
    pub self_country_code: Option<String>,
}

/// A partner as seen by one self federator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerView {
    #[serde(flatten)]
    pub federator: Federator,
    pub self_operator_id: String,
    pub self_country_code: String,
    pub self_federation_id: String,
    pub roles: RoleSet,
}

/// Creates and maintains self federators and attaches partners to them.
pub struct FederatorRegistry {
    authz: Arc<dyn Authorizer>,
    controller: Arc<dyn RegionalController>,
    peer: Arc<dyn PeerClient>,
    federation_addr: String,
}

impl FederatorRegistry {
    /// `federation_addr` is this platform's own federation endpoint, stored
    /// on every self federator it creates.
    pub fn new(
        authz: Arc<dyn Authorizer>,
        controller: Arc<dyn RegionalController>,
        peer: Arc<dyn PeerClient>,
        federation_addr: impl Into<String>,
    ) -> Self {
        Self {
            authz,
            controller,
            peer,
            federation_addr: federation_addr.into(),
        }
    }

    pub fn federation_addr(&self) -> &str {
        &self.federation_addr
    }

    fn authorize(&self, actor: &str, org: &str, action: Action) -> Result<(), FederationError> {
        self.authz
            .authorized(actor, org, RESOURCE_CLOUDLETS, action)
    }

    fn check_regions<'a, I>(&self, regions: I) -> Result<(), FederationError>
    where
        I: IntoIterator<Item = &'a String>,
    {
        for region in regions {
            if !self.controller.region_exists(region) {
                return Err(FederationError::InvalidArgument(format!(
                    "region {region} does not exist"
                )));
            }
        }
        Ok(())
    }

    pub fn create_self(
        &self,
        conn: &mut Connection,
        actor: &str,
        req: CreateSelfRequest,
    ) -> Result<Federator, FederationError> {
        require_field("operatorId", &req.operator_id)?;
        require_field("countryCode", &req.country_code)?;
        require_field("mcc", &req.mcc)?;
        require_field("locatorEndpoint", &req.locator_endpoint)?;
        validate_country_code(&req.country_code)?;
        let mncs = non_empty_set("mncs", req.mncs)?;
        let regions = non_empty_set("regions", req.regions)?;
        self.check_regions(&regions)?;

        self.authorize(actor, &req.operator_id, Action::Manage)?;
        if self.authz.organization_kind(&req.operator_id) != Some(OrgKind::Operator) {
            return Err(FederationError::InvalidArgument(format!(
                "{} is not an operator organization",
                req.operator_id
            )));
        }

        let fed = Federator {
            federation_id: uuid::Uuid::new_v4().to_string(),
            federation_addr: self.federation_addr.clone(),
            kind: FederatorKind::SelfFederator,
            operator_id: req.operator_id,
            country_code: req.country_code,
            regions,
            mcc: req.mcc,
            mncs,
            locator_endpoint: req.locator_endpoint,
        };

        let tx = conn.transaction()?;
        store::insert_federator(&tx, &fed).map_err(|e| {
            if e.is_unique() {
                FederationError::AlreadyExists(format!(
                    "self federator for {}/{}",
                    fed.operator_id, fed.country_code
                ))
            } else {
                e.into()
            }
        })?;
        emit_event(
            &tx,
            actor,
            &EventPayload::FederatorCreated {
                federation_id: fed.federation_id.clone(),
                operator_id: fed.operator_id.clone(),
                country_code: fed.country_code.clone(),
            },
        )?;
        tx.commit()?;

        tracing::info!(
            federation_id = %fed.federation_id,
            operator_id = %fed.operator_id,
            country_code = %fed.country_code,
            "self federator created"
        );
        Ok(fed)
    }

    /// Applies the changed fields and pushes them to every partner this
    /// federator shares zones with. Nothing is saved unless every push
    /// succeeds.
    pub fn update_self(
        &self,
        conn: &mut Connection,
        actor: &str,
        req: UpdateSelfRequest,
    ) -> Result<Federator, FederationError> {
        self.authorize(actor, &req.operator_id, Action::Manage)?;
        let current = self_federator(conn, &req.operator_id, &req.country_code)?;

        let mut next = current.clone();
        let mut changed = Vec::new();

        if let Some(mcc) = req.mcc {
            require_field("mcc", &mcc)?;
            if mcc != current.mcc {
                next.mcc = mcc;
                changed.push("mcc".to_string());
            }
        }
        if let Some(mncs) = req.mncs {
            let mncs = non_empty_set("mncs", mncs)?;
            if mncs != current.mncs {
                next.mncs = mncs;
                changed.push("mncs".to_string());
            }
        }
        if let Some(locator) = req.locator_endpoint {
            require_field("locatorEndpoint", &locator)?;
            if locator != current.locator_endpoint {
                next.locator_endpoint = locator;
                changed.push("locatorEndpoint".to_string());
            }
        }
        if let Some(regions) = req.regions {
            let regions = non_empty_set("regions", regions)?;
            if let Some(removed) = current.regions.difference(&regions).next() {
                return Err(FederationError::InvalidArgument(format!(
                    "region {removed} cannot be removed"
                )));
            }
            if regions != current.regions {
                self.check_regions(regions.difference(&current.regions))?;
                next.regions = regions;
                changed.push("regions".to_string());
            }
        }

        if changed.is_empty() {
            return Err(FederationError::NothingToUpdate);
        }

        let mut notified = Vec::new();
        for partner_id in
            roles::partners_with_role(conn, &current.federation_id, FederatorRole::ShareZonesWithPartner)?
        {
            let Some(partner) = store::get_federator(conn, &partner_id)? else {
                continue;
            };
            let push = PartnerUpdateRequest {
                request_id: new_request_id(),
                operator: next.operator_id.clone(),
                country: next.country_code.clone(),
                orig_federation_id: next.federation_id.clone(),
                dest_federation_id: partner.federation_id.clone(),
                mcc: next.mcc.clone(),
                mnc: next.mncs.iter().cloned().collect(),
                locator_endpoint: next.locator_endpoint.clone(),
            };
            self.peer.update_partner(&partner.federation_addr, &push)?;
            notified.push(partner.federation_id);
        }

        let tx = conn.transaction()?;
        store::update_federator(&tx, &next)?;
        emit_event(
            &tx,
            actor,
            &EventPayload::FederatorUpdated {
                federation_id: next.federation_id.clone(),
                changed: changed.clone(),
                notified: notified.clone(),
            },
        )?;
        tx.commit()?;

        tracing::info!(
            federation_id = %next.federation_id,
            ?changed,
            partners = notified.len(),
            "self federator updated"
        );
        Ok(next)
    }

    pub fn delete_self(
        &self,
        conn: &mut Connection,
        actor: &str,
        key: OperatorKey,
    ) -> Result<(), FederationError> {
        self.authorize(actor, &key.operator_id, Action::Manage)?;
        let fed = self_federator(conn, &key.operator_id, &key.country_code)?;

        let tx = conn.transaction()?;
        if !roles::list_roles(&tx, &fed.federation_id)?.is_empty() {
            return Err(FederationError::Conflict(format!(
                "self federator {key} still has partners"
            )));
        }
        if store::count_zones(&tx, &fed.federation_id)? > 0 {
            return Err(FederationError::Conflict(format!(
                "self federator {key} still owns zones"
            )));
        }
        store::delete_federator(&tx, &fed.federation_id).map_err(|e| {
            if e.is_foreign_key() {
                FederationError::Conflict(format!("self federator {key} is still referenced"))
            } else {
                e.into()
            }
        })?;
        emit_event(
            &tx,
            actor,
            &EventPayload::FederatorDeleted {
                federation_id: fed.federation_id.clone(),
            },
        )?;
        tx.commit()?;

        tracing::info!(federation_id = %fed.federation_id, "self federator deleted");
        Ok(())
    }

    /// Self federators the actor may view, optionally filtered.
    pub fn show_self(
        &self,
        conn: &Connection,
        actor: &str,
        filter: &ShowSelfRequest,
    ) -> Result<Vec<Federator>, FederationError> {
        let orgs = self
            .authz
            .authorized_orgs(actor, RESOURCE_CLOUDLETS, Action::View);
        Ok(store::list_federators(conn, FederatorKind::SelfFederator)?
            .into_iter()
            .filter(|fed| orgs.contains(&fed.operator_id))
            .filter(|fed| matches_filter(fed, &filter.operator_id, &filter.country_code))
            .collect())
    }

    /// Performs the registration handshake with a remote platform and
    /// records it as a partner this self federator may access.
    ///
    /// The partner's network identity and zone list come from the
    /// handshake response, never from the request.
    pub fn add_partner(
        &self,
        conn: &mut Connection,
        actor: &str,
        req: AddPartnerRequest,
    ) -> Result<Federator, FederationError> {
        require_field("partnerFederationAddr", &req.partner_federation_addr)?;
        require_field("partnerOperatorId", &req.partner_operator_id)?;
        validate_federation_id(&req.partner_federation_id)?;
        validate_country_code(&req.partner_country_code)?;

        self.authorize(actor, &req.self_operator_id, Action::Manage)?;
        let me = self_federator(conn, &req.self_operator_id, &req.self_country_code)?;

        let existing = store::get_federator(conn, &req.partner_federation_id)?;
        if let Some(existing) = &existing {
            if existing.kind == FederatorKind::SelfFederator {
                return Err(FederationError::InvalidArgument(
                    "partner federation id belongs to a self federator".to_string(),
                ));
            }
            if existing.operator_id != req.partner_operator_id
                || existing.country_code != req.partner_country_code
            {
                return Err(FederationError::InvalidArgument(format!(
                    "partner federation id is registered to {}/{}",
                    existing.operator_id, existing.country_code
                )));
            }
            if roles::get_roles(conn, &me.federation_id, &existing.federation_id)?
                .contains(FederatorRole::AccessPartnerZones)
            {
                return Err(FederationError::AlreadyExists(format!(
                    "partner {}/{}",
                    existing.operator_id, existing.country_code
                )));
            }
        } else if let Some(other) = store::find_federator(
            conn,
            FederatorKind::Partner,
            &req.partner_operator_id,
            &req.partner_country_code,
        )? {
            return Err(FederationError::AlreadyExists(format!(
                "partner {}/{} is known as {}",
                other.operator_id, other.country_code, other.federation_id
            )));
        }

        let intent = intents::begin_intent(
            conn,
            IntentAction::AddPartner,
            &me.federation_id,
            &req.partner_federation_id,
            &req.partner_federation_addr,
        )?;

        let handshake = PartnerRegistrationRequest {
            request_id: new_request_id(),
            orig_federation_id: me.federation_id.clone(),
            dest_federation_id: req.partner_federation_id.clone(),
            operator_id: me.operator_id.clone(),
            country_code: me.country_code.clone(),
            orig_federation_addr: me.federation_addr.clone(),
        };
        let resp = match self
            .peer
            .register_partner(&req.partner_federation_addr, &handshake)
            .and_then(|resp| {
                check_handshake(
                    &req.partner_federation_addr,
                    &handshake,
                    &req.partner_operator_id,
                    resp,
                )
            })
        {
            Ok(resp) => resp,
            Err(err) => {
                intents::abort_intent(conn, &intent, &err.to_string())?;
                return Err(err);
            }
        };

        let partner = Federator {
            federation_id: req.partner_federation_id.clone(),
            federation_addr: req.partner_federation_addr.clone(),
            kind: FederatorKind::Partner,
            operator_id: req.partner_operator_id,
            country_code: req.partner_country_code,
            regions: BTreeSet::new(),
            mcc: resp.mcc,
            mncs: resp.mnc.into_iter().collect(),
            locator_endpoint: resp.locator_endpoint,
        };

        let tx = conn.transaction()?;
        if existing.is_some() {
            store::update_federator(&tx, &partner)?;
        } else {
            store::insert_federator(&tx, &partner).map_err(|e| {
                if e.is_unique() {
                    FederationError::AlreadyExists(format!(
                        "partner {}/{}",
                        partner.operator_id, partner.country_code
                    ))
                } else {
                    e.into()
                }
            })?;
        }
        let mut zone_count = 0;
        for info in resp.partner_zone {
            if store_shadow_zone(&tx, &partner.federation_id, info)? {
                zone_count += 1;
            }
        }
        roles::grant_role(
            &tx,
            &me.federation_id,
            &partner.federation_id,
            FederatorRole::AccessPartnerZones,
        )?;
        intents::commit_intent(&tx, &intent)?;
        emit_event(
            &tx,
            actor,
            &EventPayload::PartnerAdded {
                self_federation_id: me.federation_id.clone(),
                partner_federation_id: partner.federation_id.clone(),
                partner_addr: partner.federation_addr.clone(),
                zones: zone_count,
            },
        )?;
        tx.commit()?;

        tracing::info!(
            self_id = %me.federation_id,
            partner_id = %partner.federation_id,
            zones = zone_count,
            "partner federator added"
        );
        Ok(partner)
    }

    /// Ends this self federator's access to a partner's zones.
    ///
    /// Fails with `Conflict` while any partner zone is still registered
    /// locally.
    pub fn remove_partner(
        &self,
        conn: &mut Connection,
        actor: &str,
        req: RemovePartnerRequest,
    ) -> Result<(), FederationError> {
        self.authorize(actor, &req.self_operator_id, Action::Manage)?;
        let me = self_federator(conn, &req.self_operator_id, &req.self_country_code)?;
        let partner = partner_federator(conn, &req.partner_operator_id, &req.partner_country_code)?;

        if !roles::get_roles(conn, &me.federation_id, &partner.federation_id)?
            .contains(FederatorRole::AccessPartnerZones)
        {
            return Err(FederationError::NotFound(format!(
                "no federation with partner {}/{}",
                partner.operator_id, partner.country_code
            )));
        }
        let registered = store::count_registrations(
            conn,
            &me.federation_id,
            &partner.federation_id,
            &partner.federation_id,
        )?;
        if registered > 0 {
            return Err(FederationError::Conflict(format!(
                "{registered} zone(s) of partner {}/{} are still registered",
                partner.operator_id, partner.country_code
            )));
        }

        let intent = intents::begin_intent(
            conn,
            IntentAction::RemovePartner,
            &me.federation_id,
            &partner.federation_id,
            &partner.federation_addr,
        )?;
        let removal = FederationRequest {
            request_id: new_request_id(),
            operator: me.operator_id.clone(),
            country: me.country_code.clone(),
            orig_federation_id: me.federation_id.clone(),
            dest_federation_id: partner.federation_id.clone(),
        };
        if let Err(err) = self.peer.remove_partner(&partner.federation_addr, &removal) {
            intents::abort_intent(conn, &intent, &err.to_string())?;
            return Err(err);
        }

        let tx = conn.transaction()?;
        let outcome = roles::revoke_role(
            &tx,
            &me.federation_id,
            &partner.federation_id,
            FederatorRole::AccessPartnerZones,
        )?;
        intents::commit_intent(&tx, &intent)?;
        emit_event(
            &tx,
            actor,
            &EventPayload::PartnerRemoved {
                self_federation_id: me.federation_id.clone(),
                partner_federation_id: partner.federation_id.clone(),
            },
        )?;
        tx.commit()?;

        tracing::info!(
            self_id = %me.federation_id,
            partner_id = %partner.federation_id,
            forgotten = outcome.partner_forgotten,
            "partner federator removed"
        );
        Ok(())
    }

    /// Partners of the self federators the actor may view, with the roles
    /// each self federator holds for them.
    pub fn show_partners(
        &self,
        conn: &Connection,
        actor: &str,
        filter: &ShowPartnersRequest,
    ) -> Result<Vec<PartnerView>, FederationError> {
        let selves = self.show_self(
            conn,
            actor,
            &ShowSelfRequest {
                operator_id: filter.self_operator_id.clone(),
                country_code: filter.self_country_code.clone(),
            },
        )?;
        let mut out = Vec::new();
        for me in selves {
            for (partner_id, roles) in roles::list_roles(conn, &me.federation_id)? {
                if let Some(federator) = store::get_federator(conn, &partner_id)? {
                    out.push(PartnerView {
                        federator,
                        self_operator_id: me.operator_id.clone(),
                        self_country_code: me.country_code.clone(),
                        self_federation_id: me.federation_id.clone(),
                        roles,
                    });
                }
            }
        }
        Ok(out)
    }
}

/// Rejects a handshake answer that does not come from the federator and
/// operator we addressed, or was not meant for us.
fn check_handshake(
    addr: &str,
    sent: &PartnerRegistrationRequest,
    partner_operator_id: &str,
    resp: PartnerRegistrationResponse,
) -> Result<PartnerRegistrationResponse, FederationError> {
    let rejected = |message: String| FederationError::PeerRejected {
        addr: addr.to_string(),
        status: 200,
        message,
    };
    if resp.orig_federation_id != sent.dest_federation_id
        || resp.dest_federation_id != sent.orig_federation_id
    {
        return Err(rejected(format!(
            "handshake answered by {} for {}",
            resp.orig_federation_id, resp.dest_federation_id
        )));
    }
    if resp.orig_operator_id != partner_operator_id || resp.partner_operator_id != sent.operator_id
    {
        return Err(rejected(format!(
            "handshake answered by operator {} for {}, expected {partner_operator_id} for {}",
            resp.orig_operator_id, resp.partner_operator_id, sent.operator_id
        )));
    }
    Ok(resp)
}

/// Stores or refreshes the shadow copy of a partner zone. A malformed zone,
/// or a zone id already owned by someone else, is skipped.
pub(crate) fn store_shadow_zone(
    conn: &Connection,
    owner_id: &str,
    info: crate::wire::ZoneInfo,
) -> Result<bool, FederationError> {
    if let Err(err) = validate_zone_id(&info.zone_id)
        .and_then(|()| parse_geo_location(&info.geo_location).map(|_| ()))
    {
        tracing::warn!(
            zone_id = %info.zone_id,
            claimed_by = owner_id,
            error = %err,
            "malformed partner zone, skipping"
        );
        return Ok(false);
    }
    let shadow = info.into_shadow(owner_id);
    match store::get_zone(conn, &shadow.zone_id)? {
        Some(existing) if existing.federation_id == owner_id => {
            store::update_zone(conn, &shadow)?;
            Ok(true)
        }
        Some(existing) => {
            tracing::warn!(
                zone_id = %shadow.zone_id,
                owner = %existing.federation_id,
                claimed_by = owner_id,
                "partner zone id collides with a known zone, skipping"
            );
            Ok(false)
        }
        None => {
            store::insert_zone(conn, &shadow)?;
            Ok(true)
        }
    }
}

pub(crate) fn self_federator(
    conn: &Connection,
    operator_id: &str,
    country_code: &str,
) -> Result<Federator, FederationError> {
    require_field("operatorId", operator_id)?;
    require_field("countryCode", country_code)?;
    store::find_federator(conn, FederatorKind::SelfFederator, operator_id, country_code)?
        .ok_or_else(|| {
            FederationError::NotFound(format!(
                "self federator for {operator_id}/{country_code}"
            ))
        })
}

pub(crate) fn partner_federator(
    conn: &Connection,
    operator_id: &str,
    country_code: &str,
) -> Result<Federator, FederationError> {
    require_field("partnerOperatorId", operator_id)?;
    require_field("partnerCountryCode", country_code)?;
    store::find_federator(conn, FederatorKind::Partner, operator_id, country_code)?.ok_or_else(
        || FederationError::NotFound(format!("partner federator {operator_id}/{country_code}")),
    )
}

pub(crate) fn matches_filter(
    fed: &Federator,
    operator_id: &Option<String>,
    country_code: &Option<String>,
) -> bool {
    operator_id.as_ref().map_or(true, |op| *op == fed.operator_id)
        && country_code.as_ref().map_or(true, |cc| *cc == fed.country_code)
}

fn non_empty_set(field: &str, values: Vec<String>) -> Result<BTreeSet<String>, FederationError> {
    let set: BTreeSet<String> = values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if set.is_empty() {
        return Err(FederationError::InvalidArgument(format!("missing {field}")));
    }
    if let Some(bad) = set.iter().find(|v| v.contains(',')) {
        return Err(FederationError::InvalidArgument(format!(
            "{field} entry {bad:?} may not contain a comma"
        )));
    }
    Ok(set)
}
