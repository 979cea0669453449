//! Receiving side of the federation protocol.
//!
//! Every handler first checks that `destFederationId` names one of this
//! platform's self federators and that the caller's operator and country
//! match what is on record for `origFederationId`. Requests that only remove
//! state succeed quietly when there is nothing left to remove, so a peer can
//! retry them.

use edgefed_observe::{emit_event, EventPayload};
use edgefed_types::validate::{
    parse_geo_location, validate_country_code, validate_federation_id, validate_zone_id,
};
use edgefed_types::{
    Federator, FederatorKind, FederatorRole, RegisteredZone, SharedZone,
};
use rusqlite::Connection;

use crate::error::{require_field, FederationError};
use crate::roles;
use crate::store;
use crate::wire::{
    FederationRequest, PartnerRegistrationRequest, PartnerRegistrationResponse,
    PartnerUpdateRequest, ZoneInfo, ZoneNotifyRequest, ZoneRegisterRequest, ZoneRegisterResponse,
    ZoneRegistration, ZoneRequest,
};

fn peer_actor(orig_federation_id: &str) -> String {
    format!("peer:{orig_federation_id}")
}

/// The local self federator a request is addressed to.
fn destination(conn: &Connection, dest_federation_id: &str) -> Result<Federator, FederationError> {
    require_field("destFederationId", dest_federation_id)?;
    match store::get_federator(conn, dest_federation_id)? {
        Some(fed) if fed.kind == FederatorKind::SelfFederator => Ok(fed),
        _ => {
            tracing::warn!(dest = dest_federation_id, "request for unknown destination federator");
            Err(FederationError::NotAuthorized(format!(
                "{dest_federation_id} is not a federator of this platform"
            )))
        }
    }
}

/// The calling partner, or `None` if it is not known here.
fn caller(
    conn: &Connection,
    orig_federation_id: &str,
    operator: &str,
    country: &str,
) -> Result<Option<Federator>, FederationError> {
    require_field("origFederationId", orig_federation_id)?;
    match store::get_federator(conn, orig_federation_id)? {
        None => Ok(None),
        Some(fed) if fed.kind == FederatorKind::Partner
            && fed.operator_id == operator
            && fed.country_code == country =>
        {
            Ok(Some(fed))
        }
        Some(_) => {
            tracing::warn!(
                orig = orig_federation_id,
                operator,
                country,
                "caller identity does not match the federator on record"
            );
            Err(FederationError::NotAuthorized(format!(
                "{orig_federation_id} is not registered to {operator}/{country}"
            )))
        }
    }
}

fn known_caller(
    conn: &Connection,
    orig_federation_id: &str,
    operator: &str,
    country: &str,
) -> Result<Federator, FederationError> {
    caller(conn, orig_federation_id, operator, country)?.ok_or_else(|| {
        FederationError::NotAuthorized(format!("{orig_federation_id} is not a known partner"))
    })
}

/// Accepts a registration handshake.
///
/// Records the caller as a partner, grants it `ShareZonesWithPartner` and
/// shares every zone of the destination federator with it. Repeating the
/// handshake refreshes the caller's address and returns the same answer.
pub fn accept_partner(
    conn: &mut Connection,
    req: &PartnerRegistrationRequest,
) -> Result<PartnerRegistrationResponse, FederationError> {
    require_field("operatorId", &req.operator_id)?;
    require_field("origFederationAddr", &req.orig_federation_addr)?;
    validate_federation_id(&req.orig_federation_id)?;
    validate_country_code(&req.country_code)?;

    let me = destination(conn, &req.dest_federation_id)?;
    if req.orig_federation_id == me.federation_id {
        return Err(FederationError::InvalidArgument(
            "a federator cannot partner with itself".to_string(),
        ));
    }
    let existing = caller(conn, &req.orig_federation_id, &req.operator_id, &req.country_code)?;
    if existing.is_none() {
        if let Some(other) =
            store::find_federator(conn, FederatorKind::Partner, &req.operator_id, &req.country_code)?
        {
            return Err(FederationError::AlreadyExists(format!(
                "partner {}/{} is known as {}",
                other.operator_id, other.country_code, other.federation_id
            )));
        }
    }

    let zones = store::list_zones(conn, &me.federation_id)?;
    let tx = conn.transaction()?;
    let partner = match existing {
        Some(mut fed) => {
            fed.federation_addr = req.orig_federation_addr.clone();
            store::update_federator(&tx, &fed)?;
            fed
        }
        None => {
            let fed = Federator {
                federation_id: req.orig_federation_id.clone(),
                federation_addr: req.orig_federation_addr.clone(),
                kind: FederatorKind::Partner,
                operator_id: req.operator_id.clone(),
                country_code: req.country_code.clone(),
                regions: Default::default(),
                mcc: String::new(),
                mncs: Default::default(),
                locator_endpoint: String::new(),
            };
            store::insert_federator(&tx, &fed).map_err(|e| {
                if e.is_unique() {
                    FederationError::AlreadyExists(format!(
                        "partner {}/{}",
                        fed.operator_id, fed.country_code
                    ))
                } else {
                    e.into()
                }
            })?;
            fed
        }
    };
    roles::grant_role(
        &tx,
        &me.federation_id,
        &partner.federation_id,
        FederatorRole::ShareZonesWithPartner,
    )?;
    for zone in &zones {
        if !store::is_zone_shared(&tx, &zone.zone_id, &partner.federation_id)? {
            store::insert_shared_zone(
                &tx,
                &SharedZone {
                    zone_id: zone.zone_id.clone(),
                    federation_id: partner.federation_id.clone(),
                    operator_id: partner.operator_id.clone(),
                    country_code: partner.country_code.clone(),
                },
            )?;
        }
    }
    emit_event(
        &tx,
        &peer_actor(&partner.federation_id),
        &EventPayload::PartnerHandshakeAccepted {
            self_federation_id: me.federation_id.clone(),
            partner_federation_id: partner.federation_id.clone(),
            partner_addr: partner.federation_addr.clone(),
        },
    )?;
    tx.commit()?;

    tracing::info!(
        self_id = %me.federation_id,
        partner_id = %partner.federation_id,
        request_id = %req.request_id,
        zones = zones.len(),
        "partner handshake accepted"
    );
    Ok(PartnerRegistrationResponse {
        request_id: req.request_id.clone(),
        orig_operator_id: me.operator_id.clone(),
        partner_operator_id: partner.operator_id,
        orig_federation_id: me.federation_id,
        dest_federation_id: partner.federation_id,
        mcc: me.mcc,
        mnc: me.mncs.into_iter().collect(),
        locator_endpoint: me.locator_endpoint,
        partner_zone: zones.iter().map(ZoneInfo::from_zone).collect(),
    })
}

/// Refreshes a partner's network identity after it changed on its side.
pub fn update_partner(
    conn: &mut Connection,
    req: &PartnerUpdateRequest,
) -> Result<(), FederationError> {
    require_field("mcc", &req.mcc)?;
    let me = destination(conn, &req.dest_federation_id)?;
    let mut partner = known_caller(conn, &req.orig_federation_id, &req.operator, &req.country)?;

    partner.mcc = req.mcc.clone();
    partner.mncs = req.mnc.iter().cloned().collect();
    partner.locator_endpoint = req.locator_endpoint.clone();

    let tx = conn.transaction()?;
    store::update_federator(&tx, &partner)?;
    emit_event(
        &tx,
        &peer_actor(&partner.federation_id),
        &EventPayload::PartnerUpdateAccepted {
            self_federation_id: me.federation_id.clone(),
            partner_federation_id: partner.federation_id.clone(),
        },
    )?;
    tx.commit()?;

    tracing::info!(partner_id = %partner.federation_id, request_id = %req.request_id, "partner updated");
    Ok(())
}

/// Ends the caller's federation with the destination: revokes
/// `ShareZonesWithPartner` along with every share and registration it
/// covered.
pub fn remove_partner(
    conn: &mut Connection,
    req: &FederationRequest,
) -> Result<(), FederationError> {
    let me = destination(conn, &req.dest_federation_id)?;
    let Some(partner) = caller(conn, &req.orig_federation_id, &req.operator, &req.country)? else {
        tracing::debug!(orig = %req.orig_federation_id, "removal from unknown partner, nothing to do");
        return Ok(());
    };

    let tx = conn.transaction()?;
    let outcome = roles::revoke_role(
        &tx,
        &me.federation_id,
        &partner.federation_id,
        FederatorRole::ShareZonesWithPartner,
    )?;
    if outcome.revoked {
        emit_event(
            &tx,
            &peer_actor(&partner.federation_id),
            &EventPayload::PartnerRemovalAccepted {
                self_federation_id: me.federation_id.clone(),
                partner_federation_id: partner.federation_id.clone(),
                forgotten: outcome.partner_forgotten,
            },
        )?;
    }
    tx.commit()?;

    tracing::info!(
        self_id = %me.federation_id,
        partner_id = %partner.federation_id,
        forgotten = outcome.partner_forgotten,
        "partner removal accepted"
    );
    Ok(())
}

/// Records that the caller uses one of the destination's zones.
///
/// The zone must be owned by the destination and shared with the caller.
/// The registration token echoes the request id.
pub fn register_zone(
    conn: &mut Connection,
    req: &ZoneRegisterRequest,
) -> Result<ZoneRegisterResponse, FederationError> {
    let me = destination(conn, &req.dest_federation_id)?;
    let partner = known_caller(conn, &req.orig_federation_id, &req.operator, &req.country)?;
    let zone_id = match req.zones.as_slice() {
        [zone_id] => zone_id.clone(),
        _ => {
            return Err(FederationError::InvalidArgument(
                "exactly one zone must be registered per request".to_string(),
            ))
        }
    };

    match store::get_zone(conn, &zone_id)? {
        Some(zone) if zone.federation_id == me.federation_id => {}
        _ => return Err(FederationError::NotFound(format!("zone {zone_id}"))),
    }
    if !store::is_zone_shared(conn, &zone_id, &partner.federation_id)? {
        return Err(FederationError::NotAuthorized(format!(
            "zone {zone_id} is not shared with {}",
            partner.federation_id
        )));
    }

    let tx = conn.transaction()?;
    if !store::is_zone_registered(&tx, &zone_id, &me.federation_id, &partner.federation_id)? {
        store::insert_registered_zone(
            &tx,
            &RegisteredZone {
                zone_id: zone_id.clone(),
                self_federation_id: me.federation_id.clone(),
                federation_id: partner.federation_id.clone(),
                operator_id: partner.operator_id.clone(),
                country_code: partner.country_code.clone(),
            },
        )?;
        emit_event(
            &tx,
            &peer_actor(&partner.federation_id),
            &EventPayload::ZoneRegistrationAccepted {
                zone_id: zone_id.clone(),
                partner_federation_id: partner.federation_id.clone(),
            },
        )?;
    }
    tx.commit()?;

    tracing::info!(%zone_id, partner_id = %partner.federation_id, "zone registration accepted");
    Ok(ZoneRegisterResponse {
        request_id: req.request_id.clone(),
        lead_operator_id: me.operator_id,
        partner_operator_id: partner.operator_id,
        federation_id: me.federation_id,
        zone: ZoneRegistration {
            zone_id,
            registration_token: req.request_id.clone(),
        },
    })
}

pub fn deregister_zone(conn: &mut Connection, req: &ZoneRequest) -> Result<(), FederationError> {
    require_field("zone", &req.zone)?;
    let me = destination(conn, &req.dest_federation_id)?;
    let Some(partner) = caller(conn, &req.orig_federation_id, &req.operator, &req.country)? else {
        return Ok(());
    };

    let tx = conn.transaction()?;
    if store::delete_registered_zone(&tx, &req.zone, &me.federation_id, &partner.federation_id)? {
        emit_event(
            &tx,
            &peer_actor(&partner.federation_id),
            &EventPayload::ZoneDeregistrationAccepted {
                zone_id: req.zone.clone(),
                partner_federation_id: partner.federation_id.clone(),
            },
        )?;
        tracing::info!(zone_id = %req.zone, partner_id = %partner.federation_id, "zone deregistration accepted");
    }
    tx.commit()?;
    Ok(())
}

/// Stores or refreshes the shadow of a zone the caller shared with us.
///
/// Requires the destination to hold `AccessPartnerZones` for the caller.
pub fn zone_shared(conn: &mut Connection, req: &ZoneNotifyRequest) -> Result<(), FederationError> {
    let me = destination(conn, &req.dest_federation_id)?;
    let partner = known_caller(conn, &req.orig_federation_id, &req.operator, &req.country)?;
    roles::require_role(
        conn,
        &me.federation_id,
        &partner.federation_id,
        FederatorRole::AccessPartnerZones,
    )?;
    validate_zone_id(&req.partner_zone.zone_id)?;
    parse_geo_location(&req.partner_zone.geo_location)?;

    let shadow = req.partner_zone.clone().into_shadow(&partner.federation_id);
    let tx = conn.transaction()?;
    match store::get_zone(&tx, &shadow.zone_id)? {
        Some(existing) if existing.federation_id == partner.federation_id => {
            store::update_zone(&tx, &shadow)?;
        }
        Some(_) => {
            return Err(FederationError::AlreadyExists(format!(
                "zone {} belongs to another federator",
                shadow.zone_id
            )));
        }
        None => {
            store::insert_zone(&tx, &shadow).map_err(|e| {
                if e.is_unique() {
                    FederationError::AlreadyExists(format!("zone {}", shadow.zone_id))
                } else {
                    e.into()
                }
            })?;
        }
    }
    emit_event(
        &tx,
        &peer_actor(&partner.federation_id),
        &EventPayload::PartnerZoneNotified {
            zone_id: shadow.zone_id.clone(),
            partner_federation_id: partner.federation_id.clone(),
        },
    )?;
    tx.commit()?;

    tracing::info!(zone_id = %shadow.zone_id, partner_id = %partner.federation_id, "partner zone received");
    Ok(())
}

/// Drops the destination's registration of a withdrawn partner zone, and
/// the shadow itself once nothing references it.
pub fn zone_unshared(conn: &mut Connection, req: &ZoneRequest) -> Result<(), FederationError> {
    require_field("zone", &req.zone)?;
    let me = destination(conn, &req.dest_federation_id)?;
    let Some(partner) = caller(conn, &req.orig_federation_id, &req.operator, &req.country)? else {
        return Ok(());
    };

    let tx = conn.transaction()?;
    let Some(zone) = store::get_zone(&tx, &req.zone)?
        .filter(|zone| zone.federation_id == partner.federation_id)
    else {
        return Ok(());
    };
    store::delete_registered_zone(&tx, &zone.zone_id, &me.federation_id, &partner.federation_id)?;
    let removed = match store::zone_references(&tx, &zone.zone_id)? {
        (0, 0) => store::delete_zone(&tx, &zone.zone_id)?,
        _ => false,
    };
    emit_event(
        &tx,
        &peer_actor(&partner.federation_id),
        &EventPayload::PartnerZoneWithdrawn {
            zone_id: zone.zone_id.clone(),
            partner_federation_id: partner.federation_id.clone(),
        },
    )?;
    tx.commit()?;

    tracing::info!(zone_id = %zone.zone_id, partner_id = %partner.federation_id, removed, "partner zone withdrawn");
    Ok(())
}
