//! Trust role manager.
//!
//! One row per (self, partner) pair holds the delimited role set. Granting
//! is idempotent. Revoking a role also drops the rows that only made sense
//! while it was held, and forgets the partner entirely once no self
//! federator on this platform holds any role for it.

use edgefed_types::{FederatorRole, RoleSet};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{FederationError, StoreError};
use crate::store;

fn parse_roles(raw: String) -> rusqlite::Result<RoleSet> {
    raw.parse::<RoleSet>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Roles `self_id` holds for `partner_id`. A missing row is the empty set.
pub fn get_roles(conn: &Connection, self_id: &str, partner_id: &str) -> Result<RoleSet, StoreError> {
    let roles = conn
        .query_row(
            "SELECT roles FROM federator_roles
             WHERE self_federation_id = ?1 AND partner_federation_id = ?2",
            [self_id, partner_id],
            |row| parse_roles(row.get(0)?),
        )
        .optional()?;
    Ok(roles.unwrap_or_default())
}

/// Fails with `NotAuthorized` unless `self_id` holds `role` for `partner_id`.
pub fn require_role(
    conn: &Connection,
    self_id: &str,
    partner_id: &str,
    role: FederatorRole,
) -> Result<(), FederationError> {
    if get_roles(conn, self_id, partner_id)?.contains(role) {
        Ok(())
    } else {
        Err(FederationError::NotAuthorized(format!(
            "role {role} is not granted for partner {partner_id}"
        )))
    }
}

/// Grants `role`, returning `false` if it was already held.
pub fn grant_role(
    conn: &Connection,
    self_id: &str,
    partner_id: &str,
    role: FederatorRole,
) -> Result<bool, StoreError> {
    let mut roles = get_roles(conn, self_id, partner_id)?;
    if !roles.insert(role) {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO federator_roles (self_federation_id, partner_federation_id, roles)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(self_federation_id, partner_federation_id)
         DO UPDATE SET roles = excluded.roles, updated_at = datetime('now')",
        params![self_id, partner_id, roles.to_string()],
    )?;
    tracing::info!(self_id, partner_id, %role, "federator role granted");
    Ok(true)
}

/// What [`revoke_role`] removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Revocation {
    /// The role was held before the call.
    pub revoked: bool,
    /// The partner's federator record and shadow zones were dropped.
    pub partner_forgotten: bool,
}

/// Revokes `role` and drops the rows that depended on it.
///
/// - `ShareZonesWithPartner`: every share of a self zone with the partner,
///   and every registration the partner made on those zones.
/// - `AccessPartnerZones`: this self federator's registrations of partner
///   zones, and the partner's shadow zones once no self federator can
///   access them.
///
/// The role row is removed once empty, and the partner record once no role
/// row references it. Run inside a transaction.
pub fn revoke_role(
    conn: &Connection,
    self_id: &str,
    partner_id: &str,
    role: FederatorRole,
) -> Result<Revocation, StoreError> {
    let mut roles = get_roles(conn, self_id, partner_id)?;
    let revoked = roles.remove(role);

    match role {
        FederatorRole::ShareZonesWithPartner => {
            store::delete_registrations(conn, self_id, partner_id, self_id)?;
            store::delete_shares_with(conn, self_id, partner_id)?;
        }
        FederatorRole::AccessPartnerZones => {
            store::delete_registrations(conn, self_id, partner_id, partner_id)?;
        }
    }

    if roles.is_empty() {
        conn.execute(
            "DELETE FROM federator_roles
             WHERE self_federation_id = ?1 AND partner_federation_id = ?2",
            [self_id, partner_id],
        )?;
    } else {
        conn.execute(
            "UPDATE federator_roles SET roles = ?3, updated_at = datetime('now')
             WHERE self_federation_id = ?1 AND partner_federation_id = ?2",
            params![self_id, partner_id, roles.to_string()],
        )?;
    }

    if role == FederatorRole::AccessPartnerZones
        && role_holders(conn, partner_id, Some(FederatorRole::AccessPartnerZones))? == 0
    {
        let dropped = store::delete_unreferenced_zones(conn, partner_id)?;
        tracing::debug!(partner_id, dropped, "partner shadow zones dropped");
    }

    let mut partner_forgotten = false;
    if role_holders(conn, partner_id, None)? == 0 {
        store::delete_unreferenced_zones(conn, partner_id)?;
        partner_forgotten = store::delete_federator(conn, partner_id)?;
    }

    if revoked {
        tracing::info!(self_id, partner_id, %role, partner_forgotten, "federator role revoked");
    }
    Ok(Revocation {
        revoked,
        partner_forgotten,
    })
}

/// Counts self federators holding `role` (or any role) for `partner_id`.
fn role_holders(
    conn: &Connection,
    partner_id: &str,
    role: Option<FederatorRole>,
) -> Result<usize, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT roles FROM federator_roles WHERE partner_federation_id = ?1",
    )?;
    let rows = stmt.query_map([partner_id], |row| parse_roles(row.get(0)?))?;
    let mut count = 0;
    for roles in rows {
        let roles = roles?;
        let holds = match role {
            Some(role) => roles.contains(role),
            None => !roles.is_empty(),
        };
        if holds {
            count += 1;
        }
    }
    Ok(count)
}

/// Partners for which `self_id` holds `role`.
pub fn partners_with_role(
    conn: &Connection,
    self_id: &str,
    role: FederatorRole,
) -> Result<Vec<String>, StoreError> {
    Ok(list_roles(conn, self_id)?
        .into_iter()
        .filter(|(_, roles)| roles.contains(role))
        .map(|(partner, _)| partner)
        .collect())
}

/// Every (partner, roles) pair recorded for `self_id`.
pub fn list_roles(conn: &Connection, self_id: &str) -> Result<Vec<(String, RoleSet)>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT partner_federation_id, roles FROM federator_roles
         WHERE self_federation_id = ?1 ORDER BY partner_federation_id",
    )?;
    let rows = stmt.query_map([self_id], |row| {
        Ok((row.get::<_, String>(0)?, parse_roles(row.get(1)?)?))
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_partner, seed_self, test_db, zone};
    use edgefed_types::{RegisteredZone, SharedZone};

    #[test]
    fn grant_is_idempotent_and_directional() {
        let conn = test_db();
        seed_self(&conn, "fed-self-1", "mexop");
        seed_partner(&conn, "fed-part-1", "telco");

        assert!(grant_role(&conn, "fed-self-1", "fed-part-1", FederatorRole::AccessPartnerZones).unwrap());
        assert!(!grant_role(&conn, "fed-self-1", "fed-part-1", FederatorRole::AccessPartnerZones).unwrap());

        let roles = get_roles(&conn, "fed-self-1", "fed-part-1").unwrap();
        assert!(roles.contains(FederatorRole::AccessPartnerZones));
        assert!(!roles.contains(FederatorRole::ShareZonesWithPartner));
        assert!(matches!(
            require_role(&conn, "fed-self-1", "fed-part-1", FederatorRole::ShareZonesWithPartner),
            Err(FederationError::NotAuthorized(_))
        ));
        assert_eq!(
            partners_with_role(&conn, "fed-self-1", FederatorRole::AccessPartnerZones).unwrap(),
            vec!["fed-part-1".to_string()]
        );
    }

    #[test]
    fn revoking_one_role_keeps_the_other_and_the_partner() {
        let conn = test_db();
        seed_self(&conn, "fed-self-1", "mexop");
        seed_partner(&conn, "fed-part-1", "telco");
        grant_role(&conn, "fed-self-1", "fed-part-1", FederatorRole::AccessPartnerZones).unwrap();
        grant_role(&conn, "fed-self-1", "fed-part-1", FederatorRole::ShareZonesWithPartner).unwrap();

        let outcome =
            revoke_role(&conn, "fed-self-1", "fed-part-1", FederatorRole::ShareZonesWithPartner)
                .unwrap();
        assert!(outcome.revoked);
        assert!(!outcome.partner_forgotten);
        assert!(store::get_federator(&conn, "fed-part-1").unwrap().is_some());
        assert!(get_roles(&conn, "fed-self-1", "fed-part-1")
            .unwrap()
            .contains(FederatorRole::AccessPartnerZones));
    }

    #[test]
    fn revoking_share_drops_shares_and_registrations_of_own_zones() {
        let conn = test_db();
        seed_self(&conn, "fed-self-1", "mexop");
        seed_partner(&conn, "fed-part-1", "telco");
        grant_role(&conn, "fed-self-1", "fed-part-1", FederatorRole::ShareZonesWithPartner).unwrap();
        store::insert_zone(&conn, &zone("zone-sfo", "fed-self-1")).unwrap();
        store::insert_shared_zone(
            &conn,
            &SharedZone {
                zone_id: "zone-sfo".into(),
                federation_id: "fed-part-1".into(),
                operator_id: "telco".into(),
                country_code: "US".into(),
            },
        )
        .unwrap();
        store::insert_registered_zone(
            &conn,
            &RegisteredZone {
                zone_id: "zone-sfo".into(),
                self_federation_id: "fed-self-1".into(),
                federation_id: "fed-part-1".into(),
                operator_id: "telco".into(),
                country_code: "US".into(),
            },
        )
        .unwrap();

        let outcome =
            revoke_role(&conn, "fed-self-1", "fed-part-1", FederatorRole::ShareZonesWithPartner)
                .unwrap();
        assert!(outcome.partner_forgotten);
        assert_eq!(store::zone_references(&conn, "zone-sfo").unwrap(), (0, 0));
        assert!(store::get_zone(&conn, "zone-sfo").unwrap().is_some());
        assert!(store::get_federator(&conn, "fed-part-1").unwrap().is_none());
    }

    #[test]
    fn revoking_last_access_drops_shadow_zones() {
        let conn = test_db();
        seed_self(&conn, "fed-self-1", "mexop");
        seed_partner(&conn, "fed-part-1", "telco");
        grant_role(&conn, "fed-self-1", "fed-part-1", FederatorRole::AccessPartnerZones).unwrap();
        store::insert_zone(&conn, &zone("zone-lon", "fed-part-1")).unwrap();

        let outcome =
            revoke_role(&conn, "fed-self-1", "fed-part-1", FederatorRole::AccessPartnerZones)
                .unwrap();
        assert!(outcome.partner_forgotten);
        assert!(store::get_zone(&conn, "zone-lon").unwrap().is_none());
        assert!(list_roles(&conn, "fed-self-1").unwrap().is_empty());
    }

    #[test]
    fn revoking_an_absent_role_is_harmless() {
        let conn = test_db();
        seed_self(&conn, "fed-self-1", "mexop");
        seed_partner(&conn, "fed-part-1", "telco");
        grant_role(&conn, "fed-self-1", "fed-part-1", FederatorRole::AccessPartnerZones).unwrap();

        let outcome =
            revoke_role(&conn, "fed-self-1", "fed-part-1", FederatorRole::ShareZonesWithPartner)
                .unwrap();
        assert!(!outcome.revoked);
        assert!(!outcome.partner_forgotten);
    }
}
