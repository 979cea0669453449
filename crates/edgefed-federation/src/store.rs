//! Federator store: row-level access to federators, zones, and the
//! shared/registered relations.
//!
//! Every function takes a plain `&Connection` so callers can run it inside a
//! transaction (`Transaction` derefs to `Connection`). Constraint violations
//! come back as [`StoreError`] with a classified kind.

use edgefed_types::{
    join_set, split_list, split_set, Federator, FederatorKind, FederatorZone, RegisteredZone,
    SharedZone,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::StoreError;

const FEDERATOR_COLUMNS: &str = "federation_id, federation_addr, kind, operator_id, country_code,
     regions, mcc, mncs, locator_endpoint";

const ZONE_COLUMNS: &str = "zone_id, federation_id, geo_location, city, state, locality,
     region, cloudlets, edge_count";

fn federator_from_row(row: &Row<'_>) -> rusqlite::Result<Federator> {
    let kind: String = row.get(2)?;
    let kind = kind.parse::<FederatorKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Federator {
        federation_id: row.get(0)?,
        federation_addr: row.get(1)?,
        kind,
        operator_id: row.get(3)?,
        country_code: row.get(4)?,
        regions: split_set(&row.get::<_, String>(5)?),
        mcc: row.get(6)?,
        mncs: split_set(&row.get::<_, String>(7)?),
        locator_endpoint: row.get(8)?,
    })
}

fn zone_from_row(row: &Row<'_>) -> rusqlite::Result<FederatorZone> {
    Ok(FederatorZone {
        zone_id: row.get(0)?,
        federation_id: row.get(1)?,
        geo_location: row.get(2)?,
        city: row.get(3)?,
        state: row.get(4)?,
        locality: row.get(5)?,
        region: row.get(6)?,
        cloudlets: split_list(&row.get::<_, String>(7)?),
        edge_count: row.get(8)?,
    })
}

// ── Federators ───────────────────────────────────────────────────────

pub fn insert_federator(conn: &Connection, fed: &Federator) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO federators (federation_id, federation_addr, kind, operator_id, country_code,
                                 regions, mcc, mncs, locator_endpoint)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            fed.federation_id,
            fed.federation_addr,
            fed.kind.as_str(),
            fed.operator_id,
            fed.country_code,
            join_set(&fed.regions),
            fed.mcc,
            join_set(&fed.mncs),
            fed.locator_endpoint,
        ],
    )?;
    Ok(())
}

/// Rewrites the mutable columns of an existing federator. Identity fields
/// (`federation_id`, `kind`, operator and country) never change.
pub fn update_federator(conn: &Connection, fed: &Federator) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "UPDATE federators
         SET federation_addr = ?2, regions = ?3, mcc = ?4, mncs = ?5, locator_endpoint = ?6,
             updated_at = datetime('now')
         WHERE federation_id = ?1",
        params![
            fed.federation_id,
            fed.federation_addr,
            join_set(&fed.regions),
            fed.mcc,
            join_set(&fed.mncs),
            fed.locator_endpoint,
        ],
    )?;
    Ok(changed > 0)
}

pub fn get_federator(conn: &Connection, federation_id: &str) -> Result<Option<Federator>, StoreError> {
    let sql = format!("SELECT {FEDERATOR_COLUMNS} FROM federators WHERE federation_id = ?1");
    Ok(conn
        .query_row(&sql, [federation_id], federator_from_row)
        .optional()?)
}

pub fn find_federator(
    conn: &Connection,
    kind: FederatorKind,
    operator_id: &str,
    country_code: &str,
) -> Result<Option<Federator>, StoreError> {
    let sql = format!(
        "SELECT {FEDERATOR_COLUMNS} FROM federators
         WHERE kind = ?1 AND operator_id = ?2 AND country_code = ?3"
    );
    Ok(conn
        .query_row(
            &sql,
            params![kind.as_str(), operator_id, country_code],
            federator_from_row,
        )
        .optional()?)
}

pub fn list_federators(conn: &Connection, kind: FederatorKind) -> Result<Vec<Federator>, StoreError> {
    let sql = format!(
        "SELECT {FEDERATOR_COLUMNS} FROM federators WHERE kind = ?1
         ORDER BY operator_id, country_code"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([kind.as_str()], federator_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn delete_federator(conn: &Connection, federation_id: &str) -> Result<bool, StoreError> {
    let deleted = conn.execute(
        "DELETE FROM federators WHERE federation_id = ?1",
        [federation_id],
    )?;
    Ok(deleted > 0)
}

// ── Zones ────────────────────────────────────────────────────────────

pub fn insert_zone(conn: &Connection, zone: &FederatorZone) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO federator_zones (zone_id, federation_id, geo_location, city, state, locality,
                                      region, cloudlets, edge_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            zone.zone_id,
            zone.federation_id,
            zone.geo_location,
            zone.city,
            zone.state,
            zone.locality,
            zone.region,
            zone.cloudlets.join(","),
            zone.edge_count,
        ],
    )?;
    Ok(())
}

/// Refreshes the descriptive fields of a zone. Ownership never changes.
pub fn update_zone(conn: &Connection, zone: &FederatorZone) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "UPDATE federator_zones
         SET geo_location = ?2, city = ?3, state = ?4, locality = ?5, edge_count = ?6
         WHERE zone_id = ?1",
        params![
            zone.zone_id,
            zone.geo_location,
            zone.city,
            zone.state,
            zone.locality,
            zone.edge_count,
        ],
    )?;
    Ok(changed > 0)
}

pub fn get_zone(conn: &Connection, zone_id: &str) -> Result<Option<FederatorZone>, StoreError> {
    let sql = format!("SELECT {ZONE_COLUMNS} FROM federator_zones WHERE zone_id = ?1");
    Ok(conn.query_row(&sql, [zone_id], zone_from_row).optional()?)
}

/// Zones owned by `federation_id`, ordered by zone id.
pub fn list_zones(conn: &Connection, federation_id: &str) -> Result<Vec<FederatorZone>, StoreError> {
    let sql = format!(
        "SELECT {ZONE_COLUMNS} FROM federator_zones WHERE federation_id = ?1 ORDER BY zone_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([federation_id], zone_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn count_zones(conn: &Connection, federation_id: &str) -> Result<i64, StoreError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM federator_zones WHERE federation_id = ?1",
        [federation_id],
        |row| row.get(0),
    )?)
}

pub fn delete_zone(conn: &Connection, zone_id: &str) -> Result<bool, StoreError> {
    let deleted = conn.execute("DELETE FROM federator_zones WHERE zone_id = ?1", [zone_id])?;
    Ok(deleted > 0)
}

/// Returns how many shared and registered rows reference `zone_id`.
pub fn zone_references(conn: &Connection, zone_id: &str) -> Result<(i64, i64), StoreError> {
    Ok(conn.query_row(
        "SELECT (SELECT COUNT(*) FROM federator_shared_zones WHERE zone_id = ?1),
                (SELECT COUNT(*) FROM federator_registered_zones WHERE zone_id = ?1)",
        [zone_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?)
}

// ── Shared zones ─────────────────────────────────────────────────────

pub fn insert_shared_zone(conn: &Connection, shared: &SharedZone) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO federator_shared_zones (zone_id, federation_id, operator_id, country_code)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            shared.zone_id,
            shared.federation_id,
            shared.operator_id,
            shared.country_code,
        ],
    )?;
    Ok(())
}

pub fn is_zone_shared(conn: &Connection, zone_id: &str, partner_id: &str) -> Result<bool, StoreError> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM federator_shared_zones WHERE zone_id = ?1 AND federation_id = ?2)",
        [zone_id, partner_id],
        |row| row.get(0),
    )?)
}

pub fn delete_shared_zone(conn: &Connection, zone_id: &str, partner_id: &str) -> Result<bool, StoreError> {
    let deleted = conn.execute(
        "DELETE FROM federator_shared_zones WHERE zone_id = ?1 AND federation_id = ?2",
        [zone_id, partner_id],
    )?;
    Ok(deleted > 0)
}

/// Share rows for `zone_id`, ordered by partner.
pub fn shared_with(conn: &Connection, zone_id: &str) -> Result<Vec<SharedZone>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT zone_id, federation_id, operator_id, country_code
         FROM federator_shared_zones WHERE zone_id = ?1
         ORDER BY operator_id, country_code",
    )?;
    let rows = stmt.query_map([zone_id], |row| {
        Ok(SharedZone {
            zone_id: row.get(0)?,
            federation_id: row.get(1)?,
            operator_id: row.get(2)?,
            country_code: row.get(3)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Deletes every share of an `owner_id` zone with `partner_id`.
pub fn delete_shares_with(conn: &Connection, owner_id: &str, partner_id: &str) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "DELETE FROM federator_shared_zones
         WHERE federation_id = ?2
           AND zone_id IN (SELECT zone_id FROM federator_zones WHERE federation_id = ?1)",
        [owner_id, partner_id],
    )?)
}

// ── Registered zones ─────────────────────────────────────────────────

pub fn insert_registered_zone(conn: &Connection, reg: &RegisteredZone) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO federator_registered_zones
            (zone_id, self_federation_id, federation_id, operator_id, country_code)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            reg.zone_id,
            reg.self_federation_id,
            reg.federation_id,
            reg.operator_id,
            reg.country_code,
        ],
    )?;
    Ok(())
}

pub fn is_zone_registered(
    conn: &Connection,
    zone_id: &str,
    self_id: &str,
    partner_id: &str,
) -> Result<bool, StoreError> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM federator_registered_zones
                       WHERE zone_id = ?1 AND self_federation_id = ?2 AND federation_id = ?3)",
        [zone_id, self_id, partner_id],
        |row| row.get(0),
    )?)
}

pub fn delete_registered_zone(
    conn: &Connection,
    zone_id: &str,
    self_id: &str,
    partner_id: &str,
) -> Result<bool, StoreError> {
    let deleted = conn.execute(
        "DELETE FROM federator_registered_zones
         WHERE zone_id = ?1 AND self_federation_id = ?2 AND federation_id = ?3",
        [zone_id, self_id, partner_id],
    )?;
    Ok(deleted > 0)
}

/// Registration rows for `zone_id`, ordered by the other party.
pub fn registrations_of(conn: &Connection, zone_id: &str) -> Result<Vec<RegisteredZone>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT zone_id, self_federation_id, federation_id, operator_id, country_code
         FROM federator_registered_zones WHERE zone_id = ?1
         ORDER BY operator_id, country_code",
    )?;
    let rows = stmt.query_map([zone_id], |row| {
        Ok(RegisteredZone {
            zone_id: row.get(0)?,
            self_federation_id: row.get(1)?,
            federation_id: row.get(2)?,
            operator_id: row.get(3)?,
            country_code: row.get(4)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Counts registration rows between the local `self_id` and `other_id` on
/// zones owned by `owner_id`.
pub fn count_registrations(
    conn: &Connection,
    self_id: &str,
    other_id: &str,
    owner_id: &str,
) -> Result<i64, StoreError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM federator_registered_zones r
         JOIN federator_zones z ON z.zone_id = r.zone_id
         WHERE r.self_federation_id = ?1 AND r.federation_id = ?2 AND z.federation_id = ?3",
        [self_id, other_id, owner_id],
        |row| row.get(0),
    )?)
}

/// Deletes registration rows between `self_id` and `other_id` on zones owned
/// by `owner_id`.
pub fn delete_registrations(
    conn: &Connection,
    self_id: &str,
    other_id: &str,
    owner_id: &str,
) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "DELETE FROM federator_registered_zones
         WHERE self_federation_id = ?1 AND federation_id = ?2
           AND zone_id IN (SELECT zone_id FROM federator_zones WHERE federation_id = ?3)",
        [self_id, other_id, owner_id],
    )?)
}

/// Deletes every zone owned by `owner_id` that nothing references any more,
/// returning how many were removed.
pub fn delete_unreferenced_zones(conn: &Connection, owner_id: &str) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "DELETE FROM federator_zones
         WHERE federation_id = ?1
           AND zone_id NOT IN (SELECT zone_id FROM federator_shared_zones)
           AND zone_id NOT IN (SELECT zone_id FROM federator_registered_zones)",
        [owner_id],
    )?)
}
