//! Two-phase log for partner operations that touch both platforms.
//!
//! A `pending` row is written before the peer is called. A peer failure
//! marks it `aborted`; a peer success is followed by the local transaction,
//! which marks it `committed` together with its row changes. Anything still
//! `pending` after that is a partner whose state may disagree with ours.

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentAction {
    AddPartner,
    RemovePartner,
}

impl IntentAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AddPartner => "add_partner",
            Self::RemovePartner => "remove_partner",
        }
    }
}

/// A row of `federation_intents`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationIntent {
    pub id: String,
    pub action: String,
    pub self_federation_id: String,
    pub partner_federation_id: String,
    pub partner_addr: String,
    pub status: String,
    pub detail: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Records a pending intent and returns its id.
pub fn begin_intent(
    conn: &Connection,
    action: IntentAction,
    self_id: &str,
    partner_id: &str,
    partner_addr: &str,
) -> Result<String, StoreError> {
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO federation_intents
            (id, action, self_federation_id, partner_federation_id, partner_addr)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, action.as_str(), self_id, partner_id, partner_addr],
    )?;
    tracing::debug!(intent = %id, action = action.as_str(), partner_id, "intent recorded");
    Ok(id)
}

pub fn commit_intent(conn: &Connection, id: &str) -> Result<(), StoreError> {
    finish(conn, id, "committed", None)
}

pub fn abort_intent(conn: &Connection, id: &str, detail: &str) -> Result<(), StoreError> {
    finish(conn, id, "aborted", Some(detail))
}

fn finish(conn: &Connection, id: &str, status: &str, detail: Option<&str>) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE federation_intents
         SET status = ?2, detail = ?3, updated_at = datetime('now')
         WHERE id = ?1 AND status = 'pending'",
        params![id, status, detail],
    )?;
    Ok(())
}

/// Intents that never reached `committed` or `aborted`, oldest first.
pub fn pending_intents(conn: &Connection) -> Result<Vec<FederationIntent>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, action, self_federation_id, partner_federation_id, partner_addr,
                status, detail, created_at, updated_at
         FROM federation_intents WHERE status = 'pending'
         ORDER BY created_at, id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(FederationIntent {
            id: row.get(0)?,
            action: row.get(1)?,
            self_federation_id: row.get(2)?,
            partner_federation_id: row.get(3)?,
            partner_addr: row.get(4)?,
            status: row.get(5)?,
            detail: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
