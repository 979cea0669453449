//! Persistence for the audit log.
//!
//! All writes go through [`emit_event`], all reads through [`query_events`].

use rusqlite::{params, Connection};

use crate::error::ObserveError;
use crate::event::{AuditEvent, EventPayload};

/// Appends `payload` to the audit log on behalf of `actor`.
///
/// # Errors
///
/// Returns `ObserveError::Database` on SQL failure or
/// `ObserveError::Serialization` if the payload cannot be serialised.
pub fn emit_event(
    conn: &Connection,
    actor: &str,
    payload: &EventPayload,
) -> Result<AuditEvent, ObserveError> {
    let payload_json = serde_json::to_string(payload)?;
    let event_type = payload.event_type();
    let entity_type = payload.entity_type();
    let entity_id = payload.entity_id();

    // Sequence assignment and insert in one statement so concurrent writers
    // cannot observe the same MAX(seq).
    let (id, seq, occurred_at) = conn.query_row(
        "INSERT INTO federation_audit_log
            (seq, event_type, entity_type, entity_id, actor, payload_json, occurred_at)
         VALUES (
            (SELECT COALESCE(MAX(seq), 0) + 1 FROM federation_audit_log),
            ?1, ?2, ?3, ?4, ?5,
            datetime('now')
         )
         RETURNING id, seq, occurred_at",
        params![event_type, entity_type, entity_id, actor, payload_json],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        },
    )?;

    tracing::debug!(seq, event_type, entity_id, actor, "audit event recorded");

    Ok(AuditEvent {
        id,
        seq,
        event_type: event_type.to_string(),
        entity_type: entity_type.to_string(),
        entity_id: entity_id.to_string(),
        actor: actor.to_string(),
        payload_json,
        occurred_at,
    })
}

/// Filter criteria for [`query_events`].
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub event_type: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    /// Events at or after this `YYYY-MM-DD HH:MM:SS` timestamp.
    pub since: Option<String>,
    /// Maximum number of events to return (default 100).
    pub limit: Option<i64>,
}

/// Queries the audit log, oldest first.
///
/// # Errors
///
/// Returns `ObserveError::Database` on SQL failure.
pub fn query_events(
    conn: &Connection,
    filter: &EventFilter,
) -> Result<Vec<AuditEvent>, ObserveError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    let optional = [
        ("event_type = ", &filter.event_type),
        ("entity_type = ", &filter.entity_type),
        ("entity_id = ", &filter.entity_id),
        ("occurred_at >= ", &filter.since),
    ];
    for (column, value) in optional {
        if let Some(value) = value {
            param_values.push(Box::new(value.clone()));
            clauses.push(format!("{column}?{}", param_values.len()));
        }
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    param_values.push(Box::new(filter.limit.unwrap_or(100)));
    let sql = format!(
        "SELECT id, seq, event_type, entity_type, entity_id, actor, payload_json, occurred_at
         FROM federation_audit_log
         {where_clause}
         ORDER BY seq ASC
         LIMIT ?{}",
        param_values.len()
    );

    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| &**p).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        Ok(AuditEvent {
            id: row.get(0)?,
            seq: row.get(1)?,
            event_type: row.get(2)?,
            entity_type: row.get(3)?,
            entity_id: row.get(4)?,
            actor: row.get(5)?,
            payload_json: row.get(6)?,
            occurred_at: row.get(7)?,
        })
    })?;

    let mut events = Vec::new();
    for row in rows {
        events.push(row?);
    }
    Ok(events)
}
