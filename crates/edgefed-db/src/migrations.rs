//! Embedded SQL migration runner.
//!
//! Migrations are SQL files embedded at compile time. They run in order on
//! startup and are tracked by name in `_edgefed_migrations`, so each one is
//! applied exactly once.

use rusqlite::Connection;
use thiserror::Error;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. New migrations are appended here.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_init",
        sql: include_str!("migrations/000_init.sql"),
    },
    Migration {
        name: "001_federators",
        sql: include_str!("migrations/001_federators.sql"),
    },
    Migration {
        name: "002_federator_zones",
        sql: include_str!("migrations/002_federator_zones.sql"),
    },
    Migration {
        name: "003_federation_intents",
        sql: include_str!("migrations/003_federation_intents.sql"),
    },
    Migration {
        name: "004_audit_log",
        sql: include_str!("migrations/004_audit_log.sql"),
    },
];

/// Errors that can occur during migration execution.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A SQL statement within a migration failed.
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        name: String,
        source: rusqlite::Error,
    },

    /// Failed to query migration state.
    #[error("failed to check migration state: {0}")]
    StateQuery(rusqlite::Error),
}

/// Runs all pending migrations against `conn`, returning how many were
/// applied.
///
/// Each migration runs in its own transaction together with its tracking
/// row, so a failure leaves no partial schema behind.
///
/// # Errors
///
/// Returns `MigrationError` if any migration fails to execute or if the
/// tracking table cannot be queried.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    run_migrations_from_list(conn, MIGRATIONS)
}

fn run_migrations_from_list(
    conn: &Connection,
    migrations: &[Migration],
) -> Result<usize, MigrationError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _edgefed_migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| MigrationError::ExecutionFailed {
        name: "_edgefed_migrations_bootstrap".to_string(),
        source: e,
    })?;

    let mut applied = 0;

    for migration in migrations {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _edgefed_migrations WHERE name = ?1",
                [migration.name],
                |row| row.get(0),
            )
            .map_err(MigrationError::StateQuery)?;

        if already_applied {
            tracing::debug!(migration = migration.name, "migration already applied");
            continue;
        }

        tracing::info!(migration = migration.name, "applying migration");
        apply(conn, migration).map_err(|source| MigrationError::ExecutionFailed {
            name: migration.name.to_string(),
            source,
        })?;
        applied += 1;
    }

    Ok(applied)
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), rusqlite::Error> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql)?;
    tx.execute(
        "INSERT INTO _edgefed_migrations (name) VALUES (?1)",
        [migration.name],
    )?;
    tx.commit()
}
