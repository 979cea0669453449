//! Database layer for the edge federation control plane.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! and embedded SQL migrations. Every federation table is created through
//! versioned migrations managed by this crate.
//!
//! Foreign keys are switched on for every pooled connection. The federation
//! core relies on them: a federator still referenced by roles or zones, or a
//! zone still shared or registered, cannot be deleted out from under its
//! dependents.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
