//! Federation audit log.
//!
//! Every successful management mutation and every inbound peer call this
//! platform accepts is appended to `federation_audit_log`, together with the
//! actor that caused it. Administrators query the log to reconstruct who
//! federated with whom, and which zones moved where.
//!
//! | Entity | Example events |
//! |--------|---------------|
//! | `federator` | `FEDERATOR_CREATED`, `PARTNER_ADDED`, `PARTNER_HANDSHAKE_ACCEPTED` |
//! | `zone` | `ZONE_SHARED`, `ZONE_REGISTERED`, `PARTNER_ZONE_NOTIFIED` |
//!
//! Writes take the caller's connection so the event lands in the same
//! transaction as the change it describes.

mod error;
mod event;
mod store;

pub use error::ObserveError;
pub use event::{AuditEvent, EventPayload};
pub use store::{emit_event, query_events, EventFilter};
