//! Error taxonomy for federation operations.

use edgefed_observe::ObserveError;
use edgefed_types::ValidationError;
use rusqlite::ffi;
use thiserror::Error;

/// Classification of a store failure, derived from SQLite's extended result
/// code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// A primary key or unique index rejected the write.
    Unique,
    /// A foreign key rejected the write or delete.
    ForeignKey,
    Other,
}

/// A persistence failure with a stable kind callers can branch on.
#[derive(Debug, Error)]
#[error("store error ({kind:?}): {source}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    #[source]
    pub source: rusqlite::Error,
}

impl StoreError {
    pub fn is_unique(&self) -> bool {
        self.kind == StoreErrorKind::Unique
    }

    pub fn is_foreign_key(&self) -> bool {
        self.kind == StoreErrorKind::ForeignKey
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(source: rusqlite::Error) -> Self {
        let kind = match &source {
            rusqlite::Error::SqliteFailure(err, _) => match err.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    StoreErrorKind::Unique
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => StoreErrorKind::ForeignKey,
                _ => StoreErrorKind::Other,
            },
            _ => StoreErrorKind::Other,
        };
        Self { kind, source }
    }
}

/// Errors returned by the registry, the zone manager, and inbound handlers.
#[derive(Debug, Error)]
pub enum FederationError {
    /// Missing or malformed request field. Never reaches a peer.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The operation would break an ownership or lifecycle invariant.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("nothing to update")]
    NothingToUpdate,

    #[error("peer {addr} unreachable: {reason}")]
    PeerUnreachable { addr: String, reason: String },

    #[error("peer {addr} rejected the request ({status}): {message}")]
    PeerRejected {
        addr: String,
        status: u16,
        message: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for FederationError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(StoreError::from(err))
    }
}

impl From<ValidationError> for FederationError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl From<ObserveError> for FederationError {
    fn from(err: ObserveError) -> Self {
        match err {
            ObserveError::Database(e) => e.into(),
            ObserveError::Serialization(e) => {
                rusqlite::Error::ToSqlConversionFailure(Box::new(e)).into()
            }
        }
    }
}

/// Fails with `InvalidArgument` naming `field` when `value` is blank.
pub(crate) fn require_field(field: &str, value: &str) -> Result<(), FederationError> {
    if value.trim().is_empty() {
        return Err(FederationError::InvalidArgument(format!(
            "missing {field}"
        )));
    }
    Ok(())
}
