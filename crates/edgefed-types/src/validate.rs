//! Field validators shared by the management API and the peer protocol.

use thiserror::Error;

/// Errors produced by field validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid country code {0:?}, must be an ISO 3166-1 alpha-2 code")]
    InvalidCountryCode(String),
    #[error("invalid geo location {0:?}, expected \"<latitude>,<longitude>\"")]
    InvalidGeoLocation(String),
    #[error("invalid zone ID {0:?}")]
    InvalidZoneId(String),
    #[error("invalid federation ID {0:?}")]
    InvalidFederationId(String),
    #[error("unknown federator kind {0:?}")]
    UnknownKind(String),
}

/// Checks that `code` is two ASCII uppercase letters.
pub fn validate_country_code(code: &str) -> Result<(), ValidationError> {
    if code.len() == 2 && code.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidCountryCode(code.to_string()))
    }
}

/// Parses `"<lat>,<long>"` into decimal degrees.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidGeoLocation`] if either half is missing,
/// not a finite number, or out of range.
pub fn parse_geo_location(loc: &str) -> Result<(f64, f64), ValidationError> {
    let invalid = || ValidationError::InvalidGeoLocation(loc.to_string());
    let (lat, long) = loc.split_once(',').ok_or_else(invalid)?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let long: f64 = long.trim().parse().map_err(|_| invalid())?;
    if !lat.is_finite() || !long.is_finite() {
        return Err(invalid());
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&long) {
        return Err(invalid());
    }
    Ok((lat, long))
}

/// Zone IDs are 1..=64 characters of `[A-Za-z0-9_.-]`.
pub fn validate_zone_id(zone_id: &str) -> Result<(), ValidationError> {
    let ok = !zone_id.is_empty()
        && zone_id.len() <= 64
        && zone_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'));
    if ok {
        Ok(())
    } else {
        Err(ValidationError::InvalidZoneId(zone_id.to_string()))
    }
}

/// Federation IDs supplied by a caller are 8..=128 characters of `[A-Za-z0-9_-]`.
pub fn validate_federation_id(id: &str) -> Result<(), ValidationError> {
    let ok = (8..=128).contains(&id.len())
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-'));
    if ok {
        Ok(())
    } else {
        Err(ValidationError::InvalidFederationId(id.to_string()))
    }
}
