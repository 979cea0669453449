//! Shared types for the edge federation control plane.
//!
//! This crate holds the entity model every other crate speaks: federators
//! (this platform's own identity per operator and country, or a remote
//! partner platform), the directional trust roles between them, the zones a
//! federator owns, and the share/registration relations that connect zones
//! to partners. It also carries the field validators used by both the
//! management API and the peer protocol.
//!
//! Nothing here touches the database or the network.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

mod role;
pub mod validate;

pub use role::{FederatorRole, ParseRoleError, RoleSet};
pub use validate::ValidationError;

/// Whether a federator record describes this platform or a remote one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FederatorKind {
    /// This platform's identity for one operator and country.
    #[serde(rename = "self")]
    SelfFederator,
    /// A remote platform this platform federates with.
    Partner,
}

impl FederatorKind {
    /// Returns the canonical string stored in the `kind` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelfFederator => "self",
            Self::Partner => "partner",
        }
    }
}

impl std::fmt::Display for FederatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FederatorKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "self" => Ok(Self::SelfFederator),
            "partner" => Ok(Self::Partner),
            other => Err(ValidationError::UnknownKind(other.to_string())),
        }
    }
}

/// One operator platform's identity record for a given country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Federator {
    /// Opaque unique identity, generated by the federator's owner.
    pub federation_id: String,
    /// Reachable federation endpoint of the platform hosting this federator.
    pub federation_addr: String,
    /// Self or partner.
    pub kind: FederatorKind,
    /// Operator organization that owns the federator.
    pub operator_id: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country_code: String,
    /// Regions the operator's infrastructure lives in.
    #[serde(default)]
    pub regions: BTreeSet<String>,
    /// Mobile country code.
    #[serde(default)]
    pub mcc: String,
    /// Mobile network codes.
    #[serde(default)]
    pub mncs: BTreeSet<String>,
    /// Discovery service endpoint of the operator platform.
    #[serde(default)]
    pub locator_endpoint: String,
}

/// Identifies a federator by operator and country, the way administrators
/// name them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorKey {
    /// Operator organization.
    pub operator_id: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country_code: String,
}

impl OperatorKey {
    pub fn new(operator_id: impl Into<String>, country_code: impl Into<String>) -> Self {
        Self {
            operator_id: operator_id.into(),
            country_code: country_code.into(),
        }
    }
}

impl std::fmt::Display for OperatorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.operator_id, self.country_code)
    }
}

/// A named, geolocated group of edge sites owned by one federator.
///
/// Self zones carry their cloudlet names. Shadow copies of partner zones
/// only know how many edge sites the owner reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatorZone {
    /// Owning federator.
    pub federation_id: String,
    /// Identifier chosen by the creator, unique on this platform.
    pub zone_id: String,
    /// `"<lat>,<long>"` in decimal degrees.
    pub geo_location: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub locality: String,
    /// Region the zone's cloudlets live in. Empty for partner shadows.
    #[serde(default)]
    pub region: String,
    /// Cloudlet names. Empty for partner shadows.
    #[serde(default)]
    pub cloudlets: Vec<String>,
    /// Number of edge sites in the zone.
    #[serde(default)]
    pub edge_count: u32,
}

/// A sharing grant from a zone's owner to one partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedZone {
    pub zone_id: String,
    /// The partner the zone is shared with.
    pub federation_id: String,
    pub operator_id: String,
    pub country_code: String,
}

/// Records that a zone is actively used by a consumer.
///
/// On the consumer's platform `federation_id` is the partner owning the
/// zone; on the owner's platform it is the partner that registered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredZone {
    pub zone_id: String,
    /// Local self federator on this side of the relation.
    pub self_federation_id: String,
    /// The other party.
    pub federation_id: String,
    pub operator_id: String,
    pub country_code: String,
}

/// Joins a set into the comma-delimited form stored in the database.
pub fn join_set<'a, I>(items: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    items
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// Splits a comma-delimited column back into a set, dropping empty entries.
pub fn split_set(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Splits a comma-delimited column into an ordered list.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
