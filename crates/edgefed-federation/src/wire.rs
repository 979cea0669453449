//! Messages exchanged between federation endpoints.
//!
//! All bodies are JSON with camelCase keys. `origFederationId` is always the
//! caller's federator and `destFederationId` the receiver's, except in
//! responses, where the responder puts itself in `orig`.

use edgefed_types::FederatorZone;
use serde::{Deserialize, Serialize};

/// Registration handshake (`POST`), partner update (`PUT`) and partner
/// removal (`DELETE`).
pub const PARTNER_PATH: &str = "/operator/partner";
/// Zone registration (`POST`) and deregistration (`DELETE`).
pub const ZONE_PATH: &str = "/operator/zone";
/// Zone share (`POST`) and unshare (`DELETE`) notifications.
pub const ZONE_NOTIFY_PATH: &str = "/operator/notify/zone";

pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Zone metadata as a partner sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneInfo {
    pub zone_id: String,
    pub geo_location: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub locality: String,
    #[serde(default)]
    pub edge_count: u32,
}

impl ZoneInfo {
    /// Describes an owned zone. Edge count is the number of cloudlets.
    pub fn from_zone(zone: &FederatorZone) -> Self {
        Self {
            zone_id: zone.zone_id.clone(),
            geo_location: zone.geo_location.clone(),
            city: zone.city.clone(),
            state: zone.state.clone(),
            locality: zone.locality.clone(),
            edge_count: u32::try_from(zone.cloudlets.len()).unwrap_or(u32::MAX),
        }
    }

    /// Builds the local shadow record of a zone owned by `owner_id`.
    pub fn into_shadow(self, owner_id: &str) -> FederatorZone {
        FederatorZone {
            federation_id: owner_id.to_string(),
            zone_id: self.zone_id,
            geo_location: self.geo_location,
            city: self.city,
            state: self.state,
            locality: self.locality,
            region: String::new(),
            cloudlets: Vec::new(),
            edge_count: self.edge_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerRegistrationRequest {
    pub request_id: String,
    pub orig_federation_id: String,
    pub dest_federation_id: String,
    pub operator_id: String,
    pub country_code: String,
    pub orig_federation_addr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerRegistrationResponse {
    pub request_id: String,
    /// Responder's operator.
    pub orig_operator_id: String,
    /// Caller's operator, echoed.
    pub partner_operator_id: String,
    /// Responder's federation id.
    pub orig_federation_id: String,
    /// Caller's federation id, echoed.
    pub dest_federation_id: String,
    pub mcc: String,
    #[serde(default)]
    pub mnc: Vec<String>,
    #[serde(default)]
    pub locator_endpoint: String,
    #[serde(default)]
    pub partner_zone: Vec<ZoneInfo>,
}

/// Pushed to partners when a self federator's network identity changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerUpdateRequest {
    pub request_id: String,
    pub operator: String,
    pub country: String,
    pub orig_federation_id: String,
    pub dest_federation_id: String,
    pub mcc: String,
    #[serde(default)]
    pub mnc: Vec<String>,
    #[serde(default)]
    pub locator_endpoint: String,
}

/// Ends the federation the caller established with the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationRequest {
    pub request_id: String,
    pub operator: String,
    pub country: String,
    pub orig_federation_id: String,
    pub dest_federation_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneRegisterRequest {
    pub request_id: String,
    pub operator: String,
    pub country: String,
    pub orig_federation_id: String,
    pub dest_federation_id: String,
    /// Exactly one zone id per request.
    pub zones: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneRegistration {
    pub zone_id: String,
    /// Opaque correlation id, echoes the request id.
    pub registration_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneRegisterResponse {
    pub request_id: String,
    pub lead_operator_id: String,
    pub partner_operator_id: String,
    pub federation_id: String,
    pub zone: ZoneRegistration,
}

/// Zone deregistration and unshare notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneRequest {
    pub request_id: String,
    pub operator: String,
    pub country: String,
    pub orig_federation_id: String,
    pub dest_federation_id: String,
    pub zone: String,
}

/// Share notification carrying the zone's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneNotifyRequest {
    pub request_id: String,
    pub operator: String,
    pub country: String,
    pub orig_federation_id: String,
    pub dest_federation_id: String,
    pub partner_zone: ZoneInfo,
}

/// Body returned by peer endpoints that have nothing else to say.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub message: String,
}

impl Ack {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
