//! Payload and record types for the audit log.

use serde::{Deserialize, Serialize};

/// Structured payloads, one variant per event type.
///
/// Payloads are serialised to JSON and stored in the `payload_json` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    // ── Management: federators ───────────────────────────────────────
    FederatorCreated {
        federation_id: String,
        operator_id: String,
        country_code: String,
    },

    /// A self federator changed and the change was pushed to partners.
    FederatorUpdated {
        federation_id: String,
        /// Names of the fields that changed.
        changed: Vec<String>,
        /// Partners that received the update.
        notified: Vec<String>,
    },

    FederatorDeleted {
        federation_id: String,
    },

    PartnerAdded {
        self_federation_id: String,
        partner_federation_id: String,
        partner_addr: String,
        /// Zones stored from the handshake response.
        zones: usize,
    },

    PartnerRemoved {
        self_federation_id: String,
        partner_federation_id: String,
    },

    // ── Management: zones ────────────────────────────────────────────
    ZoneCreated {
        zone_id: String,
        federation_id: String,
        region: String,
    },

    ZoneDeleted {
        zone_id: String,
        federation_id: String,
    },

    ZoneShared {
        zone_id: String,
        partner_federation_id: String,
    },

    ZoneUnshared {
        zone_id: String,
        partner_federation_id: String,
    },

    ZoneRegistered {
        zone_id: String,
        self_federation_id: String,
        partner_federation_id: String,
    },

    ZoneDeregistered {
        zone_id: String,
        self_federation_id: String,
        partner_federation_id: String,
    },

    // ── Inbound peer calls ───────────────────────────────────────────
    /// A partner completed the registration handshake against us.
    PartnerHandshakeAccepted {
        self_federation_id: String,
        partner_federation_id: String,
        partner_addr: String,
    },

    PartnerUpdateAccepted {
        self_federation_id: String,
        partner_federation_id: String,
    },

    PartnerRemovalAccepted {
        self_federation_id: String,
        partner_federation_id: String,
        /// Whether the partner record itself was dropped.
        forgotten: bool,
    },

    /// A partner pushed metadata of one of its zones.
    PartnerZoneNotified {
        zone_id: String,
        partner_federation_id: String,
    },

    PartnerZoneWithdrawn {
        zone_id: String,
        partner_federation_id: String,
    },

    /// A partner registered to use one of our zones.
    ZoneRegistrationAccepted {
        zone_id: String,
        partner_federation_id: String,
    },

    ZoneDeregistrationAccepted {
        zone_id: String,
        partner_federation_id: String,
    },
}

impl EventPayload {
    /// Returns the canonical event type string for this payload.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::FederatorCreated { .. } => "FEDERATOR_CREATED",
            Self::FederatorUpdated { .. } => "FEDERATOR_UPDATED",
            Self::FederatorDeleted { .. } => "FEDERATOR_DELETED",
            Self::PartnerAdded { .. } => "PARTNER_ADDED",
            Self::PartnerRemoved { .. } => "PARTNER_REMOVED",
            Self::ZoneCreated { .. } => "ZONE_CREATED",
            Self::ZoneDeleted { .. } => "ZONE_DELETED",
            Self::ZoneShared { .. } => "ZONE_SHARED",
            Self::ZoneUnshared { .. } => "ZONE_UNSHARED",
            Self::ZoneRegistered { .. } => "ZONE_REGISTERED",
            Self::ZoneDeregistered { .. } => "ZONE_DEREGISTERED",
            Self::PartnerHandshakeAccepted { .. } => "PARTNER_HANDSHAKE_ACCEPTED",
            Self::PartnerUpdateAccepted { .. } => "PARTNER_UPDATE_ACCEPTED",
            Self::PartnerRemovalAccepted { .. } => "PARTNER_REMOVAL_ACCEPTED",
            Self::PartnerZoneNotified { .. } => "PARTNER_ZONE_NOTIFIED",
            Self::PartnerZoneWithdrawn { .. } => "PARTNER_ZONE_WITHDRAWN",
            Self::ZoneRegistrationAccepted { .. } => "ZONE_REGISTRATION_ACCEPTED",
            Self::ZoneDeregistrationAccepted { .. } => "ZONE_DEREGISTRATION_ACCEPTED",
        }
    }

    /// Returns the `entity_type` column value.
    pub fn entity_type(&self) -> &'static str {
        match self {
            Self::FederatorCreated { .. }
            | Self::FederatorUpdated { .. }
            | Self::FederatorDeleted { .. }
            | Self::PartnerAdded { .. }
            | Self::PartnerRemoved { .. }
            | Self::PartnerHandshakeAccepted { .. }
            | Self::PartnerUpdateAccepted { .. }
            | Self::PartnerRemovalAccepted { .. } => "federator",
            Self::ZoneCreated { .. }
            | Self::ZoneDeleted { .. }
            | Self::ZoneShared { .. }
            | Self::ZoneUnshared { .. }
            | Self::ZoneRegistered { .. }
            | Self::ZoneDeregistered { .. }
            | Self::PartnerZoneNotified { .. }
            | Self::PartnerZoneWithdrawn { .. }
            | Self::ZoneRegistrationAccepted { .. }
            | Self::ZoneDeregistrationAccepted { .. } => "zone",
        }
    }

    /// Returns the `entity_id` column value: the zone for zone events, the
    /// partner for partner events, the federator otherwise.
    pub fn entity_id(&self) -> &str {
        match self {
            Self::FederatorCreated { federation_id, .. }
            | Self::FederatorUpdated { federation_id, .. }
            | Self::FederatorDeleted { federation_id } => federation_id,
            Self::PartnerAdded {
                partner_federation_id,
                ..
            }
            | Self::PartnerRemoved {
                partner_federation_id,
                ..
            }
            | Self::PartnerHandshakeAccepted {
                partner_federation_id,
                ..
            }
            | Self::PartnerUpdateAccepted {
                partner_federation_id,
                ..
            }
            | Self::PartnerRemovalAccepted {
                partner_federation_id,
                ..
            } => partner_federation_id,
            Self::ZoneCreated { zone_id, .. }
            | Self::ZoneDeleted { zone_id, .. }
            | Self::ZoneShared { zone_id, .. }
            | Self::ZoneUnshared { zone_id, .. }
            | Self::ZoneRegistered { zone_id, .. }
            | Self::ZoneDeregistered { zone_id, .. }
            | Self::PartnerZoneNotified { zone_id, .. }
            | Self::PartnerZoneWithdrawn { zone_id, .. }
            | Self::ZoneRegistrationAccepted { zone_id, .. }
            | Self::ZoneDeregistrationAccepted { zone_id, .. } => zone_id,
        }
    }
}

/// A single row from `federation_audit_log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: i64,
    /// Monotonically increasing position in the log.
    pub seq: i64,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    /// Management user, or `peer:<federationId>` for inbound calls.
    pub actor: String,
    pub payload_json: String,
    /// SQLite `datetime('now')` timestamp (UTC).
    pub occurred_at: String,
}
