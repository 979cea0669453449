//! Edge federation core.
//!
//! Lets one operator platform expose edge zones to partner platforms and
//! consume theirs. [`FederatorRegistry`] manages this platform's self
//! federators and attaches partners through the registration handshake.
//! [`ZoneManager`] owns zones, shares them with partners and registers
//! partner zones. The [`inbound`] handlers are the receiving half of every
//! peer exchange.
//!
//! Everything here is synchronous and works on a borrowed
//! [`rusqlite::Connection`]. Authorization, the regional controller and the
//! peer transport are injected as trait objects.

pub mod authz;
pub mod client;
pub mod controller;
pub mod error;
pub mod inbound;
pub mod intents;
pub mod registry;
pub mod roles;
pub mod store;
pub mod wire;
pub mod zones;

#[cfg(test)]
mod test_support;

pub use authz::{Action, Authorizer, GrantRole, OrgKind, StaticPolicy, RESOURCE_CLOUDLETS};
pub use client::{HttpPeerClient, PeerClient};
pub use controller::{RegionalController, StaticInventory};
pub use error::{FederationError, StoreError, StoreErrorKind};
pub use intents::{pending_intents, FederationIntent, IntentAction};
pub use registry::{
    AddPartnerRequest, CreateSelfRequest, FederatorRegistry, PartnerView, RemovePartnerRequest,
    ShowPartnersRequest, ShowSelfRequest, UpdateSelfRequest,
};
pub use zones::{
    CreateZoneRequest, PartnerZoneView, ShowPartnerZonesRequest, ShowZonesRequest, ZoneKey,
    ZoneManager, ZonePartnerRequest, ZoneView,
};
