//! Outbound side of the federation protocol.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::FederationError;
use crate::wire::{
    FederationRequest, PartnerRegistrationRequest, PartnerRegistrationResponse,
    PartnerUpdateRequest, ZoneNotifyRequest, ZoneRegisterRequest, ZoneRegisterResponse,
    ZoneRequest, PARTNER_PATH, ZONE_NOTIFY_PATH, ZONE_PATH,
};

/// One synchronous call per protocol exchange. `addr` is the peer's
/// federation address as stored on its federator record.
///
/// Implementations return `PeerUnreachable` for transport failures and
/// `PeerRejected` for any answer other than 200.
pub trait PeerClient: Send + Sync {
    fn register_partner(
        &self,
        addr: &str,
        req: &PartnerRegistrationRequest,
    ) -> Result<PartnerRegistrationResponse, FederationError>;

    fn update_partner(&self, addr: &str, req: &PartnerUpdateRequest) -> Result<(), FederationError>;

    fn remove_partner(&self, addr: &str, req: &FederationRequest) -> Result<(), FederationError>;

    fn register_zone(
        &self,
        addr: &str,
        req: &ZoneRegisterRequest,
    ) -> Result<ZoneRegisterResponse, FederationError>;

    fn deregister_zone(&self, addr: &str, req: &ZoneRequest) -> Result<(), FederationError>;

    fn notify_zone_shared(&self, addr: &str, req: &ZoneNotifyRequest)
        -> Result<(), FederationError>;

    fn notify_zone_unshared(&self, addr: &str, req: &ZoneRequest) -> Result<(), FederationError>;
}

/// [`PeerClient`] over JSON/HTTP.
///
/// Uses `reqwest`'s blocking client, so it must be called from a thread that
/// may block (a `spawn_blocking` task on the server).
#[derive(Debug, Clone)]
pub struct HttpPeerClient {
    client: Client,
}

impl HttpPeerClient {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("edgefed/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    fn call<Req, Resp>(
        &self,
        method: Method,
        addr: &str,
        path: &str,
        body: &Req,
    ) -> Result<Resp, FederationError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let url = endpoint_url(addr, path);
        tracing::debug!(%method, %url, "calling federation peer");

        let resp = self
            .client
            .request(method, &url)
            .json(body)
            .send()
            .map_err(|e| FederationError::PeerUnreachable {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let text = resp.text().unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or(text);
            tracing::warn!(%url, status = status.as_u16(), %message, "peer rejected request");
            return Err(FederationError::PeerRejected {
                addr: addr.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        resp.json::<Resp>()
            .map_err(|e| FederationError::PeerRejected {
                addr: addr.to_string(),
                status: status.as_u16(),
                message: format!("unreadable response body: {e}"),
            })
    }

    fn call_ack<Req: Serialize>(
        &self,
        method: Method,
        addr: &str,
        path: &str,
        body: &Req,
    ) -> Result<(), FederationError> {
        self.call::<Req, serde_json::Value>(method, addr, path, body)
            .map(|_| ())
    }
}

impl PeerClient for HttpPeerClient {
    fn register_partner(
        &self,
        addr: &str,
        req: &PartnerRegistrationRequest,
    ) -> Result<PartnerRegistrationResponse, FederationError> {
        self.call(Method::POST, addr, PARTNER_PATH, req)
    }

    fn update_partner(&self, addr: &str, req: &PartnerUpdateRequest) -> Result<(), FederationError> {
        self.call_ack(Method::PUT, addr, PARTNER_PATH, req)
    }

    fn remove_partner(&self, addr: &str, req: &FederationRequest) -> Result<(), FederationError> {
        self.call_ack(Method::DELETE, addr, PARTNER_PATH, req)
    }

    fn register_zone(
        &self,
        addr: &str,
        req: &ZoneRegisterRequest,
    ) -> Result<ZoneRegisterResponse, FederationError> {
        self.call(Method::POST, addr, ZONE_PATH, req)
    }

    fn deregister_zone(&self, addr: &str, req: &ZoneRequest) -> Result<(), FederationError> {
        self.call_ack(Method::DELETE, addr, ZONE_PATH, req)
    }

    fn notify_zone_shared(
        &self,
        addr: &str,
        req: &ZoneNotifyRequest,
    ) -> Result<(), FederationError> {
        self.call_ack(Method::POST, addr, ZONE_NOTIFY_PATH, req)
    }

    fn notify_zone_unshared(&self, addr: &str, req: &ZoneRequest) -> Result<(), FederationError> {
        self.call_ack(Method::DELETE, addr, ZONE_NOTIFY_PATH, req)
    }
}

/// Joins a federation address and a protocol path. Addresses without a
/// scheme are plain HTTP.
pub fn endpoint_url(addr: &str, path: &str) -> String {
    let base = addr.trim().trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{base}{path}")
    } else {
        format!("http://{base}{path}")
    }
}
