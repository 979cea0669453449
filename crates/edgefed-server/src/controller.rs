//! Regional controllers as configured under `[[regions]]`.

use crate::config::RegionConfig;
use edgefed_federation::client::endpoint_url;
use edgefed_federation::{FederationError, RegionalController, StaticInventory};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Controller API path listing cloudlets.
pub const SHOW_CLOUDLET_PATH: &str = "/api/v1/ctrl/ShowCloudlet";

#[derive(Debug, Serialize, Deserialize)]
struct CloudletKey {
    organization: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    name: String,
}

#[derive(Debug, Serialize)]
struct ShowCloudletRequest {
    key: CloudletKey,
}

#[derive(Debug, Deserialize)]
struct CloudletRecord {
    key: CloudletKey,
}

/// Cloudlet lookups against one region's controller over HTTP.
///
/// Blocking; call from a `spawn_blocking` task.
#[derive(Debug, Clone)]
pub struct HttpRegionalController {
    client: Client,
    address: String,
}

impl HttpRegionalController {
    pub fn new(client: Client, address: impl Into<String>) -> Self {
        Self {
            client,
            address: address.into(),
        }
    }

    /// Lists the cloudlets `organization` owns behind this controller.
    pub fn show_cloudlets(&self, organization: &str) -> Result<Vec<String>, FederationError> {
        let url = endpoint_url(&self.address, SHOW_CLOUDLET_PATH);
        tracing::debug!(%url, organization, "listing controller cloudlets");

        let body = ShowCloudletRequest {
            key: CloudletKey {
                organization: organization.to_string(),
                name: String::new(),
            },
        };
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| FederationError::PeerUnreachable {
                addr: self.address.clone(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(FederationError::PeerRejected {
                addr: self.address.clone(),
                status: status.as_u16(),
                message: resp.text().unwrap_or_default(),
            });
        }

        let records: Vec<CloudletRecord> =
            resp.json().map_err(|e| FederationError::PeerRejected {
                addr: self.address.clone(),
                status: status.as_u16(),
                message: format!("unreadable cloudlet list: {e}"),
            })?;
        Ok(records
            .into_iter()
            .filter(|r| r.key.organization == organization)
            .map(|r| r.key.name)
            .collect())
    }
}

/// Routes each region to its HTTP controller, or to the static inventory
/// when the region has no controller address.
#[derive(Debug, Default)]
pub struct RegionDirectory {
    inventory: StaticInventory,
    controllers: HashMap<String, HttpRegionalController>,
}

impl RegionDirectory {
    /// Builds the directory. Constructs a blocking HTTP client when any
    /// region has an address, so call this off the async runtime.
    pub fn from_config(regions: &[RegionConfig], timeout: Duration) -> Self {
        let mut directory = Self::default();
        let mut client: Option<Client> = None;

        for region in regions {
            match &region.address {
                Some(address) => {
                    let client = client.get_or_insert_with(|| {
                        Client::builder()
                            .timeout(timeout)
                            .build()
                            .unwrap_or_default()
                    });
                    directory.controllers.insert(
                        region.name.clone(),
                        HttpRegionalController::new(client.clone(), address),
                    );
                }
                None => {
                    directory.inventory = region.cloudlets.iter().fold(
                        std::mem::take(&mut directory.inventory).with_region(&region.name),
                        |inv, c| inv.with_cloudlet(&region.name, &c.organization, &c.name),
                    );
                }
            }
        }

        tracing::info!(
            static_regions = regions.len() - directory.controllers.len(),
            controller_regions = directory.controllers.len(),
            "region directory ready"
        );
        directory
    }
}

impl RegionalController for RegionDirectory {
    fn region_exists(&self, region: &str) -> bool {
        self.controllers.contains_key(region) || self.inventory.region_exists(region)
    }

    fn list_cloudlets(
        &self,
        region: &str,
        organization: &str,
    ) -> Result<Vec<String>, FederationError> {
        match self.controllers.get(region) {
            Some(controller) => controller.show_cloudlets(organization),
            None => self.inventory.list_cloudlets(region, organization),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CloudletConfig;

    fn region(name: &str, address: Option<&str>, cloudlets: &[(&str, &str)]) -> RegionConfig {
        RegionConfig {
            name: name.to_string(),
            address: address.map(str::to_string),
            cloudlets: cloudlets
                .iter()
                .map(|(org, name)| CloudletConfig {
                    organization: org.to_string(),
                    name: name.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn static_regions_serve_configured_cloudlets() {
        let dir = RegionDirectory::from_config(
            &[
                region("US-1", None, &[("mexop", "cloudlet1"), ("other", "c9")]),
                region("US-2", None, &[]),
            ],
            Duration::from_secs(1),
        );

        assert!(dir.region_exists("US-1"));
        assert!(dir.region_exists("US-2"));
        assert!(!dir.region_exists("EU-1"));
        assert_eq!(
            dir.list_cloudlets("US-1", "mexop").unwrap(),
            vec!["cloudlet1".to_string()]
        );
        assert!(dir.list_cloudlets("US-2", "mexop").unwrap().is_empty());
    }

    #[test]
    fn unreachable_controller_is_reported() {
        // Port 1 on loopback has no listener.
        let dir = RegionDirectory::from_config(
            &[region("EU-1", Some("127.0.0.1:1"), &[])],
            Duration::from_millis(500),
        );

        assert!(dir.region_exists("EU-1"));
        assert!(matches!(
            dir.list_cloudlets("EU-1", "mexop"),
            Err(FederationError::PeerUnreachable { .. })
        ));
    }
}
