//! Regional compute controller seam.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::FederationError;

/// Knows which regions exist and which cloudlets an organization owns in
/// each of them.
pub trait RegionalController: Send + Sync {
    fn region_exists(&self, region: &str) -> bool;

    /// Cloudlet names owned by `organization` in `region`.
    fn list_cloudlets(&self, region: &str, organization: &str)
        -> Result<Vec<String>, FederationError>;
}

/// Fixed inventory, used in tests and for regions configured without a
/// controller endpoint.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    regions: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl StaticInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.regions.entry(region.into()).or_default();
        self
    }

    pub fn with_cloudlet(
        mut self,
        region: impl Into<String>,
        organization: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.regions
            .entry(region.into())
            .or_default()
            .entry(organization.into())
            .or_default()
            .insert(name.into());
        self
    }
}

impl RegionalController for StaticInventory {
    fn region_exists(&self, region: &str) -> bool {
        self.regions.contains_key(region)
    }

    fn list_cloudlets(
        &self,
        region: &str,
        organization: &str,
    ) -> Result<Vec<String>, FederationError> {
        let orgs = self
            .regions
            .get(region)
            .ok_or_else(|| FederationError::NotFound(format!("region {region}")))?;
        Ok(orgs
            .get(organization)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default())
    }
}
