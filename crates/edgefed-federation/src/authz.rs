//! Authorization seam.
//!
//! The core only ever asks about the `cloudlets` resource of an operator
//! organization: `manage` to change federation state, `view` to list it.

use std::collections::{BTreeSet, HashMap};

use crate::error::FederationError;

/// Resource guarded by every federation check.
pub const RESOURCE_CLOUDLETS: &str = "cloudlets";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Manage,
    View,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manage => "manage",
            Self::View => "view",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrgKind {
    Operator,
    Developer,
}

/// Policy decision point consulted before any federation operation.
pub trait Authorizer: Send + Sync {
    /// Returns `NotAuthorized` unless `actor` may perform `action` on
    /// `resource` within `org`.
    fn authorized(
        &self,
        actor: &str,
        org: &str,
        resource: &str,
        action: Action,
    ) -> Result<(), FederationError>;

    /// Organizations within which `actor` may perform `action` on `resource`.
    fn authorized_orgs(&self, actor: &str, resource: &str, action: Action) -> BTreeSet<String>;

    fn organization_kind(&self, org: &str) -> Option<OrgKind>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantRole {
    /// May manage and view.
    Manager,
    Viewer,
}

impl GrantRole {
    fn allows(self, action: Action) -> bool {
        match self {
            Self::Manager => true,
            Self::Viewer => action == Action::View,
        }
    }
}

/// In-memory policy built from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicy {
    orgs: HashMap<String, OrgKind>,
    grants: HashMap<String, HashMap<String, GrantRole>>,
}

impl StaticPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_organization(mut self, name: impl Into<String>, kind: OrgKind) -> Self {
        self.orgs.insert(name.into(), kind);
        self
    }

    /// Grants `role` on `org` to `user`. A later grant for the same pair
    /// replaces the earlier one.
    pub fn with_grant(
        mut self,
        user: impl Into<String>,
        org: impl Into<String>,
        role: GrantRole,
    ) -> Self {
        self.grants
            .entry(user.into())
            .or_default()
            .insert(org.into(), role);
        self
    }
}

impl Authorizer for StaticPolicy {
    fn authorized(
        &self,
        actor: &str,
        org: &str,
        resource: &str,
        action: Action,
    ) -> Result<(), FederationError> {
        let allowed = resource == RESOURCE_CLOUDLETS
            && self
                .grants
                .get(actor)
                .and_then(|orgs| orgs.get(org))
                .is_some_and(|role| role.allows(action));
        if allowed {
            Ok(())
        } else {
            tracing::debug!(actor, org, resource, action = action.as_str(), "authorization denied");
            Err(FederationError::NotAuthorized(format!(
                "{actor} may not {} {resource} of {org}",
                action.as_str()
            )))
        }
    }

    fn authorized_orgs(&self, actor: &str, resource: &str, action: Action) -> BTreeSet<String> {
        if resource != RESOURCE_CLOUDLETS {
            return BTreeSet::new();
        }
        self.grants
            .get(actor)
            .map(|orgs| {
                orgs.iter()
                    .filter(|(_, role)| role.allows(action))
                    .map(|(org, _)| org.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn organization_kind(&self, org: &str) -> Option<OrgKind> {
        self.orgs.get(org).copied()
    }
}
