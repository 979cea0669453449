//! Directional trust roles between a self federator and a partner.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single capability one federator holds with respect to a partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FederatorRole {
    /// Self pushes its zone metadata to the partner.
    ShareZonesWithPartner,
    /// Self may see and register the partner's zones.
    AccessPartnerZones,
}

impl FederatorRole {
    pub const ALL: [FederatorRole; 2] = [Self::ShareZonesWithPartner, Self::AccessPartnerZones];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShareZonesWithPartner => "ShareZonesWithPartner",
            Self::AccessPartnerZones => "AccessPartnerZones",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Self::ShareZonesWithPartner => 0b01,
            Self::AccessPartnerZones => 0b10,
        }
    }
}

impl std::fmt::Display for FederatorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FederatorRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ShareZonesWithPartner" => Ok(Self::ShareZonesWithPartner),
            "AccessPartnerZones" => Ok(Self::AccessPartnerZones),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// Error returned when a stored role label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown federator role: {0}")]
pub struct ParseRoleError(pub String);

/// The set of roles granted for one (self, partner) pair.
///
/// Roles are independent flags: either, both, or neither may be held, and
/// the partner's view of the same pair is unrelated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RoleSet(u8);

impl RoleSet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn contains(self, role: FederatorRole) -> bool {
        self.0 & role.bit() != 0
    }

    /// Adds `role`, returning `false` if it was already present.
    pub fn insert(&mut self, role: FederatorRole) -> bool {
        let had = self.contains(role);
        self.0 |= role.bit();
        !had
    }

    /// Removes `role`, returning `false` if it was absent.
    pub fn remove(&mut self, role: FederatorRole) -> bool {
        let had = self.contains(role);
        self.0 &= !role.bit();
        had
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = FederatorRole> {
        FederatorRole::ALL
            .into_iter()
            .filter(move |role| self.contains(*role))
    }
}

impl From<FederatorRole> for RoleSet {
    fn from(role: FederatorRole) -> Self {
        Self(role.bit())
    }
}

impl std::fmt::Display for RoleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels: Vec<&str> = self.iter().map(FederatorRole::as_str).collect();
        f.write_str(&labels.join(","))
    }
}

impl std::str::FromStr for RoleSet {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = RoleSet::empty();
        for label in s.split(',').map(str::trim).filter(|l| !l.is_empty()) {
            set.insert(label.parse()?);
        }
        Ok(set)
    }
}

impl Serialize for RoleSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for RoleSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let roles = Vec::<FederatorRole>::deserialize(deserializer)?;
        let mut set = RoleSet::empty();
        for role in roles {
            set.insert(role);
        }
        Ok(set)
    }
}
