//! The effective permission set carried in access tokens.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Sentinel carried in the token permission claim for a full grant.
pub const WILDCARD: &str = "*";

/// The resolved permission set for a role.
///
/// A role holding every permission key that exists in the system
/// collapses to [`PermissionClaim::Wildcard`], which keeps the token
/// payload bounded no matter how many permissions the platform
/// accumulates over time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "keys")]
pub enum PermissionClaim {
    /// The role holds every permission in the system.
    Wildcard,
    /// An explicit set of `resource:action` keys.
    Keys(BTreeSet<String>),
}

impl PermissionClaim {
    /// Builds a claim from the keys a role holds, collapsing to the
    /// wildcard when the role holds all `total_in_system` permissions.
    pub fn from_keys(keys: BTreeSet<String>, total_in_system: usize) -> Self {
        if total_in_system > 0 && keys.len() == total_in_system {
            Self::Wildcard
        } else {
            Self::Keys(keys)
        }
    }

    /// Whether the claim grants the given `resource:action` key.
    pub fn grants(&self, key: &str) -> bool {
        match self {
            Self::Wildcard => true,
            Self::Keys(keys) => keys.contains(key),
        }
    }

    /// The values serialized into the token `permissions` claim:
    /// `["*"]` for a wildcard, the sorted key list otherwise.
    pub fn claim_values(&self) -> Vec<String> {
        match self {
            Self::Wildcard => vec![WILDCARD.to_string()],
            Self::Keys(keys) => keys.iter().cloned().collect(),
        }
    }

    /// Rebuilds a claim from token `permissions` values.
    pub fn from_claim_values(values: &[String]) -> Self {
        if values.len() == 1 && values[0] == WILDCARD {
            Self::Wildcard
        } else {
            Self::Keys(values.iter().cloned().collect())
        }
    }
}
