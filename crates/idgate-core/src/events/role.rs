//! Role-management domain events consumed by this core.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events published by the role-management collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RoleEvent {
    /// A role's permission grants changed; cached resolutions for the
    /// role are stale and must be dropped.
    PermissionsChanged {
        /// The role whose grants changed.
        role_id: Uuid,
    },
}
