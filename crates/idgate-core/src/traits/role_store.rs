//! Role/permission store collaborator contract.

use std::collections::BTreeSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::result::AppResult;

/// Read access to role permission grants.
///
/// The store also publishes `role.permissions.changed` events on every
/// grant mutation; the permission cache is invalidated by those events,
/// never by polling.
#[async_trait]
pub trait RoleStore: Send + Sync + 'static {
    /// The `resource:action` keys granted to a role.
    async fn list_permission_keys(&self, role_id: Uuid) -> AppResult<BTreeSet<String>>;

    /// Every permission key that exists in the system, used to decide
    /// wildcard collapse.
    async fn list_all_permission_keys(&self) -> AppResult<BTreeSet<String>>;
}
