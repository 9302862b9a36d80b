//! The authenticated principal threaded through call chains.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permission::PermissionClaim;

/// A fully resolved, validated caller.
///
/// This is the one explicit value the rest of the platform receives
/// after token validation; downstream code branches on its fields
/// instead of inspecting raw request attachments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedPrincipal {
    /// The identity behind the session.
    pub identity_id: Uuid,
    /// The validated session.
    pub session_id: Uuid,
    /// Role held at token issuance.
    pub role_id: Uuid,
    /// Tenant scope of the identity.
    pub tenant_id: Uuid,
    /// The permission claim carried by the access token.
    pub permissions: PermissionClaim,
    /// Scope grants carried by the access token.
    pub scopes: Vec<String>,
    /// Whether the session has passed MFA. Endpoints requiring elevated
    /// trust must check this themselves; it never gates rotation.
    pub mfa_verified: bool,
    /// When the backing session expires.
    pub expires_at: DateTime<Utc>,
}

impl AuthenticatedPrincipal {
    /// Whether the principal holds the given `resource:action` key.
    pub fn has_permission(&self, key: &str) -> bool {
        self.permissions.grants(key)
    }

    /// Whether the principal carries the given scope grant.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}
