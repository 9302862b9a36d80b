//! Identity entity model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An administrative principal.
///
/// Identities are owned and mutated by the identity-management service;
/// the session core only ever reads them through the
/// `IdentityDirectory` collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Identity {
    /// Unique identity identifier.
    pub id: Uuid,
    /// Login email.
    pub email: String,
    /// The role this identity holds.
    pub role_id: Uuid,
    /// The tenant this identity is scoped to.
    pub tenant_id: Uuid,
    /// Sub-service scopes this identity may access; copied into the
    /// access token scope claim at issuance.
    #[sqlx(json)]
    pub scopes: Vec<String>,
    /// Whether the identity may authenticate at all.
    pub is_active: bool,
}
