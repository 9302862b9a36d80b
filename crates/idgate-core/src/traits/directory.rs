//! Identity-management collaborator contracts.

use async_trait::async_trait;
use uuid::Uuid;

use idgate_entity::Identity;

use crate::result::AppResult;

/// Read-only access to identity records.
///
/// Identities are owned by the identity-management service; this core
/// only reads them when issuing or rotating sessions.
#[async_trait]
pub trait IdentityDirectory: Send + Sync + 'static {
    /// Look up an identity by ID.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Identity>>;
}

/// Credential authentication collaborator.
///
/// Password storage and verification mechanics live entirely behind
/// this trait. A `Ok(None)` covers every failure mode — unknown email,
/// wrong password, inactive identity — so callers cannot distinguish
/// them and user enumeration stays impossible.
#[async_trait]
pub trait CredentialVerifier: Send + Sync + 'static {
    /// Verify email + password, returning the identity on success.
    async fn verify(&self, email: &str, password: &str) -> AppResult<Option<Identity>>;
}
