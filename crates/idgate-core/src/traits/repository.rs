//! Session persistence contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use idgate_entity::{Session, TokenRotation};

use crate::result::AppResult;

/// The session store: the single source of truth for session existence
/// and validity.
///
/// Implementations must provide O(1) indexed lookups by token hash (the
/// hottest path in the system) and must make [`rotate_tokens`] and
/// [`revoke_all_for_identity`] single atomic store operations, never
/// read-then-write sequences.
///
/// [`rotate_tokens`]: SessionRepository::rotate_tokens
/// [`revoke_all_for_identity`]: SessionRepository::revoke_all_for_identity
#[async_trait]
pub trait SessionRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Persist a new session. Only hashed token values are stored.
    async fn create(&self, session: &Session) -> AppResult<()>;

    /// Find a session by ID, whatever its state.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Session>>;

    /// Find the session currently holding this access token hash.
    async fn find_by_token_hash(&self, token_hash: &str) -> AppResult<Option<Session>>;

    /// Find the session whose current **or** superseded refresh hash
    /// matches. Both must be checked so a late duplicate of an
    /// already-rotated token is distinguishable from an unknown one.
    async fn find_by_refresh_hash(&self, refresh_hash: &str) -> AppResult<Option<Session>>;

    /// Compare-and-swap token rotation. The write succeeds only if the
    /// row still holds `rotation.expected_refresh_hash` as its current
    /// refresh hash. Returns `false` when the condition no longer held
    /// (the caller lost a race).
    async fn rotate_tokens(&self, rotation: &TokenRotation) -> AppResult<bool>;

    /// Refresh `last_activity_at`. Best-effort on the validation path.
    async fn touch_activity(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()>;

    /// Revoke a single session. Returns `true` if this call performed
    /// the transition, `false` if the session was already revoked or
    /// does not exist.
    async fn revoke(&self, id: Uuid, reason: &str, at: DateTime<Utc>) -> AppResult<bool>;

    /// Revoke every active session of an identity except `exclude`, as
    /// one atomic bulk update. Returns the number of rows transitioned.
    async fn revoke_all_for_identity(
        &self,
        identity_id: Uuid,
        exclude: Option<Uuid>,
        reason: &str,
        at: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// List all currently valid sessions of an identity.
    async fn list_active_by_identity(&self, identity_id: Uuid) -> AppResult<Vec<Session>>;

    /// Mark a session as MFA-verified. Returns `false` for unknown
    /// sessions.
    async fn set_mfa_verified(
        &self,
        id: Uuid,
        method: &str,
        at: DateTime<Utc>,
    ) -> AppResult<bool>;
}
