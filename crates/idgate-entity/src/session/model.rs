//! Session entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An administrative session.
///
/// Sessions are created on login and only ever transition state after
/// that: rotation swaps the token hashes in place, revocation flips
/// `is_active`. Rows are never physically deleted so that the full
/// session history remains available to audit queries.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    /// Unique session identifier.
    pub id: Uuid,
    /// The identity this session belongs to.
    pub identity_id: Uuid,
    /// SHA-256 hash of the current access token. Plaintext bearer
    /// values are never stored.
    pub token_hash: String,
    /// SHA-256 hash of the current refresh token.
    pub refresh_token_hash: String,
    /// Hash of the refresh token superseded by the most recent rotation.
    /// A presentation matching this value is a reuse (see the rotation
    /// engine) and must never match `refresh_token_hash`.
    pub previous_refresh_token_hash: Option<String>,

    // -- MFA --
    /// Whether this session has passed MFA verification.
    pub mfa_verified: bool,
    /// When MFA verification happened.
    pub mfa_verified_at: Option<DateTime<Utc>>,
    /// The MFA method used (e.g. "totp", "webauthn").
    pub mfa_method: Option<String>,

    // -- Client metadata --
    /// IP address from which the session was created.
    pub ip_address: String,
    /// User-Agent header value.
    pub user_agent: Option<String>,
    /// Opaque client device fingerprint.
    pub device_fingerprint: Option<String>,

    // -- State --
    /// Whether the session is live. `false` implies `revoked_at` and
    /// `revoked_reason` are set.
    pub is_active: bool,
    /// When the session expires (extended on each successful rotation).
    pub expires_at: DateTime<Utc>,
    /// Last observed activity.
    pub last_activity_at: DateTime<Utc>,
    /// When the session was created (login time).
    pub created_at: DateTime<Utc>,
    /// When the session was revoked.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Why the session was revoked.
    pub revoked_reason: Option<String>,
}

impl Session {
    /// Whether the session currently authorizes requests: live and not
    /// past its expiry.
    pub fn is_valid(&self) -> bool {
        self.is_active && !self.is_expired()
    }

    /// Whether the session has passed its absolute expiry. Expiry is
    /// checked independently of `is_active`.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Whether the presented refresh hash matches the superseded (not
    /// current) refresh token of this session.
    pub fn matches_previous_refresh(&self, presented_hash: &str) -> bool {
        self.previous_refresh_token_hash.as_deref() == Some(presented_hash)
    }
}

/// Client-supplied metadata captured at session creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Client IP address.
    pub ip_address: String,
    /// User-Agent header.
    pub user_agent: Option<String>,
    /// Opaque device fingerprint.
    pub device_fingerprint: Option<String>,
}

/// Parameters of a compare-and-swap token rotation.
///
/// The store applies this only if the row still holds
/// `expected_refresh_hash` as its current refresh hash, so two rotations
/// racing on the same token cannot both win.
#[derive(Debug, Clone)]
pub struct TokenRotation {
    /// The session to rotate.
    pub session_id: Uuid,
    /// The refresh hash read before rotating; the write condition.
    pub expected_refresh_hash: String,
    /// Hash of the newly minted access token.
    pub new_token_hash: String,
    /// Hash of the newly minted refresh token.
    pub new_refresh_hash: String,
    /// The extended session expiry.
    pub new_expires_at: DateTime<Utc>,
    /// Rotation timestamp, also used for `last_activity_at`.
    pub rotated_at: DateTime<Utc>,
}
