//! Access token validation, the hottest path in the system.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use idgate_core::traits::repository::SessionRepository;

/// Why a presented token did not validate. Internal only; every variant
/// collapses to "reauthenticate" at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// No session holds this token hash.
    NotFound,
    /// The session was revoked.
    Inactive,
    /// The session passed its absolute expiry.
    Expired,
}

/// Result of validating an access token hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The token authorizes requests.
    Valid {
        identity_id: Uuid,
        session_id: Uuid,
        mfa_verified: bool,
        expires_at: DateTime<Utc>,
    },
    /// The token does not authorize requests.
    Invalid { reason: InvalidReason },
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

/// Validates access token hashes against the session store.
///
/// The store lookup is bounded by the caller-supplied timeout and fails
/// closed: a slow or failing store answers `Invalid { NotFound }`, never
/// `Valid`. The `last_activity_at` refresh after a successful validation
/// is spawned off and can neither block nor fail the result.
#[derive(Debug, Clone)]
pub struct SessionValidator {
    repository: Arc<dyn SessionRepository>,
}

impl SessionValidator {
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self { repository }
    }

    /// Validate the SHA-256 hash of a presented access token.
    pub async fn validate(&self, token_hash: &str, store_timeout: Duration) -> ValidationOutcome {
        let lookup = tokio::time::timeout(
            store_timeout,
            self.repository.find_by_token_hash(token_hash),
        )
        .await;

        let session = match lookup {
            Err(_) => {
                warn!(
                    timeout_ms = store_timeout.as_millis() as u64,
                    "Session store lookup timed out, failing closed"
                );
                return ValidationOutcome::Invalid {
                    reason: InvalidReason::NotFound,
                };
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Session store lookup failed, failing closed");
                return ValidationOutcome::Invalid {
                    reason: InvalidReason::NotFound,
                };
            }
            Ok(Ok(None)) => {
                return ValidationOutcome::Invalid {
                    reason: InvalidReason::NotFound,
                };
            }
            Ok(Ok(Some(session))) => session,
        };

        if !session.is_active {
            return ValidationOutcome::Invalid {
                reason: InvalidReason::Inactive,
            };
        }
        if session.is_expired() {
            return ValidationOutcome::Invalid {
                reason: InvalidReason::Expired,
            };
        }

        let repository = Arc::clone(&self.repository);
        let session_id = session.id;
        tokio::spawn(async move {
            if let Err(e) = repository.touch_activity(session_id, Utc::now()).await {
                debug!(session_id = %session_id, error = %e, "Activity refresh failed");
            }
        });

        ValidationOutcome::Valid {
            identity_id: session.identity_id,
            session_id: session.id,
            mfa_verified: session.mfa_verified,
            expires_at: session.expires_at,
        }
    }
}
