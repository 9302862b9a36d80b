//! Refresh token rotation with reuse detection.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use idgate_core::error::AppError;
use idgate_core::events::{DomainEvent, EventPayload, SessionEvent};
use idgate_core::result::AppResult;
use idgate_core::traits::directory::IdentityDirectory;
use idgate_core::traits::events::EventPublisher;
use idgate_core::traits::repository::SessionRepository;
use idgate_entity::{Session, TokenRotation};

use crate::jwt::{TokenIssuer, token_hash};
use crate::permission::PermissionResolver;

/// Why a rotation request was refused. Internal only; every variant
/// collapses to "reauthenticate" at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationDenied {
    /// No session holds this refresh hash, current or superseded.
    NotFound,
    /// The session was revoked.
    Inactive,
    /// The session passed its absolute expiry.
    Expired,
    /// A superseded refresh token was presented again. The session has
    /// been force-revoked.
    ReplayDetected,
}

/// Result of a rotation request.
#[derive(Debug, Clone)]
pub enum RotationOutcome {
    /// Tokens were swapped; the old refresh token is now the superseded
    /// one and will trigger replay handling if presented again.
    Rotated {
        session_id: Uuid,
        access_token: String,
        refresh_token: String,
        /// Expiry of the new access token.
        expires_at: DateTime<Utc>,
    },
    /// The request was refused.
    Denied { reason: RotationDenied },
}

/// Outcome of one pass through the rotation protocol.
enum Attempt {
    Settled(RotationOutcome),
    /// The compare-and-swap write affected zero rows.
    LostRace,
}

/// Executes the rotation protocol against the session store.
///
/// A lost compare-and-swap is re-run once from the lookup; the loser of
/// a benign double-submit race then observes its own hash as superseded
/// and takes the conservative replay path.
#[derive(Clone)]
pub struct RotationEngine {
    repository: Arc<dyn SessionRepository>,
    directory: Arc<dyn IdentityDirectory>,
    resolver: PermissionResolver,
    issuer: TokenIssuer,
    events: Arc<dyn EventPublisher>,
}

impl std::fmt::Debug for RotationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationEngine").finish_non_exhaustive()
    }
}

impl RotationEngine {
    pub fn new(
        repository: Arc<dyn SessionRepository>,
        directory: Arc<dyn IdentityDirectory>,
        resolver: PermissionResolver,
        issuer: TokenIssuer,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            repository,
            directory,
            resolver,
            issuer,
            events,
        }
    }

    /// Rotate the session identified by a presented refresh token hash.
    pub async fn rotate(
        &self,
        presented_refresh_hash: &str,
        store_timeout: Duration,
    ) -> AppResult<RotationOutcome> {
        match self
            .attempt_within(presented_refresh_hash, store_timeout)
            .await?
        {
            Attempt::Settled(outcome) => return Ok(outcome),
            Attempt::LostRace => {
                info!("Rotation lost a compare-and-swap race, retrying once");
            }
        }
        match self
            .attempt_within(presented_refresh_hash, store_timeout)
            .await?
        {
            Attempt::Settled(outcome) => Ok(outcome),
            Attempt::LostRace => Err(AppError::conflict(
                "Concurrent session rotation, retry the request",
            )),
        }
    }

    /// One protocol pass, deadline-bounded as a whole. Every suspension
    /// point in the pass (lookup, identity re-read, permission
    /// resolution, revoke, CAS write) counts against the same timeout;
    /// a stalled store answers service-unavailable, never a hang.
    async fn attempt_within(
        &self,
        presented_refresh_hash: &str,
        store_timeout: Duration,
    ) -> AppResult<Attempt> {
        tokio::time::timeout(store_timeout, self.attempt(presented_refresh_hash))
            .await
            .map_err(|_| AppError::service_unavailable("Session store lookup timed out"))?
    }

    async fn attempt(&self, presented_refresh_hash: &str) -> AppResult<Attempt> {
        let lookup = self
            .repository
            .find_by_refresh_hash(presented_refresh_hash)
            .await?;

        let session = match lookup {
            Some(session) => session,
            None => {
                return Ok(Attempt::Settled(RotationOutcome::Denied {
                    reason: RotationDenied::NotFound,
                }));
            }
        };

        if session.matches_previous_refresh(presented_refresh_hash) {
            return Ok(Attempt::Settled(self.handle_reuse(session).await?));
        }

        if !session.is_active {
            return Ok(Attempt::Settled(RotationOutcome::Denied {
                reason: RotationDenied::Inactive,
            }));
        }
        if session.is_expired() {
            return Ok(Attempt::Settled(RotationOutcome::Denied {
                reason: RotationDenied::Expired,
            }));
        }

        // Re-read the identity and re-resolve permissions so rotated
        // tokens reflect role changes made since the last issuance.
        let identity = match self.directory.find_by_id(session.identity_id).await? {
            Some(identity) if identity.is_active => identity,
            _ => {
                warn!(
                    session_id = %session.id,
                    identity_id = %session.identity_id,
                    "Rotation for a missing or deactivated identity, revoking session"
                );
                self.repository
                    .revoke(session.id, "identity deactivated", Utc::now())
                    .await?;
                return Ok(Attempt::Settled(RotationOutcome::Denied {
                    reason: RotationDenied::Inactive,
                }));
            }
        };

        let claim = self.resolver.resolve(identity.role_id).await?;
        let pair = self.issuer.issue(&identity, &claim, session.id)?;

        let now = Utc::now();
        let rotation = TokenRotation {
            session_id: session.id,
            expected_refresh_hash: session.refresh_token_hash.clone(),
            new_token_hash: token_hash(&pair.access_token),
            new_refresh_hash: token_hash(&pair.refresh_token),
            new_expires_at: self.issuer.session_expiry(now),
            rotated_at: now,
        };

        if !self.repository.rotate_tokens(&rotation).await? {
            return Ok(Attempt::LostRace);
        }

        info!(
            session_id = %session.id,
            identity_id = %identity.id,
            "Session tokens rotated"
        );

        Ok(Attempt::Settled(RotationOutcome::Rotated {
            session_id: session.id,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_at: pair.access_expires_at,
        }))
    }

    /// Conservative handling of a superseded-hash presentation: the
    /// refresh token was either stolen or duplicated, and there is no
    /// way to tell which request is the legitimate one.
    async fn handle_reuse(&self, session: Session) -> AppResult<RotationOutcome> {
        warn!(
            session_id = %session.id,
            identity_id = %session.identity_id,
            ip_address = %session.ip_address,
            "Refresh token reuse detected, revoking session"
        );

        self.repository
            .revoke(session.id, "refresh token reuse detected", Utc::now())
            .await?;

        self.events.publish(DomainEvent::new(EventPayload::Session(
            SessionEvent::ReuseDetected { session },
        )));

        Ok(RotationOutcome::Denied {
            reason: RotationDenied::ReplayDetected,
        })
    }
}
