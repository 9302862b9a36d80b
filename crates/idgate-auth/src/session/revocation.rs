//! Session revocation: single logout and bulk invalidation.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use idgate_core::events::{DomainEvent, EventPayload, SessionEvent};
use idgate_core::result::AppResult;
use idgate_core::traits::events::EventPublisher;
use idgate_core::traits::repository::SessionRepository;

/// Revokes sessions, singly or in bulk.
#[derive(Clone)]
pub struct RevocationManager {
    repository: Arc<dyn SessionRepository>,
    events: Arc<dyn EventPublisher>,
}

impl std::fmt::Debug for RevocationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationManager").finish_non_exhaustive()
    }
}

impl RevocationManager {
    pub fn new(repository: Arc<dyn SessionRepository>, events: Arc<dyn EventPublisher>) -> Self {
        Self { repository, events }
    }

    /// Logout is idempotent: `true` whenever the session ends the call
    /// revoked, whichever call performed the transition. `false` only
    /// for sessions that do not exist. A retried logout must not read
    /// as a failure.
    pub async fn logout(&self, session_id: Uuid) -> AppResult<bool> {
        if self
            .repository
            .revoke(session_id, "logout", Utc::now())
            .await?
        {
            info!(session_id = %session_id, "Session logged out");
            return Ok(true);
        }

        // No transition: already revoked, or unknown.
        match self.repository.find_by_id(session_id).await? {
            Some(session) => Ok(!session.is_active),
            None => Ok(false),
        }
    }

    /// Revoke every active session of an identity except `exclude`, as
    /// one atomic bulk store operation. Returns how many sessions
    /// transitioned in this call.
    pub async fn revoke_all(
        &self,
        identity_id: Uuid,
        exclude: Option<Uuid>,
        reason: &str,
    ) -> AppResult<u64> {
        let revoked_count = self
            .repository
            .revoke_all_for_identity(identity_id, exclude, reason, Utc::now())
            .await?;

        if revoked_count > 0 {
            info!(
                identity_id = %identity_id,
                revoked_count,
                reason,
                "Bulk session revocation"
            );
            self.events.publish(DomainEvent::new(EventPayload::Session(
                SessionEvent::Revoked {
                    identity_id,
                    revoked_count,
                    reason: reason.to_string(),
                    excluded_session_id: exclude,
                },
            )));
        }

        Ok(revoked_count)
    }
}
