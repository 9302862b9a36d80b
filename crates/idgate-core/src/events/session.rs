//! Session-related domain events.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use idgate_entity::Session;

/// Events related to administrative sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// An identity logged in and a session was created.
    Created {
        /// The session ID.
        session_id: Uuid,
        /// The identity ID.
        identity_id: Uuid,
        /// The IP address of the login.
        ip_address: String,
    },
    /// One or more sessions were revoked in a bulk invalidation.
    /// Published only when at least one row actually transitioned.
    Revoked {
        /// The identity whose sessions were revoked.
        identity_id: Uuid,
        /// How many sessions transitioned in this call.
        revoked_count: u64,
        /// Why the sessions were revoked.
        reason: String,
        /// The session spared from the bulk revocation, if any.
        excluded_session_id: Option<Uuid>,
    },
    /// A superseded refresh token was presented again and the session
    /// was force-revoked. Escalated to security monitoring with the
    /// full session metadata.
    ReuseDetected {
        /// The session as it stood when the reuse was observed.
        session: Session,
    },
}
