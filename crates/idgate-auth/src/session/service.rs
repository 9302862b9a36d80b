//! The session service facade, the single entry point for callers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use idgate_core::error::AppError;
use idgate_core::events::{DomainEvent, EventPayload, SessionEvent};
use idgate_core::result::AppResult;
use idgate_core::traits::directory::{CredentialVerifier, IdentityDirectory};
use idgate_core::traits::events::EventPublisher;
use idgate_core::traits::repository::SessionRepository;
use idgate_entity::{AuthenticatedPrincipal, Identity, PermissionClaim, Session, SessionMetadata};

use crate::jwt::{TokenIssuer, TokenType, token_hash};
use crate::permission::PermissionResolver;

use super::revocation::RevocationManager;
use super::rotation::{RotationEngine, RotationOutcome};
use super::validator::{SessionValidator, ValidationOutcome};

/// The generic message every credential and token failure collapses to.
/// Distinguishing unknown emails from wrong passwords or revoked
/// sessions would let a caller enumerate accounts.
const GENERIC_AUTH_FAILURE: &str = "Authentication failed";

/// What a successful login or session issuance hands back to the caller.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IssuedSession {
    pub session_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry of the access token, not of the session.
    pub expires_at: DateTime<Utc>,
}

/// Facade over issuance, validation, rotation, and revocation.
///
/// All session state changes go through the store before any event is
/// published, so consumers observing events always see durable state.
#[derive(Clone)]
pub struct SessionService {
    repository: Arc<dyn SessionRepository>,
    directory: Arc<dyn IdentityDirectory>,
    credentials: Arc<dyn CredentialVerifier>,
    events: Arc<dyn EventPublisher>,
    issuer: TokenIssuer,
    resolver: PermissionResolver,
    validator: SessionValidator,
    rotation: RotationEngine,
    revocation: RevocationManager,
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService").finish_non_exhaustive()
    }
}

impl SessionService {
    pub fn new(
        repository: Arc<dyn SessionRepository>,
        directory: Arc<dyn IdentityDirectory>,
        credentials: Arc<dyn CredentialVerifier>,
        events: Arc<dyn EventPublisher>,
        issuer: TokenIssuer,
        resolver: PermissionResolver,
    ) -> Self {
        let validator = SessionValidator::new(Arc::clone(&repository));
        let rotation = RotationEngine::new(
            Arc::clone(&repository),
            Arc::clone(&directory),
            resolver.clone(),
            issuer.clone(),
            Arc::clone(&events),
        );
        let revocation = RevocationManager::new(Arc::clone(&repository), Arc::clone(&events));

        Self {
            repository,
            directory,
            credentials,
            events,
            issuer,
            resolver,
            validator,
            rotation,
            revocation,
        }
    }

    /// Authenticate credentials and open a session.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        metadata: SessionMetadata,
    ) -> AppResult<IssuedSession> {
        let identity = self
            .credentials
            .verify(email, password)
            .await?
            .ok_or_else(|| AppError::authentication(GENERIC_AUTH_FAILURE))?;

        self.open_session(identity, metadata, false, None).await
    }

    /// Open a session for an already-authenticated identity, e.g. after
    /// an SSO or MFA flow completed elsewhere.
    pub async fn issue_session(
        &self,
        identity_id: Uuid,
        metadata: SessionMetadata,
        mfa_verified: bool,
        mfa_method: Option<String>,
    ) -> AppResult<IssuedSession> {
        let identity = match self.directory.find_by_id(identity_id).await? {
            Some(identity) if identity.is_active => identity,
            _ => {
                debug!(identity_id = %identity_id, "Issuance refused for missing or inactive identity");
                return Err(AppError::authentication(GENERIC_AUTH_FAILURE));
            }
        };

        self.open_session(identity, metadata, mfa_verified, mfa_method)
            .await
    }

    async fn open_session(
        &self,
        identity: Identity,
        metadata: SessionMetadata,
        mfa_verified: bool,
        mfa_method: Option<String>,
    ) -> AppResult<IssuedSession> {
        let claim = self.resolver.resolve(identity.role_id).await?;
        let session_id = Uuid::new_v4();
        let pair = self.issuer.issue(&identity, &claim, session_id)?;

        let now = Utc::now();
        let session = Session {
            id: session_id,
            identity_id: identity.id,
            token_hash: token_hash(&pair.access_token),
            refresh_token_hash: token_hash(&pair.refresh_token),
            previous_refresh_token_hash: None,
            mfa_verified,
            mfa_verified_at: mfa_verified.then_some(now),
            mfa_method,
            ip_address: metadata.ip_address,
            user_agent: metadata.user_agent,
            device_fingerprint: metadata.device_fingerprint,
            is_active: true,
            expires_at: pair.refresh_expires_at,
            last_activity_at: now,
            created_at: now,
            revoked_at: None,
            revoked_reason: None,
        };

        self.repository.create(&session).await?;

        info!(
            identity_id = %identity.id,
            session_id = %session_id,
            ip_address = %session.ip_address,
            "Session created"
        );
        self.events.publish(DomainEvent::new(EventPayload::Session(
            SessionEvent::Created {
                session_id,
                identity_id: identity.id,
                ip_address: session.ip_address.clone(),
            },
        )));

        Ok(IssuedSession {
            session_id,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_at: pair.access_expires_at,
        })
    }

    /// Validate the hash of a presented access token. Fails closed on
    /// store timeouts and errors.
    pub async fn validate_access_token(
        &self,
        token_hash: &str,
        store_timeout: Duration,
    ) -> ValidationOutcome {
        self.validator.validate(token_hash, store_timeout).await
    }

    /// Verify a raw access token end to end and produce the typed
    /// principal downstream authorization checks consume.
    pub async fn authenticate(
        &self,
        access_token: &str,
        store_timeout: Duration,
    ) -> AppResult<AuthenticatedPrincipal> {
        let claims = self.issuer.decode(access_token, TokenType::Access)?;

        let outcome = self
            .validator
            .validate(&token_hash(access_token), store_timeout)
            .await;
        let (session_id, mfa_verified, expires_at) = match outcome {
            ValidationOutcome::Valid {
                session_id,
                mfa_verified,
                expires_at,
                ..
            } => (session_id, mfa_verified, expires_at),
            ValidationOutcome::Invalid { reason } => {
                debug!(?reason, "Access token rejected");
                return Err(AppError::authentication(GENERIC_AUTH_FAILURE));
            }
        };

        let role_id = claims
            .role_id
            .ok_or_else(|| AppError::authentication(GENERIC_AUTH_FAILURE))?;
        let tenant_id = claims
            .tenant_id
            .ok_or_else(|| AppError::authentication(GENERIC_AUTH_FAILURE))?;

        Ok(AuthenticatedPrincipal {
            identity_id: claims.sub,
            session_id,
            role_id,
            tenant_id,
            permissions: PermissionClaim::from_claim_values(&claims.permissions),
            scopes: claims.scopes,
            mfa_verified,
            expires_at,
        })
    }

    /// Rotate a refresh token, presented as its SHA-256 hash.
    pub async fn rotate(
        &self,
        presented_refresh_hash: &str,
        store_timeout: Duration,
    ) -> AppResult<RotationOutcome> {
        self.rotation.rotate(presented_refresh_hash, store_timeout).await
    }

    /// Idempotent logout. `false` only for unknown sessions.
    pub async fn logout(&self, session_id: Uuid) -> AppResult<bool> {
        self.revocation.logout(session_id).await
    }

    /// Revoke every active session of an identity except `exclude`.
    pub async fn revoke_all_sessions(
        &self,
        identity_id: Uuid,
        exclude: Option<Uuid>,
        reason: &str,
    ) -> AppResult<u64> {
        self.revocation.revoke_all(identity_id, exclude, reason).await
    }

    /// All currently valid sessions of an identity, for the "active
    /// devices" view.
    pub async fn list_active_sessions(&self, identity_id: Uuid) -> AppResult<Vec<Session>> {
        self.repository.list_active_by_identity(identity_id).await
    }

    /// Record MFA verification on a session.
    pub async fn mark_mfa_verified(&self, session_id: Uuid, method: &str) -> AppResult<()> {
        if !self
            .repository
            .set_mfa_verified(session_id, method, Utc::now())
            .await?
        {
            return Err(AppError::not_found("Session not found"));
        }
        info!(session_id = %session_id, method, "Session MFA verified");
        Ok(())
    }

    /// The resolver, for wiring cache invalidation in the binary.
    pub fn permission_resolver(&self) -> &PermissionResolver {
        &self.resolver
    }
}
