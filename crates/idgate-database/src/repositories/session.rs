//! Postgres session repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use idgate_core::error::{AppError, ErrorKind};
use idgate_core::result::AppResult;
use idgate_core::traits::SessionRepository;
use idgate_entity::{Session, TokenRotation};

/// Session repository backed by PostgreSQL.
///
/// Rotation and bulk revocation are expressed as single conditional
/// UPDATE statements so that concurrent callers are serialized by the
/// database, not by application-level locking.
#[derive(Debug, Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    /// Create a new session repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn create(&self, session: &Session) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO sessions (id, identity_id, token_hash, refresh_token_hash, \
             previous_refresh_token_hash, mfa_verified, mfa_verified_at, mfa_method, \
             ip_address, user_agent, device_fingerprint, is_active, expires_at, \
             last_activity_at, created_at, revoked_at, revoked_reason) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
        )
        .bind(session.id)
        .bind(session.identity_id)
        .bind(&session.token_hash)
        .bind(&session.refresh_token_hash)
        .bind(&session.previous_refresh_token_hash)
        .bind(session.mfa_verified)
        .bind(session.mfa_verified_at)
        .bind(&session.mfa_method)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(&session.device_fingerprint)
        .bind(session.is_active)
        .bind(session.expires_at)
        .bind(session.last_activity_at)
        .bind(session.created_at)
        .bind(session.revoked_at)
        .bind(&session.revoked_reason)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create session", e))?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Session>> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find session", e))
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> AppResult<Option<Session>> {
        // Revoked sessions must still be found so a presentation of
        // their token is answered with the session state, not NOT_FOUND.
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE token_hash = $1")
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find session by token", e)
        })
    }

    async fn find_by_refresh_hash(&self, refresh_hash: &str) -> AppResult<Option<Session>> {
        sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions \
             WHERE refresh_token_hash = $1 OR previous_refresh_token_hash = $1",
        )
        .bind(refresh_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                "Failed to find session by refresh token",
                e,
            )
        })
    }

    async fn rotate_tokens(&self, rotation: &TokenRotation) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE sessions SET \
                 previous_refresh_token_hash = refresh_token_hash, \
                 refresh_token_hash = $3, \
                 token_hash = $4, \
                 expires_at = $5, \
                 last_activity_at = $6 \
             WHERE id = $1 AND refresh_token_hash = $2 AND is_active",
        )
        .bind(rotation.session_id)
        .bind(&rotation.expected_refresh_hash)
        .bind(&rotation.new_refresh_hash)
        .bind(&rotation.new_token_hash)
        .bind(rotation.new_expires_at)
        .bind(rotation.rotated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to rotate tokens", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn touch_activity(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE sessions SET last_activity_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to update last activity", e)
            })?;
        Ok(())
    }

    async fn revoke(&self, id: Uuid, reason: &str, at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE sessions SET is_active = FALSE, revoked_at = $2, revoked_reason = $3 \
             WHERE id = $1 AND is_active",
        )
        .bind(id)
        .bind(at)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to revoke session", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_all_for_identity(
        &self,
        identity_id: Uuid,
        exclude: Option<Uuid>,
        reason: &str,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE sessions SET is_active = FALSE, revoked_at = $3, revoked_reason = $4 \
             WHERE identity_id = $1 AND is_active AND ($2::uuid IS NULL OR id <> $2)",
        )
        .bind(identity_id)
        .bind(exclude)
        .bind(at)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to revoke identity sessions", e)
        })?;

        Ok(result.rows_affected())
    }

    async fn list_active_by_identity(&self, identity_id: Uuid) -> AppResult<Vec<Session>> {
        sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions \
             WHERE identity_id = $1 AND is_active AND expires_at > NOW() \
             ORDER BY created_at DESC",
        )
        .bind(identity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list active sessions", e)
        })
    }

    async fn set_mfa_verified(
        &self,
        id: Uuid,
        method: &str,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE sessions SET mfa_verified = TRUE, mfa_verified_at = $2, mfa_method = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .bind(method)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to set MFA verification", e)
        })?;

        Ok(result.rows_affected() > 0)
    }
}
