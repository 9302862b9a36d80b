//! Postgres-backed identity directory and credential verifier.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use idgate_auth::PasswordHasher;
use idgate_core::error::{AppError, ErrorKind};
use idgate_core::result::AppResult;
use idgate_core::traits::directory::{CredentialVerifier, IdentityDirectory};
use idgate_entity::Identity;

const IDENTITY_COLUMNS: &str = "id, email, role_id, tenant_id, scopes, is_active";

/// Read-only identity lookups against the identities table.
#[derive(Debug, Clone)]
pub struct PgIdentityDirectory {
    pool: PgPool,
}

impl PgIdentityDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityDirectory for PgIdentityDirectory {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Identity>> {
        sqlx::query_as::<_, Identity>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find identity", e))
    }
}

/// Email + password verification against stored Argon2id hashes.
///
/// Every non-match answers `Ok(None)`: unknown email, wrong password,
/// and deactivated identity are indistinguishable to the caller.
#[derive(Debug, Clone)]
pub struct PgCredentialVerifier {
    pool: PgPool,
    hasher: PasswordHasher,
}

impl PgCredentialVerifier {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            hasher: PasswordHasher::new(),
        }
    }
}

#[async_trait]
impl CredentialVerifier for PgCredentialVerifier {
    async fn verify(&self, email: &str, password: &str) -> AppResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityWithSecret>(&format!(
            "SELECT {IDENTITY_COLUMNS}, password_hash FROM identities WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to look up credentials", e)
        })?;

        let Some(row) = row else {
            debug!("Credential check for unknown email");
            return Ok(None);
        };

        if !row.identity.is_active {
            debug!(identity_id = %row.identity.id, "Credential check for inactive identity");
            return Ok(None);
        }

        if self.hasher.verify_password(password, &row.password_hash)? {
            Ok(Some(row.identity))
        } else {
            debug!(identity_id = %row.identity.id, "Password mismatch");
            Ok(None)
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct IdentityWithSecret {
    #[sqlx(flatten)]
    identity: Identity,
    password_hash: String,
}
