//! Postgres-backed role permission store.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use idgate_core::error::{AppError, ErrorKind};
use idgate_core::result::AppResult;
use idgate_core::traits::role_store::RoleStore;

/// Permission grant lookups against the role_permissions join table.
#[derive(Debug, Clone)]
pub struct PgRoleStore {
    pool: PgPool,
}

impl PgRoleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleStore for PgRoleStore {
    async fn list_permission_keys(&self, role_id: Uuid) -> AppResult<BTreeSet<String>> {
        let keys: Vec<String> = sqlx::query_scalar(
            "SELECT p.key FROM permissions p \
             JOIN role_permissions rp ON rp.permission_id = p.id \
             WHERE rp.role_id = $1",
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list role permissions", e)
        })?;

        Ok(keys.into_iter().collect())
    }

    async fn list_all_permission_keys(&self) -> AppResult<BTreeSet<String>> {
        let keys: Vec<String> = sqlx::query_scalar("SELECT key FROM permissions")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to list permissions", e)
            })?;

        Ok(keys.into_iter().collect())
    }
}
