//! In-memory session repository.
//!
//! Backs tests and single-node deployments without Postgres. Semantics
//! mirror `PgSessionRepository`: hash lookups are index reads, rotation
//! is compare-and-swap, revocation flips state without deleting rows.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use idgate_core::error::AppError;
use idgate_core::result::AppResult;
use idgate_core::traits::repository::SessionRepository;
use idgate_entity::{Session, TokenRotation};

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<Uuid, Session>,
    /// access token hash → session id
    by_token: HashMap<String, Uuid>,
    /// refresh token hash (current and superseded) → session id
    by_refresh: HashMap<String, Uuid>,
}

/// Hash-indexed in-memory session store.
///
/// Revoked sessions stay in every index so that a presentation of their
/// token is answered with the session's state, not with "not found".
#[derive(Debug, Default)]
pub struct MemorySessionRepository {
    inner: Mutex<Inner>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| AppError::internal("Session store lock poisoned"))
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn create(&self, session: &Session) -> AppResult<()> {
        let mut inner = self.lock()?;
        inner.by_token.insert(session.token_hash.clone(), session.id);
        inner
            .by_refresh
            .insert(session.refresh_token_hash.clone(), session.id);
        if let Some(previous) = &session.previous_refresh_token_hash {
            inner.by_refresh.insert(previous.clone(), session.id);
        }
        inner.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Session>> {
        Ok(self.lock()?.sessions.get(&id).cloned())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> AppResult<Option<Session>> {
        let inner = self.lock()?;
        Ok(inner
            .by_token
            .get(token_hash)
            .and_then(|id| inner.sessions.get(id))
            .cloned())
    }

    async fn find_by_refresh_hash(&self, refresh_hash: &str) -> AppResult<Option<Session>> {
        let inner = self.lock()?;
        Ok(inner
            .by_refresh
            .get(refresh_hash)
            .and_then(|id| inner.sessions.get(id))
            .cloned())
    }

    async fn rotate_tokens(&self, rotation: &TokenRotation) -> AppResult<bool> {
        let mut inner = self.lock()?;

        // CAS condition, checked under the lock.
        let applies = inner
            .sessions
            .get(&rotation.session_id)
            .is_some_and(|s| s.is_active && s.refresh_token_hash == rotation.expected_refresh_hash);
        if !applies {
            return Ok(false);
        }

        let (old_token_hash, old_previous) = {
            let session = match inner.sessions.get_mut(&rotation.session_id) {
                Some(session) => session,
                None => return Ok(false),
            };
            let old_token_hash = std::mem::replace(
                &mut session.token_hash,
                rotation.new_token_hash.clone(),
            );
            let old_previous = session.previous_refresh_token_hash.replace(
                std::mem::replace(
                    &mut session.refresh_token_hash,
                    rotation.new_refresh_hash.clone(),
                ),
            );
            session.expires_at = rotation.new_expires_at;
            session.last_activity_at = rotation.rotated_at;
            (old_token_hash, old_previous)
        };

        inner.by_token.remove(&old_token_hash);
        inner
            .by_token
            .insert(rotation.new_token_hash.clone(), rotation.session_id);
        if let Some(stale) = old_previous {
            inner.by_refresh.remove(&stale);
        }
        // The expected hash stays indexed; it is now the superseded one.
        inner
            .by_refresh
            .insert(rotation.new_refresh_hash.clone(), rotation.session_id);

        Ok(true)
    }

    async fn touch_activity(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        if let Some(session) = self.lock()?.sessions.get_mut(&id) {
            session.last_activity_at = at;
        }
        Ok(())
    }

    async fn revoke(&self, id: Uuid, reason: &str, at: DateTime<Utc>) -> AppResult<bool> {
        let mut inner = self.lock()?;
        match inner.sessions.get_mut(&id) {
            Some(session) if session.is_active => {
                session.is_active = false;
                session.revoked_at = Some(at);
                session.revoked_reason = Some(reason.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_identity(
        &self,
        identity_id: Uuid,
        exclude: Option<Uuid>,
        reason: &str,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut inner = self.lock()?;
        let mut revoked = 0u64;
        for session in inner.sessions.values_mut() {
            if session.identity_id != identity_id || !session.is_active {
                continue;
            }
            if exclude == Some(session.id) {
                continue;
            }
            session.is_active = false;
            session.revoked_at = Some(at);
            session.revoked_reason = Some(reason.to_string());
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn list_active_by_identity(&self, identity_id: Uuid) -> AppResult<Vec<Session>> {
        let inner = self.lock()?;
        let mut sessions: Vec<Session> = inner
            .sessions
            .values()
            .filter(|s| s.identity_id == identity_id && s.is_valid())
            .cloned()
            .collect();
        // Newest first, same as the Postgres repository.
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn set_mfa_verified(
        &self,
        id: Uuid,
        method: &str,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut inner = self.lock()?;
        match inner.sessions.get_mut(&id) {
            Some(session) => {
                session.mfa_verified = true;
                session.mfa_verified_at = Some(at);
                session.mfa_method = Some(method.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(identity_id: Uuid, token: &str, refresh: &str) -> Session {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4(),
            identity_id,
            token_hash: token.into(),
            refresh_token_hash: refresh.into(),
            previous_refresh_token_hash: None,
            mfa_verified: false,
            mfa_verified_at: None,
            mfa_method: None,
            ip_address: "10.0.0.1".into(),
            user_agent: None,
            device_fingerprint: None,
            is_active: true,
            expires_at: now + Duration::days(14),
            last_activity_at: now,
            created_at: now,
            revoked_at: None,
            revoked_reason: None,
        }
    }

    #[tokio::test]
    async fn hash_lookups_after_create() {
        let repo = MemorySessionRepository::new();
        let s = session(Uuid::new_v4(), "at1", "rt1");
        repo.create(&s).await.expect("create");

        let by_token = repo.find_by_token_hash("at1").await.expect("find");
        assert_eq!(by_token.map(|s| s.id), Some(s.id));
        let by_refresh = repo.find_by_refresh_hash("rt1").await.expect("find");
        assert_eq!(by_refresh.map(|s| s.id), Some(s.id));
        assert!(repo.find_by_token_hash("missing").await.expect("find").is_none());
    }

    #[tokio::test]
    async fn rotation_is_compare_and_swap() {
        let repo = MemorySessionRepository::new();
        let s = session(Uuid::new_v4(), "at1", "rt1");
        repo.create(&s).await.expect("create");

        let rotation = TokenRotation {
            session_id: s.id,
            expected_refresh_hash: "rt1".into(),
            new_token_hash: "at2".into(),
            new_refresh_hash: "rt2".into(),
            new_expires_at: Utc::now() + Duration::days(14),
            rotated_at: Utc::now(),
        };
        assert!(repo.rotate_tokens(&rotation).await.expect("rotate"));

        // Same expectation again: the CAS condition no longer holds.
        assert!(!repo.rotate_tokens(&rotation).await.expect("rotate"));

        let rotated = repo
            .find_by_refresh_hash("rt2")
            .await
            .expect("find")
            .expect("session");
        assert_eq!(rotated.token_hash, "at2");
        assert_eq!(rotated.previous_refresh_token_hash.as_deref(), Some("rt1"));

        // The superseded hash still resolves to the same session.
        let by_old = repo
            .find_by_refresh_hash("rt1")
            .await
            .expect("find")
            .expect("session");
        assert_eq!(by_old.id, s.id);
        // The old access token hash does not.
        assert!(repo.find_by_token_hash("at1").await.expect("find").is_none());
    }

    #[tokio::test]
    async fn revoked_session_stays_findable() {
        let repo = MemorySessionRepository::new();
        let s = session(Uuid::new_v4(), "at1", "rt1");
        repo.create(&s).await.expect("create");

        assert!(repo.revoke(s.id, "logout", Utc::now()).await.expect("revoke"));
        // Second revocation performs no transition.
        assert!(!repo.revoke(s.id, "logout", Utc::now()).await.expect("revoke"));

        let found = repo
            .find_by_token_hash("at1")
            .await
            .expect("find")
            .expect("session");
        assert!(!found.is_active);
        assert_eq!(found.revoked_reason.as_deref(), Some("logout"));
    }

    #[tokio::test]
    async fn bulk_revocation_counts_and_excludes() {
        let repo = MemorySessionRepository::new();
        let identity_id = Uuid::new_v4();
        let keep = session(identity_id, "at1", "rt1");
        let drop1 = session(identity_id, "at2", "rt2");
        let drop2 = session(identity_id, "at3", "rt3");
        let other = session(Uuid::new_v4(), "at4", "rt4");
        for s in [&keep, &drop1, &drop2, &other] {
            repo.create(s).await.expect("create");
        }

        let count = repo
            .revoke_all_for_identity(identity_id, Some(keep.id), "password changed", Utc::now())
            .await
            .expect("revoke all");
        assert_eq!(count, 2);

        let active = repo
            .list_active_by_identity(identity_id)
            .await
            .expect("list");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, keep.id);

        // Unrelated identity untouched, repeat call revokes nothing.
        assert_eq!(
            repo.list_active_by_identity(other.identity_id)
                .await
                .expect("list")
                .len(),
            1
        );
        let again = repo
            .revoke_all_for_identity(identity_id, Some(keep.id), "password changed", Utc::now())
            .await
            .expect("revoke all");
        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn active_sessions_listed_newest_first() {
        let repo = MemorySessionRepository::new();
        let identity_id = Uuid::new_v4();
        let mut older = session(identity_id, "at1", "rt1");
        older.created_at = Utc::now() - Duration::hours(2);
        let mut newer = session(identity_id, "at2", "rt2");
        newer.created_at = Utc::now() - Duration::minutes(5);
        repo.create(&older).await.expect("create");
        repo.create(&newer).await.expect("create");

        let active = repo
            .list_active_by_identity(identity_id)
            .await
            .expect("list");
        let ids: Vec<Uuid> = active.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[tokio::test]
    async fn mfa_flag_set_and_unknown_session_reported() {
        let repo = MemorySessionRepository::new();
        let s = session(Uuid::new_v4(), "at1", "rt1");
        repo.create(&s).await.expect("create");

        assert!(repo
            .set_mfa_verified(s.id, "totp", Utc::now())
            .await
            .expect("set mfa"));
        let found = repo.find_by_id(s.id).await.expect("find").expect("session");
        assert!(found.mfa_verified);
        assert_eq!(found.mfa_method.as_deref(), Some("totp"));

        assert!(!repo
            .set_mfa_verified(Uuid::new_v4(), "totp", Utc::now())
            .await
            .expect("set mfa"));
    }
}
