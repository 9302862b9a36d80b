//! Shared test harness: in-memory store, memory cache, and stub
//! collaborators for the identity directory, credentials, and roles.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use idgate_auth::{
    MemorySessionRepository, PermissionResolver, SessionService, TokenIssuer,
};
use idgate_cache::memory::MemoryCacheProvider;
use idgate_cache::CacheManager;
use idgate_core::config::auth::AuthConfig;
use idgate_core::config::cache::MemoryCacheConfig;
use idgate_core::events::DomainEvent;
use idgate_core::result::AppResult;
use idgate_core::traits::directory::{CredentialVerifier, IdentityDirectory};
use idgate_core::traits::events::EventPublisher;
use idgate_core::traits::repository::SessionRepository;
use idgate_core::traits::role_store::RoleStore;
use idgate_entity::{Identity, Session, SessionMetadata, TokenRotation};

pub const EMAIL: &str = "admin@example.test";
pub const PASSWORD: &str = "correct horse battery staple";

/// Store timeout generous enough that only the stalled-store test hits it.
pub fn store_timeout() -> Duration {
    Duration::from_millis(500)
}

pub fn metadata() -> SessionMetadata {
    SessionMetadata {
        ip_address: "203.0.113.7".into(),
        user_agent: Some("integration-test".into()),
        device_fingerprint: None,
    }
}

#[derive(Debug)]
pub struct StubDirectory {
    identities: Mutex<HashMap<Uuid, Identity>>,
}

impl StubDirectory {
    pub fn with(identity: Identity) -> Self {
        let mut identities = HashMap::new();
        identities.insert(identity.id, identity);
        Self {
            identities: Mutex::new(identities),
        }
    }

    pub fn deactivate(&self, id: Uuid) {
        if let Some(identity) = self.identities.lock().unwrap().get_mut(&id) {
            identity.is_active = false;
        }
    }
}

#[async_trait]
impl IdentityDirectory for StubDirectory {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Identity>> {
        Ok(self.identities.lock().unwrap().get(&id).cloned())
    }
}

/// Accepts exactly one email/password combination.
#[derive(Debug)]
pub struct StubCredentials {
    identity: Identity,
}

impl StubCredentials {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl CredentialVerifier for StubCredentials {
    async fn verify(&self, email: &str, password: &str) -> AppResult<Option<Identity>> {
        if email == EMAIL && password == PASSWORD && self.identity.is_active {
            Ok(Some(self.identity.clone()))
        } else {
            Ok(None)
        }
    }
}

#[derive(Debug)]
pub struct StubRoleStore {
    grants: HashMap<Uuid, BTreeSet<String>>,
    all: BTreeSet<String>,
}

impl StubRoleStore {
    pub fn new(grants: HashMap<Uuid, BTreeSet<String>>, all: BTreeSet<String>) -> Self {
        Self { grants, all }
    }
}

#[async_trait]
impl RoleStore for StubRoleStore {
    async fn list_permission_keys(&self, role_id: Uuid) -> AppResult<BTreeSet<String>> {
        Ok(self.grants.get(&role_id).cloned().unwrap_or_default())
    }

    async fn list_all_permission_keys(&self) -> AppResult<BTreeSet<String>> {
        Ok(self.all.clone())
    }
}

/// Captures every published event for assertions.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: DomainEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// A repository whose hash lookups never complete, for fail-closed
/// timeout coverage. Every other operation panics if reached.
#[derive(Debug)]
pub struct StalledRepository;

#[async_trait]
impl SessionRepository for StalledRepository {
    async fn create(&self, _session: &Session) -> AppResult<()> {
        unreachable!("not exercised")
    }

    async fn find_by_id(&self, _id: Uuid) -> AppResult<Option<Session>> {
        unreachable!("not exercised")
    }

    async fn find_by_token_hash(&self, _token_hash: &str) -> AppResult<Option<Session>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(None)
    }

    async fn find_by_refresh_hash(&self, _refresh_hash: &str) -> AppResult<Option<Session>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(None)
    }

    async fn rotate_tokens(&self, _rotation: &TokenRotation) -> AppResult<bool> {
        unreachable!("not exercised")
    }

    async fn touch_activity(&self, _id: Uuid, _at: DateTime<Utc>) -> AppResult<()> {
        Ok(())
    }

    async fn revoke(&self, _id: Uuid, _reason: &str, _at: DateTime<Utc>) -> AppResult<bool> {
        unreachable!("not exercised")
    }

    async fn revoke_all_for_identity(
        &self,
        _identity_id: Uuid,
        _exclude: Option<Uuid>,
        _reason: &str,
        _at: DateTime<Utc>,
    ) -> AppResult<u64> {
        unreachable!("not exercised")
    }

    async fn list_active_by_identity(&self, _identity_id: Uuid) -> AppResult<Vec<Session>> {
        unreachable!("not exercised")
    }

    async fn set_mfa_verified(
        &self,
        _id: Uuid,
        _method: &str,
        _at: DateTime<Utc>,
    ) -> AppResult<bool> {
        unreachable!("not exercised")
    }
}

/// Forwards to an inner store but never completes the compare-and-swap
/// write, simulating a store that stalls mid-rotation.
#[derive(Debug, Default)]
pub struct HangingCasRepository {
    inner: MemorySessionRepository,
}

#[async_trait]
impl SessionRepository for HangingCasRepository {
    async fn create(&self, session: &Session) -> AppResult<()> {
        self.inner.create(session).await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Session>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> AppResult<Option<Session>> {
        self.inner.find_by_token_hash(token_hash).await
    }

    async fn find_by_refresh_hash(&self, refresh_hash: &str) -> AppResult<Option<Session>> {
        self.inner.find_by_refresh_hash(refresh_hash).await
    }

    async fn rotate_tokens(&self, _rotation: &TokenRotation) -> AppResult<bool> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(false)
    }

    async fn touch_activity(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        self.inner.touch_activity(id, at).await
    }

    async fn revoke(&self, id: Uuid, reason: &str, at: DateTime<Utc>) -> AppResult<bool> {
        self.inner.revoke(id, reason, at).await
    }

    async fn revoke_all_for_identity(
        &self,
        identity_id: Uuid,
        exclude: Option<Uuid>,
        reason: &str,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        self.inner
            .revoke_all_for_identity(identity_id, exclude, reason, at)
            .await
    }

    async fn list_active_by_identity(&self, identity_id: Uuid) -> AppResult<Vec<Session>> {
        self.inner.list_active_by_identity(identity_id).await
    }

    async fn set_mfa_verified(
        &self,
        id: Uuid,
        method: &str,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        self.inner.set_mfa_verified(id, method, at).await
    }
}

/// Forwards to an inner store but fails the first N compare-and-swap
/// writes, simulating lost rotation races.
#[derive(Debug)]
pub struct FlakyRotationRepository {
    inner: MemorySessionRepository,
    failures_remaining: AtomicUsize,
}

impl FlakyRotationRepository {
    pub fn failing(failures: usize) -> Self {
        Self {
            inner: MemorySessionRepository::new(),
            failures_remaining: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl SessionRepository for FlakyRotationRepository {
    async fn create(&self, session: &Session) -> AppResult<()> {
        self.inner.create(session).await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Session>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> AppResult<Option<Session>> {
        self.inner.find_by_token_hash(token_hash).await
    }

    async fn find_by_refresh_hash(&self, refresh_hash: &str) -> AppResult<Option<Session>> {
        self.inner.find_by_refresh_hash(refresh_hash).await
    }

    async fn rotate_tokens(&self, rotation: &TokenRotation) -> AppResult<bool> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Ok(false);
        }
        self.inner.rotate_tokens(rotation).await
    }

    async fn touch_activity(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        self.inner.touch_activity(id, at).await
    }

    async fn revoke(&self, id: Uuid, reason: &str, at: DateTime<Utc>) -> AppResult<bool> {
        self.inner.revoke(id, reason, at).await
    }

    async fn revoke_all_for_identity(
        &self,
        identity_id: Uuid,
        exclude: Option<Uuid>,
        reason: &str,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        self.inner
            .revoke_all_for_identity(identity_id, exclude, reason, at)
            .await
    }

    async fn list_active_by_identity(&self, identity_id: Uuid) -> AppResult<Vec<Session>> {
        self.inner.list_active_by_identity(identity_id).await
    }

    async fn set_mfa_verified(
        &self,
        id: Uuid,
        method: &str,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        self.inner.set_mfa_verified(id, method, at).await
    }
}

/// A live session row with the given hashes, for seeding the store
/// directly when a test needs control over timestamps or state.
pub fn session_record(identity_id: Uuid, token_hash: &str, refresh_hash: &str) -> Session {
    let now = Utc::now();
    Session {
        id: Uuid::new_v4(),
        identity_id,
        token_hash: token_hash.into(),
        refresh_token_hash: refresh_hash.into(),
        previous_refresh_token_hash: None,
        mfa_verified: false,
        mfa_verified_at: None,
        mfa_method: None,
        ip_address: "203.0.113.7".into(),
        user_agent: None,
        device_fingerprint: None,
        is_active: true,
        expires_at: now + chrono::Duration::days(14),
        last_activity_at: now,
        created_at: now,
        revoked_at: None,
        revoked_reason: None,
    }
}

pub fn test_identity() -> Identity {
    Identity {
        id: Uuid::new_v4(),
        email: EMAIL.into(),
        role_id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        scopes: vec!["admin-console".into()],
        is_active: true,
    }
}

pub fn keys(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|s| s.to_string()).collect()
}

pub fn memory_cache() -> CacheManager {
    let provider = MemoryCacheProvider::new(&MemoryCacheConfig::default(), 300);
    CacheManager::from_provider(Arc::new(provider))
}

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "integration-test-secret".into(),
        access_ttl_minutes: 60,
        refresh_ttl_days: 14,
    }
}

pub struct TestHarness {
    pub service: SessionService,
    pub repository: Arc<MemorySessionRepository>,
    pub directory: Arc<StubDirectory>,
    pub events: Arc<RecordingPublisher>,
    pub identity: Identity,
}

/// A service wired with an identity holding `granted` of `all_keys`.
pub fn harness_with_grants(granted: &[&str], all_keys: &[&str]) -> TestHarness {
    let identity = test_identity();
    let repository = Arc::new(MemorySessionRepository::new());
    let directory = Arc::new(StubDirectory::with(identity.clone()));
    let events = Arc::new(RecordingPublisher::default());

    let mut grants = HashMap::new();
    grants.insert(identity.role_id, keys(granted));
    let role_store = Arc::new(StubRoleStore::new(grants, keys(all_keys)));

    let resolver = PermissionResolver::new(role_store, memory_cache(), Duration::from_secs(300));
    let issuer = TokenIssuer::new(&auth_config());

    let service = SessionService::new(
        repository.clone(),
        directory.clone(),
        Arc::new(StubCredentials::new(identity.clone())),
        events.clone(),
        issuer,
        resolver,
    );

    TestHarness {
        service,
        repository,
        directory,
        events,
        identity,
    }
}

pub fn harness() -> TestHarness {
    harness_with_grants(
        &["tenant:read", "session:revoke"],
        &["tenant:read", "tenant:write", "session:revoke"],
    )
}

/// A service over an arbitrary repository implementation.
pub fn service_over(
    repository: Arc<dyn SessionRepository>,
    identity: Identity,
    events: Arc<RecordingPublisher>,
) -> SessionService {
    let mut grants = HashMap::new();
    grants.insert(identity.role_id, keys(&["tenant:read"]));
    let role_store = Arc::new(StubRoleStore::new(grants, keys(&["tenant:read", "x:y"])));
    let resolver = PermissionResolver::new(role_store, memory_cache(), Duration::from_secs(300));

    SessionService::new(
        repository,
        Arc::new(StubDirectory::with(identity.clone())),
        Arc::new(StubCredentials::new(identity)),
        events,
        TokenIssuer::new(&auth_config()),
        resolver,
    )
}
