//! Cache-aside role → permission-claim resolution.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use idgate_cache::{CacheManager, keys};
use idgate_core::events::{DomainEvent, EventPayload, RoleEvent};
use idgate_core::result::AppResult;
use idgate_core::traits::cache::CacheProvider;
use idgate_core::traits::role_store::RoleStore;
use idgate_entity::PermissionClaim;

/// A `scope → role` pairing on an identity, used when one identity
/// holds different roles in different sub-services.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ScopeAssignment {
    /// The sub-service scope the role applies to.
    pub scope: String,
    /// The role held within that scope.
    pub role_id: Uuid,
}

/// Resolves a role to its permission claim, caching the result.
///
/// The role store is the source of truth; the cache holds only derived
/// claims and is invalidated by `role.permissions.changed` events, not
/// by polling. A cache failure on the read path degrades to a store
/// lookup, never to a resolution failure.
#[derive(Clone)]
pub struct PermissionResolver {
    cache: CacheManager,
    role_store: Arc<dyn RoleStore>,
    cache_ttl: Duration,
}

impl std::fmt::Debug for PermissionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionResolver")
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

impl PermissionResolver {
    /// Creates a resolver over a role store and a cache.
    pub fn new(role_store: Arc<dyn RoleStore>, cache: CacheManager, cache_ttl: Duration) -> Self {
        Self {
            cache,
            role_store,
            cache_ttl,
        }
    }

    /// Resolves the permission claim for a role.
    ///
    /// When the role's grants cover every permission key in the system,
    /// the claim collapses to the wildcard so its serialized form stays
    /// bounded no matter how many permissions exist.
    pub async fn resolve(&self, role_id: Uuid) -> AppResult<PermissionClaim> {
        let key = keys::role_permissions(role_id);

        match self.cache.get_json::<PermissionClaim>(&key).await {
            Ok(Some(claim)) => {
                debug!(role_id = %role_id, "Permission claim served from cache");
                return Ok(claim);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(role_id = %role_id, error = %e, "Permission cache read failed, falling back to role store");
            }
        }

        let granted = self.role_store.list_permission_keys(role_id).await?;
        let total = self.role_store.list_all_permission_keys().await?.len();
        let claim = PermissionClaim::from_keys(granted, total);

        if let Err(e) = self.cache.set_json(&key, &claim, self.cache_ttl).await {
            warn!(role_id = %role_id, error = %e, "Failed to cache resolved permission claim");
        }

        Ok(claim)
    }

    /// Resolves the claims for a set of scope assignments, fanning out
    /// to the role store once per distinct role.
    pub async fn resolve_for_assignments(
        &self,
        assignments: &[ScopeAssignment],
    ) -> AppResult<BTreeMap<String, PermissionClaim>> {
        let mut by_role: BTreeMap<Uuid, PermissionClaim> = BTreeMap::new();
        for assignment in assignments {
            if !by_role.contains_key(&assignment.role_id) {
                let claim = self.resolve(assignment.role_id).await?;
                by_role.insert(assignment.role_id, claim);
            }
        }

        let mut by_scope = BTreeMap::new();
        for assignment in assignments {
            if let Some(claim) = by_role.get(&assignment.role_id) {
                by_scope.insert(assignment.scope.clone(), claim.clone());
            }
        }
        Ok(by_scope)
    }

    /// Drops the cached claim for a role. The next resolution rebuilds
    /// it from the role store.
    pub async fn invalidate(&self, role_id: Uuid) -> AppResult<()> {
        let key = keys::role_permissions(role_id);
        self.cache.delete(&key).await?;
        debug!(role_id = %role_id, "Invalidated cached permission claim");
        Ok(())
    }

    /// Consumes role events from the bus and invalidates affected cache
    /// entries. Runs until the sending side of the channel is dropped.
    pub async fn run_invalidation(&self, mut events: broadcast::Receiver<DomainEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let EventPayload::Role(RoleEvent::PermissionsChanged { role_id }) =
                        event.payload
                    {
                        if let Err(e) = self.invalidate(role_id).await {
                            warn!(role_id = %role_id, error = %e, "Permission cache invalidation failed");
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // Missed invalidations are unrecoverable individually;
                    // entries still expire by TTL.
                    warn!(missed, "Permission invalidator lagged behind the event bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use idgate_cache::memory::MemoryCacheProvider;
    use idgate_core::config::cache::MemoryCacheConfig;

    #[derive(Debug)]
    struct CountingRoleStore {
        grants: BTreeMap<Uuid, BTreeSet<String>>,
        all: BTreeSet<String>,
        lookups: AtomicUsize,
    }

    impl CountingRoleStore {
        fn new(grants: BTreeMap<Uuid, BTreeSet<String>>, all: BTreeSet<String>) -> Self {
            Self {
                grants,
                all,
                lookups: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RoleStore for CountingRoleStore {
        async fn list_permission_keys(&self, role_id: Uuid) -> AppResult<BTreeSet<String>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.grants.get(&role_id).cloned().unwrap_or_default())
        }

        async fn list_all_permission_keys(&self) -> AppResult<BTreeSet<String>> {
            Ok(self.all.clone())
        }
    }

    fn keys_of(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn memory_cache() -> CacheManager {
        let provider = MemoryCacheProvider::new(&MemoryCacheConfig::default(), 300);
        CacheManager::from_provider(Arc::new(provider))
    }

    fn resolver(store: Arc<CountingRoleStore>) -> PermissionResolver {
        PermissionResolver::new(store, memory_cache(), Duration::from_secs(300))
    }

    #[tokio::test]
    async fn second_resolution_is_served_from_cache() {
        let role_id = Uuid::new_v4();
        let mut grants = BTreeMap::new();
        grants.insert(role_id, keys_of(&["tenant:read"]));
        let store = Arc::new(CountingRoleStore::new(
            grants,
            keys_of(&["tenant:read", "tenant:write"]),
        ));
        let resolver = resolver(store.clone());

        let first = resolver.resolve(role_id).await.expect("resolve");
        let second = resolver.resolve(role_id).await.expect("resolve");

        assert_eq!(first, second);
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn full_grant_set_collapses_to_wildcard() {
        let role_id = Uuid::new_v4();
        let all = keys_of(&["a:read", "a:write", "b:read"]);
        let mut grants = BTreeMap::new();
        grants.insert(role_id, all.clone());
        let store = Arc::new(CountingRoleStore::new(grants, all));
        let resolver = resolver(store);

        let claim = resolver.resolve(role_id).await.expect("resolve");
        assert_eq!(claim, PermissionClaim::Wildcard);
        assert_eq!(claim.claim_values(), vec!["*".to_string()]);
    }

    #[tokio::test]
    async fn invalidation_forces_store_refetch() {
        let role_id = Uuid::new_v4();
        let mut grants = BTreeMap::new();
        grants.insert(role_id, keys_of(&["tenant:read"]));
        let store = Arc::new(CountingRoleStore::new(grants, keys_of(&["tenant:read", "x:y"])));
        let resolver = resolver(store.clone());

        resolver.resolve(role_id).await.expect("resolve");
        resolver.invalidate(role_id).await.expect("invalidate");
        resolver.resolve(role_id).await.expect("resolve");

        assert_eq!(store.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn assignments_fan_out_once_per_distinct_role() {
        let shared_role = Uuid::new_v4();
        let other_role = Uuid::new_v4();
        let mut grants = BTreeMap::new();
        grants.insert(shared_role, keys_of(&["billing:read"]));
        grants.insert(other_role, keys_of(&["support:read"]));
        let store = Arc::new(CountingRoleStore::new(
            grants,
            keys_of(&["billing:read", "support:read", "x:y"]),
        ));
        let resolver = resolver(store.clone());

        let assignments = vec![
            ScopeAssignment {
                scope: "billing".into(),
                role_id: shared_role,
            },
            ScopeAssignment {
                scope: "reporting".into(),
                role_id: shared_role,
            },
            ScopeAssignment {
                scope: "support".into(),
                role_id: other_role,
            },
        ];

        let resolved = resolver
            .resolve_for_assignments(&assignments)
            .await
            .expect("resolve assignments");

        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved["billing"], resolved["reporting"]);
        assert_eq!(store.lookups.load(Ordering::SeqCst), 2);
    }
}
