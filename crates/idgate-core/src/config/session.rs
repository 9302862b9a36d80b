//! Session lifecycle configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Session store and permission cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Default deadline for session store operations in milliseconds.
    /// Validation and rotation fail closed when it elapses.
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,
    /// TTL for cached role permission sets in hours. Invalidation
    /// events shorten this in practice; the TTL only bounds staleness
    /// when an event is lost.
    #[serde(default = "default_permission_cache_ttl")]
    pub permission_cache_ttl_hours: u64,
}

impl SessionConfig {
    /// The store deadline as a [`Duration`].
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// The permission cache TTL as a [`Duration`].
    pub fn permission_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.permission_cache_ttl_hours * 3600)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: default_store_timeout(),
            permission_cache_ttl_hours: default_permission_cache_ttl(),
        }
    }
}

fn default_store_timeout() -> u64 {
    2_000
}

fn default_permission_cache_ttl() -> u64 {
    6
}
