//! Cache key builders for all Idgate cache entries.
//!
//! Centralising key construction prevents typos and makes it easy to
//! find every key the application uses.

use uuid::Uuid;

/// Prefix applied to all Idgate cache keys.
const PREFIX: &str = "idgate";

/// Cache key for the resolved permission claim of a role.
pub fn role_permissions(role_id: Uuid) -> String {
    format!("{PREFIX}:perm:role:{role_id}")
}
