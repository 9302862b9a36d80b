//! Permission claim value objects.

pub mod claim;

pub use claim::PermissionClaim;
