//! Role permission resolution with a cache-aside read path.

pub mod resolver;

pub use resolver::{PermissionResolver, ScopeAssignment};
