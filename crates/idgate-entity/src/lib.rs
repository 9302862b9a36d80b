//! # idgate-entity
//!
//! Domain entity models for Idgate. Every struct in this crate represents
//! a database table row or a domain value object. All entities derive
//! `Debug`, `Clone`, `Serialize`, `Deserialize`, and database entities
//! additionally derive `sqlx::FromRow`.
//!
//! This crate has **no** internal dependencies on other Idgate crates.

pub mod identity;
pub mod permission;
pub mod principal;
pub mod session;

pub use identity::Identity;
pub use permission::PermissionClaim;
pub use principal::AuthenticatedPrincipal;
pub use session::{Session, SessionMetadata, TokenRotation};
