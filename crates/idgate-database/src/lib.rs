//! # idgate-database
//!
//! PostgreSQL connection management, migrations, and the concrete
//! session, identity, and role repositories.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::{PgCredentialVerifier, PgIdentityDirectory, PgRoleStore, PgSessionRepository};
