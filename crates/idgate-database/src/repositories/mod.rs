//! Concrete repository implementations.

pub mod directory;
pub mod role;
pub mod session;

pub use directory::{PgCredentialVerifier, PgIdentityDirectory};
pub use role::PgRoleStore;
pub use session::PgSessionRepository;
