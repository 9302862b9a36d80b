//! Collaborator traits defined in `idgate-core` and implemented by
//! other crates or by external services at the integration boundary.

pub mod cache;
pub mod directory;
pub mod events;
pub mod repository;
pub mod role_store;

pub use cache::CacheProvider;
pub use directory::{CredentialVerifier, IdentityDirectory};
pub use events::EventPublisher;
pub use repository::SessionRepository;
pub use role_store::RoleStore;
