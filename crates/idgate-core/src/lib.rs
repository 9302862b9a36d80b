//! # idgate-core
//!
//! Core crate for Idgate. Contains collaborator traits, configuration
//! schemas, domain events, the in-process event bus, and the unified
//! error system.
//!
//! Depends only on `idgate-entity` (pure data models).

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;

pub use error::{AppError, ErrorKind, UserOutcome};
pub use result::AppResult;
