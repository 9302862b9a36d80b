//! Session entity and related value objects.

pub mod model;

pub use model::{Session, SessionMetadata, TokenRotation};
