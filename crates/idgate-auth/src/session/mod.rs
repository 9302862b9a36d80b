//! Session lifecycle: creation, validation, rotation, revocation.

pub mod memory;
pub mod revocation;
pub mod rotation;
pub mod service;
pub mod validator;

pub use memory::MemorySessionRepository;
pub use revocation::RevocationManager;
pub use rotation::{RotationDenied, RotationEngine, RotationOutcome};
pub use service::{IssuedSession, SessionService};
pub use validator::{InvalidReason, SessionValidator, ValidationOutcome};
