//! # idgate-auth
//!
//! The security core of the Idgate platform: session lifecycle,
//! refresh-token rotation with reuse detection, token issuance, and
//! role permission resolution.
//!
//! ## Modules
//!
//! - `jwt` — signed token minting, claim decoding, and token hashing
//! - `password` — Argon2id credential hashing
//! - `permission` — role → permission-set resolution with a cache
//! - `session` — session creation, validation, rotation, revocation

pub mod jwt;
pub mod password;
pub mod permission;
pub mod session;

pub use jwt::{Claims, TokenIssuer, TokenPair, token_hash};
pub use password::PasswordHasher;
pub use permission::{PermissionResolver, ScopeAssignment};
pub use session::{
    IssuedSession, InvalidReason, MemorySessionRepository, RevocationManager, RotationDenied,
    RotationEngine, RotationOutcome, SessionService, SessionValidator, ValidationOutcome,
};
