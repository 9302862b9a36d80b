//! Signed token minting, decoding, and hashing.

pub mod claims;
pub mod hash;
pub mod issuer;

pub use claims::{Claims, TokenType};
pub use hash::token_hash;
pub use issuer::{TokenIssuer, TokenPair};
