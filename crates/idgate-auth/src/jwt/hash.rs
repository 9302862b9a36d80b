//! One-way hashing of bearer tokens.
//!
//! Only hashes are ever persisted; a database leak must not yield
//! usable bearer credentials.

use sha2::{Digest, Sha256};

/// Computes the SHA-256 hash of a bearer token as a lowercase hex string.
pub fn token_hash(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}
