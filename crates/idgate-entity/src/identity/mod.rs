//! Identity entity (read-only in this core).

pub mod model;

pub use model::Identity;
