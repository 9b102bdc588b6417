//! # Keyward Core
//!
//! Error taxonomy and contracts shared by the Keyward security substrate.
//! This crate has **no framework dependencies**: the file guard, vault,
//! rate limiter and HTTP wrapper live in their own crates and depend
//! inward on the types defined here.

pub mod error;
pub mod paths;
pub mod secret;

// Re-export key types at crate root for ergonomics
pub use error::{Error, PathError, Result, ValidationError, VaultError};
pub use secret::SecretStore;
