//! Error types for the Keyward substrate.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each component has its own error enum; [`Error`] aggregates them for
//! callers that drive more than one component.

use std::path::PathBuf;

use thiserror::Error;

/// The top-level error type for all Keyward operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- File access ---
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    // --- Credential vault ---
    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    // --- Input validation ---
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // --- Outbound HTTP ---
    #[error("Rate limit exceeded for {key}")]
    RateLimitExceeded { key: String },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Component errors ---

/// Failures of the path-sanitizing file accessor.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("Invalid path: {reason}")]
    InvalidPath { reason: String },

    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PathError {
    /// True when the path was rejected for escaping its base directory.
    pub fn is_traversal(&self) -> bool {
        matches!(self, PathError::PathTraversal { .. })
    }
}

/// Failures of the credential vault.
///
/// `Decrypt` carries no detail: a wrong key, a flipped bit and a
/// forged record all look the same to the caller.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Failed to initialize encryption key: {reason}")]
    KeyInit { reason: String },

    #[error("Failed to read encryption key: {reason}")]
    KeyRead { reason: String },

    #[error("Encryption failed: {reason}")]
    Encrypt { reason: String },

    #[error("Could not decrypt secret")]
    Decrypt,

    #[error("Secret not found: {name}")]
    SecretNotFound { name: String },

    #[error("Stored record for '{name}' is malformed")]
    MalformedRecord { name: String },

    #[error("Failed to persist secrets at {}: {reason}", path.display())]
    Persist { path: PathBuf, reason: String },
}

/// Rejected user-supplied input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid ticket key format: {0}. Expected format: PROJECT-123")]
    InvalidTicketKey(String),

    #[error("Invalid API key: {0}")]
    InvalidApiKey(&'static str),

    #[error("Invalid file path: {0}")]
    InvalidFilePath(&'static str),
}
