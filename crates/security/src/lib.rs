//! Security components for Keyward.
//!
//! Provides:
//! - **Path guard**: Confine file operations to a base directory
//! - **Vault**: Encrypt/decrypt API tokens at rest with AES-256-GCM
//! - **Rate limiter**: Keyed sliding-window admission control
//! - **Validation**: URL, ticket-key, API-key and path pre-checks
//! - **Audit logging**: Structured security event logging

pub mod audit;
pub mod path;
pub mod ratelimit;
pub mod secrets;
pub mod validation;

pub use audit::{AuditEntry, AuditEvent, AuditLogger, AuditOutcome, AuditSink, TracingSink};
pub use keyward_core::SecretStore;
pub use path::{PathGuard, sanitize};
pub use ratelimit::RateLimiter;
pub use secrets::Vault;
