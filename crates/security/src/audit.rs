//! Audit trail — structured records of security-relevant outcomes.
//!
//! The library components return errors and never log on their own behalf;
//! the calling layer records what happened here and decides where it goes
//! through [`AuditSink`]s.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use keyward_core::{Error, PathError, VaultError};
use serde::{Deserialize, Serialize};

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    /// Who triggered the event (command name, integration name).
    pub actor: String,
    pub outcome: AuditOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Types of auditable events. Never carries secret values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A secret was written to the vault
    SecretStored { name: String },
    /// A secret was decrypted and handed to a caller
    SecretRead { name: String },
    /// A secret was removed from the vault
    SecretDeleted { name: String },
    /// A path was refused by the path guard
    PathDenied { path: String },
    /// An outbound request was refused by the rate limiter
    RateLimited { key: String },
    /// The configuration file was written
    ConfigWritten { path: String },
}

/// Outcome of an audited operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

impl AuditOutcome {
    /// Classify a failed operation: policy refusals are `Denied`,
    /// everything else is `Failure`.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Path(PathError::PathTraversal { .. }) | Error::RateLimitExceeded { .. } => {
                AuditOutcome::Denied
            }
            Error::Vault(VaultError::Decrypt) => AuditOutcome::Denied,
            _ => AuditOutcome::Failure,
        }
    }
}

/// Trait for audit log sinks (where events are written).
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry);
}

/// In-memory audit logger that keeps every entry and forwards it to sinks.
pub struct AuditLogger {
    entries: Mutex<Vec<AuditEntry>>,
    sinks: Vec<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("entry_count", &self.count())
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    /// Create a new audit logger with no sinks.
    pub fn new() -> Self {
        Self::with_sinks(Vec::new())
    }

    /// Create a new audit logger with the given sinks.
    pub fn with_sinks(sinks: Vec<Box<dyn AuditSink>>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            sinks,
        }
    }

    /// Record an audit event.
    pub fn log(
        &self,
        event: AuditEvent,
        actor: &str,
        outcome: AuditOutcome,
        details: Option<String>,
    ) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            event,
            actor: actor.into(),
            outcome,
            details,
        };

        for sink in &self.sinks {
            sink.record(&entry);
        }
        self.lock().push(entry);
    }

    /// Record the outcome of an operation, deriving the outcome and details
    /// from its result.
    pub fn log_result<T>(&self, event: AuditEvent, actor: &str, result: &Result<T, Error>) {
        match result {
            Ok(_) => self.log(event, actor, AuditOutcome::Success, None),
            Err(e) => self.log(
                event,
                actor,
                AuditOutcome::from_error(e),
                Some(e.to_string()),
            ),
        }
    }

    /// Get all recorded entries.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().clone()
    }

    /// Get entries with the given outcome.
    pub fn entries_by_outcome(&self, outcome: AuditOutcome) -> Vec<AuditEntry> {
        self.lock()
            .iter()
            .filter(|e| e.outcome == outcome)
            .cloned()
            .collect()
    }

    /// Count of stored entries.
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AuditEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A tracing-based audit sink that logs entries via `tracing::info!`.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, entry: &AuditEntry) {
        tracing::info!(
            event = ?entry.event,
            actor = %entry.actor,
            outcome = ?entry.outcome,
            details = ?entry.details,
            "AUDIT"
        );
    }
}
