//! CLI subcommands and the state they share.

pub mod fetch;
pub mod file;
pub mod init;
pub mod path;
pub mod secret;
pub mod status;

use std::path::PathBuf;

use keyward_config::{ConfigError, KeywardConfig};
use keyward_core::{PathError, VaultError};
use keyward_security::{AuditEvent, AuditLogger, AuditOutcome, TracingSink, Vault};

/// Loaded configuration plus the audit log, handed to every command.
pub struct Context {
    pub config: KeywardConfig,
    pub config_dir: PathBuf,
    pub audit: AuditLogger,
}

impl Context {
    /// Load configuration from `$KEYWARD_HOME` or `~/.keyward`.
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = KeywardConfig::config_dir()?;
        let config = KeywardConfig::load()?;
        let audit = AuditLogger::with_sinks(vec![Box::new(TracingSink)]);
        Ok(Self::new(config, config_dir, audit))
    }

    pub fn new(config: KeywardConfig, config_dir: PathBuf, audit: AuditLogger) -> Self {
        Self {
            config,
            config_dir,
            audit,
        }
    }

    /// Open the vault with the configured file layout, creating the key
    /// if it does not exist yet.
    pub fn vault(&self) -> Result<Vault, VaultError> {
        Vault::with_layout(
            &self.config_dir,
            &self.config.vault.key_file,
            &self.config.vault.secrets_file,
        )
    }

    /// Record a path-guard refusal. Errors other than traversal are not
    /// audited.
    fn audit_path<T>(&self, actor: &str, rel_path: &str, result: &Result<T, PathError>) {
        if let Err(e) = result
            && e.is_traversal()
        {
            self.audit.log(
                AuditEvent::PathDenied {
                    path: rel_path.to_string(),
                },
                actor,
                AuditOutcome::Denied,
                Some(e.to_string()),
            );
        }
    }
}
