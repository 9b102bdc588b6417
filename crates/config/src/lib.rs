//! Configuration loading, validation, and management for Keyward.
//!
//! Loads configuration from `~/.keyward/config.toml` (or
//! `$KEYWARD_HOME/config.toml`) with environment variable overrides.
//! The file is read and written through a [`PathGuard`] rooted at the
//! configuration directory. Secrets never live here; they go to the vault's
//! own record file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use keyward_core::PathError;
use keyward_core::paths::{config_dir, home_dir};
use keyward_security::PathGuard;
use keyward_security::secrets::{FILE_MODE, KEY_FILE, SECRETS_FILE};
use serde::{Deserialize, Serialize};

/// Name of the configuration file inside the configuration directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable that overrides [`KeywardConfig::base_dir`].
pub const BASE_DIR_ENV: &str = "KEYWARD_BASE_DIR";

/// The root configuration structure.
///
/// Maps directly to `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeywardConfig {
    /// Base directory for user-influenced file access. Defaults to the
    /// home directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,

    /// Vault file layout
    #[serde(default)]
    pub vault: VaultConfig,

    /// Per-target outbound rate limits, keyed by logical target name
    #[serde(default = "default_rate_limits")]
    pub rate_limits: BTreeMap<String, RateLimitConfig>,
}

/// Where the vault keeps its key and records, relative to the
/// configuration directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VaultConfig {
    #[serde(default = "default_key_file")]
    pub key_file: String,

    #[serde(default = "default_secrets_file")]
    pub secrets_file: String,
}

fn default_key_file() -> String {
    KEY_FILE.into()
}
fn default_secrets_file() -> String {
    SECRETS_FILE.into()
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            key_file: default_key_file(),
            secrets_file: default_secrets_file(),
        }
    }
}

/// Sliding-window limit for one outbound target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum calls per window
    pub limit: usize,

    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_window_secs() -> u64 {
    60
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

fn default_rate_limits() -> BTreeMap<String, RateLimitConfig> {
    BTreeMap::from([
        (
            "jira".to_string(),
            RateLimitConfig {
                limit: 10,
                window_secs: 60,
            },
        ),
        (
            "llm".to_string(),
            RateLimitConfig {
                limit: 5,
                window_secs: 60,
            },
        ),
    ])
}

impl Default for KeywardConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            vault: VaultConfig::default(),
            rate_limits: default_rate_limits(),
        }
    }
}

impl KeywardConfig {
    /// Load configuration from the default configuration directory.
    ///
    /// `KEYWARD_BASE_DIR` overrides `base_dir` from the file.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_dir()?)?;

        if let Some(base) = std::env::var_os(BASE_DIR_ENV).filter(|v| !v.is_empty()) {
            config.base_dir = Some(PathBuf::from(base));
            config.validate()?;
        }

        Ok(config)
    }

    /// Load `config.toml` from a specific configuration directory.
    ///
    /// A missing file yields the defaults.
    pub fn load_from(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        let guard = guard_for(dir)?;

        let content = match guard.safe_read_to_string(CONFIG_FILE) {
            Ok(content) => content,
            Err(PathError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config file found at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::ReadError {
                    path,
                    reason: e.to_string(),
                });
            }
        };

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Write this configuration to `config.toml` in `dir` with mode `0600`.
    /// Returns the path written.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf, ConfigError> {
        self.validate()?;
        let guard = guard_for(dir)?;
        let path = dir.join(CONFIG_FILE);

        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::WriteError {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        guard
            .safe_write(CONFIG_FILE, content.as_bytes(), FILE_MODE)
            .map_err(|e| ConfigError::WriteError {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        Ok(path)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        config_dir().ok_or(ConfigError::NoHomeDir)
    }

    /// The base directory for guarded file access: `base_dir` if set,
    /// otherwise the home directory.
    pub fn resolved_base_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.base_dir {
            Some(dir) => Ok(dir.clone()),
            None => home_dir().ok_or(ConfigError::NoHomeDir),
        }
    }

    /// Build the path guard for user-influenced file access.
    pub fn path_guard(&self) -> Result<PathGuard, ConfigError> {
        let base = self.resolved_base_dir()?;
        PathGuard::new(&base).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Rate limit configured for `target`, if any.
    pub fn rate_limit(&self, target: &str) -> Option<RateLimitConfig> {
        self.rate_limits.get(target).copied()
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(base) = &self.base_dir
            && !base.is_absolute()
        {
            return Err(ConfigError::ValidationError(format!(
                "base_dir must be absolute, got '{}'",
                base.display()
            )));
        }

        if self.vault.key_file.is_empty() || self.vault.secrets_file.is_empty() {
            return Err(ConfigError::ValidationError(
                "vault.key_file and vault.secrets_file must be non-empty".into(),
            ));
        }
        if self.vault.key_file == self.vault.secrets_file {
            return Err(ConfigError::ValidationError(
                "vault.key_file and vault.secrets_file must differ".into(),
            ));
        }

        for (target, limit) in &self.rate_limits {
            if limit.limit == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "rate_limits.{target}.limit must be > 0"
                )));
            }
            if limit.window_secs == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "rate_limits.{target}.window_secs must be > 0"
                )));
            }
        }

        Ok(())
    }
}

fn guard_for(dir: &Path) -> Result<PathGuard, ConfigError> {
    PathGuard::new(dir).map_err(|e| ConfigError::ValidationError(e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine home directory")]
    NoHomeDir,

    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Failed to write config file at {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for keyward_core::Error {
    fn from(err: ConfigError) -> Self {
        keyward_core::Error::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = KeywardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.vault.key_file, "vault.key");
        assert_eq!(config.vault.secrets_file, "tokens.json");
        assert_eq!(
            config.rate_limit("jira"),
            Some(RateLimitConfig {
                limit: 10,
                window_secs: 60
            })
        );
        assert_eq!(config.rate_limit("llm").unwrap().limit, 5);
        assert_eq!(config.rate_limit("asana"), None);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = KeywardConfig {
            base_dir: Some(PathBuf::from("/srv/keyward")),
            ..KeywardConfig::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: KeywardConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = KeywardConfig::load_from(dir.path()).unwrap();
        assert_eq!(config, KeywardConfig::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = KeywardConfig::default();
        config.rate_limits.insert(
            "github".into(),
            RateLimitConfig {
                limit: 30,
                window_secs: 60,
            },
        );

        let path = config.save_to(dir.path()).unwrap();
        assert_eq!(path, dir.path().join(CONFIG_FILE));

        let loaded = KeywardConfig::load_from(dir.path()).unwrap();
        assert_eq!(loaded.rate_limit("github").unwrap().limit, 30);
    }

    #[cfg(unix)]
    #[test]
    fn saved_config_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        KeywardConfig::default().save_to(dir.path()).unwrap();
        let mode = std::fs::metadata(dir.path().join(CONFIG_FILE))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
[rate_limits.jira]
limit = 3
"#,
        )
        .unwrap();

        let config = KeywardConfig::load_from(dir.path()).unwrap();
        let jira = config.rate_limit("jira").unwrap();
        assert_eq!(jira.limit, 3);
        assert_eq!(jira.window(), Duration::from_secs(60));
        // An explicit table replaces the defaults entirely.
        assert_eq!(config.rate_limit("llm"), None);
        assert_eq!(config.vault, VaultConfig::default());
    }

    #[test]
    fn zero_limit_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[rate_limits.llm]\nlimit = 0\n",
        )
        .unwrap();

        match KeywardConfig::load_from(dir.path()) {
            Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("llm")),
            other => panic!("Expected ValidationError, got: {other:?}"),
        }
    }

    #[test]
    fn zero_window_rejected() {
        let mut config = KeywardConfig::default();
        config.rate_limits.insert(
            "jira".into(),
            RateLimitConfig {
                limit: 1,
                window_secs: 0,
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn identical_vault_files_rejected() {
        let config = KeywardConfig {
            vault: VaultConfig {
                key_file: "same".into(),
                secrets_file: "same".into(),
            },
            ..KeywardConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn relative_base_dir_rejected() {
        let config = KeywardConfig {
            base_dir: Some(PathBuf::from("relative")),
            ..KeywardConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "rate_limits = [").unwrap();
        assert!(matches!(
            KeywardConfig::load_from(dir.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn explicit_base_dir_builds_guard() {
        let dir = tempfile::tempdir().unwrap();
        let config = KeywardConfig {
            base_dir: Some(dir.path().to_path_buf()),
            ..KeywardConfig::default()
        };
        let guard = config.path_guard().unwrap();
        assert_eq!(
            guard.sanitize("notes/today.md").unwrap(),
            dir.path().join("notes/today.md")
        );
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = KeywardConfig::default_toml();
        assert!(toml_str.contains("rate_limits"));
        assert!(toml_str.contains("jira"));
        assert!(toml_str.contains("tokens.json"));

        let parsed: KeywardConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, KeywardConfig::default());
    }
}
