//! Credential vault — AES-256-GCM encryption of API tokens at rest.
//!
//! On-disk layout, inside the vault directory (`~/.keyward` by default):
//!
//! - `vault.key`   — 32 raw random bytes, mode `0600`
//! - `tokens.json` — flat JSON object `name -> base64(nonce ‖ ciphertext ‖ tag)`,
//!   mode `0600`
//!
//! Secrets are never embedded in `config.toml`; back up both files together.
//! A record only decrypts under the key that sealed it.
//!
//! Every `store` is a read-modify-write of `tokens.json`, serialized within
//! one process and replaced atomically on disk. There is no file locking:
//! two processes writing at once race and the last writer wins.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use keyward_core::paths::config_dir;
use keyward_core::{PathError, SecretStore, VaultError};
use rand::Rng;
use tracing::debug;

use crate::path::PathGuard;

/// Length of the symmetric key in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Length of the AES-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Default key file name inside the vault directory.
pub const KEY_FILE: &str = "vault.key";

/// Default record file name inside the vault directory.
pub const SECRETS_FILE: &str = "tokens.json";

/// Permission bits for the key and record files.
pub const FILE_MODE: u32 = 0o600;

/// Encrypts, persists and retrieves secrets under a locally held key.
///
/// All file access goes through a [`PathGuard`] rooted at the vault
/// directory. The key is re-read from disk on every operation. Record
/// updates from clones of one `Vault` are serialized; the record file is
/// replaced atomically, so readers never need the lock.
#[derive(Debug, Clone)]
pub struct Vault {
    guard: PathGuard,
    key_file: String,
    secrets_file: String,
    writer: Arc<Mutex<()>>,
}

impl Vault {
    /// Open the vault in the default configuration directory
    /// (`$KEYWARD_HOME` or `~/.keyward`), creating the key on first use.
    pub fn open() -> Result<Self, VaultError> {
        let dir = config_dir().ok_or_else(|| VaultError::KeyInit {
            reason: "could not determine home directory".into(),
        })?;
        Self::open_in(dir)
    }

    /// Open the vault in `dir` with the default file names.
    pub fn open_in(dir: impl Into<PathBuf>) -> Result<Self, VaultError> {
        Self::with_layout(dir, KEY_FILE, SECRETS_FILE)
    }

    /// Open the vault in `dir` with explicit key and record file names
    /// (relative to `dir`).
    pub fn with_layout(
        dir: impl Into<PathBuf>,
        key_file: impl Into<String>,
        secrets_file: impl Into<String>,
    ) -> Result<Self, VaultError> {
        let guard = PathGuard::new(dir).map_err(|e| VaultError::KeyInit {
            reason: e.to_string(),
        })?;
        let vault = Self {
            guard,
            key_file: key_file.into(),
            secrets_file: secrets_file.into(),
            writer: Arc::new(Mutex::new(())),
        };
        vault.ensure_key()?;
        Ok(vault)
    }

    /// Absolute path of the key file.
    pub fn key_path(&self) -> PathBuf {
        self.guard.base().join(&self.key_file)
    }

    /// Absolute path of the record file.
    pub fn secrets_path(&self) -> PathBuf {
        self.guard.base().join(&self.secrets_file)
    }

    /// Whether a record exists for `name`. Nothing is decrypted.
    pub fn contains(&self, name: &str) -> Result<bool, VaultError> {
        Ok(self.load_records()?.contains_key(name))
    }

    /// Encrypt `secret` under a fresh random nonce and return
    /// `base64(nonce ‖ ciphertext ‖ tag)`.
    pub fn seal(&self, secret: &str) -> Result<String, VaultError> {
        let key = self.load_key()?;
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|e| VaultError::Encrypt {
            reason: e.to_string(),
        })?;

        let nonce_bytes = generate_nonce();
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext =
            cipher
                .encrypt(nonce, secret.as_bytes())
                .map_err(|e| VaultError::Encrypt {
                    reason: e.to_string(),
                })?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    /// Decrypt a blob produced by [`Vault::seal`]. `name` is only used to
    /// label a malformed record.
    pub fn unseal(&self, name: &str, encoded: &str) -> Result<String, VaultError> {
        let malformed = || VaultError::MalformedRecord { name: name.into() };

        let blob = BASE64.decode(encoded).map_err(|_| malformed())?;
        if blob.len() < NONCE_LEN {
            return Err(malformed());
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);

        let key = self.load_key()?;
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|e| VaultError::KeyRead {
            reason: e.to_string(),
        })?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| VaultError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|_| VaultError::Decrypt)
    }

    /// Check if an output string contains any of the known secrets (leakage detection).
    pub fn scan_for_leakage(output: &str, secrets: &[String]) -> bool {
        secrets.iter().any(|s| !s.is_empty() && output.contains(s))
    }

    fn ensure_key(&self) -> Result<(), VaultError> {
        let key_init = |e: PathError| VaultError::KeyInit {
            reason: e.to_string(),
        };
        if self.guard.sanitize(&self.key_file).map_err(key_init)?.exists() {
            return Ok(());
        }

        let mut key = [0u8; KEY_LEN];
        rand::rng().fill(&mut key[..]);
        // A concurrent opener may win; its key is kept and ours discarded.
        if self
            .guard
            .safe_write_new(&self.key_file, &key, FILE_MODE)
            .map_err(key_init)?
        {
            debug!(path = %self.key_path().display(), "generated vault key");
        }
        Ok(())
    }

    /// Serialize read-modify-write of the record file.
    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_key(&self) -> Result<Vec<u8>, VaultError> {
        let key = self
            .guard
            .safe_read(&self.key_file)
            .map_err(|e| VaultError::KeyRead {
                reason: e.to_string(),
            })?;
        if key.len() != KEY_LEN {
            return Err(VaultError::KeyRead {
                reason: format!("expected {KEY_LEN} bytes, found {}", key.len()),
            });
        }
        Ok(key)
    }

    fn load_records(&self) -> Result<BTreeMap<String, String>, VaultError> {
        match self.guard.safe_read(&self.secrets_file) {
            Ok(data) => serde_json::from_slice(&data).map_err(|e| VaultError::Persist {
                path: self.secrets_path(),
                reason: format!("invalid record file: {e}"),
            }),
            Err(PathError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                Ok(BTreeMap::new())
            }
            Err(e) => Err(VaultError::Persist {
                path: self.secrets_path(),
                reason: e.to_string(),
            }),
        }
    }

    fn save_records(&self, records: &BTreeMap<String, String>) -> Result<(), VaultError> {
        let persist = |reason: String| VaultError::Persist {
            path: self.secrets_path(),
            reason,
        };
        let data = serde_json::to_vec_pretty(records).map_err(|e| persist(e.to_string()))?;
        self.guard
            .safe_write(&self.secrets_file, &data, FILE_MODE)
            .map_err(|e| persist(e.to_string()))
    }
}

impl SecretStore for Vault {
    fn store(&self, name: &str, secret: &str) -> Result<(), VaultError> {
        let encoded = self.seal(secret)?;
        let _writer = self.lock_writer();
        let mut records = self.load_records()?;
        records.insert(name.to_string(), encoded);
        self.save_records(&records)?;
        debug!(name, "stored secret");
        Ok(())
    }

    fn retrieve(&self, name: &str) -> Result<String, VaultError> {
        let records = self.load_records()?;
        let encoded = records
            .get(name)
            .ok_or_else(|| VaultError::SecretNotFound { name: name.into() })?;
        self.unseal(name, encoded)
    }

    fn delete(&self, name: &str) -> Result<(), VaultError> {
        let _writer = self.lock_writer();
        let mut records = self.load_records()?;
        if records.remove(name).is_none() {
            return Err(VaultError::SecretNotFound { name: name.into() });
        }
        self.save_records(&records)?;
        debug!(name, "deleted secret");
        Ok(())
    }

    fn names(&self) -> Result<Vec<String>, VaultError> {
        Ok(self.load_records()?.into_keys().collect())
    }
}

/// Generate a random nonce.
fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill(&mut nonce[..]);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::distr::{Distribution, Uniform};

    fn vault() -> (tempfile::TempDir, Vault) {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::open_in(dir.path()).unwrap();
        (dir, vault)
    }

    fn printable_ascii(len: usize) -> String {
        let range = Uniform::new_inclusive(b' ', b'~').unwrap();
        let mut rng = rand::rng();
        (0..len).map(|_| range.sample(&mut rng) as char).collect()
    }

    #[test]
    fn open_creates_key_file() {
        let (dir, vault) = vault();
        let key = std::fs::read(dir.path().join(KEY_FILE)).unwrap();
        assert_eq!(key.len(), KEY_LEN);
        assert_eq!(vault.key_path(), dir.path().join(KEY_FILE));
    }

    #[cfg(unix)]
    #[test]
    fn key_and_records_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, vault) = vault();
        vault.store("jira", "tok-abc123").unwrap();

        for file in [KEY_FILE, SECRETS_FILE] {
            let mode = std::fs::metadata(dir.path().join(file))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, FILE_MODE, "{file}");
        }
    }

    #[test]
    fn reopening_keeps_existing_key() {
        let (dir, vault) = vault();
        vault.store("llm", "sk-1234567890abcdef").unwrap();
        let key_before = std::fs::read(dir.path().join(KEY_FILE)).unwrap();

        let reopened = Vault::open_in(dir.path()).unwrap();
        let key_after = std::fs::read(dir.path().join(KEY_FILE)).unwrap();
        assert_eq!(key_after, key_before);
        assert_eq!(reopened.retrieve("llm").unwrap(), "sk-1234567890abcdef");
    }

    #[test]
    fn store_retrieve_roundtrip() {
        let (_dir, vault) = vault();
        for len in [1, 2, 15, 16, 17, 255, 1024, 4096] {
            let secret = printable_ascii(len);
            vault.store("token", &secret).unwrap();
            assert_eq!(vault.retrieve("token").unwrap(), secret, "length {len}");
        }
    }

    #[test]
    fn different_nonces_produce_different_ciphertext() {
        let (_dir, vault) = vault();
        let a = vault.seal("test-secret").unwrap();
        let b = vault.seal("test-secret").unwrap();
        assert_ne!(a, b);
        assert_eq!(vault.unseal("a", &a).unwrap(), "test-secret");
        assert_eq!(vault.unseal("b", &b).unwrap(), "test-secret");
    }

    #[test]
    fn every_flipped_bit_is_detected() {
        let (_dir, vault) = vault();
        let encoded = vault.seal("tok-abc123").unwrap();
        let blob = BASE64.decode(&encoded).unwrap();

        for byte in 0..blob.len() {
            for bit in 0..8 {
                let mut tampered = blob.clone();
                tampered[byte] ^= 1 << bit;
                let result = vault.unseal("jira", &BASE64.encode(&tampered));
                assert!(
                    matches!(result, Err(VaultError::Decrypt)),
                    "byte {byte} bit {bit}: {result:?}"
                );
            }
        }
    }

    #[test]
    fn tampered_record_file_fails_to_decrypt() {
        let (dir, vault) = vault();
        vault.store("jira", "tok-abc123").unwrap();

        let path = dir.path().join(SECRETS_FILE);
        let mut records: BTreeMap<String, String> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        let mut blob = BASE64.decode(&records["jira"]).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        records.insert("jira".into(), BASE64.encode(&blob));
        std::fs::write(&path, serde_json::to_vec(&records).unwrap()).unwrap();

        assert!(matches!(vault.retrieve("jira"), Err(VaultError::Decrypt)));
    }

    #[test]
    fn vaults_with_different_keys_are_independent() {
        let (_dir_a, a) = vault();
        let (_dir_b, b) = vault();

        let sealed = a.seal("my-api-key").unwrap();
        assert!(matches!(b.unseal("x", &sealed), Err(VaultError::Decrypt)));
        assert_eq!(a.unseal("x", &sealed).unwrap(), "my-api-key");
    }

    #[test]
    fn missing_secret_not_found() {
        let (_dir, vault) = vault();
        match vault.retrieve("jira") {
            Err(VaultError::SecretNotFound { name }) => assert_eq!(name, "jira"),
            other => panic!("Expected SecretNotFound, got: {other:?}"),
        }

        vault.store("llm", "x").unwrap();
        assert!(matches!(
            vault.retrieve("jira"),
            Err(VaultError::SecretNotFound { .. })
        ));
    }

    #[test]
    fn short_blob_is_malformed() {
        let (_dir, vault) = vault();
        let short = BASE64.encode([0u8; NONCE_LEN - 1]);
        assert!(matches!(
            vault.unseal("jira", &short),
            Err(VaultError::MalformedRecord { .. })
        ));
        assert!(matches!(
            vault.unseal("jira", "not base64!!"),
            Err(VaultError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn nonce_only_blob_fails_authentication() {
        let (_dir, vault) = vault();
        let nonce_only = BASE64.encode([0u8; NONCE_LEN]);
        assert!(matches!(
            vault.unseal("jira", &nonce_only),
            Err(VaultError::Decrypt)
        ));
    }

    #[test]
    fn delete_removes_entry() {
        let (_dir, vault) = vault();
        vault.store("jira", "a").unwrap();
        vault.store("llm", "b").unwrap();

        vault.delete("jira").unwrap();
        assert!(!vault.contains("jira").unwrap());
        assert_eq!(vault.retrieve("llm").unwrap(), "b");

        assert!(matches!(
            vault.delete("jira"),
            Err(VaultError::SecretNotFound { .. })
        ));
    }

    #[test]
    fn names_are_sorted() {
        let (_dir, vault) = vault();
        assert!(vault.names().unwrap().is_empty());
        vault.store("llm", "b").unwrap();
        vault.store("jira", "a").unwrap();
        assert_eq!(vault.names().unwrap(), vec!["jira", "llm"]);
    }

    #[test]
    fn store_overwrites_previous_value() {
        let (_dir, vault) = vault();
        vault.store("jira", "old").unwrap();
        vault.store("jira", "new").unwrap();
        assert_eq!(vault.retrieve("jira").unwrap(), "new");
        assert_eq!(vault.names().unwrap().len(), 1);
    }

    #[test]
    fn truncated_key_is_read_error() {
        let (dir, vault) = vault();
        std::fs::write(dir.path().join(KEY_FILE), [0u8; 16]).unwrap();
        assert!(matches!(
            vault.store("jira", "x"),
            Err(VaultError::KeyRead { .. })
        ));
    }

    #[test]
    fn deleted_key_is_read_error() {
        let (dir, vault) = vault();
        vault.store("jira", "x").unwrap();
        std::fs::remove_file(dir.path().join(KEY_FILE)).unwrap();
        assert!(matches!(
            vault.retrieve("jira"),
            Err(VaultError::KeyRead { .. })
        ));
    }

    #[test]
    fn corrupt_record_file_is_persist_error() {
        let (dir, vault) = vault();
        std::fs::write(dir.path().join(SECRETS_FILE), "{not json").unwrap();
        assert!(matches!(
            vault.store("jira", "x"),
            Err(VaultError::Persist { .. })
        ));
        assert!(matches!(
            vault.retrieve("jira"),
            Err(VaultError::Persist { .. })
        ));
    }

    #[test]
    fn traversing_layout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Vault::with_layout(dir.path(), "../vault.key", SECRETS_FILE),
            Err(VaultError::KeyInit { .. })
        ));
    }

    #[test]
    fn custom_layout_uses_given_names() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::with_layout(dir.path(), "keys/master.key", "data/secrets.json").unwrap();
        vault.store("jira", "tok").unwrap();
        assert!(dir.path().join("keys/master.key").exists());
        assert!(dir.path().join("data/secrets.json").exists());
    }

    #[test]
    fn leakage_detection_finds_secret() {
        let secrets = vec!["sk-abc123".to_string(), "token-xyz".to_string()];
        assert!(Vault::scan_for_leakage(
            "The API key is sk-abc123 and it works",
            &secrets
        ));
        assert!(!Vault::scan_for_leakage("nothing to see", &secrets));
        assert!(!Vault::scan_for_leakage("anything", &["".to_string()]));
    }
}
