//! Secret storage contract.
//!
//! The CLI and integration layers depend on this trait rather than on the
//! concrete vault, so the on-disk implementation can be swapped for an
//! in-memory one in tests.

use crate::error::VaultError;

/// A store of opaque secret strings indexed by logical name
/// (e.g. `"jira"`, `"llm"`).
pub trait SecretStore: Send + Sync {
    /// Persist `secret` under `name`, replacing any previous value.
    fn store(&self, name: &str, secret: &str) -> Result<(), VaultError>;

    /// Fetch the plaintext stored under `name`.
    fn retrieve(&self, name: &str) -> Result<String, VaultError>;

    /// Remove `name`. Fails with [`VaultError::SecretNotFound`] if absent.
    fn delete(&self, name: &str) -> Result<(), VaultError>;

    /// Logical names currently stored, sorted.
    fn names(&self) -> Result<Vec<String>, VaultError>;

    /// Fetch a secret, mapping "not found" to `None`.
    ///
    /// Any other failure (including a record that no longer decrypts) is
    /// still an error.
    fn retrieve_optional(&self, name: &str) -> Result<Option<String>, VaultError> {
        match self.retrieve(name) {
            Ok(secret) => Ok(Some(secret)),
            Err(VaultError::SecretNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Plaintext map; only suitable for exercising the default methods.
    #[derive(Default)]
    struct MapStore {
        inner: Mutex<BTreeMap<String, String>>,
    }

    impl SecretStore for MapStore {
        fn store(&self, name: &str, secret: &str) -> Result<(), VaultError> {
            self.inner
                .lock()
                .unwrap()
                .insert(name.into(), secret.into());
            Ok(())
        }

        fn retrieve(&self, name: &str) -> Result<String, VaultError> {
            self.inner
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .ok_or_else(|| VaultError::SecretNotFound { name: name.into() })
        }

        fn delete(&self, name: &str) -> Result<(), VaultError> {
            self.inner
                .lock()
                .unwrap()
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| VaultError::SecretNotFound { name: name.into() })
        }

        fn names(&self) -> Result<Vec<String>, VaultError> {
            Ok(self.inner.lock().unwrap().keys().cloned().collect())
        }
    }

    #[test]
    fn retrieve_optional_maps_missing_to_none() {
        let store = MapStore::default();
        assert_eq!(store.retrieve_optional("jira").unwrap(), None);

        store.store("jira", "tok").unwrap();
        assert_eq!(store.retrieve_optional("jira").unwrap(), Some("tok".into()));
    }

    #[test]
    fn trait_objects_are_usable() {
        let store: Box<dyn SecretStore> = Box::new(MapStore::default());
        store.store("b", "2").unwrap();
        store.store("a", "1").unwrap();
        assert_eq!(store.names().unwrap(), vec!["a", "b"]);
        store.delete("a").unwrap();
        assert!(matches!(
            store.delete("a"),
            Err(VaultError::SecretNotFound { .. })
        ));
    }
}
