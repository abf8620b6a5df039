//! Credential persistence

use skillverse_core::KeyValueStore;
use std::sync::Arc;
use tracing::warn;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Access/refresh token pair held in a key-value store
///
/// Storage failures are logged and reported as `None` / `false`; they never
/// surface as errors.
#[derive(Clone)]
pub struct TokenStorage {
    store: Arc<dyn KeyValueStore>,
}

impl TokenStorage {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    /// Store both tokens; returns false if either write failed
    pub fn set_tokens(&self, access_token: &str, refresh_token: &str) -> bool {
        let access = self.write(ACCESS_TOKEN_KEY, access_token);
        let refresh = self.write(REFRESH_TOKEN_KEY, refresh_token);
        access && refresh
    }

    /// Remove both tokens; returns false if either removal failed
    pub fn clear_tokens(&self) -> bool {
        let access = self.delete(ACCESS_TOKEN_KEY);
        let refresh = self.delete(REFRESH_TOKEN_KEY);
        access && refresh
    }

    /// True only when both tokens are stored
    pub fn has_tokens(&self) -> bool {
        self.access_token().is_some() && self.refresh_token().is_some()
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key, "Failed to read token: {}", e);
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) -> bool {
        self.store
            .set(key, value)
            .inspect_err(|e| warn!(key, "Failed to store token: {}", e))
            .is_ok()
    }

    fn delete(&self, key: &str) -> bool {
        self.store
            .remove(key)
            .inspect_err(|e| warn!(key, "Failed to remove token: {}", e))
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillverse_core::{MemoryStore, StorageError};

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("quota exceeded".into()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".into()))
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".into()))
        }
    }

    #[test]
    fn set_and_clear() {
        let tokens = TokenStorage::new(Arc::new(MemoryStore::new()));
        assert!(!tokens.has_tokens());

        assert!(tokens.set_tokens("access", "refresh"));
        assert_eq!(tokens.access_token().as_deref(), Some("access"));
        assert_eq!(tokens.refresh_token().as_deref(), Some("refresh"));

        assert!(tokens.clear_tokens());
        assert!(tokens.access_token().is_none());
        assert!(tokens.refresh_token().is_none());
    }

    #[test]
    fn access_token_alone_is_not_a_session() {
        let store = Arc::new(MemoryStore::new());
        store.set(ACCESS_TOKEN_KEY, "access").unwrap();
        let tokens = TokenStorage::new(store.clone());
        assert!(!tokens.has_tokens());

        store.set(REFRESH_TOKEN_KEY, "refresh").unwrap();
        assert!(tokens.has_tokens());
    }

    #[test]
    fn storage_failures_degrade() {
        let tokens = TokenStorage::new(Arc::new(BrokenStore));
        assert!(tokens.access_token().is_none());
        assert!(!tokens.set_tokens("a", "r"));
        assert!(!tokens.clear_tokens());
    }
}
