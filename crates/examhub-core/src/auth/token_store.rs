use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::storage::{KeyValueStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

/// Holds the access/refresh token pair, caching the durable copy in memory.
///
/// Reads never fail: a storage error is logged and reported as an absent token.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStore>,
    cache: Arc<Mutex<TokenCache>>,
}

#[derive(Debug, Default)]
struct TokenCache {
    access: Option<String>,
    refresh: Option<String>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            cache: Arc::new(Mutex::new(TokenCache::default())),
        }
    }

    pub fn set_tokens(&self, access: &str, refresh: &str) {
        let mut cache = self.cache();
        cache.access = Some(access.to_owned());
        cache.refresh = Some(refresh.to_owned());
        self.write(ACCESS_TOKEN_KEY, access);
        self.write(REFRESH_TOKEN_KEY, refresh);
    }

    pub fn access_token(&self) -> Option<String> {
        let mut cache = self.cache();
        if cache.access.is_none() {
            cache.access = self.read(ACCESS_TOKEN_KEY);
        }
        cache.access.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        let mut cache = self.cache();
        if cache.refresh.is_none() {
            cache.refresh = self.read(REFRESH_TOKEN_KEY);
        }
        cache.refresh.clone()
    }

    pub fn clear_tokens(&self) {
        let mut cache = self.cache();
        cache.access = None;
        cache.refresh = None;
        self.delete(ACCESS_TOKEN_KEY);
        self.delete(REFRESH_TOKEN_KEY);
    }

    fn cache(&self) -> MutexGuard<'_, TokenCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value.filter(|token| !token.is_empty()),
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to read token from storage");
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(err) = self.storage.set(key, value) {
            tracing::warn!(key, error = %err, "failed to persist token");
        }
    }

    fn delete(&self, key: &str) {
        if let Err(err) = self.storage.remove(key) {
            tracing::warn!(key, error = %err, "failed to remove token from storage");
        }
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryKeyValueStore, StorageError};

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(std::io::Error::other("disk gone").into())
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(std::io::Error::other("disk gone").into())
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(std::io::Error::other("disk gone").into())
        }
    }

    #[test]
    fn hydrates_lazily_from_storage() {
        let storage = Arc::new(MemoryKeyValueStore::new());
        storage.set(ACCESS_TOKEN_KEY, "persisted").unwrap();
        storage.set(REFRESH_TOKEN_KEY, "r1").unwrap();

        let tokens = TokenStore::new(storage);
        assert_eq!(tokens.access_token().as_deref(), Some("persisted"));
        assert_eq!(tokens.refresh_token().as_deref(), Some("r1"));
    }

    #[test]
    fn set_tokens_writes_through() {
        let storage = Arc::new(MemoryKeyValueStore::new());
        let tokens = TokenStore::new(storage.clone());
        tokens.set_tokens("t1", "r1");
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("t1"));
        assert_eq!(storage.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r1"));
    }

    #[test]
    fn clearing_twice_matches_clearing_once() {
        let storage = Arc::new(MemoryKeyValueStore::new());
        let tokens = TokenStore::new(storage.clone());
        tokens.set_tokens("t1", "r1");

        tokens.clear_tokens();
        let once = (tokens.access_token(), tokens.refresh_token());
        tokens.clear_tokens();
        let twice = (tokens.access_token(), tokens.refresh_token());

        assert_eq!(once, (None, None));
        assert_eq!(once, twice);
        assert!(storage.get(ACCESS_TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn storage_failures_read_as_absent() {
        let tokens = TokenStore::new(Arc::new(BrokenStore));
        assert!(tokens.access_token().is_none());
        tokens.clear_tokens();

        // the in-memory copy still works when persistence does not
        tokens.set_tokens("t1", "r1");
        assert_eq!(tokens.access_token().as_deref(), Some("t1"));
    }
}
