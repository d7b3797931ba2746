//! Key/value cache store abstraction and an in-process implementation

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::CacheError;

/// A string key/value store with expiring writes.
///
/// Implementations may be unavailable at any time; callers check
/// [`CacheStore::is_ready`] and must treat every error as recoverable.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Check whether the store can currently serve requests
    fn is_ready(&self) -> bool;

    /// Get the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key` for `ttl_secs` seconds
    async fn set_ex(&self, key: &str, ttl_secs: u64, value: String) -> Result<(), CacheError>;

    /// List keys matching a glob pattern (`*` and `?` wildcards)
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;

    /// Delete keys, returning how many existed
    async fn del(&self, keys: &[String]) -> Result<usize, CacheError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Instant,
}

/// In-process cache store honouring TTLs.
///
/// Used when no external cache is configured and as the test double for the
/// orchestrator. Expired entries are dropped lazily on access.
#[derive(Debug)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, StoredValue>>,
    ready: AtomicBool,
}

impl InMemoryCacheStore {
    /// Create an empty, ready store
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ready: AtomicBool::new(true),
        }
    }

    /// Mark the store ready or unavailable
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    /// Check if there are no live entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_ready(&self) -> Result<(), CacheError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(CacheError::Unavailable)
        }
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check_ready()?;
        let now = Instant::now();

        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired
        self.entries.write().remove(key);
        Ok(None)
    }

    async fn set_ex(&self, key: &str, ttl_secs: u64, value: String) -> Result<(), CacheError> {
        self.check_ready()?;
        let entry = StoredValue {
            value,
            expires_at: Instant::now() + Duration::from_secs(ttl_secs),
        };
        self.entries.write().insert(key.to_string(), entry);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        self.check_ready()?;
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .read()
            .iter()
            .filter(|(k, e)| e.expires_at > now && glob_match(pattern, k))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn del(&self, keys: &[String]) -> Result<usize, CacheError> {
        self.check_ready()?;
        let mut entries = self.entries.write();
        Ok(keys.iter().filter(|k| entries.remove(*k).is_some()).count())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Match `text` against a glob supporting `*` (any run) and `?` (one char)
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0usize, 0usize);
    // Position of the last `*` and the text index it was tried at
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((star_pi, star_ti)) = star {
            pi = star_pi + 1;
            ti = star_ti + 1;
            star = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("kpi:overview*", "kpi:overview"));
        assert!(glob_match("kpi:overview*", "kpi:overview:amazon"));
        assert!(glob_match("kpi:*:amazon", "kpi:overview:amazon"));
        assert!(glob_match("k?i:*", "kpi:x"));
        assert!(!glob_match("kpi:overview*", "kpi:trend"));
        assert!(!glob_match("kpi", "kpi:overview"));
        assert!(glob_match("*", ""));
    }

    #[tokio::test]
    async fn test_set_get_del() {
        let store = InMemoryCacheStore::new();
        store.set_ex("a", 60, "1".to_string()).await.unwrap();
        store.set_ex("b", 60, "2".to_string()).await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some("1".to_string()));
        assert_eq!(store.get("missing").await.unwrap(), None);
        assert_eq!(store.len(), 2);

        let deleted = store
            .del(&["a".to_string(), "zzz".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = InMemoryCacheStore::new();
        store.set_ex("k", 10, "v".to_string()).await.unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_keys_pattern() {
        let store = InMemoryCacheStore::new();
        for key in ["kpi:overview", "kpi:overview:amazon", "kpi:trend:amazon"] {
            store.set_ex(key, 60, "x".to_string()).await.unwrap();
        }

        let keys = store.keys("kpi:overview*").await.unwrap();
        assert_eq!(keys, vec!["kpi:overview", "kpi:overview:amazon"]);
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = InMemoryCacheStore::new();
        store.set_ready(false);
        assert!(!store.is_ready());
        assert!(matches!(
            store.get("k").await,
            Err(CacheError::Unavailable)
        ));
        assert!(store.set_ex("k", 1, "v".to_string()).await.is_err());
    }
}
