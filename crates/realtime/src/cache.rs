//! Query cache with scope invalidation
//!
//! Cached results are keyed by ordered segments such as
//! `["dashboard", "user_1"]`. Invalidating a scope marks every entry under it
//! stale; the next read refetches. Invalidation never fetches by itself.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use skillverse_core::Retryable;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_MAX_RETRIES: u32 = 2;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Ordered key segments
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Vec<String>);

impl CacheKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn dashboard(user_id: &str) -> Self {
        Self::new(["dashboard", user_id])
    }

    pub fn skill_graph(user_id: &str) -> Self {
        Self::new(["skillGraph", user_id])
    }

    pub fn trends() -> Self {
        Self::new(["trends"])
    }

    pub fn learning_path(user_id: &str) -> Self {
        Self::new(["learningPath", user_id])
    }

    pub fn gap_analysis(user_id: &str) -> Self {
        Self::new(["gapAnalysis", user_id])
    }

    pub fn quiz(skill_id: &str) -> Self {
        Self::new(["quiz", skill_id])
    }

    /// Every per-user scope
    pub fn user_scopes(user_id: &str) -> Vec<Self> {
        vec![
            Self::dashboard(user_id),
            Self::skill_graph(user_id),
            Self::learning_path(user_id),
            Self::gap_analysis(user_id),
        ]
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether this key falls under `scope`
    pub fn starts_with(&self, scope: &Self) -> bool {
        self.0.starts_with(&scope.0)
    }

    /// Extend the key with one more segment
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// Receives scope invalidations
pub trait CacheInvalidator: Send + Sync {
    /// Mark everything under `scope` stale; must not block on a refetch
    fn invalidate(&self, scope: &CacheKey);
}

#[derive(Debug)]
struct Entry {
    value: Value,
    fetched_at: Instant,
    invalidated: bool,
}

impl Entry {
    fn is_fresh(&self, stale_time: Duration) -> bool {
        !self.invalidated && self.fetched_at.elapsed() < stale_time
    }
}

/// In-memory query cache
pub struct QueryCache {
    entries: RwLock<HashMap<CacheKey, Entry>>,
    stale_time: Duration,
    max_retries: u32,
    retry_delay: Duration,
    invalidations: broadcast::Sender<CacheKey>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        let (invalidations, _) = broadcast::channel(64);
        Self {
            entries: RwLock::new(HashMap::new()),
            stale_time: DEFAULT_STALE_TIME,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_secs(1),
            invalidations,
        }
    }

    #[must_use]
    pub const fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    /// Base delay between retries; doubles per attempt up to 30s
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Scopes invalidated from now on
    pub fn subscribe(&self) -> broadcast::Receiver<CacheKey> {
        self.invalidations.subscribe()
    }

    /// Fresh cached value, if any
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(key).filter(|e| e.is_fresh(self.stale_time))?;
        serde_json::from_value(entry.value.clone())
            .inspect_err(|e| warn!(%key, "Cached value has unexpected shape: {}", e))
            .ok()
    }

    pub fn set<T: Serialize>(&self, key: CacheKey, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.entries
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(
                        key,
                        Entry {
                            value,
                            fetched_at: Instant::now(),
                            invalidated: false,
                        },
                    );
            }
            Err(e) => warn!(%key, "Failed to cache value: {}", e),
        }
    }

    /// Absent, invalidated or expired
    pub fn is_stale(&self, key: &CacheKey) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .is_none_or(|e| !e.is_fresh(self.stale_time))
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Mark every entry under `scope` stale; returns how many were marked
    pub fn invalidate_scope(&self, scope: &CacheKey) -> usize {
        let marked = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            let mut marked = 0;
            for (_, entry) in entries.iter_mut().filter(|(key, _)| key.starts_with(scope)) {
                entry.invalidated = true;
                marked += 1;
            }
            marked
        };
        debug!(%scope, marked, "Cache scope invalidated");
        // Nobody listening is fine
        let _ = self.invalidations.send(scope.clone());
        marked
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Return the fresh cached value or run `fetcher`, retrying retryable
    /// failures up to the configured limit
    pub async fn fetch<T, E, F, Fut>(&self, key: CacheKey, mut fetcher: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: Retryable + fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let mut attempt = 0;
        loop {
            match fetcher().await {
                Ok(value) => {
                    self.set(key, &value);
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self
                        .retry_delay
                        .saturating_mul(2u32.saturating_pow(attempt))
                        .min(MAX_RETRY_DELAY);
                    attempt += 1;
                    debug!(%key, attempt, error = %e, "Fetch failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl CacheInvalidator for QueryCache {
    fn invalidate(&self, scope: &CacheKey) {
        self.invalidate_scope(scope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct FetchError {
        retryable: bool,
    }

    impl fmt::Display for FetchError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "fetch failed (retryable: {})", self.retryable)
        }
    }

    impl Retryable for FetchError {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    fn cache() -> QueryCache {
        QueryCache::new().with_retry_delay(Duration::from_millis(1))
    }

    #[test]
    fn scope_matching() {
        let scope = CacheKey::dashboard("user_1");
        assert!(scope.starts_with(&scope));
        assert!(scope.child("stats").starts_with(&scope));
        assert!(!CacheKey::dashboard("user_2").starts_with(&scope));
        assert!(!CacheKey::trends().starts_with(&scope));
        assert_eq!(scope.to_string(), "dashboard/user_1");
    }

    #[test]
    fn invalidation_marks_scope_stale() {
        let cache = cache();
        cache.set(CacheKey::dashboard("user_1"), &1);
        cache.set(CacheKey::dashboard("user_1").child("stats"), &2);
        cache.set(CacheKey::dashboard("user_2"), &3);

        let mut events = cache.subscribe();
        assert_eq!(cache.invalidate_scope(&CacheKey::dashboard("user_1")), 2);

        assert!(cache.is_stale(&CacheKey::dashboard("user_1")));
        assert!(cache.get::<i32>(&CacheKey::dashboard("user_1")).is_none());
        assert_eq!(cache.get::<i32>(&CacheKey::dashboard("user_2")), Some(3));
        // Stale entries are kept until refetched
        assert!(cache.contains(&CacheKey::dashboard("user_1")));
        assert_eq!(events.try_recv().unwrap(), CacheKey::dashboard("user_1"));
    }

    #[test]
    fn entries_expire() {
        let cache = QueryCache::new().with_stale_time(Duration::ZERO);
        cache.set(CacheKey::trends(), &"x");
        assert!(cache.is_stale(&CacheKey::trends()));
    }

    #[tokio::test]
    async fn fetch_uses_fresh_value() {
        let cache = cache();
        let calls = AtomicU32::new(0);
        let fetch = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, FetchError>(42)
        };

        assert_eq!(cache.fetch(CacheKey::trends(), fetch).await.unwrap(), 42);
        assert_eq!(cache.fetch(CacheKey::trends(), fetch).await.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate(&CacheKey::trends());
        assert_eq!(cache.fetch(CacheKey::trends(), fetch).await.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fetch_retries_retryable_errors_twice() {
        let cache = cache();
        let calls = AtomicU32::new(0);
        let result: Result<i32, _> = cache
            .fetch(CacheKey::quiz("rust"), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError { retryable: true })
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fetch_does_not_retry_client_errors() {
        let cache = cache();
        let calls = AtomicU32::new(0);
        let result: Result<i32, _> = cache
            .fetch(CacheKey::quiz("rust"), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError { retryable: false })
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
