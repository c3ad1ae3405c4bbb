//! Cache-aside reads against the remote key-value store.
//!
//! A value is served from the cache when it is present and still deserialises into the
//! expected shape; otherwise it is recomputed, written back with an expiry and returned.
//! The cache is an optimisation only: every backend failure degrades to a recompute.

use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::gateways::KvStore;

const SOURCE: &str = "application::cache_aside";

#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn KvStore>,
}

impl CacheAside {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Return the cached value for `key`, or run `compute` and cache its result for
    /// `ttl_seconds`.
    ///
    /// Concurrent misses on the same key are not coalesced: each caller computes and
    /// writes, and the last write wins. Errors from `compute` are returned unchanged and
    /// nothing is cached for them.
    pub async fn fetch_with_cache<T, E, F, Fut>(
        &self,
        key: &str,
        ttl_seconds: u64,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        debug_assert!(!key.is_empty(), "cache key must not be empty");
        let cacheable = !key.is_empty();

        if cacheable {
            if let Some(value) = self.read::<T>(key).await {
                counter!("vitrine_cache_hit_total").increment(1);
                return Ok(value);
            }
            counter!("vitrine_cache_miss_total").increment(1);
        }

        let value = compute().await?;

        if cacheable {
            self.write(key, ttl_seconds.max(1), &value).await;
        }

        Ok(value)
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                counter!("vitrine_cache_error_total", "op" => "get").increment(1);
                warn!(
                    target = SOURCE,
                    key,
                    error = %err,
                    "cache read failed; treating as miss"
                );
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(
                    target = SOURCE,
                    key,
                    error = %err,
                    "cached value has unexpected shape; recomputing"
                );
                None
            }
        }
    }

    async fn write<T: Serialize>(&self, key: &str, ttl_seconds: u64, value: &T) {
        let serialized = match serde_json::to_string(value) {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!(target = SOURCE, key, error = %err, "value could not be serialized for cache");
                return;
            }
        };

        if let Err(err) = self.store.set_ex(key, &serialized, ttl_seconds).await {
            counter!("vitrine_cache_error_total", "op" => "set").increment(1);
            warn!(
                target = SOURCE,
                key,
                ttl_seconds,
                error = %err,
                "cache write failed; returning computed value"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::application::gateways::KvError;
    use crate::infra::memory::MemoryKvStore;

    struct FailingStore {
        fail_get: bool,
        fail_set: bool,
        inner: MemoryKvStore,
    }

    #[async_trait]
    impl KvStore for FailingStore {
        async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
            if self.fail_get {
                return Err(KvError::Unavailable("connection refused".into()));
            }
            self.inner.get(key).await
        }

        async fn set_ex(&self, key: &str, value: &str, ttl: u64) -> Result<(), KvError> {
            if self.fail_set {
                return Err(KvError::Command("READONLY".into()));
            }
            self.inner.set_ex(key, value, ttl).await
        }

        async fn incr(&self, key: &str) -> Result<u64, KvError> {
            self.inner.incr(key).await
        }
    }

    fn counting_compute(
        calls: &AtomicUsize,
        value: Vec<String>,
    ) -> impl Future<Output = Result<Vec<String>, std::convert::Infallible>> + '_ {
        calls.fetch_add(1, Ordering::SeqCst);
        async move { Ok(value) }
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let cache = CacheAside::new(Arc::new(MemoryKvStore::default()));
        let calls = AtomicUsize::new(0);

        let first = cache
            .fetch_with_cache("slugs", 60, || counting_compute(&calls, vec!["a".into()]))
            .await
            .unwrap();
        let second = cache
            .fetch_with_cache("slugs", 60, || counting_compute(&calls, vec!["b".into()]))
            .await
            .unwrap();

        assert_eq!(first, vec!["a".to_string()]);
        assert_eq!(second, vec!["a".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_cached_value_is_recomputed() {
        let store = Arc::new(MemoryKvStore::default());
        store.set_ex("slugs", "{not json", 60).await.unwrap();
        let cache = CacheAside::new(store.clone());
        let calls = AtomicUsize::new(0);

        let value = cache
            .fetch_with_cache("slugs", 60, || counting_compute(&calls, vec!["fresh".into()]))
            .await
            .unwrap();

        assert_eq!(value, vec!["fresh".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stored = store.get("slugs").await.unwrap().expect("rewritten");
        assert_eq!(stored, r#"["fresh"]"#);
    }

    #[tokio::test]
    async fn wrong_shape_counts_as_miss() {
        let store = Arc::new(MemoryKvStore::default());
        store.set_ex("slugs", r#"{"a":1}"#, 60).await.unwrap();
        let cache = CacheAside::new(store);
        let calls = AtomicUsize::new(0);

        let value = cache
            .fetch_with_cache("slugs", 60, || counting_compute(&calls, vec!["x".into()]))
            .await
            .unwrap();
        assert_eq!(value, vec!["x".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn read_failure_is_treated_as_miss() {
        let cache = CacheAside::new(Arc::new(FailingStore {
            fail_get: true,
            fail_set: false,
            inner: MemoryKvStore::default(),
        }));
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = cache
                .fetch_with_cache("k", 60, || counting_compute(&calls, vec!["v".into()]))
                .await
                .unwrap();
            assert_eq!(value, vec!["v".to_string()]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn write_failure_still_returns_computed_value() {
        let cache = CacheAside::new(Arc::new(FailingStore {
            fail_get: false,
            fail_set: true,
            inner: MemoryKvStore::default(),
        }));
        let calls = AtomicUsize::new(0);

        let value = cache
            .fetch_with_cache("k", 60, || counting_compute(&calls, vec!["v".into()]))
            .await
            .unwrap();
        assert_eq!(value, vec!["v".to_string()]);
    }

    #[tokio::test]
    async fn compute_error_is_returned_and_not_cached() {
        let store = Arc::new(MemoryKvStore::default());
        let cache = CacheAside::new(store.clone());

        let result: Result<Vec<String>, &str> = cache
            .fetch_with_cache("k", 60, || async { Err("cms down") })
            .await;
        assert_eq!(result, Err("cms down"));
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
