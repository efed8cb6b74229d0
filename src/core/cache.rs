use anyhow::Result;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Per-process memo of provider responses, shared between clones.
#[derive(Clone)]
pub struct Cache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Mutex<HashMap<K, V>>>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let cache = self.inner.lock().await;
        let value = cache.get(key).cloned();
        if value.is_some() {
            debug!("Cache HIT");
        } else {
            debug!("Cache MISS");
        }
        value
    }

    pub async fn put(&self, key: K, value: V) {
        let mut cache = self.inner.lock().await;
        debug!("Cache PUT");
        cache.insert(key, value);
    }

    /// Returns the cached value for `key`, or runs `fetch` and caches its
    /// success. Failures are not cached so the next caller retries.
    pub async fn get_or_try_insert_with<F, Fut>(&self, key: K, fetch: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.get(&key).await {
            return Ok(value);
        }
        let value = fetch().await?;
        self.put(key, value.clone()).await;
        Ok(value)
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_cache_get_put() {
        let cache = Cache::<String, i32>::new();

        assert!(cache.get(&"key1".to_string()).await.is_none());
        cache.put("key1".to_string(), 123).await;
        assert_eq!(cache.get(&"key1".to_string()).await, Some(123));
        assert!(cache.get(&"key2".to_string()).await.is_none());
    }

    #[tokio::test]
    async fn test_get_or_try_insert_with_fetches_once() {
        let cache = Cache::<String, i32>::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_try_insert_with("VTI".to_string(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = Cache::<String, i32>::new();

        let failed = cache
            .get_or_try_insert_with("VTI".to_string(), || async { Err(anyhow!("offline")) })
            .await;
        assert!(failed.is_err());
        assert!(cache.get(&"VTI".to_string()).await.is_none());
    }
}
