// Cache manager.
// Serves API responses from memory while fresh, loads them live otherwise, and
// falls back to whatever the durable store holds when the live load fails.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::durable::DurableStore;
use super::entry::{CachedData, DEFAULT_TTL, Payload};
use super::key::CacheKey;
use crate::error::{DashError, Result};

/// Cache settings, fixed for the lifetime of a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl: DEFAULT_TTL }
    }
}

/// Where a fetched value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Fresh entry in the memory table.
    Memory,
    /// The loader ran and succeeded.
    Live,
    /// The loader failed; this is the last persisted value, of any age.
    StaleFallback,
}

impl Source {
    pub fn is_cached(&self) -> bool {
        !matches!(self, Source::Live)
    }
}

/// A fetched value together with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub data: T,
    pub source: Source,
}

/// Request cache in front of a rate-limited API.
///
/// Concurrent fetches of the same missing key are not coalesced; each caller
/// runs its own loader.
pub struct CacheManager {
    config: CacheConfig,
    memory: Mutex<HashMap<String, CachedData<Payload>>>,
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
}

impl CacheManager {
    /// Open a manager over `store`, re-seeding memory from it.
    pub async fn open(store: Arc<dyn DurableStore>, config: CacheConfig) -> Self {
        Self::open_with_clock(store, config, Arc::new(SystemClock)).await
    }

    pub async fn open_with_clock(
        store: Arc<dyn DurableStore>,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let manager = Self {
            config,
            memory: Mutex::new(HashMap::new()),
            store,
            clock,
        };
        manager.reseed().await;
        manager
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Number of entries held in memory, fresh or not.
    pub fn memory_len(&self) -> usize {
        self.memory().len()
    }

    /// Return the payload for `key`, running `loader` only when needed.
    pub async fn fetch<F, Fut>(&self, key: &CacheKey, loader: F) -> Result<Payload>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Payload>>,
    {
        self.fetch_with_source(key, loader)
            .await
            .map(|fetched| fetched.data)
    }

    /// Like [`fetch`](Self::fetch), also reporting where the payload came from.
    pub async fn fetch_with_source<F, Fut>(&self, key: &CacheKey, loader: F) -> Result<Fetched<Payload>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Payload>>,
    {
        let storage_key = key.storage_key();

        if let Some(payload) = self.fresh_in_memory(&storage_key) {
            debug!(key = %storage_key, "cache hit");
            return Ok(Fetched {
                data: payload,
                source: Source::Memory,
            });
        }

        match loader().await {
            Ok(payload) => {
                info!(key = %storage_key, "loaded live");
                self.store_entry(&storage_key, payload.clone()).await;
                Ok(Fetched {
                    data: payload,
                    source: Source::Live,
                })
            }
            Err(err) => {
                warn!(key = %storage_key, error = %err, "live load failed");
                match self.read_durable(&storage_key).await {
                    Some(entry) => {
                        warn!(
                            key = %storage_key,
                            stored_at = %entry.stored_at,
                            "falling back to stored data"
                        );
                        Ok(Fetched {
                            data: entry.data,
                            source: Source::StaleFallback,
                        })
                    }
                    None => Err(DashError::NoDataAvailable {
                        key: storage_key,
                        source: Box::new(err),
                    }),
                }
            }
        }
    }

    /// Fetch a JSON resource as `T`.
    pub async fn fetch_json<T, F, Fut>(&self, key: &CacheKey, loader: F) -> Result<Fetched<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let fetched = self
            .fetch_with_source(key, || async move {
                let value = loader().await?;
                Ok(Payload::Json(serde_json::to_value(&value)?))
            })
            .await?;

        let storage_key = key.storage_key();
        let data = fetched.data.into_json(&storage_key)?;
        Ok(Fetched {
            data,
            source: fetched.source,
        })
    }

    /// Fetch a raw text resource.
    pub async fn fetch_text<F, Fut>(&self, key: &CacheKey, loader: F) -> Result<Fetched<String>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let fetched = self
            .fetch_with_source(key, || async move { Ok(Payload::Text(loader().await?)) })
            .await?;

        let storage_key = key.storage_key();
        let data = fetched.data.into_text(&storage_key)?;
        Ok(Fetched {
            data,
            source: fetched.source,
        })
    }

    /// Drop every entry from memory and from the durable store.
    pub async fn invalidate_all(&self) {
        self.memory().clear();
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to clear durable store");
        }
        info!("cache invalidated");
    }

    /// Drop a single entry from memory and from the durable store.
    pub async fn invalidate(&self, key: &CacheKey) {
        let storage_key = key.storage_key();
        self.memory().remove(&storage_key);
        if let Err(e) = self.store.delete(&storage_key).await {
            warn!(key = %storage_key, error = %e, "failed to delete durable entry");
        }
    }

    fn memory(&self) -> MutexGuard<'_, HashMap<String, CachedData<Payload>>> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fresh_in_memory(&self, storage_key: &str) -> Option<Payload> {
        let now = self.clock.now();
        self.memory()
            .get(storage_key)
            .filter(|entry| entry.is_fresh(self.config.ttl, now))
            .map(|entry| entry.data.clone())
    }

    /// Record a successful load in memory and, best-effort, in the durable store.
    async fn store_entry(&self, storage_key: &str, payload: Payload) {
        let entry = CachedData::new(payload, self.clock.now());

        let serialized = match entry.to_json() {
            Ok(serialized) => Some(serialized),
            Err(e) => {
                warn!(key = %storage_key, error = %e, "failed to serialize entry");
                None
            }
        };

        self.memory().insert(storage_key.to_string(), entry);

        let Some(serialized) = serialized else {
            return;
        };

        match self.store.set(storage_key, &serialized).await {
            Ok(()) => {}
            Err(e) if e.is_quota() => {
                warn!(key = %storage_key, error = %e, "storage quota exhausted, clearing durable store");
                if let Err(e) = self.store.clear().await {
                    warn!(error = %e, "failed to clear durable store");
                }
            }
            Err(e) => {
                warn!(key = %storage_key, error = %e, "failed to persist entry");
            }
        }
    }

    /// Read a durable entry regardless of age. Corrupt entries are deleted.
    async fn read_durable(&self, storage_key: &str) -> Option<CachedData<Payload>> {
        let raw = match self.store.get(storage_key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key = %storage_key, error = %e, "failed to read durable entry");
                return None;
            }
        };

        match CachedData::<Payload>::from_json(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(key = %storage_key, error = %e, "discarding corrupt durable entry");
                if let Err(e) = self.store.delete(storage_key).await {
                    warn!(key = %storage_key, error = %e, "failed to delete corrupt entry");
                }
                None
            }
        }
    }

    /// Load every still-fresh durable entry into memory.
    async fn reseed(&self) {
        let keys = match self.store.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "failed to list durable entries");
                return;
            }
        };

        let now = self.clock.now();
        let mut seeded = 0usize;
        for key in keys {
            let Some(entry) = self.read_durable(&key).await else {
                continue;
            };
            if entry.is_fresh(self.config.ttl, now) {
                self.memory().insert(key, entry);
                seeded += 1;
            }
        }

        debug!(seeded, "re-seeded cache from durable store");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::cache::durable::MemoryStore;
    use chrono::DateTime;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL_MS: i64 = 1_800_000;

    async fn create_test_cache() -> (CacheManager, Arc<MemoryStore>, ManualClock) {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::at_millis(0);
        let cache = CacheManager::open_with_clock(
            store.clone(),
            CacheConfig {
                ttl: Duration::from_millis(TTL_MS as u64),
            },
            Arc::new(clock.clone()),
        )
        .await;
        (cache, store, clock)
    }

    fn key() -> CacheKey {
        CacheKey::repository("acme", "widget")
    }

    #[tokio::test]
    async fn test_fresh_hit_skips_loader() {
        let (cache, _store, clock) = create_test_cache().await;
        let calls = AtomicUsize::new(0);

        let load = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Payload::Json(json!({"stars": 10})))
        };

        let first = cache.fetch_with_source(&key(), load).await.unwrap();
        assert_eq!(first.source, Source::Live);

        clock.set_millis(TTL_MS - 1);
        let second = cache
            .fetch_with_source(&key(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Payload::Json(json!({"stars": 99})))
            })
            .await
            .unwrap();

        assert_eq!(second.source, Source::Memory);
        assert_eq!(second.data, Payload::Json(json!({"stars": 10})));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_reloads_once() {
        let (cache, _store, clock) = create_test_cache().await;
        let calls = AtomicUsize::new(0);

        cache
            .fetch(&key(), || async { Ok(Payload::Json(json!(1))) })
            .await
            .unwrap();

        clock.set_millis(TTL_MS);
        let value = cache
            .fetch(&key(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Payload::Json(json!(2)))
            })
            .await
            .unwrap();

        assert_eq!(value, Payload::Json(json!(2)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_without_stored_data_is_no_data() {
        let (cache, _store, _clock) = create_test_cache().await;

        let err = cache
            .fetch(&key(), || async { Err(DashError::NotFound("/repos/acme/widget".into())) })
            .await
            .unwrap_err();

        match err {
            DashError::NoDataAvailable { key, source } => {
                assert_eq!(key, "repo/acme/widget");
                assert!(matches!(*source, DashError::NotFound(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_corrupt_durable_entry_is_deleted() {
        let (cache, store, _clock) = create_test_cache().await;
        store.set("repo/acme/widget", "{broken").await.unwrap();

        let err = cache
            .fetch(&key(), || async { Err(DashError::Other("offline".into())) })
            .await
            .unwrap_err();

        assert!(err.is_no_data());
        assert!(store.get("repo/acme/widget").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reseed_skips_expired_entries() {
        let store = Arc::new(MemoryStore::new());
        let fresh = CachedData::new(
            Payload::Json(json!("fresh")),
            DateTime::from_timestamp_millis(TTL_MS).unwrap(),
        );
        let stale = CachedData::new(
            Payload::Json(json!("stale")),
            DateTime::from_timestamp_millis(0).unwrap(),
        );
        store.set("repo/acme/fresh", &fresh.to_json().unwrap()).await.unwrap();
        store.set("repo/acme/stale", &stale.to_json().unwrap()).await.unwrap();
        store.set("repo/acme/corrupt", "nope").await.unwrap();

        let clock = ManualClock::at_millis(TTL_MS + 10);
        let cache = CacheManager::open_with_clock(
            store.clone(),
            CacheConfig {
                ttl: Duration::from_millis(TTL_MS as u64),
            },
            Arc::new(clock),
        )
        .await;

        assert_eq!(cache.memory_len(), 1);
        assert!(store.get("repo/acme/corrupt").await.unwrap().is_none());
        assert!(store.get("repo/acme/stale").await.unwrap().is_some());

        let value = cache
            .fetch(&CacheKey::repository("acme", "fresh"), || async {
                Err(DashError::Other("loader must not run".into()))
            })
            .await
            .unwrap();
        assert_eq!(value, Payload::Json(json!("fresh")));
    }

    #[tokio::test]
    async fn test_invalidate_single_key() {
        let (cache, store, _clock) = create_test_cache().await;
        let other = CacheKey::repository("acme", "gadget");

        cache.fetch(&key(), || async { Ok(Payload::Text("a".into())) }).await.unwrap();
        cache.fetch(&other, || async { Ok(Payload::Text("b".into())) }).await.unwrap();

        cache.invalidate(&key()).await;

        assert_eq!(cache.memory_len(), 1);
        assert!(store.get("repo/acme/widget").await.unwrap().is_none());
        assert!(store.get("repo/acme/gadget").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fetch_text_round_trip() {
        let (cache, _store, _clock) = create_test_cache().await;
        let readme = CacheKey::new(crate::cache::ResourceKind::Readme, "acme", "widget");

        let fetched = cache
            .fetch_text(&readme, || async { Ok("<h1>Widget</h1>".to_string()) })
            .await
            .unwrap();
        assert_eq!(fetched.data, "<h1>Widget</h1>");

        let cached = cache
            .fetch_text(&readme, || async { Err(DashError::Other("unused".into())) })
            .await
            .unwrap();
        assert_eq!(cached.source, Source::Memory);
        assert_eq!(cached.data, "<h1>Widget</h1>");
    }
}
