//! Session-scoped generator cache.
//!
//! Handles are built lazily per [`SessionKey`] and evicted by capacity,
//! age since creation or idle time, whichever comes first. Concurrent
//! lookups of the same missing key share one construction.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use kiln_core::config::CacheConfig;
use kiln_core::SessionKey;

use crate::error::{ChatError, ChatResult};
use crate::handle::{GeneratorFactory, GeneratorHandle};

pub struct GeneratorCache {
    cache: Cache<SessionKey, Arc<GeneratorHandle>>,
    factory: Arc<dyn GeneratorFactory>,
    constructions: Arc<AtomicUsize>,
}

impl GeneratorCache {
    pub fn new(factory: Arc<dyn GeneratorFactory>, config: &CacheConfig) -> Self {
        Self::with_limits(
            factory,
            config.max_capacity,
            config.time_to_live(),
            config.time_to_idle(),
        )
    }

    pub fn with_limits(
        factory: Arc<dyn GeneratorFactory>,
        max_capacity: u64,
        time_to_live: Duration,
        time_to_idle: Duration,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(time_to_live)
            .time_to_idle(time_to_idle)
            .eviction_listener(|key: Arc<SessionKey>, handle: Arc<GeneratorHandle>, cause| {
                // Dropping the handle releases its memory; history stays on disk.
                debug!(
                    "Evicted generator {} (created {}, cause {:?})",
                    key,
                    handle.created_at(),
                    cause
                );
            })
            .build();

        Self {
            cache,
            factory,
            constructions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the handle for `key`, building it if absent.
    pub async fn get(&self, key: SessionKey) -> ChatResult<Arc<GeneratorHandle>> {
        let factory = self.factory.clone();
        let constructions = self.constructions.clone();

        self.cache
            .try_get_with(key, async move {
                constructions.fetch_add(1, Ordering::SeqCst);
                debug!("Building generator {}", key);
                factory.create(key).await.map(Arc::new)
            })
            .await
            .map_err(ChatError::from)
    }

    /// The cached handle, without building one.
    pub async fn peek(&self, key: SessionKey) -> Option<Arc<GeneratorHandle>> {
        self.cache.get(&key).await
    }

    pub async fn invalidate(&self, key: SessionKey) {
        self.cache.invalidate(&key).await;
    }

    /// Handles built since the cache was created.
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }

    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}
