//! # Cache Trimmer
//!
//! Periodic background task enforcing a maximum entry count per bounded
//! cache. Eviction is count-bounded only; staleness is not considered.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::store::CacheStore;
use crate::cache::types::{CacheConfig, CacheName, CacheNames};

/// Enforces entry-count bounds on the runtime and image caches.
pub struct CacheTrimmer {
    store: CacheStore,
    bounded: Vec<(CacheName, usize)>,
    interval: Duration,
}

impl CacheTrimmer {
    pub fn new(store: CacheStore, names: &CacheNames, config: &CacheConfig) -> Self {
        let bounded = vec![
            (names.runtime.clone(), config.runtime_max_entries),
            (names.image.clone(), config.image_max_entries),
        ];
        Self {
            store,
            bounded,
            interval: config.trim_interval,
        }
    }

    /// Trim every bounded cache once. Returns the total evicted entry count.
    pub fn run_once(&self) -> usize {
        let mut evicted = 0;
        for (name, max) in &self.bounded {
            let count = self.store.entry_count(name);
            if count > *max {
                evicted += self.store.trim_to(name, *max);
            }
        }
        evicted
    }

    /// Spawn the periodic trim task.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            loop {
                interval.tick().await;
                let evicted = self.run_once();
                if evicted > 0 {
                    debug!(evicted, "periodic cache trim");
                }
            }
        })
    }
}
