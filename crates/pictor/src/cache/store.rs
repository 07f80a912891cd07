//! # Cache Store
//!
//! Named, generation-tagged key→response caches. Each named cache keeps its
//! entries in insertion order, which is the recency proxy used for eviction:
//! reads never reorder entries, writes append, and trimming removes strictly
//! from the front.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::cache::types::{CacheConfig, CacheKey, CacheName, StoredResponse};

/// One named cache. At most one entry per key; a re-put replaces the old
/// entry wholesale and appends it as the newest.
#[derive(Debug, Default)]
struct NamedCache {
    entries: VecDeque<(CacheKey, StoredResponse)>,
}

impl NamedCache {
    fn get(&self, key: &CacheKey) -> Option<&StoredResponse> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, response)| response)
    }

    fn put(&mut self, key: CacheKey, response: StoredResponse) {
        self.entries.retain(|(k, _)| *k != key);
        self.entries.push_back((key, response));
    }

    fn delete(&mut self, key: &CacheKey) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| k != key);
        self.entries.len() < before
    }

    fn size_bytes(&self) -> u64 {
        self.entries.iter().map(|(_, r)| r.len() as u64).sum()
    }
}

/// Handle to the named cache store.
///
/// Explicitly constructed and passed to its consumers; cloning shares the
/// underlying state. `teardown` via [`CacheStore::clear`].
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<RwLock<HashMap<CacheName, NamedCache>>>,
    config: Arc<CacheConfig>,
}

impl CacheStore {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(config),
        }
    }

    /// Look up a stored response. Reads do not touch entry order.
    pub fn get(&self, name: &CacheName, key: &CacheKey) -> Option<StoredResponse> {
        if !self.config.enabled {
            return None;
        }

        self.inner.read().get(name).and_then(|cache| cache.get(key).cloned())
    }

    /// Store a response, creating the named cache lazily on first write.
    pub fn put(&self, name: &CacheName, key: CacheKey, response: StoredResponse) {
        if !self.config.enabled {
            return;
        }

        let mut inner = self.inner.write();
        inner.entry(name.clone()).or_default().put(key, response);
    }

    /// Remove a single entry. Returns whether an entry was removed.
    pub fn delete(&self, name: &CacheName, key: &CacheKey) -> bool {
        let mut inner = self.inner.write();
        inner.get_mut(name).is_some_and(|cache| cache.delete(key))
    }

    /// Enumerate the keys of a named cache in insertion order.
    pub fn keys(&self, name: &CacheName) -> Vec<CacheKey> {
        self.inner
            .read()
            .get(name)
            .map(|cache| cache.entries.iter().map(|(k, _)| k.clone()).collect())
            .unwrap_or_default()
    }

    /// Enumerate all named caches currently present.
    pub fn cache_names(&self) -> Vec<CacheName> {
        self.inner.read().keys().cloned().collect()
    }

    /// Delete a named cache wholesale. Returns whether it existed.
    pub fn delete_cache(&self, name: &CacheName) -> bool {
        let existed = self.inner.write().remove(name).is_some();
        if existed {
            debug!(cache = %name, "named cache deleted");
        }
        existed
    }

    /// Drop every named cache and all entries.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        let count = inner.len();
        inner.clear();
        debug!(caches = count, "cache store cleared");
    }

    pub fn entry_count(&self, name: &CacheName) -> usize {
        self.inner
            .read()
            .get(name)
            .map(|cache| cache.entries.len())
            .unwrap_or(0)
    }

    /// Total body bytes across all named caches. Backs the `getCacheSize`
    /// reply to the foreground.
    pub fn total_size_bytes(&self) -> u64 {
        self.inner.read().values().map(NamedCache::size_bytes).sum()
    }

    /// Evict oldest entries until the named cache holds at most `max`.
    /// Returns the number of evicted entries.
    pub fn trim_to(&self, name: &CacheName, max: usize) -> usize {
        let mut inner = self.inner.write();
        let Some(cache) = inner.get_mut(name) else {
            return 0;
        };

        let mut evicted = 0;
        while cache.entries.len() > max {
            cache.entries.pop_front();
            evicted += 1;
        }

        if evicted > 0 {
            debug!(cache = %name, evicted, remaining = cache.entries.len(), "trimmed cache");
        }
        evicted
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::types::{CacheKind, Generation};
    use bytes::Bytes;
    use reqwest::StatusCode;
    use reqwest::header::HeaderMap;
    use url::Url;

    fn name(kind: CacheKind) -> CacheName {
        CacheName::new(kind, Generation::new("v1"))
    }

    fn key(path: &str) -> CacheKey {
        let url = Url::parse(&format!("https://gallery.test{path}")).unwrap();
        CacheKey::get(&url)
    }

    fn response(body: &str) -> StoredResponse {
        StoredResponse::new(
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from(body.to_string()),
        )
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = CacheStore::new(CacheConfig::default());
        let image = name(CacheKind::Image);

        store.put(&image, key("/images/a.webp"), response("a"));

        let hit = store.get(&image, &key("/images/a.webp")).unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"a"));
        assert!(store.get(&image, &key("/images/b.webp")).is_none());
    }

    #[test]
    fn disabled_store_ignores_writes() {
        let store = CacheStore::new(CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        });
        let image = name(CacheKind::Image);

        store.put(&image, key("/images/a.webp"), response("a"));

        assert!(store.get(&image, &key("/images/a.webp")).is_none());
        assert_eq!(store.cache_names().len(), 0);
    }

    #[test]
    fn keys_preserve_insertion_order() {
        let store = CacheStore::new(CacheConfig::default());
        let runtime = name(CacheKind::Runtime);

        for path in ["/one", "/two", "/three"] {
            store.put(&runtime, key(path), response(path));
        }
        // A read must not promote an entry.
        let _ = store.get(&runtime, &key("/one"));

        let keys = store.keys(&runtime);
        let paths: Vec<_> = keys.iter().map(|k| k.url.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "https://gallery.test/one",
                "https://gallery.test/two",
                "https://gallery.test/three"
            ]
        );
    }

    #[test]
    fn re_put_replaces_and_becomes_newest() {
        let store = CacheStore::new(CacheConfig::default());
        let runtime = name(CacheKind::Runtime);

        store.put(&runtime, key("/a"), response("old"));
        store.put(&runtime, key("/b"), response("b"));
        store.put(&runtime, key("/a"), response("new"));

        assert_eq!(store.entry_count(&runtime), 2);
        let hit = store.get(&runtime, &key("/a")).unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"new"));

        // /a was re-inserted, so /b is now the oldest and trims first.
        store.trim_to(&runtime, 1);
        assert!(store.get(&runtime, &key("/b")).is_none());
        assert!(store.get(&runtime, &key("/a")).is_some());
    }

    #[test]
    fn trim_keeps_most_recent_in_original_order() {
        let store = CacheStore::new(CacheConfig::default());
        let image = name(CacheKind::Image);

        for i in 0..8 {
            store.put(&image, key(&format!("/img/{i}")), response("x"));
        }

        let evicted = store.trim_to(&image, 3);
        assert_eq!(evicted, 5);
        assert_eq!(store.entry_count(&image), 3);

        let paths: Vec<_> = store
            .keys(&image)
            .iter()
            .map(|k| k.url.clone())
            .collect();
        assert_eq!(
            paths,
            vec![
                "https://gallery.test/img/5",
                "https://gallery.test/img/6",
                "https://gallery.test/img/7"
            ]
        );
    }

    #[test]
    fn trim_under_limit_is_a_no_op() {
        let store = CacheStore::new(CacheConfig::default());
        let image = name(CacheKind::Image);

        store.put(&image, key("/img/0"), response("x"));
        assert_eq!(store.trim_to(&image, 3), 0);
        assert_eq!(store.entry_count(&image), 1);
    }

    #[test]
    fn delete_cache_drops_whole_cache() {
        let store = CacheStore::new(CacheConfig::default());
        let stale = CacheName::new(CacheKind::Image, Generation::new("v0"));
        let current = CacheName::new(CacheKind::Image, Generation::new("v1"));

        store.put(&stale, key("/img/a"), response("a"));
        store.put(&current, key("/img/a"), response("a"));

        assert!(store.delete_cache(&stale));
        assert!(!store.delete_cache(&stale));
        assert!(store.get(&stale, &key("/img/a")).is_none());
        assert!(store.get(&current, &key("/img/a")).is_some());
    }

    #[test]
    fn clear_empties_everything() {
        let store = CacheStore::new(CacheConfig::default());
        store.put(&name(CacheKind::Runtime), key("/a"), response("aaaa"));
        store.put(&name(CacheKind::Image), key("/b"), response("bb"));

        assert_eq!(store.total_size_bytes(), 6);
        store.clear();
        assert_eq!(store.total_size_bytes(), 0);
        assert!(store.cache_names().is_empty());
    }

    #[test]
    fn delete_single_entry() {
        let store = CacheStore::new(CacheConfig::default());
        let runtime = name(CacheKind::Runtime);

        store.put(&runtime, key("/a"), response("a"));
        assert!(store.delete(&runtime, &key("/a")));
        assert!(!store.delete(&runtime, &key("/a")));
        assert!(store.get(&runtime, &key("/a")).is_none());
    }

    #[test]
    fn cache_names_are_structural() {
        let store = CacheStore::new(CacheConfig::default());
        let v1 = CacheName::new(CacheKind::Runtime, Generation::new("v1"));
        let v2 = CacheName::new(CacheKind::Runtime, Generation::new("v2"));

        store.put(&v1, key("/a"), response("a"));
        store.put(&v2, key("/a"), response("a"));

        let names = store.cache_names();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&v1));
        assert!(names.contains(&v2));
    }
}
