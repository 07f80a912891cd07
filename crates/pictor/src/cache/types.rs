//! # Cache Types
//!
//! Common types used across the named cache store.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use url::Url;

/// Explicit deploy-generation value.
///
/// Cache names embed a generation so that deploying a new version naturally
/// invalidates stale caches at activation. Generations are compared
/// structurally, never by substring matching on rendered cache ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Generation(String);

impl Generation {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three logical caches the delivery layer maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// Versioned pre-warmed assets (install manifest, offline fallback).
    Static,
    /// Runtime-populated documents and API responses.
    Runtime,
    /// Image responses.
    Image,
}

impl CacheKind {
    pub fn label(&self) -> &'static str {
        match self {
            CacheKind::Static => "static",
            CacheKind::Runtime => "runtime",
            CacheKind::Image => "image",
        }
    }
}

/// Identifier of a named cache: logical kind plus deploy generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheName {
    pub kind: CacheKind,
    pub generation: Generation,
}

impl CacheName {
    pub fn new(kind: CacheKind, generation: Generation) -> Self {
        Self { kind, generation }
    }

    /// Rendered identifier, e.g. `pictor-image-v3`. Display only; equality
    /// is structural on kind and generation.
    pub fn id(&self) -> String {
        format!("pictor-{}-{}", self.kind.label(), self.generation)
    }
}

impl fmt::Display for CacheName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// The currently-declared cache names for one deploy generation.
#[derive(Debug, Clone)]
pub struct CacheNames {
    pub static_assets: CacheName,
    pub runtime: CacheName,
    pub image: CacheName,
}

impl CacheNames {
    pub fn for_generation(generation: &Generation) -> Self {
        Self {
            static_assets: CacheName::new(CacheKind::Static, generation.clone()),
            runtime: CacheName::new(CacheKind::Runtime, generation.clone()),
            image: CacheName::new(CacheKind::Image, generation.clone()),
        }
    }

    /// Whether `name` belongs to the declared set for this generation.
    pub fn contains(&self, name: &CacheName) -> bool {
        *name == self.static_assets || *name == self.runtime || *name == self.image
    }
}

/// Cache key for identifying stored responses: method plus normalized URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub method: Method,
    pub url: String,
}

impl CacheKey {
    /// Build a key from a request method and URL. Normalization strips the
    /// fragment; everything else is kept as parsed.
    pub fn for_request(method: &Method, url: &Url) -> Self {
        let mut normalized = url.clone();
        normalized.set_fragment(None);
        Self {
            method: method.clone(),
            url: normalized.into(),
        }
    }

    pub fn get(url: &Url) -> Self {
        Self::for_request(&Method::GET, url)
    }
}

/// Snapshot of an HTTP response as held by a named cache.
///
/// Entries are replaced wholesale, never patched in place.
#[derive(Debug, Clone)]
pub struct StoredResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl StoredResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Whether this response may be written to a cache. Failed or error
    /// responses are never cached.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Configuration for the named cache store and its trimmer.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether caching is enabled
    pub enabled: bool,
    /// Maximum entry count for the runtime cache
    pub runtime_max_entries: usize,
    /// Maximum entry count for the image cache
    pub image_max_entries: usize,
    /// Period of the background trim task
    pub trim_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            runtime_max_entries: 50,
            image_max_entries: 60,
            trim_interval: Duration::from_secs(60), // 1 minute
        }
    }
}
