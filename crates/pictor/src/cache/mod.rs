//! # Cache Subsystem
//!
//! Named, generation-tagged response caches with insertion-order eviction,
//! plus the periodic trimmer that keeps the bounded caches within their
//! entry limits.

mod store;
mod trimmer;
mod types;

pub use store::CacheStore;
pub use trimmer::CacheTrimmer;
pub use types::{
    CacheConfig, CacheKey, CacheKind, CacheName, CacheNames, Generation, StoredResponse,
};
