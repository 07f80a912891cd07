//! # Pictor
//!
//! A client-resident resource caching and delivery engine for content-heavy
//! visual sites. Intercepted requests are served from named, generation-
//! tagged caches through per-category strategies; explicit image loads go
//! through a progressive loader that deduplicates concurrent fetches and
//! adapts image quality to measured network conditions.
//!
//! ## Features
//!
//! - Request classification with per-category caching strategies
//!   (network-first, cache-first, network-race-with-timeout)
//! - Named cache store with count-bounded, oldest-first trimming
//! - Install pre-warm and generation-based cache invalidation
//! - Progressive loading with deduplication, retry backoff and timeouts
//! - Adaptive image quality selection from sampled network conditions

pub mod adaptive;
pub mod builder;
pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod loader;
pub mod origin;
pub mod strategy;

pub use builder::DeliveryConfigBuilder;
pub use cache::{
    CacheConfig, CacheKey, CacheKind, CacheName, CacheNames, CacheStore, CacheTrimmer, Generation,
    StoredResponse,
};
pub use config::{DeliveryConfig, LoaderConfig};
pub use error::DeliveryError;

// Re-export classification types
pub use classify::{Destination, RequestClass, ResourceRequest, RoutePolicy, classify};

// Re-export the network seam
pub use origin::{HttpOrigin, Origin, create_client};

// Re-export routing types
pub use strategy::{Delivered, RouterOutcome, ServedFrom, StrategyRouter};

// Re-export lifecycle types
pub use lifecycle::{
    AgentAction, AgentCommand, AgentReply, LifecycleManager, LifecyclePhase, spawn_agent,
};

// Re-export loader types
pub use loader::{
    HttpResourceFetcher, LoadError, LoadOptions, LoadPriority, LoadedResource, ResourceFetch,
    ResourceLoader,
};

// Re-export adaptive quality types
pub use adaptive::{
    AdaptiveQualitySelector, ConnectionProbe, ConnectionSample, EffectiveConnectionType,
    FixedProbe, ImageFormat, ImageRequest, NetworkQuality, NoProbe,
};
