//! # Builder for DeliveryConfig
//!
//! Fluent builder for creating and customizing [`DeliveryConfig`]
//! instances.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use pictor_engine::{DeliveryConfig, Generation};
//!
//! let config = DeliveryConfig::builder()
//!     .with_generation(Generation::new("v7"))
//!     .with_site_base("https://gallery.example")
//!     .with_precache_route("/about")
//!     .with_race_timeout(Duration::from_secs(3))
//!     .build();
//! ```

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::cache::{CacheConfig, Generation};
use crate::config::{DeliveryConfig, LoaderConfig};

/// Builder for creating DeliveryConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct DeliveryConfigBuilder {
    /// Internal config being built
    config: DeliveryConfig,
}

impl DeliveryConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: DeliveryConfig::default(),
        }
    }

    /// Set the deploy generation embedded in cache names
    pub fn with_generation(mut self, generation: Generation) -> Self {
        self.config.generation = generation;
        self
    }

    /// Set the site origin manifest routes resolve against.
    /// An unparseable URL leaves the previous value in place.
    pub fn with_site_base(mut self, base: impl AsRef<str>) -> Self {
        if let Ok(url) = url::Url::parse(base.as_ref()) {
            self.config.site_base = url;
        }
        self
    }

    /// Replace the install pre-cache manifest
    pub fn with_precache_manifest(mut self, routes: Vec<String>) -> Self {
        self.config.precache_manifest = routes;
        self
    }

    /// Append a route to the install pre-cache manifest
    pub fn with_precache_route(mut self, route: impl Into<String>) -> Self {
        self.config.precache_manifest.push(route.into());
        self
    }

    /// Set the offline fallback document route
    pub fn with_offline_fallback(mut self, route: impl Into<String>) -> Self {
        self.config.offline_fallback = route.into();
        self
    }

    /// Set the API path prefix
    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.api_prefix = prefix.into();
        self
    }

    /// Set the images path pattern (a regex matched against request paths)
    pub fn with_images_path_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.images_path_pattern = pattern.into();
        self
    }

    /// Set the deadline for the API network-race strategy
    pub fn with_race_timeout(mut self, timeout: Duration) -> Self {
        self.config.race_timeout = timeout;
        self
    }

    /// Set the cache store configuration
    pub fn with_cache_config(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    /// Enable or disable the named cache store
    pub fn with_caching_enabled(mut self, enabled: bool) -> Self {
        self.config.cache.enabled = enabled;
        self
    }

    /// Set the progressive loader configuration
    pub fn with_loader_config(mut self, loader: LoaderConfig) -> Self {
        self.config.loader = loader;
        self
    }

    /// Set the overall timeout for a single origin request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout (time to establish initial connection)
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set whether to follow redirects
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a custom HTTP header
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.headers.insert(name, value);
        }
        self
    }

    /// Set all HTTP headers, replacing any existing headers
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.config.headers = headers;
        self
    }

    /// Build the DeliveryConfig instance
    pub fn build(self) -> DeliveryConfig {
        self.config
    }
}

impl Default for DeliveryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
