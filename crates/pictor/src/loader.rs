//! # Progressive Resource Loader
//!
//! Page-context loader for explicit image/asset loads. Concurrent requests
//! for one URL share a single in-flight operation; transient failures are
//! retried with linear backoff under one global deadline; finished
//! resources land in a short-lived memory cache independent of the named
//! cache store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use moka::future::Cache as MokaCache;
use parking_lot::Mutex;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::adaptive::{AdaptiveQualitySelector, ImageRequest};
use crate::config::LoaderConfig;

/// Terminal failure of a load operation. Clone-able so that every caller
/// joined to a deduplicated operation observes the same error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("network error: {0}")]
    Network(String),

    #[error("resource load timed out after {0:?}")]
    Timeout(Duration),
}

/// A fully loaded resource handle.
#[derive(Debug, Clone)]
pub struct LoadedResource {
    pub url: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl LoadedResource {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Delivery priority hint forwarded to the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPriority {
    #[default]
    Auto,
    High,
    Low,
}

/// Raw resource fetching seam for the loader.
#[async_trait::async_trait]
pub trait ResourceFetch: Send + Sync {
    async fn fetch(&self, url: &Url, priority: LoadPriority) -> Result<LoadedResource, LoadError>;
}

/// Fetcher over a reqwest client. Non-success statuses are network errors
/// here: the loader never keeps a failed load.
pub struct HttpResourceFetcher {
    client: Client,
}

impl HttpResourceFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ResourceFetch for HttpResourceFetcher {
    async fn fetch(&self, url: &Url, priority: LoadPriority) -> Result<LoadedResource, LoadError> {
        let mut builder = self.client.get(url.clone());
        builder = match priority {
            LoadPriority::High => builder.header("priority", "u=2"),
            LoadPriority::Low => builder.header("priority", "u=5"),
            LoadPriority::Auto => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| LoadError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Network(format!("status {status} for {url}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| LoadError::Network(e.to_string()))?;

        Ok(LoadedResource {
            url: url.to_string(),
            content_type,
            bytes,
        })
    }
}

type LoadCallback = Arc<dyn Fn(&LoadedResource) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&LoadError) + Send + Sync>;

/// Per-call options. All optional; defaults come from [`LoaderConfig`].
#[derive(Clone, Default)]
pub struct LoadOptions {
    /// Explicit quality (0–100) overriding adaptive selection
    pub quality: Option<u8>,
    /// Delivery priority hint
    pub priority: LoadPriority,
    /// Placeholder shown by the page layer while the load is pending;
    /// carried here so call sites keep one options value
    pub placeholder: Option<String>,
    /// Retries after the initial attempt
    pub retry: Option<u32>,
    /// Global deadline for this load
    pub timeout: Option<Duration>,
    on_load: Option<LoadCallback>,
    on_error: Option<ErrorCallback>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_priority(mut self, priority: LoadPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn on_load(mut self, callback: impl Fn(&LoadedResource) + Send + Sync + 'static) -> Self {
        self.on_load = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&LoadError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

type SharedLoad = Shared<BoxFuture<'static, Result<LoadedResource, LoadError>>>;

/// Progressive resource loader with request deduplication.
#[derive(Clone)]
pub struct ResourceLoader {
    fetcher: Arc<dyn ResourceFetch>,
    selector: AdaptiveQualitySelector,
    config: Arc<LoaderConfig>,
    in_flight: Arc<Mutex<HashMap<String, SharedLoad>>>,
    resources: MokaCache<String, LoadedResource>,
}

impl ResourceLoader {
    pub fn new(
        fetcher: Arc<dyn ResourceFetch>,
        selector: AdaptiveQualitySelector,
        config: LoaderConfig,
    ) -> Self {
        let resources = MokaCache::builder()
            .weigher(|_k, v: &LoadedResource| v.len().try_into().unwrap_or(u32::MAX))
            .max_capacity(config.resource_cache_bytes)
            .build();

        Self {
            fetcher,
            selector,
            config: Arc::new(config),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            resources,
        }
    }

    pub fn selector(&self) -> &AdaptiveQualitySelector {
        &self.selector
    }

    /// Load a resource. Concurrent calls for the same URL share one network
    /// operation and observe the same result; failures are reported through
    /// both the returned result and `on_error`, never as a panic.
    pub async fn load(
        &self,
        url: &str,
        options: LoadOptions,
    ) -> Result<LoadedResource, LoadError> {
        let target = Url::parse(url)
            .map_err(|e| LoadError::Network(format!("invalid URL {url}: {e}")))?;
        let key = {
            let mut normalized = target.clone();
            normalized.set_fragment(None);
            String::from(normalized)
        };

        // Finished-resource hit: no in-flight map, no network.
        if let Some(hit) = self.resources.get(&key).await {
            debug!(url = %key, "resource cache hit");
            if let Some(callback) = &options.on_load {
                callback(&hit);
            }
            return Ok(hit);
        }

        // Check-then-insert happens under one guard so concurrent callers
        // cannot both decide to start a fetch.
        let shared = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(&key) {
                Some(existing) => {
                    debug!(url = %key, "joining in-flight load");
                    existing.clone()
                }
                None => {
                    let load = self.start_load(key.clone(), target, &options);
                    in_flight.insert(key.clone(), load.clone());
                    load
                }
            }
        };

        let result = shared.await;
        match &result {
            Ok(resource) => {
                if let Some(callback) = &options.on_load {
                    callback(resource);
                }
            }
            Err(err) => {
                if let Some(callback) = &options.on_error {
                    callback(err);
                }
            }
        }
        result
    }

    /// Load an image variant composed through the adaptive quality
    /// selector: the requested width is clamped by the current network
    /// tier and quality/format parameters are appended to `base_url`.
    pub async fn load_image(
        &self,
        base_url: &str,
        width: u32,
        options: LoadOptions,
    ) -> Result<LoadedResource, LoadError> {
        let mut variant = ImageRequest::new(width);
        if let Some(quality) = options.quality {
            variant = variant.with_quality(quality);
        }

        let url = self
            .selector
            .image_url(base_url, &variant)
            .map_err(|e| LoadError::Network(format!("invalid URL {base_url}: {e}")))?;
        self.load(url.as_str(), options).await
    }

    /// Peek the finished-resource cache.
    pub async fn cached(&self, url: &str) -> Option<LoadedResource> {
        self.resources.get(url).await
    }

    /// Drop all finished resources and forget nothing else; in-flight
    /// operations are unaffected.
    pub fn clear_resources(&self) {
        self.resources.invalidate_all();
    }

    /// Build the one shared future driving a load: retry loop under a
    /// global deadline, success populating the resource cache exactly once,
    /// and unconditional removal from the in-flight map on settle.
    fn start_load(&self, key: String, target: Url, options: &LoadOptions) -> SharedLoad {
        let fetcher = Arc::clone(&self.fetcher);
        let retries = options.retry.unwrap_or(self.config.retry);
        let deadline = options.timeout.unwrap_or(self.config.load_timeout);
        let backoff_unit = self.config.backoff_unit;
        let priority = options.priority;
        let in_flight = Arc::clone(&self.in_flight);
        let resources = self.resources.clone();

        async move {
            let attempts = async {
                let mut attempt = 0u32;
                loop {
                    attempt += 1;
                    match fetcher.fetch(&target, priority).await {
                        Ok(resource) => break Ok(resource),
                        Err(err) if attempt <= retries => {
                            let delay = backoff_unit * attempt;
                            warn!(url = %target, attempt, error = %err, ?delay, "load failed, backing off");
                            tokio::time::sleep(delay).await;
                        }
                        Err(err) => {
                            warn!(url = %target, attempt, error = %err, "load failed, retries exhausted");
                            break Err(err);
                        }
                    }
                }
            };

            let result = match tokio::time::timeout(deadline, attempts).await {
                Ok(result) => result,
                Err(_) => Err(LoadError::Timeout(deadline)),
            };

            if let Ok(resource) = &result {
                resources.insert(key.clone(), resource.clone()).await;
            }

            // Settled: the in-flight entry goes away whether we succeeded
            // or failed.
            in_flight.lock().remove(&key);
            result
        }
        .boxed()
        .shared()
    }
}
