//! # Strategy Router
//!
//! Applies a per-category caching strategy against the named cache store:
//! network-first-with-fallback for document navigations, cache-first for
//! images and static assets, network-race-with-timeout for API calls.
//!
//! Only responses with a successful status are ever written to a cache, so
//! a broken resource can never poison a cache entry.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheName, CacheNames, CacheStore, StoredResponse};
use crate::classify::{RequestClass, ResourceRequest, RoutePolicy, classify};
use crate::config::DeliveryConfig;
use crate::error::DeliveryError;
use crate::origin::Origin;

/// Where a delivered response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Network,
    Cache,
    OfflineFallback,
}

/// A response delivered by the router.
#[derive(Debug, Clone)]
pub struct Delivered {
    pub response: StoredResponse,
    pub served_from: ServedFrom,
}

/// Outcome of routing one request.
#[derive(Debug)]
pub enum RouterOutcome {
    /// The request is not intercepted; the caller performs its own fetch.
    Bypass,
    /// A response was produced.
    Delivered(Delivered),
    /// API race lost with no cached entry; the caller must treat this as
    /// "no data available now", not as a failure.
    NoData,
}

/// Routes classified requests through the per-category strategies.
pub struct StrategyRouter {
    origin: Arc<dyn Origin>,
    store: CacheStore,
    names: CacheNames,
    policy: RoutePolicy,
    race_timeout: Duration,
    offline_key: CacheKey,
}

impl StrategyRouter {
    pub fn new(
        origin: Arc<dyn Origin>,
        store: CacheStore,
        config: &DeliveryConfig,
    ) -> Result<Self, DeliveryError> {
        let policy = config.route_policy()?;
        let offline_url = config
            .site_base
            .join(&config.offline_fallback)
            .map_err(|e| DeliveryError::Url(format!("{}: {e}", config.offline_fallback)))?;

        Ok(Self {
            origin,
            store,
            names: config.cache_names(),
            policy,
            race_timeout: config.race_timeout,
            offline_key: CacheKey::get(&offline_url),
        })
    }

    /// Route one request through its category strategy.
    pub async fn handle(&self, request: &ResourceRequest) -> Result<RouterOutcome, DeliveryError> {
        let Some(class) = classify(request, &self.policy) else {
            return Ok(RouterOutcome::Bypass);
        };

        let key = CacheKey::for_request(&request.method, &request.url);
        let outcome = match class {
            RequestClass::Navigation => {
                RouterOutcome::Delivered(self.network_first(request, key).await?)
            }
            RequestClass::Image => {
                let name = self.names.image.clone();
                RouterOutcome::Delivered(self.cache_first(request, key, &name).await?)
            }
            RequestClass::Static => {
                let name = self.names.runtime.clone();
                RouterOutcome::Delivered(self.cache_first(request, key, &name).await?)
            }
            RequestClass::Api => self.race_with_timeout(request, key).await?,
        };
        Ok(outcome)
    }

    /// network-first-with-fallback: try the origin; on transport failure
    /// fall back to the cached entry, then to the offline document.
    async fn network_first(
        &self,
        request: &ResourceRequest,
        key: CacheKey,
    ) -> Result<Delivered, DeliveryError> {
        match self.origin.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.store
                        .put(&self.names.runtime, key, response.clone());
                }
                Ok(Delivered {
                    response,
                    served_from: ServedFrom::Network,
                })
            }
            Err(err) => {
                if let Some(cached) = self.store.get(&self.names.runtime, &key) {
                    debug!(url = %request.url, "navigation served from cache after network failure");
                    return Ok(Delivered {
                        response: cached,
                        served_from: ServedFrom::Cache,
                    });
                }

                if let Some(fallback) = self.store.get(&self.names.static_assets, &self.offline_key)
                {
                    warn!(url = %request.url, error = %err, "navigation failed, serving offline fallback");
                    return Ok(Delivered {
                        response: fallback,
                        served_from: ServedFrom::OfflineFallback,
                    });
                }

                Err(err)
            }
        }
    }

    /// cache-first-with-refresh: a hit returns without a network round-trip;
    /// a miss fetches and caches only successful responses.
    async fn cache_first(
        &self,
        request: &ResourceRequest,
        key: CacheKey,
        name: &CacheName,
    ) -> Result<Delivered, DeliveryError> {
        if let Some(cached) = self.store.get(name, &key) {
            return Ok(Delivered {
                response: cached,
                served_from: ServedFrom::Cache,
            });
        }

        let response = self.origin.fetch(request).await?;
        if response.is_success() {
            self.store.put(name, key, response.clone());
        } else {
            debug!(url = %request.url, status = %response.status, "not caching failed response");
        }

        Ok(Delivered {
            response,
            served_from: ServedFrom::Network,
        })
    }

    /// network-race-with-timeout: the fetch runs as its own task so that a
    /// late network response still refreshes the cache after the caller has
    /// already been served from it. The loser's effect is honored, its
    /// result is not. (Freshness-over-consistency policy choice.)
    async fn race_with_timeout(
        &self,
        request: &ResourceRequest,
        key: CacheKey,
    ) -> Result<RouterOutcome, DeliveryError> {
        let origin = Arc::clone(&self.origin);
        let store = self.store.clone();
        let name = self.names.runtime.clone();
        let write_key = key.clone();
        let request_for_fetch = request.clone();

        let mut fetch = tokio::spawn(async move {
            let result = origin.fetch(&request_for_fetch).await;
            if let Ok(response) = &result {
                if response.is_success() {
                    store.put(&name, write_key, response.clone());
                }
            }
            result
        });

        let network_won = tokio::select! {
            joined = &mut fetch => match joined {
                Ok(Ok(response)) => Some(response),
                Ok(Err(err)) => {
                    debug!(url = %request.url, error = %err, "api fetch failed, falling back to cache");
                    None
                }
                Err(join_err) => {
                    warn!(url = %request.url, error = %join_err, "api fetch task failed");
                    None
                }
            },
            _ = tokio::time::sleep(self.race_timeout) => {
                debug!(url = %request.url, timeout = ?self.race_timeout, "api race timed out, falling back to cache");
                None
            }
        };

        if let Some(response) = network_won {
            return Ok(RouterOutcome::Delivered(Delivered {
                response,
                served_from: ServedFrom::Network,
            }));
        }

        match self.store.get(&self.names.runtime, &key) {
            Some(cached) => Ok(RouterOutcome::Delivered(Delivered {
                response: cached,
                served_from: ServedFrom::Cache,
            })),
            None => Ok(RouterOutcome::NoData),
        }
    }
}
