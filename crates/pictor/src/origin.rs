//! # Origin Seam
//!
//! The network boundary of the interception layer. [`Origin`] mirrors the
//! platform fetch contract: transport failures are errors, HTTP error
//! statuses are successful fetches carrying that status. Strategies decide
//! what is cacheable.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::cache::StoredResponse;
use crate::classify::ResourceRequest;
use crate::config::DeliveryConfig;
use crate::error::DeliveryError;

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &DeliveryConfig) -> Result<Client, DeliveryError> {
    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(5) // Allow multiple connections to same host
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    client_builder.build().map_err(DeliveryError::from)
}

/// The content source fresh data is fetched from on cache miss.
#[async_trait]
pub trait Origin: Send + Sync {
    /// Fetch a request from the origin, snapshotting the full response.
    async fn fetch(&self, request: &ResourceRequest) -> Result<StoredResponse, DeliveryError>;
}

/// Origin implementation over a reqwest client.
#[derive(Clone)]
pub struct HttpOrigin {
    client: Client,
}

impl HttpOrigin {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &DeliveryConfig) -> Result<Self, DeliveryError> {
        Ok(Self::new(create_client(config)?))
    }
}

#[async_trait]
impl Origin for HttpOrigin {
    async fn fetch(&self, request: &ResourceRequest) -> Result<StoredResponse, DeliveryError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());

        if let Some(accept) = &request.accept {
            builder = builder.header(reqwest::header::ACCEPT, accept);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        debug!(url = %request.url, %status, bytes = body.len(), "origin fetch completed");
        Ok(StoredResponse::new(status, headers, body))
    }
}
