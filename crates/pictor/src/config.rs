use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use url::Url;

use crate::cache::{CacheConfig, CacheNames, Generation};
use crate::classify::RoutePolicy;
use crate::error::DeliveryError;

const DEFAULT_USER_AGENT: &str = "pictor-engine/0.3";

/// Default images-path pattern: anything under `/images/` or with a raster
/// file extension.
pub const DEFAULT_IMAGES_PATTERN: &str = r"(?i)^/images/|\.(?:png|jpe?g|webp|gif|svg|avif)$";

/// Configurable options for the delivery layer
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Current deploy generation; cache names embed it
    pub generation: Generation,

    /// Origin the site is served from; manifest routes resolve against it
    pub site_base: Url,

    /// Routes pre-cached at install
    pub precache_manifest: Vec<String>,

    /// Route of the offline fallback document (must be in the manifest)
    pub offline_fallback: String,

    /// Path prefix marking API requests
    pub api_prefix: String,

    /// Regex marking image paths
    pub images_path_pattern: String,

    /// Deadline for the API network-race strategy
    pub race_timeout: Duration,

    /// Cache store and trimmer configuration
    pub cache: CacheConfig,

    /// Progressive loader configuration
    pub loader: LoaderConfig,

    /// Overall timeout for a single origin request
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers for origin requests
    pub headers: HeaderMap,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            generation: Generation::new("v1"),
            site_base: Url::parse("https://localhost").expect("static URL"),
            precache_manifest: vec![
                "/".to_string(),
                "/gallery".to_string(),
                "/site.webmanifest".to_string(),
                "/offline.html".to_string(),
            ],
            offline_fallback: "/offline.html".to_string(),
            api_prefix: "/api/".to_string(),
            images_path_pattern: DEFAULT_IMAGES_PATTERN.to_string(),
            race_timeout: Duration::from_secs(5),
            cache: CacheConfig::default(),
            loader: LoaderConfig::default(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: DeliveryConfig::get_default_headers(),
        }
    }
}

impl DeliveryConfig {
    pub fn builder() -> crate::builder::DeliveryConfigBuilder {
        crate::builder::DeliveryConfigBuilder::new()
    }

    /// Compile the routing policy from the configured prefixes/patterns.
    pub fn route_policy(&self) -> Result<RoutePolicy, DeliveryError> {
        RoutePolicy::new(self.api_prefix.clone(), &self.images_path_pattern)
    }

    /// The declared cache names for the configured generation.
    pub fn cache_names(&self) -> CacheNames {
        CacheNames::for_generation(&self.generation)
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate"),
        );

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers
    }
}

/// Configuration for the progressive resource loader
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Retries after the initial attempt
    pub retry: u32,
    /// Global deadline spanning all attempts of one load
    pub load_timeout: Duration,
    /// Backoff unit; attempt `n` sleeps `backoff_unit * n` before retrying
    pub backoff_unit: Duration,
    /// Byte capacity of the finished-resource cache
    pub resource_cache_bytes: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            retry: 3,
            load_timeout: Duration::from_secs(30),
            backoff_unit: Duration::from_millis(1000),
            resource_cache_bytes: 30 * 1024 * 1024, // 30MB
        }
    }
}
