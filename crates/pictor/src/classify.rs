//! # Request Classification
//!
//! Pure classification of inbound requests into the per-category caching
//! strategies. No side effects; the router decides what to do with the
//! category.

use regex::Regex;
use reqwest::Method;
use url::Url;

use crate::error::DeliveryError;

/// Category of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// An HTML document navigation.
    Navigation,
    /// An image load.
    Image,
    /// A call under the API prefix.
    Api,
    /// Any other static asset.
    Static,
}

/// Platform-declared destination of a request, when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Document,
    Image,
    Script,
    Style,
    Font,
    Other,
}

/// An inbound request as seen by the interception layer.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub method: Method,
    pub url: Url,
    pub accept: Option<String>,
    pub destination: Option<Destination>,
}

impl ResourceRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            accept: None,
            destination: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = Some(destination);
        self
    }
}

/// Compiled routing policy: which paths count as images, which as API calls.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    api_prefix: String,
    images_pattern: Regex,
}

impl RoutePolicy {
    pub fn new(
        api_prefix: impl Into<String>,
        images_pattern: &str,
    ) -> Result<Self, DeliveryError> {
        let images_pattern = Regex::new(images_pattern)
            .map_err(|e| DeliveryError::Policy(format!("images pattern: {e}")))?;
        Ok(Self {
            api_prefix: api_prefix.into(),
            images_pattern,
        })
    }

    pub fn api_prefix(&self) -> &str {
        &self.api_prefix
    }
}

/// Classify a request, or return `None` for requests the interception layer
/// must pass through untouched.
///
/// Priority order: non-GET requests are never intercepted; an `Accept`
/// header asking for HTML marks a navigation; an image destination or a path
/// matching the configured images pattern marks an image; a path under the
/// API prefix marks an API call; everything else is a static asset.
pub fn classify(request: &ResourceRequest, policy: &RoutePolicy) -> Option<RequestClass> {
    if request.method != Method::GET {
        return None;
    }

    if request
        .accept
        .as_deref()
        .is_some_and(|accept| accept.contains("text/html"))
    {
        return Some(RequestClass::Navigation);
    }

    let path = request.url.path();
    if matches!(request.destination, Some(Destination::Image))
        || policy.images_pattern.is_match(path)
    {
        return Some(RequestClass::Image);
    }

    if path.starts_with(policy.api_prefix.as_str()) {
        return Some(RequestClass::Api);
    }

    Some(RequestClass::Static)
}
