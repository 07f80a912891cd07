//! # Adaptive Quality Selection
//!
//! Derives an image quality/resolution policy from measured network
//! conditions. The selector keeps no state: every call re-samples the
//! probe, so the policy adapts continuously as conditions change
//! mid-session.

use std::sync::Arc;

use tracing::debug;
use url::Url;

/// Quality tier derived from a connection sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkQuality {
    Slow,
    Medium,
    Fast,
}

/// Platform-reported effective connection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveConnectionType {
    Slow2g,
    Cellular2g,
    Cellular3g,
    Cellular4g,
}

/// One on-demand sample of network characteristics. Never persisted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionSample {
    pub effective_type: Option<EffectiveConnectionType>,
    pub downlink_mbps: Option<f64>,
}

/// Source of connection samples. Returning `None` means the platform does
/// not report network information; the selector falls back to `Medium`.
pub trait ConnectionProbe: Send + Sync {
    fn sample(&self) -> Option<ConnectionSample>;
}

/// Probe for platforms without network reporting.
pub struct NoProbe;

impl ConnectionProbe for NoProbe {
    fn sample(&self) -> Option<ConnectionSample> {
        None
    }
}

/// Probe returning a fixed sample, fed by the embedding application.
pub struct FixedProbe(pub ConnectionSample);

impl ConnectionProbe for FixedProbe {
    fn sample(&self) -> Option<ConnectionSample> {
        Some(self.0)
    }
}

/// Parameters for composing an image variant URL.
#[derive(Debug, Clone, Copy)]
pub struct ImageRequest {
    pub width: u32,
    pub quality: Option<u8>,
    pub format: ImageFormat,
}

impl ImageRequest {
    pub fn new(width: u32) -> Self {
        Self {
            width,
            quality: None,
            format: ImageFormat::Webp,
        }
    }

    /// Explicit quality (0–100) overriding the adaptive default.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Webp,
    Avif,
    Jpeg,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Webp => "webp",
            ImageFormat::Avif => "avif",
            ImageFormat::Jpeg => "jpg",
        }
    }
}

/// Maps connection samples to an image delivery policy.
#[derive(Clone)]
pub struct AdaptiveQualitySelector {
    probe: Arc<dyn ConnectionProbe>,
}

impl AdaptiveQualitySelector {
    pub fn new(probe: Arc<dyn ConnectionProbe>) -> Self {
        Self { probe }
    }

    /// Selector for platforms without network reporting; always `Medium`.
    pub fn without_probe() -> Self {
        Self::new(Arc::new(NoProbe))
    }

    /// Current quality tier. Re-samples on every call.
    pub fn network_quality(&self) -> NetworkQuality {
        let Some(sample) = self.probe.sample() else {
            return NetworkQuality::Medium;
        };

        use EffectiveConnectionType::*;
        let quality = if matches!(sample.effective_type, Some(Slow2g | Cellular2g))
            || sample.downlink_mbps.is_some_and(|mbps| mbps < 1.0)
        {
            NetworkQuality::Slow
        } else if matches!(sample.effective_type, Some(Cellular3g))
            || sample.downlink_mbps.is_some_and(|mbps| mbps < 5.0)
        {
            NetworkQuality::Medium
        } else if sample.effective_type.is_some() || sample.downlink_mbps.is_some() {
            NetworkQuality::Fast
        } else {
            // A sample with no usable fields is the same as no sample.
            NetworkQuality::Medium
        };

        debug!(?sample, ?quality, "network quality sampled");
        quality
    }

    /// Compression fraction for the current tier.
    pub fn optimal_image_quality(&self) -> f32 {
        match self.network_quality() {
            NetworkQuality::Slow => 0.5,
            NetworkQuality::Medium => 0.75,
            NetworkQuality::Fast => 0.95,
        }
    }

    /// Requested width clamped by the current tier.
    pub fn max_width(&self, requested: u32) -> u32 {
        match self.network_quality() {
            NetworkQuality::Slow => requested.min(800),
            NetworkQuality::Medium => requested.min(1280),
            NetworkQuality::Fast => requested,
        }
    }

    /// Compose a variant URL: `w` (tier-clamped width), `q` (0–100) and
    /// `fm` (format) query parameters appended to the base resource path.
    pub fn image_url(&self, base: &str, request: &ImageRequest) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(base)?;
        let width = self.max_width(request.width);
        let quality = request
            .quality
            .unwrap_or_else(|| (self.optimal_image_quality() * 100.0).round() as u8);

        url.query_pairs_mut()
            .append_pair("w", &width.to_string())
            .append_pair("q", &quality.to_string())
            .append_pair("fm", request.format.as_str());

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(effective_type: Option<EffectiveConnectionType>, mbps: Option<f64>) -> AdaptiveQualitySelector {
        AdaptiveQualitySelector::new(Arc::new(FixedProbe(ConnectionSample {
            effective_type,
            downlink_mbps: mbps,
        })))
    }

    #[test]
    fn missing_probe_defaults_to_medium() {
        let selector = AdaptiveQualitySelector::without_probe();
        assert_eq!(selector.network_quality(), NetworkQuality::Medium);
        assert_eq!(selector.optimal_image_quality(), 0.75);
    }

    #[test]
    fn tier_mapping() {
        use EffectiveConnectionType::*;
        assert_eq!(
            selector(Some(Slow2g), None).network_quality(),
            NetworkQuality::Slow
        );
        assert_eq!(
            selector(Some(Cellular2g), Some(8.0)).network_quality(),
            NetworkQuality::Slow
        );
        assert_eq!(
            selector(Some(Cellular4g), Some(0.5)).network_quality(),
            NetworkQuality::Slow
        );
        assert_eq!(
            selector(Some(Cellular3g), Some(20.0)).network_quality(),
            NetworkQuality::Medium
        );
        assert_eq!(
            selector(Some(Cellular4g), Some(2.0)).network_quality(),
            NetworkQuality::Medium
        );
        assert_eq!(
            selector(Some(Cellular4g), Some(10.0)).network_quality(),
            NetworkQuality::Fast
        );
        assert_eq!(
            selector(None, Some(25.0)).network_quality(),
            NetworkQuality::Fast
        );
    }

    #[test]
    fn slow_tier_never_exceeds_800_wide() {
        let selector = selector(Some(EffectiveConnectionType::Cellular2g), None);
        let url = selector
            .image_url("https://gallery.test/images/hero.jpg", &ImageRequest::new(2400))
            .unwrap();

        let width: u32 = url
            .query_pairs()
            .find(|(k, _)| k == "w")
            .map(|(_, v)| v.parse().unwrap())
            .unwrap();
        assert!(width <= 800);
    }

    #[test]
    fn medium_tier_clamps_to_1280() {
        let selector = AdaptiveQualitySelector::without_probe();
        assert_eq!(selector.max_width(2400), 1280);
        assert_eq!(selector.max_width(640), 640);
    }

    #[test]
    fn fast_tier_keeps_requested_width() {
        let selector = selector(Some(EffectiveConnectionType::Cellular4g), Some(30.0));
        assert_eq!(selector.max_width(2400), 2400);
    }

    #[test]
    fn image_url_carries_adaptive_params() {
        let selector = selector(Some(EffectiveConnectionType::Cellular4g), Some(30.0));
        let url = selector
            .image_url("https://gallery.test/images/hero.jpg", &ImageRequest::new(1600))
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://gallery.test/images/hero.jpg?w=1600&q=95&fm=webp"
        );
    }

    #[test]
    fn explicit_quality_overrides_tier() {
        let selector = AdaptiveQualitySelector::without_probe();
        let url = selector
            .image_url(
                "https://gallery.test/images/hero.jpg",
                &ImageRequest::new(640).with_quality(42).with_format(ImageFormat::Avif),
            )
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://gallery.test/images/hero.jpg?w=640&q=42&fm=avif"
        );
    }
}
