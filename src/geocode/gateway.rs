use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::http::{HttpClient, UreqClient};
use super::limiter::RateLimiter;
use super::provider::{create_provider, GeocodeProvider};
use crate::config::GeocodeConfig;
use crate::errors::{GeoMatchError, Result};
use crate::types::GeoPoint;

/// Free-text address to coordinate resolution.
pub trait Geocoder: Send + Sync {
    fn resolve(&self, text: &str) -> Result<GeoPoint>;
}

/// Rate-limited, retrying client around a single [`GeocodeProvider`].
///
/// `retry_count` is the total number of attempts (at least one). Timeouts
/// and transport failures are retried with a fixed delay until it runs out.
/// Every outbound request, retries included, goes through the gateway's
/// [`RateLimiter`].
pub struct GeocodeGateway {
    provider: Box<dyn GeocodeProvider>,
    client: Arc<dyn HttpClient>,
    limiter: RateLimiter,
    retry_count: u32,
    retry_delay: Duration,
}

impl GeocodeGateway {
    pub fn new(
        provider: Box<dyn GeocodeProvider>,
        client: Arc<dyn HttpClient>,
        config: &GeocodeConfig,
    ) -> Self {
        Self {
            provider,
            client,
            limiter: RateLimiter::new(config.request_delay()),
            retry_count: config.retry_count,
            retry_delay: config.request_delay(),
        }
    }

    /// Builds the configured provider over a `ureq` client. Returns `None`
    /// when no API key is configured.
    pub fn from_config(config: &GeocodeConfig) -> Option<Self> {
        if !config.is_enabled() {
            return None;
        }
        let provider = create_provider(config.provider, config.api_key.trim());
        let client = Arc::new(UreqClient::with_timeout(config.timeout()));
        Some(Self::new(provider, client, config))
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    fn attempt(&self, text: &str) -> Result<GeoPoint> {
        let waited = self.limiter.acquire();
        if !waited.is_zero() {
            debug!(waited_ms = waited.as_millis() as u64, "rate limited geocode request");
        }
        let params = self.provider.query_params(text);
        let response = self.client.get(self.provider.endpoint(), &params)?;
        self.provider.parse_response(text, &response)
    }
}

impl Geocoder for GeocodeGateway {
    fn resolve(&self, text: &str) -> Result<GeoPoint> {
        let text = text.trim();
        if text.is_empty() {
            return Err(GeoMatchError::GeocodeNotFound {
                query: String::new(),
            });
        }

        let attempts = self.retry_count.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(text) {
                Ok(point) => {
                    info!(
                        provider = self.provider.name(),
                        query = text,
                        lng = point.lng,
                        lat = point.lat,
                        attempt,
                        "geocoded"
                    );
                    return Ok(point);
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(
                        provider = self.provider.name(),
                        query = text,
                        attempt,
                        error = %e,
                        "geocode attempt failed; retrying"
                    );
                    std::thread::sleep(self.retry_delay);
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        provider = self.provider.name(),
                        query = text,
                        attempt,
                        error = %e,
                        "geocode failed"
                    );
                    return Err(e);
                }
            }
        }
    }
}
