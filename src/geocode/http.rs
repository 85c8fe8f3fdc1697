//! HTTP client abstraction for testability.

use std::time::Duration;

use tracing::trace;

use crate::errors::{GeoMatchError, Result};

/// Status and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Synchronous HTTP GET with query parameters.
///
/// Implementations report timeouts as [`GeoMatchError::GeocodeTimeout`] and
/// connection-level failures as [`GeoMatchError::GeocodeTransport`]. Any
/// response that arrives, whatever its status, is returned as `Ok`.
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse>;
}

/// Production client backed by `ureq`.
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    /// Creates a client whose whole request (connect, send, read) is bounded
    /// by `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: config.into(),
        }
    }
}

fn map_ureq_error(url: &str, error: ureq::Error) -> GeoMatchError {
    match error {
        ureq::Error::Timeout(which) => GeoMatchError::GeocodeTimeout {
            message: format!("request to {url} timed out ({which:?})"),
        },
        other => GeoMatchError::GeocodeTransport {
            message: format!("request to {url} failed: {other}"),
        },
    }
}

impl HttpClient for UreqClient {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse> {
        let mut request = self.agent.get(url);
        for (key, value) in query {
            request = request.query(*key, *value);
        }

        let mut response = request.call().map_err(|e| map_ureq_error(url, e))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| map_ureq_error(url, e))?;

        trace!(url, status, bytes = body.len(), "http response");
        Ok(HttpResponse { status, body })
    }
}
