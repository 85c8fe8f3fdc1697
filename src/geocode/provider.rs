//! Geocoding provider implementations.
//!
//! Each provider knows its endpoint, how to phrase a request, and how to map
//! its response body and status codes onto the crate's error taxonomy.

use serde_json::Value;

use super::http::HttpResponse;
use crate::config::ProviderKind;
use crate::errors::{GeoMatchError, Result};
use crate::types::GeoPoint;

/// A geocoding web service.
pub trait GeocodeProvider: Send + Sync {
    /// Short provider name used in logs and errors.
    fn name(&self) -> &'static str;

    fn endpoint(&self) -> &str;

    /// Query parameters for an address lookup.
    fn query_params<'a>(&'a self, address: &'a str) -> Vec<(&'a str, &'a str)>;

    /// Interprets a response.
    fn parse_response(&self, address: &str, response: &HttpResponse) -> Result<GeoPoint>;
}

/// Creates the provider selected by `kind`.
pub fn create_provider(kind: ProviderKind, api_key: &str) -> Box<dyn GeocodeProvider> {
    match kind {
        ProviderKind::Amap => Box::new(AmapProvider::new(api_key)),
        ProviderKind::Baidu => Box::new(BaiduProvider::new(api_key)),
    }
}

/// Maps HTTP-level failures common to every provider: 429 is a quota error,
/// 5xx is transient, other non-2xx statuses are rejections.
fn check_status(provider: &str, response: &HttpResponse) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    let status = response.status;
    Err(match status {
        429 => GeoMatchError::GeocodeQuota {
            provider: provider.to_string(),
            message: "HTTP 429 Too Many Requests".to_string(),
        },
        500..=599 => GeoMatchError::GeocodeTransport {
            message: format!("{provider} returned HTTP {status}"),
        },
        _ => GeoMatchError::GeocodeRejected {
            provider: provider.to_string(),
            message: format!("HTTP {status}"),
        },
    })
}

fn parse_json(provider: &str, response: &HttpResponse) -> Result<Value> {
    serde_json::from_slice(&response.body).map_err(|e| GeoMatchError::GeocodeRejected {
        provider: provider.to_string(),
        message: format!("invalid JSON response: {e}"),
    })
}

fn valid_point(lng: f64, lat: f64) -> Option<GeoPoint> {
    let in_range = lng.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lng)
        && (-90.0..=90.0).contains(&lat);
    in_range.then(|| GeoPoint::new(lng, lat))
}

// ---------------------------------------------------------------------------
// Amap (restapi.amap.com)
// ---------------------------------------------------------------------------

const AMAP_ENDPOINT: &str = "https://restapi.amap.com/v3/geocode/geo";

/// Amap info codes that signal exhausted quota or request-rate limits.
const AMAP_QUOTA_CODES: &[&str] = &[
    "10003", "10004", "10010", "10014", "10019", "10020", "10021", "10044", "10045",
];

pub struct AmapProvider {
    api_key: String,
    endpoint: String,
}

impl AmapProvider {
    pub fn new(api_key: &str) -> Self {
        Self::with_endpoint(api_key, AMAP_ENDPOINT)
    }

    pub fn with_endpoint(api_key: &str, endpoint: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            endpoint: endpoint.to_string(),
        }
    }
}

impl GeocodeProvider for AmapProvider {
    fn name(&self) -> &'static str {
        "amap"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn query_params<'a>(&'a self, address: &'a str) -> Vec<(&'a str, &'a str)> {
        vec![
            ("key", self.api_key.as_str()),
            ("address", address),
            ("output", "json"),
        ]
    }

    fn parse_response(&self, address: &str, response: &HttpResponse) -> Result<GeoPoint> {
        check_status(self.name(), response)?;
        let body = parse_json(self.name(), response)?;

        let status = body.get("status").and_then(Value::as_str).unwrap_or("0");
        if status != "1" {
            let info = body.get("info").and_then(Value::as_str).unwrap_or("unknown");
            let infocode = body.get("infocode").and_then(Value::as_str).unwrap_or("");
            let message = format!("{info} (infocode {infocode})");
            return Err(if AMAP_QUOTA_CODES.contains(&infocode) {
                GeoMatchError::GeocodeQuota {
                    provider: self.name().to_string(),
                    message,
                }
            } else {
                GeoMatchError::GeocodeRejected {
                    provider: self.name().to_string(),
                    message,
                }
            });
        }

        let not_found = || GeoMatchError::GeocodeNotFound {
            query: address.to_string(),
        };

        // location is "lng,lat"
        let location = body
            .get("geocodes")
            .and_then(Value::as_array)
            .and_then(|g| g.first())
            .and_then(|g| g.get("location"))
            .and_then(Value::as_str)
            .ok_or_else(not_found)?;

        let (lng, lat) = location.split_once(',').ok_or_else(not_found)?;
        let lng: f64 = lng.trim().parse().map_err(|_| not_found())?;
        let lat: f64 = lat.trim().parse().map_err(|_| not_found())?;
        valid_point(lng, lat).ok_or_else(not_found)
    }
}

// ---------------------------------------------------------------------------
// Baidu (api.map.baidu.com)
// ---------------------------------------------------------------------------

const BAIDU_ENDPOINT: &str = "https://api.map.baidu.com/geocoding/v3/";

pub struct BaiduProvider {
    api_key: String,
    endpoint: String,
}

impl BaiduProvider {
    pub fn new(api_key: &str) -> Self {
        Self::with_endpoint(api_key, BAIDU_ENDPOINT)
    }

    pub fn with_endpoint(api_key: &str, endpoint: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            endpoint: endpoint.to_string(),
        }
    }
}

impl GeocodeProvider for BaiduProvider {
    fn name(&self) -> &'static str {
        "baidu"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn query_params<'a>(&'a self, address: &'a str) -> Vec<(&'a str, &'a str)> {
        vec![
            ("ak", self.api_key.as_str()),
            ("address", address),
            ("output", "json"),
        ]
    }

    fn parse_response(&self, address: &str, response: &HttpResponse) -> Result<GeoPoint> {
        check_status(self.name(), response)?;
        let body = parse_json(self.name(), response)?;

        let not_found = || GeoMatchError::GeocodeNotFound {
            query: address.to_string(),
        };

        let status = body.get("status").and_then(Value::as_i64).unwrap_or(-1);
        let message = body
            .get("message")
            .or_else(|| body.get("msg"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        match status {
            0 => {}
            // 4: quota check failed, 3xx: daily quota, 401: concurrency limit
            4 | 300..=399 | 401 => {
                return Err(GeoMatchError::GeocodeQuota {
                    provider: self.name().to_string(),
                    message: format!("{message} (status {status})"),
                })
            }
            1 if message.contains("无相关结果") || message.to_lowercase().contains("no result") => {
                return Err(not_found())
            }
            // Internal server error
            1 => {
                return Err(GeoMatchError::GeocodeTransport {
                    message: format!("baidu internal error: {message}"),
                })
            }
            _ => {
                return Err(GeoMatchError::GeocodeRejected {
                    provider: self.name().to_string(),
                    message: format!("{message} (status {status})"),
                })
            }
        }

        let location = body
            .get("result")
            .and_then(|r| r.get("location"))
            .ok_or_else(not_found)?;
        let lng = location.get("lng").and_then(Value::as_f64).ok_or_else(not_found)?;
        let lat = location.get("lat").and_then(Value::as_f64).ok_or_else(not_found)?;
        valid_point(lng, lat).ok_or_else(not_found)
    }
}
