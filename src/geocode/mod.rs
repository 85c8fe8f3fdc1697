//! External geocoding: provider adapters, the HTTP seam, rate limiting, and
//! the retrying gateway the resolver calls after local matching misses.

mod gateway;
pub mod http;
mod limiter;
pub mod provider;

pub use gateway::{GeocodeGateway, Geocoder};
pub use http::{HttpClient, HttpResponse, UreqClient};
pub use limiter::RateLimiter;
pub use provider::{create_provider, AmapProvider, BaiduProvider, GeocodeProvider};
