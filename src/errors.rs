use thiserror::Error;

/// Errors that can occur while loading reference data or resolving identifiers.
#[derive(Error, Debug)]
pub enum GeoMatchError {
    #[error("malformed identifier '{input}': {reason}")]
    MalformedIdentifier { input: String, reason: String },

    #[error("geocode timeout: {message}")]
    GeocodeTimeout { message: String },

    #[error("geocode quota exceeded ({provider}): {message}")]
    GeocodeQuota { provider: String, message: String },

    #[error("geocode found no result for '{query}'")]
    GeocodeNotFound { query: String },

    #[error("geocode transport error: {message}")]
    GeocodeTransport { message: String },

    #[error("geocode request rejected ({provider}): {message}")]
    GeocodeRejected { provider: String, message: String },

    #[error("dataset error: {message} (path: {path})")]
    Dataset { message: String, path: String },

    #[error("cache error: {message} (path: {path})")]
    Cache { message: String, path: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GeoMatchError {
    /// Returns `true` for failures worth retrying: timeouts and network-level
    /// transport errors. Quota, not-found, and rejected requests are final.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GeoMatchError::GeocodeTimeout { .. } | GeoMatchError::GeocodeTransport { .. }
        )
    }

    /// Short machine-readable label for geocode failures, recorded in
    /// resolution diagnostics.
    pub fn cause_label(&self) -> &'static str {
        match self {
            GeoMatchError::GeocodeTimeout { .. } => "timeout",
            GeoMatchError::GeocodeQuota { .. } => "quota",
            GeoMatchError::GeocodeNotFound { .. } => "not_found",
            GeoMatchError::GeocodeTransport { .. } => "transport",
            GeoMatchError::GeocodeRejected { .. } => "rejected",
            GeoMatchError::MalformedIdentifier { .. } => "malformed",
            GeoMatchError::Dataset { .. } => "dataset",
            GeoMatchError::Cache { .. } => "cache",
            GeoMatchError::Config { .. } => "config",
            GeoMatchError::Io(_) => "io",
            GeoMatchError::Json(_) => "json",
        }
    }
}

/// Convenience alias for results using `GeoMatchError`.
pub type Result<T> = std::result::Result<T, GeoMatchError>;
