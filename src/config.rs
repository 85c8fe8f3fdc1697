use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{GeoMatchError, Result};
use crate::reference::{FuzzyTieBreak, IndexOptions};

/// Default configuration file name looked up by the CLI.
pub const CONFIG_FILENAME: &str = "geomatch.toml";

/// Environment variable that overrides `geocode.api_key`.
pub const API_KEY_ENV: &str = "GEOMATCH_API_KEY";

/// How far the cascade goes beyond exact matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingPrecision {
    /// Exact, suffix-stripped, and containment matching.
    High,
    /// Exact and suffix-stripped matching.
    #[default]
    Medium,
    /// Exact matching only; fuzzy stages are skipped.
    Low,
}

impl MatchingPrecision {
    pub fn allows_fuzzy(&self) -> bool {
        !matches!(self, MatchingPrecision::Low)
    }

    pub fn allows_containment(&self) -> bool {
        matches!(self, MatchingPrecision::High)
    }
}

/// Supported geocoding providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Amap,
    Baidu,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Amap => "amap",
            ProviderKind::Baidu => "baidu",
        }
    }
}

/// External geocoding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodeConfig {
    pub provider: ProviderKind,
    /// Provider API key. Geocoding is disabled while this is empty.
    pub api_key: String,
    /// Per-request timeout.
    pub timeout_seconds: u64,
    /// Total attempts per query when requests time out or fail in
    /// transport. Zero is treated as one.
    pub retry_count: u32,
    /// Fixed delay between retries, and the minimum spacing between any two
    /// outbound requests.
    pub request_delay_seconds: f64,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Amap,
            api_key: String::new(),
            timeout_seconds: 10,
            retry_count: 3,
            request_delay_seconds: 0.5,
        }
    }
}

impl GeocodeConfig {
    pub fn is_enabled(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_secs_f64(self.request_delay_seconds.max(0.0))
    }
}

/// Configuration for the resolution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Directory of administrative GeoJSON datasets.
    pub admin_geojson_dir: PathBuf,
    /// Directory of river GeoJSON datasets.
    pub river_geojson_dir: PathBuf,
    /// Persisted resolution cache.
    pub cache_file: PathBuf,
    pub enable_admin_matching: bool,
    pub enable_river_matching: bool,
    pub matching_precision: MatchingPrecision,
    pub fuzzy_tie_break: FuzzyTieBreak,
    /// After every segment attempt misses, match the whole river at province
    /// tier by name.
    pub river_province_fallback: bool,
    /// File name patterns of dataset files.
    pub dataset_patterns: Vec<String>,
    pub geocode: GeocodeConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            admin_geojson_dir: PathBuf::from("data/admin_geojson"),
            river_geojson_dir: PathBuf::from("data/river_geojson"),
            cache_file: PathBuf::from("spatial_cache.json"),
            enable_admin_matching: true,
            enable_river_matching: true,
            matching_precision: MatchingPrecision::Medium,
            fuzzy_tie_break: FuzzyTieBreak::FirstLoaded,
            river_province_fallback: false,
            dataset_patterns: vec!["*.json".to_string(), "*.geojson".to_string()],
            geocode: GeocodeConfig::default(),
        }
    }
}

impl ResolverConfig {
    /// Index tuning derived from the matching settings.
    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            tie_break: self.fuzzy_tie_break,
            allow_containment: self.matching_precision.allows_containment(),
            ..IndexOptions::default()
        }
    }

    /// Applies environment overrides (currently only the API key).
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.geocode.api_key = key.trim().to_string();
            }
        }
    }

    /// Rejects settings that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.geocode.timeout_seconds == 0 {
            return Err(GeoMatchError::Config {
                message: "geocode.timeout_seconds must be greater than zero".to_string(),
            });
        }
        let delay = self.geocode.request_delay_seconds;
        if !delay.is_finite() || delay < 0.0 {
            return Err(GeoMatchError::Config {
                message: format!("geocode.request_delay_seconds must be >= 0, got {delay}"),
            });
        }
        if self.dataset_patterns.is_empty() {
            return Err(GeoMatchError::Config {
                message: "dataset_patterns must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "toml")
}

/// Loads the configuration from disk.
///
/// `.toml` files are read as TOML, anything else as JSON. If the file does
/// not exist, returns the default configuration.
pub fn load_config(path: &Path) -> Result<ResolverConfig> {
    if !path.exists() {
        return Ok(ResolverConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(|e| GeoMatchError::Config {
        message: format!("failed to read config file '{}': {}", path.display(), e),
    })?;

    let config: ResolverConfig = if is_toml(path) {
        toml::from_str(&contents).map_err(|e| GeoMatchError::Config {
            message: format!("failed to parse config file '{}': {}", path.display(), e),
        })?
    } else {
        serde_json::from_str(&contents).map_err(|e| GeoMatchError::Config {
            message: format!("failed to parse config file '{}': {}", path.display(), e),
        })?
    };

    config.validate()?;
    Ok(config)
}

/// Saves the configuration using an atomic write.
///
/// Writes to a temporary file first and then renames it over the target, so a
/// partial write never corrupts the configuration.
pub fn save_config(path: &Path, config: &ResolverConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| GeoMatchError::Config {
            message: format!(
                "failed to create config directory '{}': {}",
                parent.display(),
                e
            ),
        })?;
    }

    let serialized = if is_toml(path) {
        toml::to_string_pretty(config).map_err(|e| GeoMatchError::Config {
            message: format!("failed to serialize config: {}", e),
        })?
    } else {
        serde_json::to_string_pretty(config).map_err(|e| GeoMatchError::Config {
            message: format!("failed to serialize config: {}", e),
        })?
    };

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, &serialized).map_err(|e| GeoMatchError::Config {
        message: format!(
            "failed to write temporary config file '{}': {}",
            tmp_path.display(),
            e
        ),
    })?;

    fs::rename(&tmp_path, path).map_err(|e| GeoMatchError::Config {
        message: format!(
            "failed to rename temporary config file '{}' to '{}': {}",
            tmp_path.display(),
            path.display(),
            e
        ),
    })?;

    Ok(())
}
