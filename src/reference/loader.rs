use std::fs;
use std::path::Path;

use glob::Pattern;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::wkt::{geometry_to_wkt, geometry_type};
use crate::errors::{GeoMatchError, Result};
use crate::identifier::AdminCode;
use crate::types::{Domain, ReferenceFeature, Tier};

/// Generic name properties, in priority order.
const NAME_KEYS: &[&str] = &["name", "NAME", "Name"];

/// Extra name properties for administrative features.
const ADMIN_NAME_KEYS: &[&str] = &["xian_name", "shi_name", "sheng_name", "行政区"];

/// Extra name properties for river features.
const RIVER_NAME_KEYS: &[&str] = &["river_name", "河流名称"];

/// Per-tier code properties, finest first.
const TIER_CODE_KEYS: &[(&str, Tier)] = &[
    ("xian_code", Tier::County),
    ("shi_code", Tier::City),
    ("sheng_code", Tier::Province),
];

fn tier_name_key(tier: Tier) -> &'static str {
    match tier {
        Tier::County => "xian_name",
        Tier::City => "shi_name",
        Tier::Province => "sheng_name",
    }
}

fn tier_code_key(tier: Tier) -> &'static str {
    match tier {
        Tier::County => "xian_code",
        Tier::City => "shi_code",
        Tier::Province => "sheng_code",
    }
}

/// Reads GeoJSON reference datasets from a directory tree.
pub struct DatasetLoader {
    patterns: Vec<Pattern>,
}

impl DatasetLoader {
    /// Creates a loader accepting files whose names match any of `patterns`.
    /// Invalid patterns are logged and ignored.
    pub fn new(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!(pattern = %p, error = %e, "ignoring invalid dataset pattern");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    fn accepts(&self, file_name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(file_name))
    }

    /// Loads every matching dataset file under `dir`, sorted by path.
    ///
    /// A missing directory yields no features. Files that cannot be read or
    /// parsed are logged and skipped.
    pub fn load_dir(&self, domain: Domain, dir: &Path) -> Vec<ReferenceFeature> {
        if !dir.is_dir() {
            info!(
                domain = %domain,
                dir = %dir.display(),
                "reference directory not found; dataset is empty"
            );
            return Vec::new();
        }

        let mut features = Vec::new();
        let mut file_count = 0usize;

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            if !self.accepts(&file_name) {
                continue;
            }

            match self.load_file(domain, entry.path()) {
                Ok(mut loaded) => {
                    file_count += 1;
                    features.append(&mut loaded);
                }
                Err(e) => warn!(error = %e, "skipping reference dataset"),
            }
        }

        info!(
            domain = %domain,
            files = file_count,
            features = features.len(),
            "loaded reference datasets"
        );
        features
    }

    /// Loads a single GeoJSON file.
    pub fn load_file(&self, domain: Domain, path: &Path) -> Result<Vec<ReferenceFeature>> {
        let source = path.to_string_lossy().to_string();
        let contents = fs::read_to_string(path).map_err(|e| GeoMatchError::Dataset {
            message: format!("failed to read dataset: {e}"),
            path: source.clone(),
        })?;
        let value: Value = serde_json::from_str(&contents).map_err(|e| GeoMatchError::Dataset {
            message: format!("failed to parse dataset: {e}"),
            path: source.clone(),
        })?;
        parse_dataset(domain, &source, &value)
    }
}

/// Extracts reference features from a GeoJSON `FeatureCollection` or single
/// `Feature`. Features lacking a name, tier, or geometry are skipped.
pub fn parse_dataset(domain: Domain, source: &str, value: &Value) -> Result<Vec<ReferenceFeature>> {
    let raw_features: Vec<&Value> = match value.get("type").and_then(Value::as_str) {
        Some("Feature") => vec![value],
        _ => match value.get("features").and_then(Value::as_array) {
            Some(list) => list.iter().collect(),
            None => {
                return Err(GeoMatchError::Dataset {
                    message: "not a GeoJSON Feature or FeatureCollection".to_string(),
                    path: source.to_string(),
                })
            }
        },
    };

    let mut features = Vec::with_capacity(raw_features.len());
    for (i, raw) in raw_features.into_iter().enumerate() {
        let parsed = match domain {
            Domain::Administrative => admin_feature(source, raw),
            Domain::River => river_feature(source, raw),
        };
        match parsed {
            Some(feature) => features.push(feature),
            None => debug!(source, index = i, domain = %domain, "skipping incomplete feature"),
        }
    }
    Ok(features)
}

fn properties(feature: &Value) -> Map<String, Value> {
    feature
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// Reads a property as a non-empty string; integral numbers are accepted so
/// that numeric codes load the same as quoted ones.
fn prop_string(props: &Map<String, Value>, key: &str) -> Option<String> {
    match props.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => n
            .as_u64()
            .map(|v| v.to_string())
            .or_else(|| n.as_i64().map(|v| v.to_string())),
        _ => None,
    }
}

fn first_prop(props: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| prop_string(props, k))
}

fn geometry_wkt(feature: &Value) -> Option<(String, String)> {
    let wkt = geometry_to_wkt(feature.get("geometry")?)?;
    let kind = geometry_type(&wkt).to_string();
    Some((wkt, kind))
}

fn admin_tier_and_code(props: &Map<String, Value>) -> Option<(Tier, String)> {
    for (key, tier) in TIER_CODE_KEYS {
        if let Some(code) = prop_string(props, key) {
            return Some((*tier, code));
        }
    }

    let code = first_prop(props, &["adcode", "code"])?;
    let tier = prop_string(props, "level")
        .and_then(|l| Tier::from_str(&l))
        .or_else(|| AdminCode::new(&code).ok().map(|c| c.tier()))?;
    Some((tier, code))
}

fn admin_feature(source: &str, feature: &Value) -> Option<ReferenceFeature> {
    let props = properties(feature);
    let (tier, code) = admin_tier_and_code(&props)?;
    let name = first_prop(&props, NAME_KEYS)
        .or_else(|| prop_string(&props, tier_name_key(tier)))
        .or_else(|| first_prop(&props, ADMIN_NAME_KEYS))?;
    let (geometry, geometry_type) = geometry_wkt(feature)?;

    Some(ReferenceFeature {
        domain: Domain::Administrative,
        tier,
        code: Some(code),
        admin_name: Some(name.clone()),
        name,
        geometry,
        geometry_type,
        source: source.to_string(),
    })
}

fn river_feature(source: &str, feature: &Value) -> Option<ReferenceFeature> {
    let props = properties(feature);
    let tier = prop_string(&props, "admin_level").and_then(|l| Tier::from_str(&l))?;
    let name = first_prop(&props, NAME_KEYS).or_else(|| first_prop(&props, RIVER_NAME_KEYS))?;
    let admin_name =
        prop_string(&props, tier_name_key(tier)).or_else(|| prop_string(&props, "admin_name"));
    let code = prop_string(&props, tier_code_key(tier));
    let (geometry, geometry_type) = geometry_wkt(feature)?;

    Some(ReferenceFeature {
        domain: Domain::River,
        tier,
        code,
        name,
        admin_name,
        geometry,
        geometry_type,
        source: source.to_string(),
    })
}
