use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Granularity level of a reference feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Province,
    City,
    County,
}

#[allow(clippy::should_implement_trait)]
impl Tier {
    /// Cascade order: finest tier first.
    pub const FINE_TO_COARSE: [Tier; 3] = [Tier::County, Tier::City, Tier::Province];

    /// Returns the string representation of this tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Province => "province",
            Tier::City => "city",
            Tier::County => "county",
        }
    }

    /// Parses a string into a `Tier`, returning `None` for unrecognized values.
    ///
    /// `district` is accepted as a county-level synonym.
    pub fn from_str(s: &str) -> Option<Tier> {
        match s.trim().to_lowercase().as_str() {
            "province" => Some(Tier::Province),
            "city" => Some(Tier::City),
            "county" | "district" => Some(Tier::County),
            _ => None,
        }
    }

    /// The next coarser tier, or `None` at province level.
    pub fn coarser(&self) -> Option<Tier> {
        match self {
            Tier::County => Some(Tier::City),
            Tier::City => Some(Tier::Province),
            Tier::Province => None,
        }
    }

    /// This tier followed by every coarser tier.
    pub fn widening(self) -> impl Iterator<Item = Tier> {
        std::iter::successors(Some(self), |t| t.coarser())
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which reference dataset family a feature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Administrative,
    River,
}

impl Domain {
    /// Returns the string representation of this domain.
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Administrative => "administrative",
            Domain::River => "river",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An administrative polygon or river geometry loaded from a reference dataset.
///
/// Features are immutable after loading and shared through `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFeature {
    pub domain: Domain,
    pub tier: Tier,
    /// Administrative code. Always present for administrative features,
    /// optional for river segments.
    pub code: Option<String>,
    /// Display name as it appears in the dataset.
    pub name: String,
    /// Administrative unit a river segment is attributed to (county name at
    /// county tier, city name at city tier, province name at province tier).
    pub admin_name: Option<String>,
    /// Geometry in well-known text form.
    pub geometry: String,
    /// Geometry type name (`Polygon`, `LineString`, ...).
    pub geometry_type: String,
    /// Dataset file the feature was loaded from.
    pub source: String,
}

/// A geocoded coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lng: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Renders the point as WKT.
    pub fn to_wkt(&self) -> String {
        format!("POINT ({} {})", self.lng, self.lat)
    }
}

/// Terminal status of a resolution call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    MatchedLocal,
    MatchedGeocoded,
    Unresolved,
}

impl MatchStatus {
    /// Returns the string representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::MatchedLocal => "matched_local",
            MatchStatus::MatchedGeocoded => "matched_geocoded",
            MatchStatus::Unresolved => "unresolved",
        }
    }
}

/// Strategy attempted at one step of the resolution cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Code,
    ExactName,
    FuzzyName,
    ExactSegment,
    FuzzySegment,
    Cache,
    Geocode,
}

impl Strategy {
    /// Returns the string representation of this strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Code => "code",
            Strategy::ExactName => "exact_name",
            Strategy::FuzzyName => "fuzzy_name",
            Strategy::ExactSegment => "exact_segment",
            Strategy::FuzzySegment => "fuzzy_segment",
            Strategy::Cache => "cache",
            Strategy::Geocode => "geocode",
        }
    }

    /// Whether this strategy is a fuzzy-name fallback.
    pub fn is_fuzzy(&self) -> bool {
        matches!(self, Strategy::FuzzyName | Strategy::FuzzySegment)
    }
}

/// Outcome of a single cascade step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutcome {
    Hit,
    Miss,
    Skipped { reason: String },
    Failed { cause: String },
}

/// One attempted step, recorded for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackStep {
    pub strategy: Strategy,
    pub tier: Option<Tier>,
    /// The code, name, or text the step looked up.
    pub query: String,
    pub outcome: StepOutcome,
}

impl FallbackStep {
    pub fn new(strategy: Strategy, tier: Option<Tier>, query: &str, outcome: StepOutcome) -> Self {
        Self {
            strategy,
            tier,
            query: query.to_string(),
            outcome,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.outcome == StepOutcome::Hit
    }
}

/// Result of resolving one location identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub status: MatchStatus,
    /// Present iff `status` is `MatchedLocal`.
    pub matched_feature: Option<Arc<ReferenceFeature>>,
    /// Present iff `status` is `MatchedGeocoded`.
    pub geocoded_point: Option<GeoPoint>,
    pub resolved_tier: Option<Tier>,
    pub fallback_path: Vec<FallbackStep>,
}

impl MatchResult {
    pub fn local(feature: Arc<ReferenceFeature>, fallback_path: Vec<FallbackStep>) -> Self {
        Self {
            status: MatchStatus::MatchedLocal,
            resolved_tier: Some(feature.tier),
            matched_feature: Some(feature),
            geocoded_point: None,
            fallback_path,
        }
    }

    pub fn geocoded(point: GeoPoint, fallback_path: Vec<FallbackStep>) -> Self {
        Self {
            status: MatchStatus::MatchedGeocoded,
            matched_feature: None,
            geocoded_point: Some(point),
            resolved_tier: None,
            fallback_path,
        }
    }

    pub fn unresolved(fallback_path: Vec<FallbackStep>) -> Self {
        Self {
            status: MatchStatus::Unresolved,
            matched_feature: None,
            geocoded_point: None,
            resolved_tier: None,
            fallback_path,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status != MatchStatus::Unresolved
    }

    /// WKT of the resolved geometry: the matched feature's geometry or the
    /// geocoded point.
    pub fn wkt(&self) -> Option<String> {
        match (&self.matched_feature, &self.geocoded_point) {
            (Some(feature), _) => Some(feature.geometry.clone()),
            (None, Some(point)) => Some(point.to_wkt()),
            (None, None) => None,
        }
    }

    /// Whether a geocode call actually reached the provider.
    pub fn geocode_attempted(&self) -> bool {
        self.fallback_path.iter().any(|s| {
            s.strategy == Strategy::Geocode && !matches!(s.outcome, StepOutcome::Skipped { .. })
        })
    }
}

/// A persisted resolution, keyed by canonical identifier string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub result: MatchResult,
    /// UNIX timestamp (seconds) when the entry was written.
    pub created_at: u64,
}

/// Returns the current UNIX timestamp in seconds.
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
