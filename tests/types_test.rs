use std::sync::Arc;

use geomatch::types::*;
use serde_json::json;

#[test]
fn test_tier_strings() {
    for tier in [Tier::Province, Tier::City, Tier::County] {
        assert_eq!(Tier::from_str(tier.as_str()), Some(tier));
    }
    assert_eq!(Tier::from_str(" District "), Some(Tier::County));
    assert_eq!(Tier::from_str("township"), None);
    assert_eq!(Tier::City.to_string(), "city");
}

#[test]
fn test_tier_widening() {
    assert_eq!(
        Tier::County.widening().collect::<Vec<_>>(),
        vec![Tier::County, Tier::City, Tier::Province]
    );
    assert_eq!(Tier::Province.widening().collect::<Vec<_>>(), vec![Tier::Province]);
    assert_eq!(Tier::Province.coarser(), None);
    assert!(Tier::Province < Tier::County);
}

#[test]
fn test_point_wkt() {
    assert_eq!(GeoPoint::new(108.3, 22.8).to_wkt(), "POINT (108.3 22.8)");
    assert_eq!(GeoPoint::new(108.0, -22.5).to_wkt(), "POINT (108 -22.5)");
}

#[test]
fn test_match_result_constructors() {
    let feature = Arc::new(ReferenceFeature {
        domain: Domain::River,
        tier: Tier::City,
        code: None,
        name: "Yu River".to_string(),
        admin_name: Some("Nanning City".to_string()),
        geometry: "LINESTRING (1 2, 3 4)".to_string(),
        geometry_type: "LineString".to_string(),
        source: "rivers.json".to_string(),
    });
    let local = MatchResult::local(feature, Vec::new());
    assert_eq!(local.status, MatchStatus::MatchedLocal);
    assert_eq!(local.resolved_tier, Some(Tier::City));
    assert_eq!(local.wkt().as_deref(), Some("LINESTRING (1 2, 3 4)"));

    let geocoded = MatchResult::geocoded(GeoPoint::new(1.0, 2.0), Vec::new());
    assert!(geocoded.is_resolved());
    assert_eq!(geocoded.resolved_tier, None);
    assert_eq!(geocoded.wkt().as_deref(), Some("POINT (1 2)"));

    let unresolved = MatchResult::unresolved(Vec::new());
    assert!(!unresolved.is_resolved());
    assert!(unresolved.wkt().is_none());
}

#[test]
fn test_geocode_attempted_ignores_skipped_step() {
    let skipped = MatchResult::unresolved(vec![FallbackStep::new(
        Strategy::Geocode,
        None,
        "x",
        StepOutcome::Skipped {
            reason: "no provider".to_string(),
        },
    )]);
    assert!(!skipped.geocode_attempted());

    let failed = MatchResult::unresolved(vec![FallbackStep::new(
        Strategy::Geocode,
        None,
        "x",
        StepOutcome::Failed {
            cause: "timeout".to_string(),
        },
    )]);
    assert!(failed.geocode_attempted());
}

#[test]
fn test_step_json_shape() {
    let step = FallbackStep::new(
        Strategy::FuzzySegment,
        Some(Tier::County),
        "Wusi River @ Pubei County",
        StepOutcome::Skipped {
            reason: "matching precision is low".to_string(),
        },
    );
    assert_eq!(
        serde_json::to_value(&step).unwrap(),
        json!({
            "strategy": "fuzzy_segment",
            "tier": "county",
            "query": "Wusi River @ Pubei County",
            "outcome": {"kind": "skipped", "reason": "matching precision is low"}
        })
    );
    assert_eq!(
        serde_json::to_value(StepOutcome::Hit).unwrap(),
        json!({"kind": "hit"})
    );
}

#[test]
fn test_strategy_fuzzy_flag() {
    assert!(Strategy::FuzzyName.is_fuzzy());
    assert!(Strategy::FuzzySegment.is_fuzzy());
    assert!(!Strategy::ExactSegment.is_fuzzy());
    assert_eq!(Strategy::Geocode.as_str(), "geocode");
    assert_eq!(MatchStatus::MatchedGeocoded.as_str(), "matched_geocoded");
}
