use std::sync::Arc;

use geomatch::config::MatchingPrecision;
use geomatch::identifier::parse;
use geomatch::reference::{IndexOptions, ReferenceIndex};
use geomatch::resolution::{CascadeSettings, MatchCascade};
use geomatch::section::SectionKeywordExtractor;
use geomatch::types::*;

fn admin(tier: Tier, code: &str, name: &str) -> ReferenceFeature {
    ReferenceFeature {
        domain: Domain::Administrative,
        tier,
        code: Some(code.to_string()),
        name: name.to_string(),
        admin_name: Some(name.to_string()),
        geometry: "POLYGON ((108 22, 109 22, 109 23, 108 22))".to_string(),
        geometry_type: "Polygon".to_string(),
        source: "admin.json".to_string(),
    }
}

fn river(tier: Tier, name: &str, admin_name: &str) -> ReferenceFeature {
    ReferenceFeature {
        domain: Domain::River,
        tier,
        code: None,
        name: name.to_string(),
        admin_name: Some(admin_name.to_string()),
        geometry: "LINESTRING (109 22, 109.5 22.3)".to_string(),
        geometry_type: "LineString".to_string(),
        source: "rivers.json".to_string(),
    }
}

fn test_index() -> Arc<ReferenceIndex> {
    Arc::new(ReferenceIndex::from_features(
        vec![
            admin(Tier::Province, "450000", "Guangxi Zhuang Autonomous Region"),
            admin(Tier::City, "450100", "Nanning City"),
            admin(Tier::City, "450700", "Qinzhou City"),
            admin(Tier::County, "450103", "Qingxiu District"),
            river(Tier::Province, "Yu River", "Guangxi Zhuang Autonomous Region"),
            river(Tier::County, "Yu River", "Hengzhou City"),
            river(Tier::County, "Wusi River", "Pubei County"),
        ],
        IndexOptions::default(),
    ))
}

fn cascade_with(settings: CascadeSettings) -> MatchCascade {
    MatchCascade::new(test_index(), SectionKeywordExtractor::default(), settings)
}

fn cascade() -> MatchCascade {
    cascade_with(CascadeSettings::default())
}

fn run(
    cascade: &MatchCascade,
    raw: &str,
    context: Option<&str>,
) -> (Option<Arc<ReferenceFeature>>, Vec<FallbackStep>) {
    let id = parse(raw).expect("valid identifier");
    let mut path = Vec::new();
    let found = cascade.run(&id, context, &mut path);
    (found, path)
}

fn steps(path: &[FallbackStep]) -> Vec<(Strategy, Option<Tier>)> {
    path.iter().map(|s| (s.strategy, s.tier)).collect()
}

// ---------------------------------------------------------------------------
// Administrative path
// ---------------------------------------------------------------------------

#[test]
fn test_county_code_hit_stops_cascade() {
    let (found, path) = run(&cascade(), "L-450103", None);
    assert_eq!(found.expect("match").name, "Qingxiu District");
    assert_eq!(path.len(), 1);
    assert!(path[0].is_hit());
}

#[test]
fn test_city_code_after_county_miss() {
    let (found, path) = run(&cascade(), "L-450100", None);
    let feature = found.expect("match");
    assert_eq!(feature.name, "Nanning City");
    assert_eq!(feature.tier, Tier::City);
    assert_eq!(
        steps(&path),
        vec![
            (Strategy::Code, Some(Tier::County)),
            (Strategy::Code, Some(Tier::City)),
        ]
    );
    assert_eq!(path[0].outcome, StepOutcome::Miss);
    assert_eq!(path[1].query, "450100");
}

#[test]
fn test_derived_city_code() {
    let (found, path) = run(&cascade(), "L-450722", None);
    assert_eq!(found.expect("match").name, "Qinzhou City");
    assert_eq!(path[1].query, "450700");
}

#[test]
fn test_province_code_is_last_code_step() {
    let (found, path) = run(&cascade(), "L-459999", None);
    assert_eq!(found.expect("match").tier, Tier::Province);
    assert_eq!(
        path.iter().map(|s| s.query.as_str()).collect::<Vec<_>>(),
        vec!["459999", "459900", "450000"]
    );
}

#[test]
fn test_name_stage_skipped_without_fragment() {
    let (found, path) = run(&cascade(), "L-469999", None);
    assert!(found.is_none());
    assert_eq!(path.len(), 4);
    let last = path.last().unwrap();
    assert_eq!(last.strategy, Strategy::ExactName);
    assert!(matches!(last.outcome, StepOutcome::Skipped { .. }));
}

#[test]
fn test_name_stage_exact_then_fuzzy_per_tier() {
    let (found, path) = run(&cascade(), "L-469999", Some("Nanning"));
    assert_eq!(found.expect("match").code.as_deref(), Some("450100"));
    assert_eq!(
        steps(&path[3..]),
        vec![
            (Strategy::ExactName, Some(Tier::County)),
            (Strategy::FuzzyName, Some(Tier::County)),
            (Strategy::ExactName, Some(Tier::City)),
            (Strategy::FuzzyName, Some(Tier::City)),
        ]
    );
    assert!(path.last().unwrap().is_hit());
}

#[test]
fn test_low_precision_skips_fuzzy() {
    let settings = CascadeSettings {
        precision: MatchingPrecision::Low,
        ..CascadeSettings::default()
    };
    let cascade = cascade_with(settings);

    let (found, path) = run(&cascade, "L-469999", Some("Nanning"));
    assert!(found.is_none());
    let fuzzy: Vec<_> = path.iter().filter(|s| s.strategy.is_fuzzy()).collect();
    assert_eq!(fuzzy.len(), 3);
    assert!(fuzzy
        .iter()
        .all(|s| matches!(s.outcome, StepOutcome::Skipped { .. })));

    let (found, _) = run(&cascade, "L-469999", Some("Nanning City"));
    assert_eq!(found.expect("exact match").name, "Nanning City");
}

#[test]
fn test_admin_matching_disabled() {
    let settings = CascadeSettings {
        enable_admin_matching: false,
        ..CascadeSettings::default()
    };
    let (found, path) = run(&cascade_with(settings), "L-450103", None);
    assert!(found.is_none());
    assert_eq!(path.len(), 1);
    assert!(matches!(path[0].outcome, StepOutcome::Skipped { .. }));
}

#[test]
fn test_subregion_bypasses_cascade_even_with_local_code() {
    let (found, path) = run(&cascade(), "L-450103>SomeTownship", None);
    assert!(found.is_none());
    assert_eq!(path.len(), 1);
    assert!(matches!(path[0].outcome, StepOutcome::Skipped { .. }));
    assert!(!path
        .iter()
        .any(|s| matches!(s.outcome, StepOutcome::Hit | StepOutcome::Miss)));
}

// ---------------------------------------------------------------------------
// River path
// ---------------------------------------------------------------------------

#[test]
fn test_river_without_section_resolves_at_province() {
    let (found, path) = run(&cascade(), "L-RIVER-Yu River", None);
    let feature = found.expect("match");
    assert_eq!(feature.tier, Tier::Province);
    assert_eq!(feature.domain, Domain::River);
    assert_eq!(steps(&path), vec![(Strategy::ExactName, Some(Tier::Province))]);
}

#[test]
fn test_river_without_section_fuzzy_name() {
    let (found, path) = run(&cascade(), "L-RIVER-Yu", None);
    assert_eq!(found.expect("match").tier, Tier::Province);
    assert_eq!(path.len(), 2);
    assert_eq!(path[1].strategy, Strategy::FuzzyName);
}

#[test]
fn test_river_section_exact_county_match() {
    let (found, path) = run(&cascade(), "L-RIVER-Wusi River>Pubei County reach", None);
    let feature = found.expect("match");
    assert_eq!(feature.tier, Tier::County);
    assert_eq!(feature.name, "Wusi River");
    assert_eq!(path.len(), 1);
    assert_eq!(path[0].strategy, Strategy::ExactSegment);
    assert_eq!(path[0].tier, Some(Tier::County));
}

#[test]
fn test_river_section_fuzzy_segment() {
    let (found, path) = run(&cascade(), "L-RIVER-Wusi>Pubei reach", None);
    // No suffix on "Pubei": inferred province, widening has nowhere to go.
    assert!(found.is_none());
    assert_eq!(
        steps(&path),
        vec![
            (Strategy::ExactSegment, Some(Tier::Province)),
            (Strategy::FuzzySegment, Some(Tier::Province)),
        ]
    );

    let (found, path) = run(&cascade(), "L-RIVER-Wusi>Pubei County reach", None);
    assert_eq!(found.expect("fuzzy match").name, "Wusi River");
    assert_eq!(path[1].strategy, Strategy::FuzzySegment);
    assert!(path[1].is_hit());
}

#[test]
fn test_river_section_widens_county_to_province() {
    let (found, path) = run(&cascade(), "L-RIVER-Yu River>Lingshan County reach", None);
    assert!(found.is_none());
    assert_eq!(
        steps(&path),
        vec![
            (Strategy::ExactSegment, Some(Tier::County)),
            (Strategy::FuzzySegment, Some(Tier::County)),
            (Strategy::ExactSegment, Some(Tier::City)),
            (Strategy::FuzzySegment, Some(Tier::City)),
            (Strategy::ExactSegment, Some(Tier::Province)),
            (Strategy::FuzzySegment, Some(Tier::Province)),
        ]
    );
}

#[test]
fn test_river_province_fallback_when_enabled() {
    let settings = CascadeSettings {
        river_province_fallback: true,
        ..CascadeSettings::default()
    };
    let (found, path) = run(
        &cascade_with(settings),
        "L-RIVER-Yu River>Lingshan County reach",
        None,
    );
    let feature = found.expect("whole-river match");
    assert_eq!(feature.tier, Tier::Province);
    assert_eq!(path.last().unwrap().strategy, Strategy::ExactName);
}

#[test]
fn test_directional_section_matches_whole_river() {
    let (found, path) = run(&cascade(), "L-RIVER-Yu River>upper reach", None);
    assert_eq!(found.expect("match").tier, Tier::Province);
    assert!(matches!(path[0].outcome, StepOutcome::Skipped { .. }));
    assert_eq!(path[1].strategy, Strategy::ExactName);
}

#[test]
fn test_other_feature_classes_have_no_local_match() {
    let (found, path) = run(&cascade(), "L-LAKE-Yu River", None);
    assert!(found.is_none());
    assert_eq!(path.len(), 1);
    assert!(matches!(path[0].outcome, StepOutcome::Skipped { .. }));
}

#[test]
fn test_river_matching_disabled() {
    let settings = CascadeSettings {
        enable_river_matching: false,
        ..CascadeSettings::default()
    };
    let (found, path) = run(&cascade_with(settings), "L-RIVER-Yu River", None);
    assert!(found.is_none());
    assert!(matches!(path[0].outcome, StepOutcome::Skipped { .. }));
}

#[test]
fn test_low_precision_river_segment() {
    let settings = CascadeSettings {
        precision: MatchingPrecision::Low,
        ..CascadeSettings::default()
    };
    let (found, path) = run(
        &cascade_with(settings),
        "L-RIVER-Wusi>Pubei County reach",
        None,
    );
    assert!(found.is_none());
    assert!(path
        .iter()
        .filter(|s| s.strategy == Strategy::FuzzySegment)
        .all(|s| matches!(s.outcome, StepOutcome::Skipped { .. })));
}

// ---------------------------------------------------------------------------
// Containment over full descriptions
// ---------------------------------------------------------------------------

fn chinese_cascade(precision: MatchingPrecision) -> MatchCascade {
    let index = ReferenceIndex::from_features(
        vec![
            admin(Tier::Province, "450000", "广西壮族自治区"),
            admin(Tier::City, "450100", "南宁市"),
            admin(Tier::County, "450103", "青秀区"),
        ],
        IndexOptions {
            allow_containment: precision.allows_containment(),
            ..IndexOptions::default()
        },
    );
    let settings = CascadeSettings {
        precision,
        ..CascadeSettings::default()
    };
    MatchCascade::new(Arc::new(index), SectionKeywordExtractor::default(), settings)
}

#[test]
fn test_full_description_needs_high_precision() {
    let description = "广西壮族自治区南宁市青秀区某街道";

    let (found, _) = run(&chinese_cascade(MatchingPrecision::Medium), "L-469999", Some(description));
    assert!(found.is_none());

    let (found, path) = run(&chinese_cascade(MatchingPrecision::High), "L-469999", Some(description));
    let feature = found.expect("containment match");
    assert_eq!(feature.name, "青秀区");
    assert_eq!(feature.tier, Tier::County);
    assert_eq!(path.last().unwrap().strategy, Strategy::FuzzyName);
}
