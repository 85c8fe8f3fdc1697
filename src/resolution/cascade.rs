use std::sync::Arc;

use tracing::debug;

use crate::config::{MatchingPrecision, ResolverConfig};
use crate::identifier::{IdentifierKind, LocationIdentifier};
use crate::reference::ReferenceIndex;
use crate::section::SectionKeywordExtractor;
use crate::types::{Domain, FallbackStep, ReferenceFeature, StepOutcome, Strategy, Tier};

/// Switches that shape which cascade stages run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeSettings {
    pub enable_admin_matching: bool,
    pub enable_river_matching: bool,
    pub precision: MatchingPrecision,
    pub river_province_fallback: bool,
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self::from_config(&ResolverConfig::default())
    }
}

impl CascadeSettings {
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self {
            enable_admin_matching: config.enable_admin_matching,
            enable_river_matching: config.enable_river_matching,
            precision: config.matching_precision,
            river_province_fallback: config.river_province_fallback,
        }
    }
}

/// Local matching of a parsed identifier against the reference index.
///
/// Strategies run in a fixed order and stop at the first hit. Every attempt
/// is appended to the caller's fallback path, hits and misses alike.
pub struct MatchCascade {
    index: Arc<ReferenceIndex>,
    extractor: SectionKeywordExtractor,
    settings: CascadeSettings,
}

fn skipped(reason: &str) -> StepOutcome {
    StepOutcome::Skipped {
        reason: reason.to_string(),
    }
}

/// Appends the step for one lookup and passes its result through.
fn record(
    path: &mut Vec<FallbackStep>,
    strategy: Strategy,
    tier: Tier,
    query: &str,
    found: Option<Arc<ReferenceFeature>>,
) -> Option<Arc<ReferenceFeature>> {
    let outcome = if found.is_some() {
        StepOutcome::Hit
    } else {
        StepOutcome::Miss
    };
    debug!(
        strategy = strategy.as_str(),
        tier = tier.as_str(),
        query,
        hit = found.is_some(),
        "cascade step"
    );
    path.push(FallbackStep::new(strategy, Some(tier), query, outcome));
    found
}

impl MatchCascade {
    pub fn new(
        index: Arc<ReferenceIndex>,
        extractor: SectionKeywordExtractor,
        settings: CascadeSettings,
    ) -> Self {
        Self {
            index,
            extractor,
            settings,
        }
    }

    pub fn index(&self) -> &ReferenceIndex {
        &self.index
    }

    pub fn settings(&self) -> &CascadeSettings {
        &self.settings
    }

    /// Runs the cascade for `id`. `section_context` supplies the name
    /// fragment for the administrative name stage.
    ///
    /// Returns `None` when local data has no match; the caller then falls
    /// back to the cache and the geocoder.
    pub fn run(
        &self,
        id: &LocationIdentifier,
        section_context: Option<&str>,
        path: &mut Vec<FallbackStep>,
    ) -> Option<Arc<ReferenceFeature>> {
        if id.bypasses_matching() {
            path.push(FallbackStep::new(
                Strategy::Code,
                None,
                &id.cache_key(),
                skipped("sub-region path bypasses local matching"),
            ));
            return None;
        }

        match id.kind {
            IdentifierKind::Administrative => self.match_administrative(id, section_context, path),
            IdentifierKind::NaturalFeature => self.match_natural_feature(id, path),
        }
    }

    fn match_administrative(
        &self,
        id: &LocationIdentifier,
        section_context: Option<&str>,
        path: &mut Vec<FallbackStep>,
    ) -> Option<Arc<ReferenceFeature>> {
        let code = id.code.as_ref()?;

        if !self.settings.enable_admin_matching {
            path.push(FallbackStep::new(
                Strategy::Code,
                None,
                code.as_str(),
                skipped("administrative matching disabled"),
            ));
            return None;
        }

        for tier in Tier::FINE_TO_COARSE {
            let tier_code = code.code_for(tier);
            let found = self
                .index
                .lookup_by_code(Domain::Administrative, tier, &tier_code);
            if let Some(feature) = record(path, Strategy::Code, tier, &tier_code, found) {
                return Some(feature);
            }
        }

        let fragment = section_context.map(str::trim).filter(|s| !s.is_empty());
        let Some(fragment) = fragment else {
            path.push(FallbackStep::new(
                Strategy::ExactName,
                None,
                "",
                skipped("no name fragment available"),
            ));
            return None;
        };

        Tier::FINE_TO_COARSE
            .into_iter()
            .find_map(|tier| self.match_name(Domain::Administrative, tier, fragment, path))
    }

    fn match_natural_feature(
        &self,
        id: &LocationIdentifier,
        path: &mut Vec<FallbackStep>,
    ) -> Option<Arc<ReferenceFeature>> {
        let name = id.feature_name.as_deref()?;

        if !id.is_river() {
            let class = id.feature_class.as_deref().unwrap_or_default();
            path.push(FallbackStep::new(
                Strategy::ExactName,
                None,
                name,
                skipped(&format!("no reference data for feature class '{class}'")),
            ));
            return None;
        }

        if !self.settings.enable_river_matching {
            path.push(FallbackStep::new(
                Strategy::ExactName,
                None,
                name,
                skipped("river matching disabled"),
            ));
            return None;
        }

        let Some(section) = id.section_descriptor.as_deref() else {
            return self.match_name(Domain::River, Tier::Province, name, path);
        };

        let keyword = self.extractor.extract(section);
        debug!(
            section,
            keyword = keyword.admin_keyword.as_deref().unwrap_or(""),
            tier = keyword.inferred_tier.as_str(),
            "extracted section keyword"
        );

        let Some(admin_keyword) = keyword.admin_keyword.as_deref() else {
            // Directional reaches name no unit; match the whole river.
            path.push(FallbackStep::new(
                Strategy::ExactSegment,
                Some(keyword.inferred_tier),
                section,
                skipped("section descriptor names no administrative unit"),
            ));
            return self.match_name(Domain::River, Tier::Province, name, path);
        };

        for tier in keyword.inferred_tier.widening() {
            if let Some(feature) = self.match_segment(tier, name, admin_keyword, path) {
                return Some(feature);
            }
        }

        if self.settings.river_province_fallback {
            return self.match_name(Domain::River, Tier::Province, name, path);
        }
        None
    }

    /// Exact then fuzzy name lookup at one tier.
    fn match_name(
        &self,
        domain: Domain,
        tier: Tier,
        name: &str,
        path: &mut Vec<FallbackStep>,
    ) -> Option<Arc<ReferenceFeature>> {
        let exact = self.index.lookup_by_name(domain, tier, name);
        if let Some(feature) = record(path, Strategy::ExactName, tier, name, exact) {
            return Some(feature);
        }

        if !self.settings.precision.allows_fuzzy() {
            path.push(FallbackStep::new(
                Strategy::FuzzyName,
                Some(tier),
                name,
                skipped("matching precision is low"),
            ));
            return None;
        }

        let fuzzy = self.index.lookup_by_name_fuzzy(domain, tier, name);
        record(path, Strategy::FuzzyName, tier, name, fuzzy)
    }

    /// Exact then fuzzy segment lookup at one tier.
    fn match_segment(
        &self,
        tier: Tier,
        river: &str,
        admin_keyword: &str,
        path: &mut Vec<FallbackStep>,
    ) -> Option<Arc<ReferenceFeature>> {
        let query = format!("{river} @ {admin_keyword}");

        let exact = self.index.lookup_segment(tier, river, admin_keyword, false);
        if let Some(feature) = record(path, Strategy::ExactSegment, tier, &query, exact) {
            return Some(feature);
        }

        if !self.settings.precision.allows_fuzzy() {
            path.push(FallbackStep::new(
                Strategy::FuzzySegment,
                Some(tier),
                &query,
                skipped("matching precision is low"),
            ));
            return None;
        }

        let fuzzy = self.index.lookup_segment(tier, river, admin_keyword, true);
        record(path, Strategy::FuzzySegment, tier, &query, fuzzy)
    }
}
