use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use super::cascade::{CascadeSettings, MatchCascade};
use crate::cache::ResolutionCache;
use crate::config::ResolverConfig;
use crate::errors::Result;
use crate::geocode::{GeocodeGateway, Geocoder};
use crate::identifier::{self, IdentifierKind, LocationIdentifier};
use crate::reference::ReferenceIndex;
use crate::section::SectionKeywordExtractor;
use crate::types::{FallbackStep, MatchResult, StepOutcome, Strategy};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolves location identifiers to reference features or geocoded points.
///
/// The order is fixed: local cascade, then the resolution cache, then the
/// geocoder. Identifiers with a sub-region path skip the cascade. Successful
/// geocodes are written through to the cache; failures are not cached.
///
/// `Resolver` is `Send + Sync`. Resolutions of the same identifier are
/// serialized so that concurrent callers make at most one geocode call.
pub struct Resolver {
    cascade: MatchCascade,
    cache: Arc<ResolutionCache>,
    geocoder: Option<Arc<dyn Geocoder>>,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Resolver {
    /// Assembles a resolver from already-built parts. Passing `None` for the
    /// geocoder disables the remote fallback.
    pub fn new(
        config: &ResolverConfig,
        index: Arc<ReferenceIndex>,
        cache: Arc<ResolutionCache>,
        geocoder: Option<Arc<dyn Geocoder>>,
    ) -> Self {
        let cascade = MatchCascade::new(
            index,
            SectionKeywordExtractor::default(),
            CascadeSettings::from_config(config),
        );
        Self {
            cascade,
            cache,
            geocoder,
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Loads the reference datasets, opens the cache file, and builds the
    /// configured geocoding gateway.
    pub fn from_config(config: &ResolverConfig) -> Self {
        let index = ReferenceIndex::load(
            &config.admin_geojson_dir,
            &config.river_geojson_dir,
            &config.dataset_patterns,
            config.index_options(),
        );
        let stats = index.stats();
        info!(
            admin_province = stats.admin_province,
            admin_city = stats.admin_city,
            admin_county = stats.admin_county,
            river_province = stats.river_province,
            river_city = stats.river_city,
            river_county = stats.river_county,
            "reference index loaded"
        );

        let cache = ResolutionCache::open(&config.cache_file);

        let geocoder = GeocodeGateway::from_config(&config.geocode)
            .map(|g| Arc::new(g) as Arc<dyn Geocoder>);
        if geocoder.is_none() {
            info!("no geocoding API key configured; remote fallback disabled");
        }

        Self::new(config, Arc::new(index), Arc::new(cache), geocoder)
    }

    pub fn index(&self) -> &ReferenceIndex {
        self.cascade.index()
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn has_geocoder(&self) -> bool {
        self.geocoder.is_some()
    }

    /// Resolves one identifier.
    ///
    /// `section_context` is free text accompanying the identifier, such as
    /// an entity's geographic description. It is the name fragment for the
    /// administrative name stage and the preferred geocode query.
    ///
    /// The only error is [`crate::errors::GeoMatchError::MalformedIdentifier`];
    /// everything else ends in a [`MatchResult`], possibly `Unresolved`.
    pub fn resolve(&self, raw: &str, section_context: Option<&str>) -> Result<MatchResult> {
        let id = identifier::parse(raw)?;
        let mut path = Vec::new();

        if let Some(feature) = self.cascade.run(&id, section_context, &mut path) {
            info!(
                identifier = %id,
                name = %feature.name,
                tier = %feature.tier,
                domain = %feature.domain,
                "matched locally"
            );
            return Ok(MatchResult::local(feature, path));
        }

        let key = id.cache_key();
        Ok(self.with_key_lock(&key, || {
            self.resolve_remote(&id, &key, section_context, path)
        }))
    }

    fn resolve_remote(
        &self,
        id: &LocationIdentifier,
        key: &str,
        section_context: Option<&str>,
        mut path: Vec<FallbackStep>,
    ) -> MatchResult {
        if let Some(entry) = self.cache.get(key) {
            debug!(key, status = entry.result.status.as_str(), "resolution cache hit");
            return entry.result;
        }
        path.push(FallbackStep::new(Strategy::Cache, None, key, StepOutcome::Miss));

        let query = self.geocode_query(id, section_context);
        let Some(geocoder) = &self.geocoder else {
            path.push(FallbackStep::new(
                Strategy::Geocode,
                None,
                &query,
                StepOutcome::Skipped {
                    reason: "no geocoding provider configured".to_string(),
                },
            ));
            info!(identifier = %id, "unresolved");
            return MatchResult::unresolved(path);
        };

        match geocoder.resolve(&query) {
            Ok(point) => {
                path.push(FallbackStep::new(Strategy::Geocode, None, &query, StepOutcome::Hit));
                let result = MatchResult::geocoded(point, path);
                self.cache.put(key, result.clone());
                result
            }
            Err(e) => {
                warn!(identifier = %id, query = %query, error = %e, "geocoding failed; unresolved");
                path.push(FallbackStep::new(
                    Strategy::Geocode,
                    None,
                    &query,
                    StepOutcome::Failed {
                        cause: format!("{}: {}", e.cause_label(), e),
                    },
                ));
                MatchResult::unresolved(path)
            }
        }
    }

    /// Free text sent to the geocoder.
    ///
    /// A non-empty section context wins. Otherwise administrative identifiers
    /// use the names of their known parent units followed by the sub-region
    /// path, and natural features use the feature name and section.
    pub fn geocode_query(&self, id: &LocationIdentifier, section_context: Option<&str>) -> String {
        if let Some(context) = section_context.map(str::trim).filter(|s| !s.is_empty()) {
            return context.to_string();
        }

        let mut parts: Vec<String> = Vec::new();
        match id.kind {
            IdentifierKind::Administrative => {
                if let Some(code) = &id.code {
                    parts = self.index().admin_lineage(code);
                    if parts.is_empty() && id.subregion_path.is_empty() {
                        parts.push(code.to_string());
                    }
                }
                parts.extend(id.subregion_path.iter().cloned());
            }
            IdentifierKind::NaturalFeature => {
                parts.extend(id.feature_name.iter().cloned());
                parts.extend(id.section_descriptor.iter().cloned());
            }
        }
        parts.join(" ")
    }

    /// Runs `f` while holding the lock for `key`. Locks are dropped from the
    /// table once nobody else holds or waits on them.
    fn with_key_lock<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let key_lock = Arc::clone(lock(&self.key_locks).entry(key.to_string()).or_default());

        let out = {
            let _guard = lock(&key_lock);
            f()
        };

        let mut locks = lock(&self.key_locks);
        if Arc::strong_count(&key_lock) == 2 {
            locks.remove(key);
        }
        out
    }
}
