use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::loader::DatasetLoader;
use super::normalize::{contains_either, normalize_name, SuffixVocabulary};
use crate::identifier::AdminCode;
use crate::types::{Domain, ReferenceFeature, Tier};

/// How a fuzzy lookup picks among several matching candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuzzyTieBreak {
    /// The first candidate in load order (files sorted by path, features in
    /// file order).
    #[default]
    FirstLoaded,
    /// The candidate with the longest original name; equal lengths fall back
    /// to load order.
    LongestName,
}

/// Tuning for the fuzzy lookups.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub tie_break: FuzzyTieBreak,
    /// Accept containment of suffix-stripped names when stripped equality
    /// finds nothing.
    pub allow_containment: bool,
    pub admin_suffixes: SuffixVocabulary,
    pub river_suffixes: SuffixVocabulary,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            tie_break: FuzzyTieBreak::FirstLoaded,
            allow_containment: false,
            admin_suffixes: SuffixVocabulary::administrative(),
            river_suffixes: SuffixVocabulary::river(),
        }
    }
}

/// A feature with its precomputed comparison keys.
struct Entry {
    feature: Arc<ReferenceFeature>,
    name: String,
    fuzzy_name: String,
    admin: Option<String>,
    fuzzy_admin: Option<String>,
}

#[derive(Default)]
struct TierTable {
    entries: Vec<Entry>,
    by_code: HashMap<String, usize>,
    by_name: HashMap<String, Vec<usize>>,
}

/// In-memory lookup over the administrative and river reference datasets,
/// partitioned by (domain, tier).
///
/// Built once and read-only afterwards; share it behind an `Arc`.
pub struct ReferenceIndex {
    tables: HashMap<(Domain, Tier), TierTable>,
    options: IndexOptions,
}

/// Feature counts per (domain, tier).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub admin_province: usize,
    pub admin_city: usize,
    pub admin_county: usize,
    pub river_province: usize,
    pub river_city: usize,
    pub river_county: usize,
}

impl ReferenceIndex {
    /// Creates an empty index.
    pub fn empty(options: IndexOptions) -> Self {
        Self {
            tables: HashMap::new(),
            options,
        }
    }

    /// Builds an index from features in load order.
    pub fn from_features<I>(features: I, options: IndexOptions) -> Self
    where
        I: IntoIterator<Item = ReferenceFeature>,
    {
        let mut index = Self::empty(options);
        for feature in features {
            index.insert(feature);
        }
        index
    }

    /// Loads both dataset directories.
    pub fn load(
        admin_dir: &Path,
        river_dir: &Path,
        patterns: &[String],
        options: IndexOptions,
    ) -> Self {
        let loader = DatasetLoader::new(patterns);
        let admin = loader.load_dir(Domain::Administrative, admin_dir);
        let rivers = loader.load_dir(Domain::River, river_dir);
        Self::from_features(admin.into_iter().chain(rivers), options)
    }

    fn vocabulary(&self, domain: Domain) -> &SuffixVocabulary {
        match domain {
            Domain::Administrative => &self.options.admin_suffixes,
            Domain::River => &self.options.river_suffixes,
        }
    }

    fn insert(&mut self, feature: ReferenceFeature) {
        let key = (feature.domain, feature.tier);
        let name = normalize_name(&feature.name);
        let fuzzy_name = self.vocabulary(feature.domain).strip(&name).to_string();
        let admin = feature.admin_name.as_deref().map(normalize_name);
        let fuzzy_admin = admin
            .as_deref()
            .map(|a| self.options.admin_suffixes.strip(a).to_string());

        let table = self.tables.entry(key).or_default();
        let idx = table.entries.len();

        // Codes are unique per tier; river segments share codes with the
        // administrative unit they run through, so only admin codes are keyed.
        if feature.domain == Domain::Administrative {
            if let Some(code) = &feature.code {
                if table.by_code.contains_key(code) {
                    warn!(
                        code = %code,
                        tier = %feature.tier,
                        source = %feature.source,
                        "duplicate administrative code; keeping first loaded feature"
                    );
                    return;
                }
                table.by_code.insert(code.clone(), idx);
            }
        }

        table.by_name.entry(name.clone()).or_default().push(idx);
        table.entries.push(Entry {
            feature: Arc::new(feature),
            name,
            fuzzy_name,
            admin,
            fuzzy_admin,
        });
    }

    fn table(&self, domain: Domain, tier: Tier) -> Option<&TierTable> {
        self.tables.get(&(domain, tier))
    }

    /// Number of features at (domain, tier).
    pub fn count(&self, domain: Domain, tier: Tier) -> usize {
        self.table(domain, tier).map_or(0, |t| t.entries.len())
    }

    /// Total number of loaded features.
    pub fn len(&self) -> usize {
        self.tables.values().map(|t| t.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            admin_province: self.count(Domain::Administrative, Tier::Province),
            admin_city: self.count(Domain::Administrative, Tier::City),
            admin_county: self.count(Domain::Administrative, Tier::County),
            river_province: self.count(Domain::River, Tier::Province),
            river_city: self.count(Domain::River, Tier::City),
            river_county: self.count(Domain::River, Tier::County),
        }
    }

    /// Exact code match.
    pub fn lookup_by_code(
        &self,
        domain: Domain,
        tier: Tier,
        code: &str,
    ) -> Option<Arc<ReferenceFeature>> {
        let table = self.table(domain, tier)?;
        let idx = *table.by_code.get(code.trim())?;
        Some(Arc::clone(&table.entries[idx].feature))
    }

    /// Exact match on the normalized name (trimmed, whitespace-collapsed,
    /// lowercased). Suffixes are not stripped. Returns the first feature in
    /// load order.
    pub fn lookup_by_name(
        &self,
        domain: Domain,
        tier: Tier,
        name: &str,
    ) -> Option<Arc<ReferenceFeature>> {
        let table = self.table(domain, tier)?;
        let idx = *table.by_name.get(&normalize_name(name))?.first()?;
        Some(Arc::clone(&table.entries[idx].feature))
    }

    /// Name match after stripping the domain's suffix vocabulary from both
    /// the query and the candidates. Ties are broken per
    /// [`IndexOptions::tie_break`].
    pub fn lookup_by_name_fuzzy(
        &self,
        domain: Domain,
        tier: Tier,
        name: &str,
    ) -> Option<Arc<ReferenceFeature>> {
        let table = self.table(domain, tier)?;
        let key = self.vocabulary(domain).fuzzy_key(name);
        if key.is_empty() {
            return None;
        }

        let stripped = self.pick(table.entries.iter().filter(|e| e.fuzzy_name == key));
        if stripped.is_some() || !self.options.allow_containment {
            return stripped;
        }
        self.pick(
            table
                .entries
                .iter()
                .filter(|e| contains_either(&e.fuzzy_name, &key)),
        )
    }

    /// River segment lookup: a river name combined with the administrative
    /// unit the segment is attributed to.
    ///
    /// Exact mode compares normalized names. Fuzzy mode strips river suffixes
    /// from the river names and administrative suffixes from the unit names.
    pub fn lookup_segment(
        &self,
        tier: Tier,
        river: &str,
        admin_keyword: &str,
        fuzzy: bool,
    ) -> Option<Arc<ReferenceFeature>> {
        let table = self.table(Domain::River, tier)?;

        if !fuzzy {
            let river = normalize_name(river);
            let admin = normalize_name(admin_keyword);
            return table
                .entries
                .iter()
                .find(|e| e.name == river && e.admin.as_deref() == Some(admin.as_str()))
                .map(|e| Arc::clone(&e.feature));
        }

        let river_key = self.options.river_suffixes.fuzzy_key(river);
        let admin_key = self.options.admin_suffixes.fuzzy_key(admin_keyword);
        if river_key.is_empty() || admin_key.is_empty() {
            return None;
        }
        let same_river = |e: &&Entry| e.fuzzy_name == river_key;

        let stripped = self.pick(
            table
                .entries
                .iter()
                .filter(same_river)
                .filter(|e| e.fuzzy_admin.as_deref() == Some(admin_key.as_str())),
        );
        if stripped.is_some() || !self.options.allow_containment {
            return stripped;
        }
        self.pick(table.entries.iter().filter(same_river).filter(|e| {
            e.fuzzy_admin
                .as_deref()
                .is_some_and(|a| contains_either(a, &admin_key))
        }))
    }

    /// Names of the administrative units containing `code`, coarse to fine,
    /// for those tiers present in the index.
    pub fn admin_lineage(&self, code: &AdminCode) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for tier in [Tier::Province, Tier::City, Tier::County] {
            if tier > code.tier() {
                break;
            }
            if let Some(f) = self.lookup_by_code(Domain::Administrative, tier, &code.code_for(tier)) {
                if !names.contains(&f.name) {
                    names.push(f.name.clone());
                }
            }
        }
        names
    }

    fn pick<'a, I>(&self, candidates: I) -> Option<Arc<ReferenceFeature>>
    where
        I: Iterator<Item = &'a Entry>,
    {
        let chosen = match self.options.tie_break {
            FuzzyTieBreak::FirstLoaded => candidates.into_iter().next(),
            FuzzyTieBreak::LongestName => {
                let mut best: Option<&Entry> = None;
                for entry in candidates {
                    let len = entry.feature.name.chars().count();
                    // Strictly longer only, so load order wins on equal length.
                    let longer = match best {
                        None => true,
                        Some(b) => len > b.feature.name.chars().count(),
                    };
                    if longer {
                        best = Some(entry);
                    }
                }
                best
            }
        };
        chosen.map(|e| Arc::clone(&e.feature))
    }
}
