/// Normalizes a name for exact comparison: trims, collapses internal
/// whitespace, and lowercases. Administrative suffixes are kept.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Default administrative-unit suffixes, English and Chinese.
pub const ADMIN_SUFFIXES: &[&str] = &[
    "special administrative region",
    "autonomous region",
    "autonomous prefecture",
    "autonomous county",
    "province",
    "prefecture",
    "municipality",
    "city",
    "county",
    "district",
    "banner",
    "league",
    "特别行政区",
    "自治区",
    "自治州",
    "自治县",
    "地区",
    "省",
    "市",
    "县",
    "区",
    "旗",
    "盟",
];

/// Default river-name suffixes.
pub const RIVER_SUFFIXES: &[&str] = &["river", "stream", "creek", "河", "江", "溪"];

/// An ordered list of name suffixes that fuzzy matching strips before
/// comparing.
///
/// Suffixes are stored normalized and tried longest first. A suffix that
/// starts with an ASCII letter only matches at a word boundary, so `city`
/// is stripped from `nanning city` but not from `atlanticity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixVocabulary {
    suffixes: Vec<String>,
}

impl SuffixVocabulary {
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = Self {
            suffixes: Vec::new(),
        };
        for s in suffixes {
            vocab.push(s.as_ref());
        }
        vocab
    }

    /// Administrative-unit suffixes (`county`, `city`, `县`, `市`, ...).
    pub fn administrative() -> Self {
        Self::new(ADMIN_SUFFIXES)
    }

    /// River-name suffixes (`river`, `河`, `江`, ...).
    pub fn river() -> Self {
        Self::new(RIVER_SUFFIXES)
    }

    /// Returns the vocabulary extended with one more suffix.
    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.push(suffix);
        self
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    fn push(&mut self, suffix: &str) {
        let suffix = normalize_name(suffix);
        if suffix.is_empty() || self.suffixes.contains(&suffix) {
            return;
        }
        let len = suffix.chars().count();
        let pos = self
            .suffixes
            .iter()
            .position(|s| s.chars().count() < len)
            .unwrap_or(self.suffixes.len());
        self.suffixes.insert(pos, suffix);
    }

    /// Strips the longest matching suffix from an already-normalized name.
    ///
    /// Returns the input unchanged when no suffix matches or when stripping
    /// would leave nothing.
    pub fn strip<'a>(&self, normalized: &'a str) -> &'a str {
        for suffix in &self.suffixes {
            let Some(rest) = normalized.strip_suffix(suffix.as_str()) else {
                continue;
            };
            let needs_boundary = suffix.starts_with(|c: char| c.is_ascii_alphabetic());
            if needs_boundary && !rest.is_empty() && !rest.ends_with(char::is_whitespace) {
                continue;
            }
            let stripped = rest.trim_end();
            if !stripped.is_empty() {
                return stripped;
            }
        }
        normalized
    }

    /// Normalizes `name` and strips its suffix.
    pub fn fuzzy_key(&self, name: &str) -> String {
        let normalized = normalize_name(name);
        self.strip(&normalized).to_string()
    }
}

/// Containment check used by the loosest fuzzy mode: either string contains
/// the other. Empty strings never match.
pub fn contains_either(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}
