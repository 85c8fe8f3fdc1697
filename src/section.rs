//! Section descriptor parsing for river identifiers.
//!
//! A section descriptor such as `Pubei County reach` or `浦北县河段` names the
//! administrative unit a river segment runs through. The extractor recovers
//! that unit's name and guesses the tier from its suffix.

use crate::reference::normalize_name;
use crate::types::Tier;

/// An administrative suffix and the tier it implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierSuffix {
    pub suffix: String,
    pub tier: Tier,
}

impl TierSuffix {
    pub fn new(suffix: &str, tier: Tier) -> Self {
        Self {
            suffix: suffix.to_ascii_lowercase(),
            tier,
        }
    }

    fn is_word(&self) -> bool {
        self.suffix.starts_with(|c: char| c.is_ascii_alphabetic())
    }
}

/// Words the extractor recognizes. All lists are plain data so callers can
/// extend them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionVocabulary {
    /// Trailing markers removed before keyword search (`reach`, `河段`, ...).
    pub reach_markers: Vec<String>,
    /// Administrative suffixes with the tier each implies.
    pub tier_suffixes: Vec<TierSuffix>,
    /// Descriptors that name a part of the river rather than a place.
    pub directional: Vec<String>,
}

impl Default for SectionVocabulary {
    fn default() -> Self {
        let reach_markers = ["reach", "section", "segment", "stretch", "河段", "段"];
        let tier_suffixes = [
            ("autonomous region", Tier::Province),
            ("province", Tier::Province),
            ("自治区", Tier::Province),
            ("省", Tier::Province),
            ("autonomous prefecture", Tier::City),
            ("prefecture", Tier::City),
            ("city", Tier::City),
            ("league", Tier::City),
            ("自治州", Tier::City),
            ("地区", Tier::City),
            ("市", Tier::City),
            ("盟", Tier::City),
            ("autonomous county", Tier::County),
            ("county", Tier::County),
            ("district", Tier::County),
            ("banner", Tier::County),
            ("自治县", Tier::County),
            ("县", Tier::County),
            ("区", Tier::County),
            ("旗", Tier::County),
        ];
        let directional = [
            "upper",
            "middle",
            "lower",
            "upstream",
            "downstream",
            "main stem",
            "source",
            "上游",
            "中游",
            "下游",
            "干流",
            "源头",
        ];

        Self {
            reach_markers: reach_markers.iter().map(|s| s.to_string()).collect(),
            tier_suffixes: tier_suffixes
                .iter()
                .map(|(s, t)| TierSuffix::new(s, *t))
                .collect(),
            directional: directional.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Keyword recovered from a section descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionKeyword {
    /// Administrative unit name, or `None` when the descriptor only names a
    /// part of the river (`upper reach`).
    pub admin_keyword: Option<String>,
    pub inferred_tier: Tier,
}

/// Extracts `(admin keyword, tier)` from free-text section descriptors.
#[derive(Debug, Clone, Default)]
pub struct SectionKeywordExtractor {
    vocab: SectionVocabulary,
}

/// A suffix match: byte range in the lowercased text and the implied tier.
#[derive(Debug, Clone, Copy)]
struct Occurrence {
    start: usize,
    end: usize,
    tier: Tier,
}

fn trim_keyword(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation() || "，、；".contains(c))
}

impl SectionKeywordExtractor {
    pub fn new(vocab: SectionVocabulary) -> Self {
        Self { vocab }
    }

    pub fn vocabulary(&self) -> &SectionVocabulary {
        &self.vocab
    }

    /// Parses a section descriptor.
    ///
    /// The finest-tier suffix found decides the tier; the keyword runs from
    /// the previous suffix (or the start) through that suffix, so
    /// `Qinzhou City Pubei County reach` yields `Pubei County` at county tier.
    /// Without a recognizable suffix the cleaned descriptor is the keyword and
    /// the tier is province.
    pub fn extract(&self, descriptor: &str) -> SectionKeyword {
        let cleaned = self.strip_reach_markers(descriptor.trim());

        if self.vocab.directional.iter().any(|d| normalize_name(d) == normalize_name(cleaned)) {
            return SectionKeyword {
                admin_keyword: None,
                inferred_tier: Tier::Province,
            };
        }

        let lower = cleaned.to_ascii_lowercase();
        let occurrences = self.occurrences(&lower);

        let Some(finest) = occurrences.iter().map(|o| o.tier).max() else {
            let keyword = trim_keyword(cleaned);
            return SectionKeyword {
                admin_keyword: (!keyword.is_empty()).then(|| keyword.to_string()),
                inferred_tier: Tier::Province,
            };
        };

        let pos = occurrences
            .iter()
            .position(|o| o.tier == finest)
            .unwrap_or_default();
        let chosen = occurrences[pos];
        let begin = if pos == 0 { 0 } else { occurrences[pos - 1].end };
        // `lower` has the same byte layout as `cleaned`: only ASCII changed.
        let keyword = trim_keyword(&cleaned[begin..chosen.end]);

        SectionKeyword {
            admin_keyword: (!keyword.is_empty()).then(|| keyword.to_string()),
            inferred_tier: finest,
        }
    }

    /// Removes trailing reach markers, repeatedly.
    fn strip_reach_markers<'a>(&self, text: &'a str) -> &'a str {
        let mut current = text;
        loop {
            let base: &'a str = current;
            let lower = base.to_ascii_lowercase();
            let stripped = self.vocab.reach_markers.iter().find_map(|marker| {
                let marker = marker.to_ascii_lowercase();
                let rest = lower.strip_suffix(marker.as_str())?;
                let is_word = marker.starts_with(|c: char| c.is_ascii_alphabetic());
                if is_word && !rest.is_empty() && !rest.ends_with(char::is_whitespace) {
                    return None;
                }
                let remaining = base[..rest.len()].trim_end();
                (!remaining.is_empty()).then_some(remaining)
            });
            match stripped {
                Some(next) => current = next,
                None => return current,
            }
        }
    }

    fn occurrences(&self, lower: &str) -> Vec<Occurrence> {
        let mut suffixes: Vec<&TierSuffix> = self.vocab.tier_suffixes.iter().collect();
        // Longer suffixes claim their span first: 自治区 before 区.
        suffixes.sort_by_key(|s| std::cmp::Reverse(s.suffix.chars().count()));

        let mut found: Vec<Occurrence> = Vec::new();
        for suffix in suffixes {
            for (start, _) in lower.match_indices(suffix.suffix.as_str()) {
                let end = start + suffix.suffix.len();
                if start == 0 {
                    continue;
                }
                if suffix.is_word() && !word_boundary(lower, start, end) {
                    continue;
                }
                if found.iter().any(|o| start < o.end && o.start < end) {
                    continue;
                }
                found.push(Occurrence {
                    start,
                    end,
                    tier: suffix.tier,
                });
            }
        }
        found.sort_by_key(|o| o.start);
        found
    }
}

fn word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    before.is_some_and(char::is_whitespace) && after.map_or(true, |c| !c.is_alphanumeric())
}
