//! Location identifier parsing.
//!
//! Two grammars are recognized:
//!
//! - administrative: `L-<6-digit-code>[>subregion[>subregion...]]`
//! - natural feature: `L-<FEATURE>-<name>[>sectionDescriptor]`
//!
//! Administrative codes encode their tier in trailing zero groups: a code
//! ending in `0000` is a province, one ending in `00` is a city, anything else
//! is a county.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{GeoMatchError, Result};
use crate::types::Tier;

/// Prefix shared by every location identifier.
pub const IDENTIFIER_PREFIX: &str = "L-";

/// Separator between an identifier's base and its sub-region or section parts.
pub const PATH_SEPARATOR: char = '>';

/// Feature class handled by the river reference datasets.
pub const RIVER_FEATURE_CLASS: &str = "RIVER";

/// A validated six-digit administrative code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AdminCode(String);

impl AdminCode {
    /// Validates a six-digit numeric code. The two-digit province prefix must
    /// not be `00`.
    pub fn new(code: &str) -> std::result::Result<Self, String> {
        if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("administrative code '{code}' must be 6 digits"));
        }
        if code.starts_with("00") {
            return Err(format!(
                "administrative code '{code}' has no province prefix"
            ));
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The tier this code denotes by its trailing zero groups.
    pub fn tier(&self) -> Tier {
        if self.0.ends_with("0000") {
            Tier::Province
        } else if self.0.ends_with("00") {
            Tier::City
        } else {
            Tier::County
        }
    }

    /// Code with positions 5–6 zeroed.
    pub fn city_code(&self) -> String {
        format!("{}00", &self.0[..4])
    }

    /// Code with positions 3–6 zeroed.
    pub fn province_code(&self) -> String {
        format!("{}0000", &self.0[..2])
    }

    /// The code to look up at `tier`: the code as-is at county tier, or the
    /// derived coarser code.
    pub fn code_for(&self, tier: Tier) -> String {
        match tier {
            Tier::County => self.0.clone(),
            Tier::City => self.city_code(),
            Tier::Province => self.province_code(),
        }
    }
}

impl TryFrom<String> for AdminCode {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        AdminCode::new(&value)
    }
}

impl From<AdminCode> for String {
    fn from(code: AdminCode) -> Self {
        code.0
    }
}

impl fmt::Display for AdminCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which grammar an identifier was parsed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Administrative,
    NaturalFeature,
}

/// A parsed location identifier.
///
/// Exactly one of `code` and `feature_name` is populated, depending on `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationIdentifier {
    pub kind: IdentifierKind,
    pub code: Option<AdminCode>,
    /// Free-text units finer than the reference data (townships, villages).
    pub subregion_path: Vec<String>,
    /// Upper-case feature class such as `RIVER`.
    pub feature_class: Option<String>,
    pub feature_name: Option<String>,
    pub section_descriptor: Option<String>,
}

impl LocationIdentifier {
    /// Whether local matching must be skipped in favour of geocoding.
    pub fn bypasses_matching(&self) -> bool {
        self.kind == IdentifierKind::Administrative && !self.subregion_path.is_empty()
    }

    /// Whether this identifier names a river.
    pub fn is_river(&self) -> bool {
        self.feature_class.as_deref() == Some(RIVER_FEATURE_CLASS)
    }

    /// Canonical string form used as the resolution cache key.
    pub fn cache_key(&self) -> String {
        let mut key = String::from(IDENTIFIER_PREFIX);
        match self.kind {
            IdentifierKind::Administrative => {
                if let Some(code) = &self.code {
                    key.push_str(code.as_str());
                }
                for sub in &self.subregion_path {
                    key.push(PATH_SEPARATOR);
                    key.push_str(sub);
                }
            }
            IdentifierKind::NaturalFeature => {
                key.push_str(self.feature_class.as_deref().unwrap_or_default());
                key.push('-');
                key.push_str(self.feature_name.as_deref().unwrap_or_default());
                if let Some(section) = &self.section_descriptor {
                    key.push(PATH_SEPARATOR);
                    key.push_str(section);
                }
            }
        }
        key
    }
}

impl fmt::Display for LocationIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

fn malformed(input: &str, reason: impl Into<String>) -> GeoMatchError {
    GeoMatchError::MalformedIdentifier {
        input: input.to_string(),
        reason: reason.into(),
    }
}

/// Parses a raw identifier string.
///
/// Segment whitespace is trimmed. Empty segments, a missing `L-` prefix, a
/// code that is not six digits, or a feature identifier without a name all
/// fail with [`GeoMatchError::MalformedIdentifier`].
pub fn parse(raw: &str) -> Result<LocationIdentifier> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix(IDENTIFIER_PREFIX)
        .ok_or_else(|| malformed(raw, "missing 'L-' prefix"))?;

    let (head, tail) = match body.split_once(PATH_SEPARATOR) {
        Some((head, tail)) => (head.trim(), Some(tail)),
        None => (body.trim(), None),
    };

    if head.is_empty() {
        return Err(malformed(raw, "empty identifier body"));
    }

    if head.starts_with(|c: char| c.is_ascii_digit()) {
        parse_administrative(raw, head, tail)
    } else {
        parse_natural_feature(raw, head, tail)
    }
}

fn parse_administrative(raw: &str, head: &str, tail: Option<&str>) -> Result<LocationIdentifier> {
    let code = AdminCode::new(head).map_err(|reason| malformed(raw, reason))?;

    let mut subregion_path = Vec::new();
    if let Some(tail) = tail {
        for segment in tail.split(PATH_SEPARATOR) {
            let segment = segment.trim();
            if segment.is_empty() {
                return Err(malformed(raw, "empty sub-region segment"));
            }
            subregion_path.push(segment.to_string());
        }
    }

    Ok(LocationIdentifier {
        kind: IdentifierKind::Administrative,
        code: Some(code),
        subregion_path,
        feature_class: None,
        feature_name: None,
        section_descriptor: None,
    })
}

fn parse_natural_feature(raw: &str, head: &str, tail: Option<&str>) -> Result<LocationIdentifier> {
    let (class, name) = head
        .split_once('-')
        .ok_or_else(|| malformed(raw, "expected '<FEATURE>-<name>'"))?;

    let class = class.trim();
    if class.is_empty() || !class.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(malformed(raw, format!("invalid feature class '{class}'")));
    }

    let name = name.trim();
    if name.is_empty() {
        return Err(malformed(raw, "empty feature name"));
    }

    // The descriptor is free text and may itself contain separators.
    let section_descriptor = match tail {
        Some(tail) => {
            let section = tail.trim();
            if section.is_empty() {
                return Err(malformed(raw, "empty section descriptor"));
            }
            Some(section.to_string())
        }
        None => None,
    };

    Ok(LocationIdentifier {
        kind: IdentifierKind::NaturalFeature,
        code: None,
        subregion_path: Vec::new(),
        feature_class: Some(class.to_ascii_uppercase()),
        feature_name: Some(name.to_string()),
        section_descriptor,
    })
}
