/// Identifier resolution.
///
/// The cascade matches identifiers against local reference data; the
/// resolver wraps it with the resolution cache and the geocoding fallback.
mod cascade;
mod resolver;

pub use cascade::{CascadeSettings, MatchCascade};
pub use resolver::Resolver;
