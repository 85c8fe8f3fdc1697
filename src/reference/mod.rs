/// Reference datasets: loading, WKT conversion, name normalization, and the
/// tiered lookup index.
mod index;
pub mod loader;
pub mod normalize;
pub mod wkt;

pub use index::{FuzzyTieBreak, IndexOptions, IndexStats, ReferenceIndex};
pub use loader::DatasetLoader;
pub use normalize::{normalize_name, SuffixVocabulary};
