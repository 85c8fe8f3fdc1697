pub mod cache;
pub mod config;
pub mod errors;
pub mod geocode;
pub mod identifier;
pub mod processor;
pub mod reference;
pub mod resolution;
pub mod section;
pub mod types;
