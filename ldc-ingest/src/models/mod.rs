//! Data model shared by the pipeline stages

pub mod catalog;
pub mod feature;
pub mod run_report;
pub mod segment;
pub mod track;

pub use catalog::{CatalogEntry, SearchCandidate};
pub use feature::FeatureVector;
pub use run_report::RunReport;
pub use segment::Segment;
pub use track::{AcquiredTrack, CanonicalAudio};
