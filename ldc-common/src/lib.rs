//! # LDC Common Library
//!
//! Shared code for the folk-song corpus builder:
//! - Error type used by storage and configuration
//! - Configuration file and root folder resolution
//! - Identity normalization (storage keys)
//! - Human-readable duration parsing
//! - Blob store abstraction (local filesystem, in-memory)

pub mod config;
pub mod duration;
pub mod error;
pub mod naming;
pub mod store;

pub use duration::{parse_duration, MalformedDurationError};
pub use error::{Error, Result};
pub use naming::normalize;
pub use store::{BlobStore, LocalStore, MemoryStore};
