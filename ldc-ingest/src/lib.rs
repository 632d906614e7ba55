//! ldc-ingest library interface
//!
//! Builds the regional folk-song corpus: catalog → search → download → WAV → fixed windows →
//! mean MFCC vectors. Exposed as a library so the stages can be driven and tested
//! individually; the `ldc-ingest` binary wires the production collaborators.

pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod tables;
pub mod utils;

pub use crate::config::{PipelineConfig, Stage};
pub use crate::error::{PipelineError, PipelineResult, StageError};
pub use crate::orchestrator::{Collaborators, Orchestrator};
