//! Utility modules for ldc-ingest

pub mod audio_decoder;
pub mod identity_locks;
pub mod retry;

pub use audio_decoder::{decode_audio_bytes, resample, DecodedAudio};
pub use identity_locks::IdentityLocks;
pub use retry::{retry_transient, RetryPolicy, Transient};
