//! Storage and configuration errors shared by the ldc crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the blob store and configuration loading
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem failure while touching one blob
    #[error("I/O error on {key}: {source}")]
    BlobIo {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Nothing stored under the key
    #[error("Blob not found: {0}")]
    MissingBlob(String),

    /// Key is empty, absolute, or climbs out of the store root
    #[error("Invalid store key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// The store cannot persist anything (root missing or read-only, lock poisoned)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Configuration file missing, unreadable or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// A value could not be encoded for storage
    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl Error {
    pub(crate) fn blob_io(key: &str) -> impl FnOnce(std::io::Error) -> Error + '_ {
        move |source| Error::BlobIo {
            key: key.to_string(),
            source,
        }
    }
}
