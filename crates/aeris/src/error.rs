//! Error and Result types for Aeris operations.

use crate::store::StoreError;
use std::io;
use thiserror::Error;

/// A convenience `Result` type for Aeris operations.
pub type Result<T> = std::result::Result<T, AerisError>;

/// The error type for Aeris operations.
#[derive(Debug, Error)]
pub enum AerisError {
    /// Malformed caller input: bad site code, bad time string, bad table shape.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Incoming data lies entirely inside existing coverage and overwrite was not requested.
    #[error("Overlap in datasource {name}: incoming {incoming} is already covered by {existing}")]
    Overlap {
        /// Name of the datasource being written.
        name: String,
        /// Daterange of the rejected data.
        incoming: String,
        /// Current overall coverage of the datasource.
        existing: String,
    },

    /// File content was already ingested and overwrite was not requested.
    #[error("File already ingested as {filename} (hash {hash})")]
    DuplicateIngest {
        /// Filename recorded when the content was first ingested.
        filename: String,
        /// Content hash of the file.
        hash: String,
    },

    /// A referenced object does not exist in the store.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of object, e.g. "datasource".
        kind: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// A stored key or document does not parse as expected.
    #[error("Format error in {key}: {reason}")]
    Format {
        /// Offending key or string.
        key: String,
        /// Parser message.
        reason: String,
    },

    /// Requested data type or operation is outside the supported set.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// The stored document changed since it was loaded.
    #[error("Concurrent modification of {key}: loaded revision {expected:?}, stored revision {found:?}")]
    ConcurrentModification {
        /// Key of the document.
        key: String,
        /// Revision observed at load time (`None` for new objects).
        expected: Option<u64>,
        /// Revision currently stored (`None` if absent).
        found: Option<u64>,
    },

    /// Invalid magic bytes in a segment payload.
    #[error("Invalid magic bytes: expected ASEG, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported segment format version or block encoding.
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u16),

    /// Payload checksum does not match expected value.
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Expected CRC32 checksum.
        expected: u32,
        /// Actual computed CRC32 checksum.
        actual: u32,
    },

    /// Error while decoding a segment payload.
    #[error("Decompression error: {0}")]
    DecompressionError(String),

    /// Object store failure, propagated unchanged.
    #[error(transparent)]
    StoreError(#[from] StoreError),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Configuration file could not be parsed.
    #[error("Config error: {0}")]
    ConfigError(#[from] toml::de::Error),
}

impl AerisError {
    /// Builds a [`AerisError::Format`] for the given key.
    pub fn format(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::Format {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Builds a [`AerisError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
