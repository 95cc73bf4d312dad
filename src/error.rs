//! Error types returned by store operations.

use crate::snapshot::codec::{DecodeError, EncodeError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while operating on a [`Store`](crate::Store).
#[derive(Debug, Error)]
pub enum StoreError {
    /// `add` was called on a key that holds a live entry
    #[error("item {0} already exists")]
    AlreadyExists(String),

    /// The key is absent or its entry has expired
    #[error("item {0} not found")]
    NotFound(String),

    /// The delta's numeric type differs from the stored value's type
    #[error("type mismatch for {key}: stored {stored}, delta {delta}")]
    TypeMismatch {
        key: String,
        stored: &'static str,
        delta: &'static str,
    },

    /// The stored value or the delta is not numeric
    #[error("the value for {key} ({type_tag}) can not be changed arithmetically")]
    Unsupported { key: String, type_tag: &'static str },

    /// The key contains a byte outside the prefix index alphabet
    #[error("invalid key {key:?}: byte {byte:#04x} at position {position} is not printable ASCII")]
    InvalidKey {
        key: String,
        byte: u8,
        position: usize,
    },

    /// The snapshot sequence cannot advance past `u64::MAX`
    #[error("snapshot sequence {0} is the last one available")]
    SequenceExhausted(u64),

    /// A snapshot file could not be created, written, opened or read
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A map could not be encoded into the snapshot format
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// A snapshot file is malformed
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
