//! Storage error types.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No object is stored under the requested id.
    #[error("no such object: {0}")]
    NoSuchObject(String),

    /// A stored object could not be decoded.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject {
        /// Hex id of the object, or `<unhashed>` when decoding raw bytes.
        id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Caller-supplied object data was invalid.
    #[error("invalid object: {0}")]
    InvalidObject(String),

    /// The requested reference was not found.
    #[error("reference not found: {0}")]
    RefNotFound(String),

    /// A reference name or its contents were invalid.
    #[error("invalid reference: {0}")]
    InvalidRef(String),

    /// zlib compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(String),
}

impl StorageError {
    pub(crate) fn corrupt(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptObject {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
