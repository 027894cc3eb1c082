//! Git protocol error types.

use crate::pack::ObjectKind;
use knit_storage::StorageError;
use thiserror::Error;

/// Errors from the two variable-length integer decoders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VarintError {
    /// The buffer ended while a continuation bit was still set.
    #[error("input truncated at byte {offset}")]
    TruncatedInput {
        /// Offset of the byte that was expected.
        offset: usize,
    },

    /// The encoded value does not fit in 64 bits.
    #[error("malformed varint starting at byte {offset}")]
    MalformedVarint {
        /// Offset of the first byte of the varint.
        offset: usize,
    },
}

/// Errors from the zlib frame locator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZlibError {
    /// The input is not a valid zlib stream.
    #[error("decompression failed after {consumed} input bytes: {message}")]
    Decompression {
        /// Compressed bytes consumed before the failure.
        consumed: usize,
        /// Decoder message.
        message: String,
    },

    /// The input ended before the stream did.
    #[error("compressed stream truncated after {consumed} input bytes")]
    Truncated {
        /// Compressed bytes consumed.
        consumed: usize,
    },
}

/// Pack file format errors. Offsets are absolute positions in the buffer
/// handed to the parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackError {
    /// The buffer ended early.
    #[error("truncated input at byte {offset}: {context}")]
    TruncatedInput {
        /// Where more bytes were expected.
        offset: usize,
        /// What was being read.
        context: String,
    },

    /// A size or offset varint overflowed.
    #[error("malformed varint at byte {offset} (object {index})")]
    MalformedVarint {
        /// Index of the record being decoded.
        index: usize,
        /// Offset of the varint.
        offset: usize,
    },

    /// The pack does not start with `PACK`.
    #[error("invalid pack signature {found:02x?}")]
    InvalidMagic {
        /// The four bytes found instead.
        found: Vec<u8>,
    },

    /// The pack version is neither 2 nor 3.
    #[error("unsupported pack version: {0}")]
    UnsupportedVersion(u32),

    /// The record's 3-bit type is not a known kind.
    #[error("object {index} at byte {offset}: unsupported object kind {code}")]
    UnsupportedObjectKind {
        /// Index of the record.
        index: usize,
        /// Offset of the record header.
        offset: usize,
        /// Raw 3-bit type code.
        code: u8,
    },

    /// An offset-delta points outside the data preceding it.
    #[error("object {index} at byte {offset}: base offset {distance} points before the pack")]
    InvalidBaseOffset {
        /// Index of the record.
        index: usize,
        /// Offset of the record header.
        offset: usize,
        /// Backward distance read from the record.
        distance: u64,
    },

    /// The payload is not a valid zlib stream.
    #[error("object {index} at byte {offset}: {message}")]
    Decompression {
        /// Index of the record.
        index: usize,
        /// Offset of the compressed payload.
        offset: usize,
        /// Decoder message.
        message: String,
    },

    /// The header size disagrees with the inflated payload.
    #[error("object {index} at byte {offset}: header declares {declared} bytes, payload inflates to {actual}")]
    SizeMismatch {
        /// Index of the record.
        index: usize,
        /// Offset of the record header.
        offset: usize,
        /// Size from the record header.
        declared: u64,
        /// Inflated length.
        actual: usize,
    },
}

/// Delta application errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeltaError {
    /// A size varint in the delta header was malformed.
    #[error("delta header: {0}")]
    Varint(#[from] VarintError),

    /// The delta was computed against a base of a different size.
    #[error("base size mismatch: delta expects {expected} bytes, base has {actual}")]
    BaseSizeMismatch {
        /// Size declared by the delta.
        expected: usize,
        /// Length of the supplied base.
        actual: usize,
    },

    /// The instructions produce a different amount of data than declared.
    #[error("result size mismatch: delta declares {expected} bytes, instructions produce {actual}")]
    ResultSizeMismatch {
        /// Size declared by the delta.
        expected: usize,
        /// Bytes produced (or about to be produced) by the instructions.
        actual: usize,
    },

    /// A copy instruction reads outside the base.
    #[error("copy at instruction byte {at} out of bounds: offset {offset}, size {size}, base length {base_len}")]
    CopyOutOfBounds {
        /// Offset of the command byte.
        at: usize,
        /// Copy offset.
        offset: usize,
        /// Copy size.
        size: usize,
        /// Length of the base.
        base_len: usize,
    },

    /// Command byte `0x00`, the reserved zero-length insert.
    #[error("unsupported literal encoding (command byte 0x00) at instruction byte {at}")]
    UnsupportedLiteralEncoding {
        /// Offset of the command byte.
        at: usize,
    },

    /// An instruction needs more bytes than remain.
    #[error("delta instructions truncated at byte {at}: {needed} more bytes needed")]
    TruncatedInstructions {
        /// Offset of the command byte.
        at: usize,
        /// How many bytes were missing.
        needed: usize,
    },
}

/// Errors that can occur during git protocol operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Invalid pkt-line format.
    #[error("invalid pkt-line: {0}")]
    InvalidPktLine(String),

    /// The server answered with something other than the smart protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The ref advertisement could not be parsed.
    #[error("malformed ref advertisement: {0}")]
    MalformedAdvertisement(String),

    /// Transport failure; safe to retry.
    #[error("network error: {0}")]
    Network(String),

    /// Invalid pack file.
    #[error("invalid pack file: {0}")]
    Pack(#[from] PackError),

    /// A delta record could not be reconstructed.
    #[error("object {index}: cannot apply delta")]
    Delta {
        /// Index of the record in the pack.
        index: usize,
        /// Underlying delta error.
        #[source]
        source: DeltaError,
    },

    /// A record kind that cannot be written to the object store.
    #[error("object {index}: unsupported object kind {kind} for writing")]
    UnsupportedObjectKind {
        /// Index of the record in the pack.
        index: usize,
        /// Its kind.
        kind: ObjectKind,
    },

    /// Storing or loading a specific pack record failed.
    #[error("object {index}: cannot store object")]
    Object {
        /// Index of the record in the pack.
        index: usize,
        /// Underlying storage error.
        #[source]
        source: StorageError,
    },

    /// Working tree materialization failed.
    #[error("checkout failed: {0}")]
    Checkout(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GitError {
    /// Returns true for transient transport failures the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
