//! Git fetch-side protocol implementation for knit.
//!
//! This crate decodes git pack files and speaks the client half of the
//! smart HTTP protocol, enough to clone a repository into a loose-object
//! store and check out its working tree.
//!
//! The pipeline of a clone:
//! - [`SmartHttpClient`] discovers refs and requests a pack;
//! - [`parse_pack`] splits the pack into [`PackObjectRecord`]s;
//! - [`write_all`] stores whole objects, then resolves ref-deltas with
//!   [`apply_delta`];
//! - [`checkout_commit`] writes the HEAD tree to disk.

mod checkout;
mod client;
mod clone;
mod delta;
mod error;
mod pack;
mod pktline;
mod protocol;
mod varint;
mod writer;
mod zlib;

pub use checkout::{checkout_commit, checkout_tree, write_tree};
pub use client::{ClientConfig, SmartHttpClient};
pub use clone::{clone_repository, populate, CloneOutcome};
pub use delta::{apply_delta, DeltaBuilder};
pub use error::{DeltaError, GitError, PackError, VarintError, ZlibError};
pub use pack::{
    parse_pack, BaseRef, ObjectKind, PackBuilder, PackObjectRecord, PackParser,
};
pub use pktline::{PktLine, PktLineReader, MAX_PKT_LEN};
pub use protocol::{
    build_want_request, parse_ref_advertisement, RefAdvertisement, RefRecord, UPLOAD_PACK,
};
pub use varint::{
    decode_object_header, decode_offset, decode_varint, encode_object_header, encode_offset,
    encode_varint, ObjectHeader,
};
pub use writer::{write_all, WriteSummary};
pub use zlib::{inflate_frame, Inflated};

/// Result type for git protocol operations.
pub type Result<T> = std::result::Result<T, GitError>;
