//! Git object storage for knit.
//!
//! This crate provides content-addressed storage for git objects
//! (blobs, trees, commits, tags): the canonical object encoding, the
//! loose-object layout on disk, and reference management.

mod commit;
mod compression;
mod error;
mod loose;
mod object;
mod refs;
mod store;
mod traits;
mod tree;

pub use commit::{commit_tree_id, CommitBuilder, Signature};
pub use compression::{compress, decompress, CompressionLevel};
pub use error::StorageError;
pub use loose::{LooseObjectStore, DEFAULT_HEAD};
pub use object::{format_object, parse_object, GitObject, ObjectId, ObjectType};
pub use refs::{RefStore, Reference};
pub use store::MemoryObjectStore;
pub use traits::ObjectDatabase;
pub use tree::{FileMode, Tree, TreeEntry};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
