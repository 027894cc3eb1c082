//! Git object types and the canonical loose-object encoding.
//!
//! Every stored object is serialized as `"{type} {len}\0{content}"`; its
//! [`ObjectId`] is the SHA-1 of exactly those bytes.

use crate::{Result, StorageError};
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::fmt;
use std::str::FromStr;

/// A 20-byte SHA-1 object identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 20]);

impl ObjectId {
    /// Length of a raw object id in bytes.
    pub const LEN: usize = 20;

    /// Length of a hex-encoded object id.
    pub const HEX_LEN: usize = 40;

    /// Creates an ObjectId from raw bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Creates an ObjectId from a slice that must be exactly 20 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; 20] = bytes.try_into().map_err(|_| {
            StorageError::InvalidObject(format!("invalid object id length: {}", bytes.len()))
        })?;
        Ok(Self(raw))
    }

    /// Creates an ObjectId from a hex string.
    pub fn from_hex(hex: &str) -> Result<Self> {
        if hex.len() != Self::HEX_LEN {
            return Err(StorageError::InvalidObject(format!(
                "invalid object id length: {}",
                hex.len()
            )));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(hex, &mut bytes)
            .map_err(|e| StorageError::InvalidObject(format!("{hex:?}: {e}")))?;
        Ok(Self(bytes))
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns the hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// SHA-1 of `data`, taken as already-formatted object bytes.
    ///
    /// A fresh hasher is used for every call.
    pub fn hash(data: &[u8]) -> Self {
        Self(Sha1::digest(data).into())
    }

    /// Computes the id `content` would have when stored as `object_type`.
    ///
    /// Equivalent to `ObjectId::hash(&format_object(object_type, content))`
    /// without building the intermediate buffer.
    pub fn hash_object(object_type: ObjectType, content: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(header(object_type, content.len()));
        hasher.update(content);
        Self(hasher.finalize().into())
    }

    /// Splits the hex id into the fan-out directory and file name used by
    /// the loose-object layout (`ab` / `cdef...`).
    pub fn fanout(&self) -> (String, String) {
        let hex = self.to_hex();
        let (dir, file) = hex.split_at(2);
        (dir.to_string(), file.to_string())
    }
}

impl FromStr for ObjectId {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Git object types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    /// File content.
    Blob,
    /// Directory listing.
    Tree,
    /// Commit object.
    Commit,
    /// Annotated tag.
    Tag,
}

impl ObjectType {
    /// All storable object types.
    pub const ALL: [ObjectType; 4] = [Self::Commit, Self::Tree, Self::Blob, Self::Tag];

    /// Returns the string representation used in git.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
            Self::Tag => "tag",
        }
    }

    /// Parses an object type from a string.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "blob" => Ok(Self::Blob),
            "tree" => Ok(Self::Tree),
            "commit" => Ok(Self::Commit),
            "tag" => Ok(Self::Tag),
            _ => Err(StorageError::InvalidObject(format!(
                "unknown object type: {}",
                s
            ))),
        }
    }

    /// Returns the type code used in pack files.
    pub fn pack_type(&self) -> u8 {
        match self {
            Self::Commit => 1,
            Self::Tree => 2,
            Self::Blob => 3,
            Self::Tag => 4,
        }
    }

    /// Maps a pack file type code back to a storable type.
    ///
    /// Delta codes (6, 7) and invalid codes return `None`.
    pub fn from_pack_type(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Commit),
            2 => Some(Self::Tree),
            3 => Some(Self::Blob),
            4 => Some(Self::Tag),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn header(object_type: ObjectType, len: usize) -> String {
    format!("{} {}\0", object_type.as_str(), len)
}

/// Serializes an object into its canonical form: `"{type} {len}\0{content}"`.
pub fn format_object(object_type: ObjectType, content: &[u8]) -> Vec<u8> {
    let header = header(object_type, content.len());
    let mut out = Vec::with_capacity(header.len() + content.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(content);
    out
}

/// Splits canonical object bytes into their type and content.
///
/// The header must be exactly two space-separated fields, a known type and
/// a decimal length that matches the content that follows the NUL.
pub fn parse_object(raw: &[u8]) -> Result<(ObjectType, &[u8])> {
    const UNHASHED: &str = "<unhashed>";

    let nul = raw
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| StorageError::corrupt(UNHASHED, "missing NUL after header"))?;
    let header = std::str::from_utf8(&raw[..nul])
        .map_err(|_| StorageError::corrupt(UNHASHED, "header is not valid UTF-8"))?;

    let mut fields = header.split(' ');
    let (kind, len) = match (fields.next(), fields.next(), fields.next()) {
        (Some(kind), Some(len), None) => (kind, len),
        _ => {
            return Err(StorageError::corrupt(
                UNHASHED,
                format!("invalid header: {header:?}"),
            ))
        }
    };

    let object_type = ObjectType::parse(kind)
        .map_err(|_| StorageError::corrupt(UNHASHED, format!("unknown object type {kind:?}")))?;
    let declared: usize = len
        .parse()
        .map_err(|_| StorageError::corrupt(UNHASHED, format!("invalid size {len:?}")))?;

    let content = &raw[nul + 1..];
    if declared != content.len() {
        return Err(StorageError::corrupt(
            UNHASHED,
            format!("header declares {declared} bytes, found {}", content.len()),
        ));
    }

    Ok((object_type, content))
}

/// A git object (blob, tree, commit, or tag).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitObject {
    /// The object's unique identifier (SHA-1 hash).
    pub id: ObjectId,
    /// The type of object.
    pub object_type: ObjectType,
    /// The raw object data (uncompressed, without header).
    pub data: Bytes,
}

impl GitObject {
    /// Creates a new git object, computing its ID from the data.
    pub fn new(object_type: ObjectType, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let id = ObjectId::hash_object(object_type, &data);
        Self {
            id,
            object_type,
            data,
        }
    }

    /// Creates a blob object from file content.
    pub fn blob(content: impl Into<Bytes>) -> Self {
        Self::new(ObjectType::Blob, content)
    }

    /// Returns the canonical serialized form.
    pub fn encode(&self) -> Vec<u8> {
        format_object(self.object_type, &self.data)
    }

    /// Returns the size of the object data.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
