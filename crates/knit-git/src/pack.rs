//! Git pack file format implementation.
//!
//! Pack files are the format used by git for efficient object transfer.
//! See: https://git-scm.com/docs/pack-format
//!
//! The parser turns a fetched pack into an ordered list of records without
//! resolving deltas; [`crate::write_all`] does that against an object
//! database. The trailing checksum is not verified.

use crate::error::PackError;
use crate::varint::{decode_object_header, decode_offset, encode_object_header, encode_offset};
use crate::zlib::inflate_frame;
use crate::{GitError, Result, VarintError, ZlibError};
use bytes::Bytes;
use knit_storage::{compress, CompressionLevel, GitObject, ObjectId, ObjectType};
use sha1::{Digest, Sha1};
use std::fmt;

/// Magic bytes at the start of a pack file.
const PACK_SIGNATURE: &[u8; 4] = b"PACK";
/// Pack version written by [`PackBuilder`].
const PACK_VERSION: u32 = 2;
/// Versions the parser accepts.
const SUPPORTED_VERSIONS: [u32; 2] = [2, 3];

const OFS_DELTA: u8 = 6;
const REF_DELTA: u8 = 7;

/// Kind of a pack record, from the 3-bit type field of its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A whole commit.
    Commit,
    /// A whole tree.
    Tree,
    /// A whole blob.
    Blob,
    /// A whole annotated tag.
    Tag,
    /// A delta against a record earlier in the same pack.
    OffsetDelta,
    /// A delta against an object named by id.
    RefDelta,
    /// Codes 0 and 5, which git never assigns.
    Invalid(u8),
}

impl ObjectKind {
    /// Maps a 3-bit type code to a kind.
    pub fn from_code(code: u8) -> Self {
        match code {
            OFS_DELTA => Self::OffsetDelta,
            REF_DELTA => Self::RefDelta,
            _ => ObjectType::from_pack_type(code)
                .map(Self::from)
                .unwrap_or(Self::Invalid(code)),
        }
    }

    /// Returns the 3-bit type code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Commit => ObjectType::Commit.pack_type(),
            Self::Tree => ObjectType::Tree.pack_type(),
            Self::Blob => ObjectType::Blob.pack_type(),
            Self::Tag => ObjectType::Tag.pack_type(),
            Self::OffsetDelta => OFS_DELTA,
            Self::RefDelta => REF_DELTA,
            Self::Invalid(code) => *code,
        }
    }

    /// Returns the object type for non-delta kinds.
    pub fn object_type(&self) -> Option<ObjectType> {
        match self {
            Self::Commit => Some(ObjectType::Commit),
            Self::Tree => Some(ObjectType::Tree),
            Self::Blob => Some(ObjectType::Blob),
            Self::Tag => Some(ObjectType::Tag),
            _ => None,
        }
    }

    /// Returns true for the two delta kinds.
    pub fn is_delta(&self) -> bool {
        matches!(self, Self::OffsetDelta | Self::RefDelta)
    }
}

impl From<ObjectType> for ObjectKind {
    fn from(ot: ObjectType) -> Self {
        match ot {
            ObjectType::Commit => Self::Commit,
            ObjectType::Tree => Self::Tree,
            ObjectType::Blob => Self::Blob,
            ObjectType::Tag => Self::Tag,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OffsetDelta => f.write_str("ofs-delta"),
            Self::RefDelta => f.write_str("ref-delta"),
            Self::Invalid(code) => write!(f, "invalid({code})"),
            other => match other.object_type() {
                Some(ot) => write!(f, "{ot}"),
                None => Ok(()),
            },
        }
    }
}

/// What a delta record is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseRef {
    /// The object with this id (ref-delta).
    Id(ObjectId),
    /// The record starting this many bytes before the delta's own header
    /// (ofs-delta).
    Offset(u64),
}

/// One record of a parsed pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackObjectRecord {
    /// Record kind.
    pub kind: ObjectKind,
    /// Uncompressed size from the header; equals `content.len()`.
    pub declared_size: u64,
    /// Inflated payload: object content, or delta instructions.
    pub content: Bytes,
    /// Base of a delta record.
    pub base_ref: Option<BaseRef>,
    /// Offset of the record header in the parsed buffer.
    pub offset: usize,
}

impl PackObjectRecord {
    /// Absolute offset of an offset-delta's base record.
    pub fn base_offset(&self) -> Option<usize> {
        match self.base_ref {
            Some(BaseRef::Offset(distance)) => {
                let distance = usize::try_from(distance).ok()?;
                self.offset.checked_sub(distance)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PackHeader {
    version: u32,
    object_count: u32,
}

/// Parses a pack into its records.
pub struct PackParser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PackParser<'a> {
    /// Creates a new pack parser.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Parses the whole buffer. Parsing the same buffer twice yields the
    /// same records.
    pub fn parse(&mut self) -> std::result::Result<Vec<PackObjectRecord>, PackError> {
        self.pos = 0;
        self.skip_acknowledgements();
        let header = self.read_header()?;

        // the count is untrusted; every record takes at least one byte
        let capacity = (header.object_count as usize).min(self.data.len() - self.pos);
        let mut records = Vec::with_capacity(capacity);
        for index in 0..header.object_count as usize {
            records.push(self.parse_record(index)?);
        }

        tracing::debug!(
            version = header.version,
            objects = records.len(),
            trailing = self.data.len() - self.pos,
            "Parsed pack"
        );
        Ok(records)
    }

    fn remaining(&self) -> &'a [u8] {
        self.data.get(self.pos..).unwrap_or_default()
    }

    fn truncated(&self, offset: usize, context: impl Into<String>) -> PackError {
        PackError::TruncatedInput {
            offset,
            context: context.into(),
        }
    }

    /// Skips `NAK`/`ACK` pkt-lines that upload-pack sends ahead of the pack.
    fn skip_acknowledgements(&mut self) {
        while !self.remaining().starts_with(PACK_SIGNATURE) {
            let rest = self.remaining();
            let Some(len) = rest
                .get(..4)
                .and_then(|h| std::str::from_utf8(h).ok())
                .filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()))
                .and_then(|h| usize::from_str_radix(h, 16).ok())
            else {
                return;
            };
            if len <= 4 || len > rest.len() {
                return;
            }
            let payload = &rest[4..len];
            if !(payload.starts_with(b"NAK") || payload.starts_with(b"ACK")) {
                return;
            }
            tracing::trace!(line = %String::from_utf8_lossy(payload).trim_end(), "Skipped acknowledgement");
            self.pos += len;
        }
    }

    fn read_u32(&mut self, what: &str) -> std::result::Result<u32, PackError> {
        let bytes = self
            .remaining()
            .get(..4)
            .ok_or_else(|| self.truncated(self.pos, format!("pack header {what}")))?;
        let value = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        self.pos += 4;
        Ok(value)
    }

    fn read_header(&mut self) -> std::result::Result<PackHeader, PackError> {
        let rest = self.remaining();
        if rest.len() < PACK_SIGNATURE.len() {
            if PACK_SIGNATURE.starts_with(rest) {
                return Err(self.truncated(self.pos, "pack signature"));
            }
            return Err(PackError::InvalidMagic {
                found: rest.to_vec(),
            });
        }
        if &rest[..4] != PACK_SIGNATURE {
            return Err(PackError::InvalidMagic {
                found: rest[..4].to_vec(),
            });
        }
        self.pos += 4;

        let version = self.read_u32("version")?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(PackError::UnsupportedVersion(version));
        }
        let object_count = self.read_u32("object count")?;

        Ok(PackHeader {
            version,
            object_count,
        })
    }

    fn parse_record(&mut self, index: usize) -> std::result::Result<PackObjectRecord, PackError> {
        let offset = self.pos;
        let header = decode_object_header(self.data, offset)
            .map_err(|e| self.varint_error(e, index, "object header"))?;
        self.pos += header.consumed;

        let base_ref = match header.kind {
            ObjectKind::RefDelta => {
                let raw = self
                    .remaining()
                    .get(..ObjectId::LEN)
                    .ok_or_else(|| self.truncated(self.pos, format!("object {index} base id")))?;
                let id = ObjectId::from_slice(raw)
                    .map_err(|_| self.truncated(self.pos, format!("object {index} base id")))?;
                self.pos += ObjectId::LEN;
                Some(BaseRef::Id(id))
            }
            ObjectKind::OffsetDelta => {
                let (distance, next) = decode_offset(self.data, self.pos)
                    .map_err(|e| self.varint_error(e, index, "base offset"))?;
                if distance == 0 || distance > offset as u64 {
                    return Err(PackError::InvalidBaseOffset {
                        index,
                        offset,
                        distance,
                    });
                }
                self.pos = next;
                Some(BaseRef::Offset(distance))
            }
            ObjectKind::Invalid(code) => {
                return Err(PackError::UnsupportedObjectKind {
                    index,
                    offset,
                    code,
                })
            }
            _ => None,
        };

        let payload_at = self.pos;
        let hint = usize::try_from(header.size).unwrap_or(usize::MAX);
        let inflated = inflate_frame(self.remaining(), hint).map_err(|e| match e {
            ZlibError::Truncated { consumed } => {
                self.truncated(payload_at + consumed, format!("object {index} payload"))
            }
            ZlibError::Decompression { message, .. } => PackError::Decompression {
                index,
                offset: payload_at,
                message,
            },
        })?;

        if inflated.data.len() as u64 != header.size {
            return Err(PackError::SizeMismatch {
                index,
                offset,
                declared: header.size,
                actual: inflated.data.len(),
            });
        }
        self.pos += inflated.consumed;

        tracing::trace!(index, offset, kind = %header.kind, size = header.size, "Decoded pack record");
        Ok(PackObjectRecord {
            kind: header.kind,
            declared_size: header.size,
            content: Bytes::from(inflated.data),
            base_ref,
            offset,
        })
    }

    fn varint_error(&self, e: VarintError, index: usize, what: &str) -> PackError {
        match e {
            VarintError::TruncatedInput { offset } => {
                self.truncated(offset, format!("object {index} {what}"))
            }
            VarintError::MalformedVarint { offset } => PackError::MalformedVarint { index, offset },
        }
    }
}

/// Parses `data` into its ordered records.
pub fn parse_pack(data: &[u8]) -> std::result::Result<Vec<PackObjectRecord>, PackError> {
    PackParser::new(data).parse()
}

enum EntryBase {
    None,
    Id(ObjectId),
    Index(usize),
}

struct Entry {
    code: u8,
    base: EntryBase,
    data: Bytes,
}

/// Builds a pack file from whole objects and deltas.
pub struct PackBuilder {
    entries: Vec<Entry>,
    level: CompressionLevel,
}

impl PackBuilder {
    /// Creates a new pack builder.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            level: CompressionLevel::default(),
        }
    }

    /// Sets the zlib level of record payloads.
    pub fn with_compression(mut self, level: CompressionLevel) -> Self {
        self.level = level;
        self
    }

    /// Number of records added so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds an object to the pack.
    pub fn add(&mut self, object: GitObject) {
        self.entries.push(Entry {
            code: object.object_type.pack_type(),
            base: EntryBase::None,
            data: object.data,
        });
    }

    /// Adds a delta against the object `base`.
    pub fn add_ref_delta(&mut self, base: ObjectId, delta: impl Into<Bytes>) {
        self.entries.push(Entry {
            code: REF_DELTA,
            base: EntryBase::Id(base),
            data: delta.into(),
        });
    }

    /// Adds a delta against the record added at position `base_index`.
    pub fn add_ofs_delta(&mut self, base_index: usize, delta: impl Into<Bytes>) {
        self.entries.push(Entry {
            code: OFS_DELTA,
            base: EntryBase::Index(base_index),
            data: delta.into(),
        });
    }

    /// Builds the pack file, trailer checksum included.
    pub fn build(self) -> Result<Vec<u8>> {
        let mut pack = Vec::new();

        pack.extend_from_slice(PACK_SIGNATURE);
        pack.extend_from_slice(&PACK_VERSION.to_be_bytes());
        pack.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());

        let mut starts = Vec::with_capacity(self.entries.len());
        for (index, entry) in self.entries.iter().enumerate() {
            let start = pack.len();
            starts.push(start);
            encode_object_header(entry.code, entry.data.len() as u64, &mut pack);

            match entry.base {
                EntryBase::None => {}
                EntryBase::Id(id) => pack.extend_from_slice(id.as_bytes()),
                EntryBase::Index(base) => {
                    let base_start = starts
                        .get(base)
                        .copied()
                        .filter(|_| base < index)
                        .ok_or(GitError::Pack(PackError::InvalidBaseOffset {
                            index,
                            offset: start,
                            distance: 0,
                        }))?;
                    encode_offset((start - base_start) as u64, &mut pack);
                }
            }

            pack.extend_from_slice(&compress(&entry.data, self.level)?);
        }

        let checksum = Sha1::digest(&pack);
        pack.extend_from_slice(&checksum);

        Ok(pack)
    }
}

impl Default for PackBuilder {
    fn default() -> Self {
        Self::new()
    }
}
