//! zlib helpers for loose objects.

use crate::{Result, StorageError};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

/// zlib level used when writing new loose objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    /// Stored blocks only
    None,
    /// zlib level 1
    Fast,
    /// zlib's own default (level 6), what git writes
    #[default]
    Default,
    /// zlib level 9
    Best,
}

impl CompressionLevel {
    /// The matching flate2 setting.
    pub fn to_flate2(self) -> flate2::Compression {
        match self {
            Self::None => flate2::Compression::none(),
            Self::Fast => flate2::Compression::fast(),
            Self::Default => flate2::Compression::default(),
            Self::Best => flate2::Compression::best(),
        }
    }
}

/// Compresses `data` into a single zlib stream.
pub fn compress(data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), level.to_flate2());
    encoder
        .write_all(data)
        .map_err(|e| StorageError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| StorageError::Compression(e.to_string()))
}

/// Decompresses a complete zlib stream.
pub fn decompress(compressed: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| StorageError::Compression(e.to_string()))?;
    Ok(out)
}
