//! Locating zlib frames inside a pack.
//!
//! Pack records carry no compressed length, so the only way to find where
//! one payload ends and the next record begins is to run the decoder and
//! count the input bytes it consumed.

use crate::error::ZlibError;
use flate2::{Decompress, FlushDecompress, Status};

// Upper bound on the output buffer reserved up front from an untrusted size.
const MAX_PREALLOC: usize = 16 * 1024 * 1024;
const CHUNK: usize = 32 * 1024;

/// A decompressed zlib frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inflated {
    /// The decompressed bytes.
    pub data: Vec<u8>,
    /// Exact number of compressed bytes the frame occupied.
    pub consumed: usize,
}

/// Decompresses the zlib stream at the start of `input`, stopping at the
/// end of the stream. Trailing bytes are left alone.
///
/// `size_hint` is used only to size the output buffer.
pub fn inflate_frame(input: &[u8], size_hint: usize) -> Result<Inflated, ZlibError> {
    let mut decoder = Decompress::new(true);
    let mut data = Vec::with_capacity(size_hint.min(MAX_PREALLOC));

    loop {
        if data.capacity() == data.len() {
            data.reserve(CHUNK);
        }

        let consumed = decoder.total_in() as usize;
        let produced = data.len();
        let status = decoder
            .decompress_vec(&input[consumed..], &mut data, FlushDecompress::None)
            .map_err(|e| ZlibError::Decompression {
                consumed,
                message: e.to_string(),
            })?;

        match status {
            Status::StreamEnd => {
                return Ok(Inflated {
                    data,
                    consumed: decoder.total_in() as usize,
                })
            }
            Status::Ok | Status::BufError => {
                let stalled = decoder.total_in() as usize == consumed && data.len() == produced;
                if stalled {
                    return Err(ZlibError::Truncated {
                        consumed: decoder.total_in() as usize,
                    });
                }
            }
        }
    }
}
