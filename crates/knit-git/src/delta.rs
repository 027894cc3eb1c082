//! Git delta instructions.
//!
//! A delta starts with two plain varints, the base size and the result
//! size, followed by instructions:
//!
//! - `0xxxxxxx` inserts the next `x` (1..=127) bytes of the delta;
//! - `1abcdefg` copies from the base. Bits `g..d` select which of four
//!   little-endian offset bytes follow, bits `c..a` which of three size
//!   bytes follow. With no size bits set the size is `0x10000`.

use crate::error::DeltaError;
use crate::varint::{decode_varint, encode_varint};

const COPY: u8 = 0x80;
const MAX_INSERT: usize = 0x7f;
const DEFAULT_COPY_SIZE: usize = 0x10000;
const MAX_PREALLOC: usize = 16 * 1024 * 1024;

/// Applies `delta` to `base`, returning the reconstructed object content.
pub fn apply_delta(base: &[u8], delta: &[u8]) -> Result<Vec<u8>, DeltaError> {
    let (base_size, pos) = decode_varint(delta, 0)?;
    if base_size != base.len() {
        return Err(DeltaError::BaseSizeMismatch {
            expected: base_size,
            actual: base.len(),
        });
    }
    let (result_size, mut pos) = decode_varint(delta, pos)?;

    let mut out = Vec::with_capacity(result_size.min(MAX_PREALLOC));
    let push = |out: &mut Vec<u8>, bytes: &[u8]| {
        if out.len() + bytes.len() > result_size {
            return Err(DeltaError::ResultSizeMismatch {
                expected: result_size,
                actual: out.len() + bytes.len(),
            });
        }
        out.extend_from_slice(bytes);
        Ok(())
    };

    while let Some(&cmd) = delta.get(pos) {
        let at = pos;
        pos += 1;

        if cmd & COPY == 0 {
            let len = usize::from(cmd);
            if len == 0 {
                return Err(DeltaError::UnsupportedLiteralEncoding { at });
            }
            let literal = delta
                .get(pos..pos + len)
                .ok_or_else(|| DeltaError::TruncatedInstructions {
                    at,
                    needed: (pos + len).saturating_sub(delta.len()),
                })?;
            push(&mut out, literal)?;
            pos += len;
            continue;
        }

        let mut operand = |mask: u8, shift: usize| -> Result<usize, DeltaError> {
            if cmd & mask == 0 {
                return Ok(0);
            }
            let byte = *delta
                .get(pos)
                .ok_or(DeltaError::TruncatedInstructions { at, needed: 1 })?;
            pos += 1;
            Ok(usize::from(byte) << shift)
        };

        let offset = operand(0x01, 0)? | operand(0x02, 8)? | operand(0x04, 16)? | operand(0x08, 24)?;
        let mut size = operand(0x10, 0)? | operand(0x20, 8)? | operand(0x40, 16)?;
        if cmd & 0x70 == 0 {
            size = DEFAULT_COPY_SIZE;
        }

        let chunk = offset
            .checked_add(size)
            .and_then(|end| base.get(offset..end))
            .ok_or(DeltaError::CopyOutOfBounds {
                at,
                offset,
                size,
                base_len: base.len(),
            })?;
        push(&mut out, chunk)?;
    }

    if out.len() != result_size {
        return Err(DeltaError::ResultSizeMismatch {
            expected: result_size,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// Writes delta instructions.
///
/// ```
/// use knit_git::{apply_delta, DeltaBuilder};
///
/// let delta = DeltaBuilder::new(11, 13)
///     .copy(0, 6)
///     .insert(b"there")
///     .copy(6, 2)
///     .build();
/// assert_eq!(apply_delta(b"hello world", &delta).unwrap(), b"hello therewo");
/// ```
#[derive(Debug, Clone)]
pub struct DeltaBuilder {
    out: Vec<u8>,
}

impl DeltaBuilder {
    /// Starts a delta from a base of `base_size` bytes to a result of
    /// `result_size` bytes.
    pub fn new(base_size: usize, result_size: usize) -> Self {
        let mut out = Vec::new();
        encode_varint(base_size as u64, &mut out);
        encode_varint(result_size as u64, &mut out);
        Self { out }
    }

    /// Copies `size` bytes at `offset` of the base. Sizes above `0xffffff`
    /// are split across several instructions.
    pub fn copy(mut self, mut offset: u32, mut size: usize) -> Self {
        while size > 0 {
            let chunk = size.min(0xff_ffff);
            self.push_copy(offset, chunk);
            offset = offset.wrapping_add(chunk as u32);
            size -= chunk;
        }
        self
    }

    fn push_copy(&mut self, offset: u32, size: usize) {
        let cmd_at = self.out.len();
        let mut cmd = COPY;
        self.out.push(cmd);

        for (i, byte) in offset.to_le_bytes().into_iter().enumerate() {
            if byte != 0 {
                cmd |= 1 << i;
                self.out.push(byte);
            }
        }
        if size != DEFAULT_COPY_SIZE {
            for (i, byte) in (size as u32).to_le_bytes().into_iter().take(3).enumerate() {
                if byte != 0 {
                    cmd |= 0x10 << i;
                    self.out.push(byte);
                }
            }
        }
        self.out[cmd_at] = cmd;
    }

    /// Inserts literal bytes, split into runs of at most 127.
    pub fn insert(mut self, data: &[u8]) -> Self {
        for run in data.chunks(MAX_INSERT) {
            self.out.push(run.len() as u8);
            self.out.extend_from_slice(run);
        }
        self
    }

    /// Appends a raw instruction byte sequence.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.out.extend_from_slice(bytes);
        self
    }

    /// Returns the encoded delta.
    pub fn build(self) -> Vec<u8> {
        self.out
    }
}
