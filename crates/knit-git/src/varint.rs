//! Variable-length integers used by the pack format.
//!
//! Three encodings appear in a pack:
//! - the record header: 3-bit type and the low 4 size bits in the first
//!   byte, then 7-bit little-endian groups;
//! - the plain 7-bit little-endian varint of delta base/result sizes;
//! - the big-endian "offset" encoding of offset-delta base distances, which
//!   adds one before each shift so that no value has two encodings.
//!
//! In all three the high bit of a byte means "another byte follows".

use crate::error::VarintError;
use crate::pack::ObjectKind;

const CONTINUE: u8 = 0x80;
const LOW7: u8 = 0x7f;

/// A decoded pack record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeader {
    /// Record kind from bits 6..4 of the first byte.
    pub kind: ObjectKind,
    /// Uncompressed size asserted by the header.
    pub size: u64,
    /// Number of header bytes consumed.
    pub consumed: usize,
}

// Shifts `part` into place, or None if bits would fall off the top.
fn place(part: u8, shift: u32) -> Option<u64> {
    let part = u64::from(part);
    if shift >= u64::BITS {
        return None;
    }
    let placed = part << shift;
    (placed >> shift == part).then_some(placed)
}

/// Decodes the record header starting at `buf[pos]`.
pub fn decode_object_header(buf: &[u8], pos: usize) -> Result<ObjectHeader, VarintError> {
    let mut cursor = pos;
    let mut byte = *buf
        .get(cursor)
        .ok_or(VarintError::TruncatedInput { offset: cursor })?;
    cursor += 1;

    let kind = ObjectKind::from_code((byte >> 4) & 0x07);
    let mut size = u64::from(byte & 0x0f);
    let mut shift = 4;

    while byte & CONTINUE != 0 {
        byte = *buf
            .get(cursor)
            .ok_or(VarintError::TruncatedInput { offset: cursor })?;
        cursor += 1;
        size |= place(byte & LOW7, shift).ok_or(VarintError::MalformedVarint { offset: pos })?;
        shift += 7;
    }

    Ok(ObjectHeader {
        kind,
        size,
        consumed: cursor - pos,
    })
}

/// Decodes a plain 7-bit varint at `buf[pos]`, returning the value and the
/// cursor just past it.
pub fn decode_varint(buf: &[u8], pos: usize) -> Result<(usize, usize), VarintError> {
    let mut cursor = pos;
    let mut value = 0u64;
    let mut shift = 0;

    loop {
        let byte = *buf
            .get(cursor)
            .ok_or(VarintError::TruncatedInput { offset: cursor })?;
        cursor += 1;
        value |= place(byte & LOW7, shift).ok_or(VarintError::MalformedVarint { offset: pos })?;
        if byte & CONTINUE == 0 {
            break;
        }
        shift += 7;
    }

    let value = usize::try_from(value).map_err(|_| VarintError::MalformedVarint { offset: pos })?;
    Ok((value, cursor))
}

/// Decodes an offset-delta base distance at `buf[pos]`, returning the
/// distance and the cursor just past it.
pub fn decode_offset(buf: &[u8], pos: usize) -> Result<(u64, usize), VarintError> {
    let mut cursor = pos;
    let mut byte = *buf
        .get(cursor)
        .ok_or(VarintError::TruncatedInput { offset: cursor })?;
    cursor += 1;
    let mut value = u64::from(byte & LOW7);

    while byte & CONTINUE != 0 {
        byte = *buf
            .get(cursor)
            .ok_or(VarintError::TruncatedInput { offset: cursor })?;
        cursor += 1;
        value = value
            .checked_add(1)
            .filter(|v| v.leading_zeros() >= 7)
            .ok_or(VarintError::MalformedVarint { offset: pos })?;
        value = (value << 7) | u64::from(byte & LOW7);
    }

    Ok((value, cursor))
}

/// Appends a record header for type `code` and `size`.
pub fn encode_object_header(code: u8, size: u64, out: &mut Vec<u8>) {
    let mut byte = ((code & 0x07) << 4) | (size & 0x0f) as u8;
    let mut rest = size >> 4;
    while rest != 0 {
        out.push(byte | CONTINUE);
        byte = (rest & u64::from(LOW7)) as u8;
        rest >>= 7;
    }
    out.push(byte);
}

/// Appends a plain 7-bit varint.
pub fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= u64::from(CONTINUE) {
        out.push((value as u8 & LOW7) | CONTINUE);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Appends an offset-delta base distance.
pub fn encode_offset(mut value: u64, out: &mut Vec<u8>) {
    let mut buf = [0u8; 10];
    let mut i = buf.len() - 1;
    buf[i] = value as u8 & LOW7;
    value >>= 7;
    while value != 0 {
        value -= 1;
        i -= 1;
        buf[i] = (value as u8 & LOW7) | CONTINUE;
        value >>= 7;
    }
    out.extend_from_slice(&buf[i..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_single_byte() {
        let h = decode_object_header(&[0x0a], 0).unwrap();
        assert_eq!(h.size, 10);
        assert_eq!(h.kind, ObjectKind::Invalid(0));
        assert_eq!(h.consumed, 1);
    }

    #[test]
    fn test_header_two_bytes() {
        let h = decode_object_header(&[0x8a, 0x42], 0).unwrap();
        assert_eq!(h.size, 1066);
        assert_eq!(h.consumed, 2);
    }

    #[test]
    fn test_header_three_bytes() {
        let h = decode_object_header(&[0x82, 0x81, 0x03], 0).unwrap();
        assert_eq!(h.size, 6162);
        assert_eq!(h.consumed, 3);
    }

    #[test]
    fn test_header_documentation_example() {
        let h = decode_object_header(&[0x96, 0x0a], 0).unwrap();
        assert_eq!(h.size, 166);
        assert_eq!(h.kind, ObjectKind::Commit);
        assert_eq!(h.consumed, 2);
    }

    #[test]
    fn test_header_zero_byte() {
        let h = decode_object_header(&[0x00, 0xff], 0).unwrap();
        assert_eq!(h.size, 0);
        assert_eq!(h.consumed, 1);
    }

    #[test]
    fn test_header_every_kind_code() {
        let expected = [
            ObjectKind::Invalid(0),
            ObjectKind::Commit,
            ObjectKind::Tree,
            ObjectKind::Blob,
            ObjectKind::Tag,
            ObjectKind::Invalid(5),
            ObjectKind::OffsetDelta,
            ObjectKind::RefDelta,
        ];
        for (code, kind) in expected.into_iter().enumerate() {
            let h = decode_object_header(&[(code as u8) << 4 | 0x03], 0).unwrap();
            assert_eq!(h.kind, kind);
            assert_eq!(h.size, 3);
        }
    }

    #[test]
    fn test_header_at_offset() {
        let h = decode_object_header(&[0xff, 0xff, 0x35], 2).unwrap();
        assert_eq!(h.kind, ObjectKind::Blob);
        assert_eq!(h.size, 5);
        assert_eq!(h.consumed, 1);
    }

    #[test]
    fn test_header_empty_input() {
        assert_eq!(
            decode_object_header(&[], 0),
            Err(VarintError::TruncatedInput { offset: 0 })
        );
    }

    #[test]
    fn test_header_truncated_continuation() {
        assert_eq!(
            decode_object_header(&[0x95, 0x80], 0),
            Err(VarintError::TruncatedInput { offset: 2 })
        );
    }

    #[test]
    fn test_header_overflow() {
        let mut buf = vec![0xff; 12];
        buf.push(0x01);
        assert_eq!(
            decode_object_header(&buf, 0),
            Err(VarintError::MalformedVarint { offset: 0 })
        );
    }

    #[test]
    fn test_header_max_u64() {
        let mut buf = Vec::new();
        encode_object_header(3, u64::MAX, &mut buf);
        let h = decode_object_header(&buf, 0).unwrap();
        assert_eq!(h.size, u64::MAX);
        assert_eq!(h.consumed, buf.len());
    }

    #[test]
    fn test_varint_single_and_multi_byte() {
        assert_eq!(decode_varint(&[0x00], 0), Ok((0, 1)));
        assert_eq!(decode_varint(&[0x7f], 0), Ok((127, 1)));
        assert_eq!(decode_varint(&[0x80, 0x01], 0), Ok((128, 2)));
        assert_eq!(decode_varint(&[0xe5, 0x8e, 0x26], 0), Ok((624_485, 3)));
    }

    #[test]
    fn test_varint_returns_new_cursor() {
        let buf = [0x05, 0x91, 0x02, 0x09];
        let (first, pos) = decode_varint(&buf, 0).unwrap();
        let (second, pos) = decode_varint(&buf, pos).unwrap();
        assert_eq!((first, second, pos), (5, 273, 3));
    }

    #[test]
    fn test_varint_truncated() {
        assert_eq!(
            decode_varint(&[0x80], 0),
            Err(VarintError::TruncatedInput { offset: 1 })
        );
        assert_eq!(
            decode_varint(&[], 0),
            Err(VarintError::TruncatedInput { offset: 0 })
        );
    }

    #[test]
    fn test_varint_overflow() {
        let mut buf = vec![0xff; 10];
        buf.push(0x7f);
        assert_eq!(
            decode_varint(&buf, 0),
            Err(VarintError::MalformedVarint { offset: 0 })
        );
    }

    #[test]
    fn test_offset_encoding() {
        // values from the pack-format documentation's offset scheme
        assert_eq!(decode_offset(&[0x00], 0), Ok((0, 1)));
        assert_eq!(decode_offset(&[0x7f], 0), Ok((127, 1)));
        assert_eq!(decode_offset(&[0x80, 0x00], 0), Ok((128, 2)));
        assert_eq!(decode_offset(&[0x81, 0x05], 0), Ok((((1 + 1) << 7) | 5, 2)));
        assert_eq!(decode_offset(&[0x80, 0x80, 0x00], 0), Ok((16_512, 3)));
    }

    #[test]
    fn test_offset_truncated_and_overflow() {
        assert_eq!(
            decode_offset(&[0x81], 0),
            Err(VarintError::TruncatedInput { offset: 1 })
        );
        assert_eq!(
            decode_offset(&[0xff; 12], 0),
            Err(VarintError::MalformedVarint { offset: 0 })
        );
    }

    #[test]
    fn test_offset_encoder_matches_decoder() {
        for value in [0u64, 1, 127, 128, 255, 16_511, 16_512, 1 << 20, u64::MAX >> 8] {
            let mut buf = Vec::new();
            encode_offset(value, &mut buf);
            assert_eq!(decode_offset(&buf, 0), Ok((value, buf.len())), "{value}");
        }
    }
}
