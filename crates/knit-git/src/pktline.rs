//! Git pkt-line format implementation.
//!
//! Every line of the smart protocol is prefixed with a 4-character hex
//! length that counts the prefix itself, or is the flush packet "0000".

use crate::{GitError, Result};
use std::io::{ErrorKind, Read};

/// Largest total packet length, prefix included.
pub const MAX_PKT_LEN: usize = 65520;

/// A pkt-line packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktLine {
    /// Data line with content.
    Data(Vec<u8>),
    /// Flush packet (0000).
    Flush,
}

impl PktLine {
    /// Creates a data packet from bytes.
    pub fn from_bytes(b: impl Into<Vec<u8>>) -> Self {
        Self::Data(b.into())
    }

    /// Creates a data packet holding `s` terminated by a newline.
    pub fn line(s: &str) -> Self {
        let mut data = Vec::with_capacity(s.len() + 1);
        data.extend_from_slice(s.as_bytes());
        if !s.ends_with('\n') {
            data.push(b'\n');
        }
        Self::Data(data)
    }

    /// Encodes the packet to bytes.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Data(data) => {
                let mut result = format!("{:04x}", data.len() + 4).into_bytes();
                result.extend_from_slice(data);
                result
            }
            Self::Flush => b"0000".to_vec(),
        }
    }

    /// Returns true if this is a flush packet.
    pub fn is_flush(&self) -> bool {
        matches!(self, Self::Flush)
    }

    /// Returns the data content, or None for a flush.
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Self::Data(data) => Some(data),
            Self::Flush => None,
        }
    }

    /// Returns the data as a string, trimming any trailing newline.
    pub fn as_str(&self) -> Option<&str> {
        self.data()
            .and_then(|d| std::str::from_utf8(d).ok())
            .map(|s| s.trim_end_matches('\n'))
    }
}

/// Reader for pkt-line format.
pub struct PktLineReader<R> {
    reader: R,
}

impl<R: Read> PktLineReader<R> {
    /// Creates a new pkt-line reader.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads the next packet. Returns `None` at a clean end of input; input
    /// that stops inside a packet is an error.
    pub fn read(&mut self) -> Result<Option<PktLine>> {
        let mut len_buf = [0u8; 4];
        let got = self.fill(&mut len_buf)?;
        if got == 0 {
            return Ok(None);
        }
        if got < len_buf.len() {
            return Err(GitError::InvalidPktLine(format!(
                "truncated length prefix ({got} of 4 bytes)"
            )));
        }

        let len = std::str::from_utf8(&len_buf)
            .ok()
            .filter(|s| s.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|s| usize::from_str_radix(s, 16).ok())
            .ok_or_else(|| {
                GitError::InvalidPktLine(format!("invalid length prefix {len_buf:02x?}"))
            })?;

        match len {
            0 => Ok(Some(PktLine::Flush)),
            1..=3 => Err(GitError::InvalidPktLine(format!(
                "unsupported special packet {len:04x}"
            ))),
            _ if len > MAX_PKT_LEN => Err(GitError::InvalidPktLine(format!(
                "packet length {len} exceeds {MAX_PKT_LEN}"
            ))),
            _ => {
                let mut data = vec![0u8; len - 4];
                let got = self.fill(&mut data)?;
                if got < data.len() {
                    return Err(GitError::InvalidPktLine(format!(
                        "truncated packet: expected {} data bytes, got {got}",
                        data.len()
                    )));
                }
                Ok(Some(PktLine::Data(data)))
            }
        }
    }

    /// Reads data packets up to and including the next flush. Running out
    /// of input first is an error.
    pub fn read_section(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut lines = Vec::new();
        loop {
            match self.read()? {
                Some(PktLine::Data(data)) => lines.push(data),
                Some(PktLine::Flush) => return Ok(lines),
                None => {
                    return Err(GitError::InvalidPktLine(
                        "input ended before flush packet".to_string(),
                    ))
                }
            }
        }
    }

    /// Consumes the reader and returns the inner reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    // read_exact that reports how far it got instead of failing
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}
