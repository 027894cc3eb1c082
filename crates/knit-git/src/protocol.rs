//! Git smart HTTP protocol, client side.
//!
//! Parses the ref advertisement returned by `info/refs` and builds the
//! upload-pack request that asks for every advertised ref.
//! See: https://git-scm.com/docs/http-protocol

use crate::pktline::{PktLine, PktLineReader};
use crate::{GitError, Result};
use knit_storage::ObjectId;

/// Service name of the fetch side of the protocol.
pub const UPLOAD_PACK: &str = "git-upload-pack";

/// Placeholder name an empty repository advertises its capabilities under.
const NO_REFS: &str = "capabilities^{}";

/// A reference as advertised by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefRecord {
    /// Object the ref points to.
    pub id: ObjectId,
    /// Reference name (`HEAD`, `refs/heads/main`, ...).
    pub name: String,
}

impl RefRecord {
    /// Creates a record.
    pub fn new(id: ObjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Returns true for the peeled `^{}` entries of annotated tags.
    pub fn is_peeled(&self) -> bool {
        self.name.ends_with("^{}")
    }
}

/// A parsed `info/refs` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefAdvertisement {
    /// Advertised refs in server order.
    pub refs: Vec<RefRecord>,
    /// Capabilities from the first ref line.
    pub capabilities: Vec<String>,
}

impl RefAdvertisement {
    /// Parses an advertisement body.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut reader = PktLineReader::new(body);
        let malformed = |e: GitError| GitError::MalformedAdvertisement(e.to_string());

        let mut first = reader.read().map_err(malformed)?;
        if let Some(service) = first
            .as_ref()
            .and_then(PktLine::as_str)
            .and_then(|line| line.strip_prefix("# service="))
        {
            if service != UPLOAD_PACK {
                return Err(GitError::MalformedAdvertisement(format!(
                    "unexpected service {service:?}"
                )));
            }
            match reader.read().map_err(malformed)? {
                Some(PktLine::Flush) => {}
                _ => {
                    return Err(GitError::MalformedAdvertisement(
                        "service header not followed by flush".to_string(),
                    ))
                }
            }
            first = reader.read().map_err(malformed)?;
        }

        let mut lines = match first {
            Some(PktLine::Data(line)) => vec![line],
            Some(PktLine::Flush) => Vec::new(),
            None => {
                return Err(GitError::MalformedAdvertisement(
                    "no ref lines".to_string(),
                ))
            }
        };
        if !lines.is_empty() {
            lines.extend(reader.read_section().map_err(malformed)?);
        }
        if lines.is_empty() {
            return Err(GitError::MalformedAdvertisement(
                "no ref lines".to_string(),
            ));
        }

        let mut advertisement = Self::default();
        for (index, line) in lines.iter().enumerate() {
            let line = line.strip_suffix(b"\n").unwrap_or(line.as_slice());
            let (record, capabilities) = match line.iter().position(|&b| b == 0) {
                Some(nul) => (&line[..nul], Some(&line[nul + 1..])),
                None => (line, None),
            };

            if index == 0 {
                if let Some(caps) = capabilities {
                    advertisement.capabilities = String::from_utf8_lossy(caps)
                        .split_ascii_whitespace()
                        .map(str::to_string)
                        .collect();
                }
            }

            let record = parse_ref_line(record, index)?;
            if record.name == NO_REFS {
                continue;
            }
            advertisement.refs.push(record);
        }

        tracing::debug!(
            refs = advertisement.refs.len(),
            capabilities = advertisement.capabilities.len(),
            "Parsed ref advertisement"
        );
        Ok(advertisement)
    }

    /// The ref named `HEAD`, if advertised.
    pub fn head(&self) -> Option<&RefRecord> {
        self.refs.iter().find(|r| r.name == "HEAD")
    }

    /// Branch HEAD points at, from the `symref=HEAD:<target>` capability.
    pub fn head_symref(&self) -> Option<&str> {
        self.capabilities
            .iter()
            .find_map(|c| c.strip_prefix("symref=HEAD:"))
    }

    /// Returns true if the server advertised `name` (with or without a
    /// `=value` suffix).
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities
            .iter()
            .any(|c| c == name || c.strip_prefix(name).is_some_and(|rest| rest.starts_with('=')))
    }
}

fn parse_ref_line(record: &[u8], index: usize) -> Result<RefRecord> {
    let malformed = |reason: &str| {
        GitError::MalformedAdvertisement(format!(
            "line {index}: {reason}: {:?}",
            String::from_utf8_lossy(record)
        ))
    };

    let hex = record
        .get(..ObjectId::HEX_LEN)
        .ok_or_else(|| malformed("too short"))?;
    if record.get(ObjectId::HEX_LEN) != Some(&b' ') {
        return Err(malformed("missing space after object id"));
    }
    let id = std::str::from_utf8(hex)
        .ok()
        .and_then(|h| ObjectId::from_hex(h).ok())
        .ok_or_else(|| malformed("invalid object id"))?;
    let name = std::str::from_utf8(&record[ObjectId::HEX_LEN + 1..])
        .map_err(|_| malformed("ref name is not UTF-8"))?;
    if name.is_empty() {
        return Err(malformed("empty ref name"));
    }

    Ok(RefRecord::new(id, name))
}

/// Parses an advertisement body into its ref records.
pub fn parse_ref_advertisement(body: &[u8]) -> Result<Vec<RefRecord>> {
    RefAdvertisement::parse(body).map(|adv| adv.refs)
}

/// Builds the upload-pack request body: one `want` line per ref (duplicates
/// included), a flush, then `done`.
pub fn build_want_request(refs: &[RefRecord]) -> Vec<u8> {
    let mut body = Vec::with_capacity(refs.len() * 50 + 13);
    for r in refs {
        body.extend_from_slice(&PktLine::line(&format!("want {}", r.id)).encode());
    }
    body.extend_from_slice(&PktLine::Flush.encode());
    body.extend_from_slice(&PktLine::line("done").encode());
    body
}
