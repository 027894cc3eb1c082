//! Tree objects: directory listings of `(mode, name, id)` entries.

use crate::{GitObject, ObjectId, ObjectType, Result, StorageError};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

/// File mode of a tree entry, as git writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMode {
    /// Subdirectory (`40000`).
    Directory,
    /// Regular file (`100644`).
    Regular,
    /// Executable file (`100755`).
    Executable,
    /// Symbolic link (`120000`).
    Symlink,
    /// Submodule commit (`160000`).
    Gitlink,
}

impl FileMode {
    /// Returns the octal mode string stored in tree objects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Directory => "40000",
            Self::Regular => "100644",
            Self::Executable => "100755",
            Self::Symlink => "120000",
            Self::Gitlink => "160000",
        }
    }

    /// Parses a tree-entry mode. `040000` is accepted for directories.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "40000" | "040000" => Ok(Self::Directory),
            "100644" => Ok(Self::Regular),
            "100755" => Ok(Self::Executable),
            "120000" => Ok(Self::Symlink),
            "160000" => Ok(Self::Gitlink),
            _ => Err(StorageError::InvalidObject(format!(
                "unsupported tree entry mode: {s:?}"
            ))),
        }
    }

    /// Returns true for subdirectory entries.
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory)
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry in a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Entry mode.
    pub mode: FileMode,
    /// Entry name; never empty, never contains `/` or NUL.
    pub name: String,
    /// Id of the blob or subtree.
    pub id: ObjectId,
}

impl TreeEntry {
    /// Creates an entry, rejecting names git cannot store.
    pub fn new(mode: FileMode, name: impl Into<String>, id: ObjectId) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.contains('/') || name.contains('\0') {
            return Err(StorageError::InvalidObject(format!(
                "invalid tree entry name: {name:?}"
            )));
        }
        Ok(Self { mode, name, id })
    }

    // Git orders directories as if their name ended in '/'.
    fn cmp_git(&self, other: &Self) -> Ordering {
        let suffix = |e: &Self| if e.mode.is_dir() { Some(b'/') } else { None };
        self.name
            .bytes()
            .chain(suffix(self))
            .cmp(other.name.bytes().chain(suffix(other)))
    }
}

/// An in-memory tree. Entry order is only fixed at serialization time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry.
    pub fn push(&mut self, entry: TreeEntry) {
        self.entries.push(entry);
    }

    /// Returns the entries in their current order.
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes the tree body: entries sorted by name, each
    /// `"{mode} {name}\0{20-byte id}"`.
    pub fn serialize(&self) -> Vec<u8> {
        let mut sorted: Vec<&TreeEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.cmp_git(b));

        let mut out = Vec::new();
        for entry in sorted {
            out.extend_from_slice(entry.mode.as_str().as_bytes());
            out.push(b' ');
            out.extend_from_slice(entry.name.as_bytes());
            out.push(0);
            out.extend_from_slice(entry.id.as_bytes());
        }
        out
    }

    /// Builds the tree object for this listing.
    pub fn to_object(&self) -> GitObject {
        GitObject::new(ObjectType::Tree, self.serialize())
    }

    /// Parses a tree body (the content after the object header). A name
    /// may appear only once.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut entries = Vec::new();
        let mut names = HashSet::new();
        let mut pos = 0;

        while pos < body.len() {
            let rest = &body[pos..];
            let space = rest
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| truncated(pos, "missing space after mode"))?;
            let nul = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| truncated(pos, "missing NUL after name"))?;
            if nul < space {
                return Err(truncated(pos, "NUL before mode separator"));
            }

            let mode = std::str::from_utf8(&rest[..space])
                .map_err(|_| truncated(pos, "mode is not ASCII"))
                .and_then(FileMode::parse)?;
            let name = std::str::from_utf8(&rest[space + 1..nul])
                .map_err(|_| truncated(pos, "name is not valid UTF-8"))?;

            let id_start = nul + 1;
            let id_end = id_start + ObjectId::LEN;
            if id_end > rest.len() {
                return Err(truncated(pos, "unexpected end of tree while reading id"));
            }
            let id = ObjectId::from_slice(&rest[id_start..id_end])?;

            if !names.insert(name) {
                return Err(StorageError::InvalidObject(format!(
                    "duplicate tree entry {name:?} at byte {pos}"
                )));
            }
            entries.push(TreeEntry::new(mode, name, id)?);
            pos += id_end;
        }

        Ok(Self { entries })
    }
}

impl FromIterator<TreeEntry> for Tree {
    fn from_iter<I: IntoIterator<Item = TreeEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

fn truncated(offset: usize, reason: &str) -> StorageError {
    StorageError::InvalidObject(format!("malformed tree entry at byte {offset}: {reason}"))
}
