//! Git reference management on disk.

use crate::{ObjectId, Result, StorageError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A git reference (branch, tag, or symbolic ref).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Direct reference to an object.
    Direct(ObjectId),
    /// Symbolic reference (e.g., HEAD -> refs/heads/main).
    Symbolic(String),
}

impl Reference {
    /// Returns the object ID if this is a direct reference.
    pub fn as_direct(&self) -> Option<ObjectId> {
        match self {
            Self::Direct(id) => Some(*id),
            Self::Symbolic(_) => None,
        }
    }

    fn encode(&self) -> String {
        match self {
            Self::Direct(id) => format!("{id}\n"),
            Self::Symbolic(target) => format!("ref: {target}\n"),
        }
    }

    fn decode(name: &str, contents: &str) -> Result<Self> {
        let contents = contents.trim_end();
        match contents.strip_prefix("ref: ") {
            Some(target) => {
                validate_name(target)?;
                Ok(Self::Symbolic(target.to_string()))
            }
            None => ObjectId::from_hex(contents)
                .map(Self::Direct)
                .map_err(|_| StorageError::InvalidRef(format!("{name}: {contents:?}"))),
        }
    }
}

/// Loose references stored as files under a git directory.
#[derive(Debug, Clone)]
pub struct RefStore {
    git_dir: PathBuf,
}

impl RefStore {
    /// Opens the references of a git directory.
    pub fn new(git_dir: impl Into<PathBuf>) -> Self {
        Self {
            git_dir: git_dir.into(),
        }
    }

    /// Returns the git directory.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.git_dir.join(name))
    }

    /// Gets a reference by name.
    pub fn get(&self, name: &str) -> Result<Reference> {
        let path = self.path(name)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Reference::decode(name, &contents),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::RefNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Sets a reference to point to an object.
    pub fn set(&self, name: &str, target: ObjectId) -> Result<()> {
        self.write(name, &Reference::Direct(target))
    }

    /// Sets a symbolic reference.
    pub fn set_symbolic(&self, name: &str, target: &str) -> Result<()> {
        validate_name(target)?;
        self.write(name, &Reference::Symbolic(target.to_string()))
    }

    fn write(&self, name: &str, reference: &Reference) -> Result<()> {
        let path = self.path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, reference.encode())?;
        tracing::debug!(name, reference = ?reference, "Updated reference");
        Ok(())
    }

    /// Resolves HEAD to a commit id.
    pub fn resolve_head(&self) -> Result<ObjectId> {
        match self.get("HEAD")? {
            Reference::Direct(id) => Ok(id),
            Reference::Symbolic(target) => match self.get(&target)? {
                Reference::Direct(id) => Ok(id),
                Reference::Symbolic(_) => Err(StorageError::InvalidRef(
                    "deeply nested symbolic refs not supported".to_string(),
                )),
            },
        }
    }

    /// Gets the current branch name (if HEAD is symbolic).
    pub fn current_branch(&self) -> Option<String> {
        match self.get("HEAD").ok()? {
            Reference::Symbolic(target) => {
                target.strip_prefix("refs/heads/").map(|s| s.to_string())
            }
            Reference::Direct(_) => None,
        }
    }
}

/// Accepts `HEAD` and `refs/...` names whose components cannot escape the
/// git directory.
fn validate_name(name: &str) -> Result<()> {
    let invalid = || StorageError::InvalidRef(format!("invalid reference name: {name:?}"));

    if name == "HEAD" {
        return Ok(());
    }
    let rest = name.strip_prefix("refs/").ok_or_else(invalid)?;
    let bad_component = rest.split('/').any(|c| {
        c.is_empty() || c == "." || c == ".." || c.ends_with(".lock") || c.contains('\\')
    });
    if bad_component || name.bytes().any(|b| b < 0x20 || b == 0x7f) {
        return Err(invalid());
    }
    Ok(())
}
