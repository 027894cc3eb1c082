//! Loose-object storage on disk.
//!
//! Objects live at `<git-dir>/objects/<2 hex>/<38 hex>`, each file holding
//! the zlib-compressed canonical form of one object.

use crate::compression::{compress, decompress, CompressionLevel};
use crate::{parse_object, ObjectDatabase, ObjectId, ObjectType, Result, StorageError};
use bytes::Bytes;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Initial contents of `HEAD` in a fresh repository.
pub const DEFAULT_HEAD: &str = "ref: refs/heads/main\n";

/// A git directory's loose-object database.
#[derive(Debug, Clone)]
pub struct LooseObjectStore {
    git_dir: PathBuf,
    level: CompressionLevel,
}

impl LooseObjectStore {
    /// Opens the object database of an existing git directory.
    pub fn new(git_dir: impl Into<PathBuf>) -> Self {
        Self {
            git_dir: git_dir.into(),
            level: CompressionLevel::default(),
        }
    }

    /// Creates the repository skeleton (`objects/`, `refs/heads/`,
    /// `refs/tags/`, `HEAD`) under `git_dir` and opens it. Existing files
    /// are left untouched.
    pub fn init(git_dir: impl Into<PathBuf>) -> Result<Self> {
        let git_dir = git_dir.into();
        for dir in ["objects", "refs/heads", "refs/tags"] {
            fs::create_dir_all(git_dir.join(dir))?;
        }

        let head = git_dir.join("HEAD");
        if !head.exists() {
            fs::write(&head, DEFAULT_HEAD)?;
        }

        tracing::debug!(git_dir = %git_dir.display(), "Initialized repository layout");
        Ok(Self::new(git_dir))
    }

    /// Sets the zlib level used for new objects.
    pub fn with_compression(mut self, level: CompressionLevel) -> Self {
        self.level = level;
        self
    }

    /// Returns the git directory this store lives in.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Returns the path an object is (or would be) stored at.
    pub fn object_path(&self, id: &ObjectId) -> PathBuf {
        let (dir, file) = id.fanout();
        self.git_dir.join("objects").join(dir).join(file)
    }
}

impl ObjectDatabase for LooseObjectStore {
    fn write_raw(&self, formatted: &[u8]) -> Result<ObjectId> {
        let id = ObjectId::hash(formatted);
        let path = self.object_path(&id);

        if path.is_file() {
            tracing::trace!(%id, "Object already present");
            return Ok(id);
        }

        let parent = path
            .parent()
            .ok_or_else(|| StorageError::corrupt(id.to_hex(), "object path has no parent"))?;
        // create_dir_all treats a concurrently created directory as success
        fs::create_dir_all(parent)?;

        // only complete files ever appear under the object's name
        let compressed = compress(formatted, self.level)?;
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(&compressed)?;
        tmp.persist(&path).map_err(|e| e.error)?;

        tracing::trace!(%id, size = formatted.len(), compressed = compressed.len(), "Wrote object");
        Ok(id)
    }

    fn read(&self, id: &ObjectId) -> Result<(ObjectType, Bytes)> {
        let path = self.object_path(id);
        let compressed = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NoSuchObject(id.to_hex()))
            }
            Err(e) => return Err(e.into()),
        };

        let raw = decompress(&compressed)
            .map_err(|e| StorageError::corrupt(id.to_hex(), e.to_string()))?;
        let (object_type, content) = parse_object(&raw).map_err(|e| match e {
            StorageError::CorruptObject { reason, .. } => StorageError::corrupt(id.to_hex(), reason),
            other => other,
        })?;

        Ok((object_type, Bytes::copy_from_slice(content)))
    }

    fn contains(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.object_path(id).is_file())
    }
}
