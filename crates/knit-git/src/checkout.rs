//! Moving trees between the object database and a working directory.

use crate::{GitError, Result};
use knit_storage::{
    commit_tree_id, FileMode, ObjectDatabase, ObjectId, ObjectType, Tree, TreeEntry,
};
use std::fs;
use std::path::Path;

const GIT_DIR: &str = ".git";

fn read_typed<D>(db: &D, id: &ObjectId, expected: ObjectType) -> Result<bytes::Bytes>
where
    D: ObjectDatabase + ?Sized,
{
    let (object_type, content) = db.read(id)?;
    if object_type != expected {
        return Err(GitError::Checkout(format!(
            "{id} is a {object_type}, expected a {expected}"
        )));
    }
    Ok(content)
}

/// Writes the tree of `commit` into `dir`. Returns the number of files
/// written.
pub fn checkout_commit<D>(db: &D, commit: &ObjectId, dir: &Path) -> Result<usize>
where
    D: ObjectDatabase + ?Sized,
{
    let content = read_typed(db, commit, ObjectType::Commit)?;
    let tree = commit_tree_id(&content)?;
    checkout_tree(db, &tree, dir)
}

/// Writes the tree `tree_id` into `dir`, creating directories as needed.
/// Returns the number of files written.
pub fn checkout_tree<D>(db: &D, tree_id: &ObjectId, dir: &Path) -> Result<usize>
where
    D: ObjectDatabase + ?Sized,
{
    let tree = Tree::parse(&read_typed(db, tree_id, ObjectType::Tree)?)?;
    fs::create_dir_all(dir)?;

    let mut files = 0;
    for entry in tree.entries() {
        // names come from the remote; none of these may be created
        if matches!(entry.name.as_str(), "." | "..") || entry.name.eq_ignore_ascii_case(GIT_DIR) {
            return Err(GitError::Checkout(format!(
                "refusing to check out entry {:?} of tree {tree_id}",
                entry.name
            )));
        }
        let path = dir.join(&entry.name);
        // a link left by an earlier entry would redirect writes outside `dir`
        if fs::symlink_metadata(&path).is_ok_and(|meta| meta.file_type().is_symlink()) {
            return Err(GitError::Checkout(format!(
                "refusing to write through symlink {}",
                path.display()
            )));
        }

        match entry.mode {
            FileMode::Directory => files += checkout_tree(db, &entry.id, &path)?,
            FileMode::Gitlink => fs::create_dir_all(&path)?,
            FileMode::Regular | FileMode::Executable => {
                let content = read_typed(db, &entry.id, ObjectType::Blob)?;
                fs::write(&path, &content)?;
                set_executable(&path, entry.mode == FileMode::Executable)?;
                files += 1;
            }
            FileMode::Symlink => {
                let target = read_typed(db, &entry.id, ObjectType::Blob)?;
                create_symlink(&target, &path)?;
                files += 1;
            }
        }
    }

    tracing::trace!(tree = %tree_id, dir = %dir.display(), files, "Checked out tree");
    Ok(files)
}

#[cfg(unix)]
fn set_executable(path: &Path, executable: bool) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if executable { 0o755 } else { 0o644 };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path, _executable: bool) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn create_symlink(target: &[u8], path: &Path) -> Result<()> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    std::os::unix::fs::symlink(OsStr::from_bytes(target), path)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_symlink(target: &[u8], path: &Path) -> Result<()> {
    fs::write(path, target)?;
    Ok(())
}

/// Stores the contents of `dir` (skipping `.git`) as blobs and trees and
/// returns the root tree id. Empty subdirectories are left out, as git does.
pub fn write_tree<D>(db: &D, dir: &Path) -> Result<ObjectId>
where
    D: ObjectDatabase + ?Sized,
{
    let tree = build_tree(db, dir)?;
    let id = db.write(ObjectType::Tree, &tree.serialize())?;
    tracing::debug!(dir = %dir.display(), %id, entries = tree.len(), "Wrote tree");
    Ok(id)
}

fn build_tree<D>(db: &D, dir: &Path) -> Result<Tree>
where
    D: ObjectDatabase + ?Sized,
{
    let mut tree = Tree::new();

    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let name = dir_entry.file_name().into_string().map_err(|raw| {
            GitError::Checkout(format!("file name {raw:?} is not valid UTF-8"))
        })?;
        if name == GIT_DIR {
            continue;
        }

        let path = dir_entry.path();
        let meta = fs::symlink_metadata(&path)?;
        let file_type = meta.file_type();

        let (mode, id) = if file_type.is_dir() {
            let subtree = build_tree(db, &path)?;
            if subtree.is_empty() {
                continue;
            }
            (
                FileMode::Directory,
                db.write(ObjectType::Tree, &subtree.serialize())?,
            )
        } else if file_type.is_symlink() {
            let target = fs::read_link(&path)?;
            (
                FileMode::Symlink,
                db.write(ObjectType::Blob, target.as_os_str().as_encoded_bytes())?,
            )
        } else {
            let mode = if is_executable(&meta) {
                FileMode::Executable
            } else {
                FileMode::Regular
            };
            (mode, db.write(ObjectType::Blob, &fs::read(&path)?)?)
        };

        tree.push(TreeEntry::new(mode, name, id)?);
    }

    Ok(tree)
}

#[cfg(unix)]
fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &fs::Metadata) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use knit_storage::{CommitBuilder, MemoryObjectStore, Signature};
    use tempfile::TempDir;

    #[test]
    fn test_write_tree_known_hash() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("hello.txt"), "hello\n").unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/HEAD"), "ignored").unwrap();

        let db = MemoryObjectStore::new();
        let id = write_tree(&db, dir.path()).unwrap();
        assert_eq!(id.to_hex(), "aaa96ced2d9a1c8e72c56b253a0e2fe78393feb7");
        assert_eq!(db.len(), 2);
    }

    #[test]
    fn test_write_tree_empty_dir() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();

        let db = MemoryObjectStore::new();
        let id = write_tree(&db, dir.path()).unwrap();
        assert_eq!(id.to_hex(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
    }

    #[test]
    fn test_roundtrip_through_checkout() {
        let src = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("src/nested")).unwrap();
        fs::write(src.path().join("README"), "readme\n").unwrap();
        fs::write(src.path().join("src/main.rs"), "fn main() {}\n").unwrap();
        fs::write(src.path().join("src/nested/data.bin"), [0u8, 1, 2, 255]).unwrap();

        let db = MemoryObjectStore::new();
        let tree = write_tree(&db, src.path()).unwrap();

        let dest = TempDir::new().unwrap();
        let files = checkout_tree(&db, &tree, dest.path()).unwrap();
        assert_eq!(files, 3);
        assert_eq!(fs::read(dest.path().join("README")).unwrap(), b"readme\n");
        assert_eq!(
            fs::read(dest.path().join("src/nested/data.bin")).unwrap(),
            [0u8, 1, 2, 255]
        );

        // the checked-out copy hashes back to the same tree
        assert_eq!(write_tree(&db, dest.path()).unwrap(), tree);
    }

    #[cfg(unix)]
    #[test]
    fn test_modes_survive_roundtrip() {
        use std::os::unix::fs::PermissionsExt;

        let src = TempDir::new().unwrap();
        let script = src.path().join("run.sh");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        std::os::unix::fs::symlink("run.sh", src.path().join("link")).unwrap();

        let db = MemoryObjectStore::new();
        let tree_id = write_tree(&db, src.path()).unwrap();
        let (_, body) = db.read(&tree_id).unwrap();
        let tree = Tree::parse(&body).unwrap();
        let mode_of = |name: &str| tree.entries().iter().find(|e| e.name == name).unwrap().mode;
        assert_eq!(mode_of("run.sh"), FileMode::Executable);
        assert_eq!(mode_of("link"), FileMode::Symlink);

        let dest = TempDir::new().unwrap();
        checkout_tree(&db, &tree_id, dest.path()).unwrap();
        let meta = fs::metadata(dest.path().join("run.sh")).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o755);
        assert_eq!(
            fs::read_link(dest.path().join("link")).unwrap(),
            Path::new("run.sh")
        );
    }

    #[test]
    fn test_checkout_commit() {
        let db = MemoryObjectStore::new();
        let blob = db.write(ObjectType::Blob, b"content\n").unwrap();
        let tree: Tree = [TreeEntry::new(FileMode::Regular, "file.txt", blob).unwrap()]
            .into_iter()
            .collect();
        let tree_id = db.write(ObjectType::Tree, &tree.serialize()).unwrap();
        let commit = CommitBuilder::new(tree_id, Signature::now("A", "a@example.com"), "init")
            .build();
        let commit_id = db.write(ObjectType::Commit, &commit).unwrap();

        let dest = TempDir::new().unwrap();
        assert_eq!(checkout_commit(&db, &commit_id, dest.path()).unwrap(), 1);
        assert_eq!(fs::read(dest.path().join("file.txt")).unwrap(), b"content\n");
    }

    #[test]
    fn test_checkout_wrong_type() {
        let db = MemoryObjectStore::new();
        let blob = db.write(ObjectType::Blob, b"not a tree").unwrap();
        let dest = TempDir::new().unwrap();
        assert!(matches!(
            checkout_tree(&db, &blob, dest.path()),
            Err(GitError::Checkout(_))
        ));
    }

    #[test]
    fn test_checkout_refuses_dot_entries() {
        let db = MemoryObjectStore::new();
        let blob = db.write(ObjectType::Blob, b"x").unwrap();
        for name in ["..", ".git", ".GIT"] {
            let tree: Tree = [TreeEntry::new(FileMode::Regular, name, blob).unwrap()]
                .into_iter()
                .collect();
            let tree_id = db.write(ObjectType::Tree, &tree.serialize()).unwrap();
            let dest = TempDir::new().unwrap();
            assert!(
                matches!(checkout_tree(&db, &tree_id, dest.path()), Err(GitError::Checkout(_))),
                "{name}"
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_checkout_does_not_follow_existing_symlink() {
        let db = MemoryObjectStore::new();
        let blob = db.write(ObjectType::Blob, b"evil").unwrap();
        let inner: Tree = [TreeEntry::new(FileMode::Regular, "evil.txt", blob).unwrap()]
            .into_iter()
            .collect();
        let inner_id = db.write(ObjectType::Tree, &inner.serialize()).unwrap();
        let root: Tree = [TreeEntry::new(FileMode::Directory, "x", inner_id).unwrap()]
            .into_iter()
            .collect();
        let root_id = db.write(ObjectType::Tree, &root.serialize()).unwrap();

        let outside = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), dest.path().join("x")).unwrap();

        assert!(matches!(
            checkout_tree(&db, &root_id, dest.path()),
            Err(GitError::Checkout(_))
        ));
        assert!(!outside.path().join("evil.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_checkout_rejects_symlink_and_directory_with_same_name() {
        let outside = TempDir::new().unwrap();
        let db = MemoryObjectStore::new();
        let target = outside.path().as_os_str().as_encoded_bytes().to_vec();
        let link = db.write(ObjectType::Blob, &target).unwrap();
        let blob = db.write(ObjectType::Blob, b"evil").unwrap();
        let inner: Tree = [TreeEntry::new(FileMode::Regular, "evil.txt", blob).unwrap()]
            .into_iter()
            .collect();
        let inner_id = db.write(ObjectType::Tree, &inner.serialize()).unwrap();
        let root: Tree = [
            TreeEntry::new(FileMode::Symlink, "x", link).unwrap(),
            TreeEntry::new(FileMode::Directory, "x", inner_id).unwrap(),
        ]
        .into_iter()
        .collect();
        let root_id = db.write(ObjectType::Tree, &root.serialize()).unwrap();

        let dest = TempDir::new().unwrap();
        assert!(checkout_tree(&db, &root_id, dest.path()).is_err());
        assert!(!outside.path().join("evil.txt").exists());
    }

    #[test]
    fn test_checkout_gitlink_creates_directory() {
        let db = MemoryObjectStore::new();
        let tree: Tree = [TreeEntry::new(FileMode::Gitlink, "sub", ObjectId::from_bytes([1; 20])).unwrap()]
            .into_iter()
            .collect();
        let tree_id = db.write(ObjectType::Tree, &tree.serialize()).unwrap();

        let dest = TempDir::new().unwrap();
        assert_eq!(checkout_tree(&db, &tree_id, dest.path()).unwrap(), 0);
        assert!(dest.path().join("sub").is_dir());
    }

    #[test]
    fn test_checkout_missing_blob() {
        let db = MemoryObjectStore::new();
        let tree: Tree = [TreeEntry::new(FileMode::Regular, "gone", ObjectId::from_bytes([2; 20])).unwrap()]
            .into_iter()
            .collect();
        let tree_id = db.write(ObjectType::Tree, &tree.serialize()).unwrap();
        let dest = TempDir::new().unwrap();
        assert!(matches!(
            checkout_tree(&db, &tree_id, dest.path()),
            Err(GitError::Storage(_))
        ));
    }
}
