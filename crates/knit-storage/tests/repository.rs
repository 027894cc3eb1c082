//! Builds a small repository on disk through the public API and checks the
//! ids against the ones git itself produces for the same content.

use chrono::{FixedOffset, TimeZone};
use knit_storage::{
    commit_tree_id, CommitBuilder, FileMode, LooseObjectStore, ObjectDatabase, ObjectId,
    ObjectType, RefStore, Reference, Signature, StorageError, Tree, TreeEntry,
};
use tempfile::TempDir;

fn author() -> Signature {
    let when = FixedOffset::west_opt(7 * 3600)
        .unwrap()
        .timestamp_opt(1_112_911_993, 0)
        .unwrap();
    Signature::new("A U Thor", "author@example.com", when)
}

#[test]
fn test_first_commit_matches_git() {
    let dir = TempDir::new().unwrap();
    let store = LooseObjectStore::init(dir.path().join(".git")).unwrap();

    let blob = store.write(ObjectType::Blob, b"hello\n").unwrap();
    assert_eq!(blob.to_hex(), "ce013625030ba8dba906f756967f9e9ca394464a");

    let tree: Tree = [TreeEntry::new(FileMode::Regular, "hello.txt", blob).unwrap()]
        .into_iter()
        .collect();
    let tree = store.write(ObjectType::Tree, &tree.serialize()).unwrap();
    assert_eq!(tree.to_hex(), "aaa96ced2d9a1c8e72c56b253a0e2fe78393feb7");

    let commit = CommitBuilder::new(tree, author(), "initial").build();
    let commit = store.write(ObjectType::Commit, &commit).unwrap();
    assert_eq!(commit.to_hex(), "2086090589325da009b7b143e85675253d9de7f7");

    // objects/ce/013625... on disk
    assert!(dir
        .path()
        .join(".git/objects/ce/013625030ba8dba906f756967f9e9ca394464a")
        .is_file());

    let refs = RefStore::new(store.git_dir());
    refs.set("refs/heads/main", commit).unwrap();
    assert_eq!(refs.resolve_head().unwrap(), commit);
    assert_eq!(refs.current_branch().as_deref(), Some("main"));

    // walk back from HEAD to the file content
    let (_, body) = store.read(&refs.resolve_head().unwrap()).unwrap();
    let (_, tree_body) = store.read(&commit_tree_id(&body).unwrap()).unwrap();
    let tree = Tree::parse(&tree_body).unwrap();
    let (object_type, content) = store.read(&tree.entries()[0].id).unwrap();
    assert_eq!(object_type, ObjectType::Blob);
    assert_eq!(&content[..], b"hello\n");
}

#[test]
fn test_second_commit_has_parent() {
    let dir = TempDir::new().unwrap();
    let store = LooseObjectStore::init(dir.path().join(".git")).unwrap();
    let empty_tree = store.write(ObjectType::Tree, b"").unwrap();

    let first = store
        .write(
            ObjectType::Commit,
            &CommitBuilder::new(empty_tree, author(), "one").build(),
        )
        .unwrap();
    let second = CommitBuilder::new(empty_tree, author(), "two")
        .parent(first)
        .build();
    let text = String::from_utf8(second).unwrap();
    assert!(text.contains(&format!("\nparent {first}\n")));
}

#[test]
fn test_reopened_store_sees_objects() {
    let dir = TempDir::new().unwrap();
    let git_dir = dir.path().join(".git");
    let id = LooseObjectStore::init(&git_dir)
        .unwrap()
        .write(ObjectType::Blob, b"persisted")
        .unwrap();

    let reopened = LooseObjectStore::new(&git_dir);
    assert!(reopened.contains(&id).unwrap());
    assert!(!reopened
        .contains(&ObjectId::hash_object(ObjectType::Blob, b"other"))
        .unwrap());
}

#[test]
fn test_remote_ref_names_cannot_escape() {
    let dir = TempDir::new().unwrap();
    let refs = RefStore::new(dir.path().join(".git"));
    let id = ObjectId::from_bytes([7; 20]);

    for name in ["refs/../../evil", "/etc/passwd", "refs/heads/", "config"] {
        assert!(
            matches!(refs.set(name, id), Err(StorageError::InvalidRef(_))),
            "{name}"
        );
    }
    refs.set("refs/tags/v1.0", id).unwrap();
    assert_eq!(refs.get("refs/tags/v1.0").unwrap(), Reference::Direct(id));
}
