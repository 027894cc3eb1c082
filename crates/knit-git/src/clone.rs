//! Cloning a remote repository over smart HTTP.

use crate::checkout::checkout_commit;
use crate::client::{ClientConfig, SmartHttpClient};
use crate::pack::parse_pack;
use crate::protocol::RefAdvertisement;
use crate::writer::{write_all, WriteSummary};
use crate::{GitError, Result};
use knit_storage::{LooseObjectStore, ObjectDatabase, ObjectId, ObjectType, RefStore};
use std::fs;
use std::path::Path;

/// What a clone produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneOutcome {
    /// Commit checked out, or `None` for an empty remote.
    pub head: Option<ObjectId>,
    /// Branch HEAD was pointed at, if the remote advertised one.
    pub branch: Option<String>,
    /// Refs written under `.git/refs`.
    pub refs: usize,
    /// Objects stored from the pack.
    pub objects: WriteSummary,
    /// Files written to the working tree.
    pub files: usize,
}

/// Clones `url` into `dest`, which is created if needed.
pub fn clone_repository(url: &str, dest: &Path, config: &ClientConfig) -> Result<CloneOutcome> {
    let client = SmartHttpClient::new(config)?;

    tracing::info!(%url, "Discovering refs");
    let advertisement = client.discover_refs(url)?;
    if advertisement.refs.is_empty() {
        tracing::info!("Remote repository is empty");
        return populate(dest, &advertisement, None);
    }

    tracing::info!(refs = advertisement.refs.len(), "Fetching pack");
    let pack = client.negotiate_pack(url, &advertisement.refs)?;
    populate(dest, &advertisement, Some(pack.as_slice()))
}

/// Builds a repository in `dest` from an already fetched advertisement and
/// pack: stores the objects, writes the refs, points HEAD and checks out the
/// HEAD commit.
pub fn populate(
    dest: &Path,
    advertisement: &RefAdvertisement,
    pack: Option<&[u8]>,
) -> Result<CloneOutcome> {
    fs::create_dir_all(dest)?;
    let store = LooseObjectStore::init(dest.join(".git"))?;
    let refs = RefStore::new(store.git_dir());
    let mut outcome = CloneOutcome::default();

    if let Some(pack) = pack {
        let records = parse_pack(pack)?;
        tracing::info!(records = records.len(), "Writing objects");
        outcome.objects = write_all(&store, &records)?;
    }

    for record in &advertisement.refs {
        if !record.name.starts_with("refs/") || record.is_peeled() {
            continue;
        }
        match refs.set(&record.name, record.id) {
            Ok(()) => outcome.refs += 1,
            Err(e) => tracing::warn!(name = %record.name, error = %e, "Skipping ref"),
        }
    }

    let head = advertisement.head().map(|r| r.id);
    match advertisement.head_symref() {
        Some(branch) if advertisement.refs.iter().any(|r| r.name == branch) => {
            refs.set_symbolic("HEAD", branch)?;
            outcome.branch = Some(branch.to_string());
        }
        _ => {
            if let Some(id) = head {
                refs.set("HEAD", id)?;
            }
        }
    }

    let Some(head) = head else {
        if !advertisement.refs.is_empty() {
            return Err(GitError::Protocol(
                "remote did not advertise HEAD".to_string(),
            ));
        }
        return Ok(outcome);
    };

    // HEAD may name an annotated tag; checkout wants the commit
    let commit = peel_to_commit(&store, head)?;
    tracing::info!(%commit, "Checking out working tree");
    outcome.files = checkout_commit(&store, &commit, dest)?;
    outcome.head = Some(commit);

    tracing::info!(
        objects = outcome.objects.total(),
        refs = outcome.refs,
        files = outcome.files,
        "Clone complete"
    );
    Ok(outcome)
}

fn peel_to_commit<D>(db: &D, mut id: ObjectId) -> Result<ObjectId>
where
    D: ObjectDatabase + ?Sized,
{
    loop {
        let (object_type, content) = db.read(&id)?;
        match object_type {
            ObjectType::Commit => return Ok(id),
            ObjectType::Tag => {
                let target = content
                    .split(|&b| b == b'\n')
                    .next()
                    .and_then(|line| line.strip_prefix(b"object "))
                    .and_then(|hex| std::str::from_utf8(hex).ok())
                    .and_then(|hex| ObjectId::from_hex(hex).ok())
                    .ok_or_else(|| GitError::Checkout(format!("tag {id} has no object line")))?;
                id = target;
            }
            other => {
                return Err(GitError::Checkout(format!(
                    "HEAD points at a {other}, expected a commit"
                )))
            }
        }
    }
}
