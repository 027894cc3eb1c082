//! CLI command implementations.

use knit_git::{clone_repository, write_tree, ClientConfig, GitError, SmartHttpClient};
use knit_storage::{
    commit_tree_id, CommitBuilder, FileMode, LooseObjectStore, ObjectDatabase, ObjectId, ObjectType,
    RefStore, Reference, Signature, StorageError, Tree,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// CLI errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("unknown revision: {0}")]
    UnknownRevision(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Locations every repository command works against.
#[derive(Debug, Clone)]
pub struct Repo {
    git_dir: PathBuf,
}

impl Repo {
    pub fn new(git_dir: impl Into<PathBuf>) -> Self {
        Self {
            git_dir: git_dir.into(),
        }
    }

    fn open(&self) -> Result<LooseObjectStore> {
        if !self.git_dir.join("objects").is_dir() {
            return Err(CliError::NotARepository(self.git_dir.clone()));
        }
        Ok(LooseObjectStore::new(&self.git_dir))
    }

    fn refs(&self) -> RefStore {
        RefStore::new(&self.git_dir)
    }

    /// The working tree is the directory holding the git directory.
    fn work_dir(&self) -> PathBuf {
        match self.git_dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Resolves a full hex id, `HEAD`, or a ref name (`main`, `v1`,
    /// `refs/heads/main`).
    fn resolve(&self, rev: &str) -> Result<ObjectId> {
        if rev.len() == 40 {
            if let Ok(id) = ObjectId::from_hex(rev) {
                return Ok(id);
            }
        }

        let refs = self.refs();
        if rev == "HEAD" {
            return refs
                .resolve_head()
                .map_err(|_| CliError::UnknownRevision(rev.to_string()));
        }
        for name in [
            rev.to_string(),
            format!("refs/heads/{rev}"),
            format!("refs/tags/{rev}"),
        ] {
            if let Ok(Reference::Direct(id)) = refs.get(&name) {
                return Ok(id);
            }
        }
        Err(CliError::UnknownRevision(rev.to_string()))
    }
}

/// Initialize a new repository.
pub fn init(path: &Path, out: &mut impl Write) -> Result<()> {
    let git_dir = path.join(".git");
    tracing::info!(path = %git_dir.display(), "Initializing repository");

    LooseObjectStore::init(&git_dir)?;
    writeln!(out, "Initialized empty Git repository in {}", git_dir.display())?;
    Ok(())
}

/// Print the type of an object.
pub fn cat_file_type(repo: &Repo, rev: &str, out: &mut impl Write) -> Result<()> {
    let (object_type, _) = repo.open()?.read(&repo.resolve(rev)?)?;
    writeln!(out, "{object_type}")?;
    Ok(())
}

/// Pretty-print the content of an object.
pub fn cat_file_pretty(repo: &Repo, rev: &str, out: &mut impl Write) -> Result<()> {
    let (object_type, content) = repo.open()?.read(&repo.resolve(rev)?)?;
    match object_type {
        ObjectType::Tree => print_tree(&Tree::parse(&content)?, false, out),
        _ => {
            out.write_all(&content)?;
            Ok(())
        }
    }
}

/// Hash a file as a blob, optionally storing it.
pub fn hash_object(repo: &Repo, file: &Path, write: bool, out: &mut impl Write) -> Result<()> {
    let content = std::fs::read(file)?;
    let id = if write {
        repo.open()?.write(ObjectType::Blob, &content)?
    } else {
        ObjectId::hash_object(ObjectType::Blob, &content)
    };
    writeln!(out, "{id}")?;
    Ok(())
}

/// List a tree, or the tree of a commit.
pub fn ls_tree(repo: &Repo, rev: &str, name_only: bool, out: &mut impl Write) -> Result<()> {
    let store = repo.open()?;
    let id = repo.resolve(rev)?;
    let (mut object_type, mut content) = store.read(&id)?;
    if object_type == ObjectType::Commit {
        (object_type, content) = store.read(&commit_tree_id(&content)?)?;
    }
    if object_type != ObjectType::Tree {
        return Err(CliError::InvalidArgument(format!(
            "{rev} is a {object_type}, not a tree-ish"
        )));
    }
    print_tree(&Tree::parse(&content)?, name_only, out)
}

fn print_tree(tree: &Tree, name_only: bool, out: &mut impl Write) -> Result<()> {
    for entry in tree.entries() {
        if name_only {
            writeln!(out, "{}", entry.name)?;
            continue;
        }
        let kind = match entry.mode {
            FileMode::Directory => "tree",
            FileMode::Gitlink => "commit",
            _ => "blob",
        };
        writeln!(
            out,
            "{:0>6} {kind} {}\t{}",
            entry.mode.as_str(),
            entry.id,
            entry.name
        )?;
    }
    Ok(())
}

/// Store the working tree as tree objects and print the root id.
pub fn write_tree_cmd(repo: &Repo, out: &mut impl Write) -> Result<()> {
    let store = repo.open()?;
    let id = write_tree(&store, &repo.work_dir())?;
    writeln!(out, "{id}")?;
    Ok(())
}

/// Create a commit object from a tree.
pub fn commit_tree(
    repo: &Repo,
    tree: &str,
    parents: &[String],
    message: &str,
    author: &str,
    out: &mut impl Write,
) -> Result<()> {
    let store = repo.open()?;
    let tree = repo.resolve(tree)?;
    let (object_type, _) = store.read(&tree)?;
    if object_type != ObjectType::Tree {
        return Err(CliError::InvalidArgument(format!("{tree} is not a tree")));
    }

    let (name, email) = parse_identity(author)?;
    let mut builder = CommitBuilder::new(tree, Signature::now(name, email), message);
    for parent in parents {
        builder = builder.parent(repo.resolve(parent)?);
    }
    let id = store.write(ObjectType::Commit, &builder.build())?;
    writeln!(out, "{id}")?;
    Ok(())
}

/// Parses `Name <email>`.
fn parse_identity(identity: &str) -> Result<(&str, &str)> {
    let invalid = || CliError::InvalidArgument(format!("expected 'Name <email>', got {identity:?}"));
    let (name, rest) = identity.split_once('<').ok_or_else(invalid)?;
    let email = rest.strip_suffix('>').ok_or_else(invalid)?;
    Ok((name.trim(), email.trim()))
}

/// List the refs of a remote repository.
pub fn ls_remote(url: &str, config: &ClientConfig, out: &mut impl Write) -> Result<()> {
    let advertisement = SmartHttpClient::new(config)?.discover_refs(url)?;
    for record in &advertisement.refs {
        writeln!(out, "{}\t{}", record.id, record.name)?;
    }
    Ok(())
}

/// Clone a repository.
pub fn clone(
    url: &str,
    dir: Option<&Path>,
    config: &ClientConfig,
    out: &mut impl Write,
) -> Result<()> {
    let dest = match dir {
        Some(dir) => dir.to_path_buf(),
        None => PathBuf::from(default_clone_dir(url)?),
    };
    if dest.exists() && dest.read_dir()?.next().is_some() {
        return Err(CliError::InvalidArgument(format!(
            "destination path {} already exists and is not empty",
            dest.display()
        )));
    }

    writeln!(out, "Cloning into '{}'...", dest.display())?;
    let outcome = clone_repository(url, &dest, config)?;
    match outcome.head {
        Some(head) => writeln!(
            out,
            "Checked out {head} ({} objects, {} files)",
            outcome.objects.total(),
            outcome.files
        )?,
        None => writeln!(out, "warning: You appear to have cloned an empty repository.")?,
    }
    Ok(())
}

/// `https://host/group/name.git/` -> `name`
fn default_clone_dir(url: &str) -> Result<&str> {
    let last = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() || name.contains(':') {
        return Err(CliError::InvalidArgument(format!(
            "cannot derive a directory name from {url}"
        )));
    }
    Ok(name)
}
