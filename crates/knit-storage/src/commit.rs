//! Commit object formatting.

use crate::{GitObject, ObjectId, ObjectType, Result, StorageError};
use chrono::{DateTime, FixedOffset, Local};
use std::fmt;

/// Author or committer identity with a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Display name.
    pub name: String,
    /// Email address, without angle brackets.
    pub email: String,
    /// Point in time, with the offset it was recorded in.
    pub when: DateTime<FixedOffset>,
}

impl Signature {
    /// Creates a signature at an explicit time.
    pub fn new(name: impl Into<String>, email: impl Into<String>, when: DateTime<FixedOffset>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            when,
        }
    }

    /// Creates a signature stamped with the current local time.
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self::new(name, email, Local::now().fixed_offset())
    }
}

impl fmt::Display for Signature {
    /// `Name <email> <unix-seconds> <+hhmm>`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let offset = self.when.offset().local_minus_utc();
        let sign = if offset < 0 { '-' } else { '+' };
        let offset = offset.abs();
        write!(
            f,
            "{} <{}> {} {}{:02}{:02}",
            self.name,
            self.email,
            self.when.timestamp(),
            sign,
            offset / 3600,
            (offset % 3600) / 60
        )
    }
}

/// Builds commit objects.
#[derive(Debug, Clone)]
pub struct CommitBuilder {
    tree: ObjectId,
    parents: Vec<ObjectId>,
    author: Signature,
    committer: Signature,
    message: String,
}

impl CommitBuilder {
    /// Starts a commit of `tree`; author and committer are both `author`.
    pub fn new(tree: ObjectId, author: Signature, message: impl Into<String>) -> Self {
        Self {
            tree,
            parents: Vec::new(),
            committer: author.clone(),
            author,
            message: message.into(),
        }
    }

    /// Adds a parent commit.
    pub fn parent(mut self, parent: ObjectId) -> Self {
        self.parents.push(parent);
        self
    }

    /// Overrides the committer.
    pub fn committer(mut self, committer: Signature) -> Self {
        self.committer = committer;
        self
    }

    /// Formats the commit body.
    pub fn build(&self) -> Vec<u8> {
        let mut content = format!("tree {}\n", self.tree);
        for parent in &self.parents {
            content.push_str(&format!("parent {}\n", parent));
        }
        content.push_str(&format!("author {}\n", self.author));
        content.push_str(&format!("committer {}\n", self.committer));
        content.push('\n');
        content.push_str(&self.message);
        if !self.message.ends_with('\n') {
            content.push('\n');
        }
        content.into_bytes()
    }

    /// Builds the commit object.
    pub fn to_object(&self) -> GitObject {
        GitObject::new(ObjectType::Commit, self.build())
    }
}

/// Extracts the root tree id from a commit body.
pub fn commit_tree_id(content: &[u8]) -> Result<ObjectId> {
    let first = content
        .split(|&b| b == b'\n')
        .next()
        .unwrap_or_default();
    let hex = first
        .strip_prefix(b"tree ")
        .ok_or_else(|| StorageError::InvalidObject("commit does not start with a tree line".into()))?;
    let hex = std::str::from_utf8(hex)
        .map_err(|_| StorageError::InvalidObject("commit tree line is not ASCII".into()))?;
    ObjectId::from_hex(hex)
}
