//! Commit objects, decoded only as far as checkout needs them.

use super::oid::Oid;
use super::store::{ObjectType, RawObject};
use crate::error::{Error, Result};

/// A decoded commit header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    oid: Oid,
    tree: Oid,
    parents: Vec<Oid>,
    summary: String,
}

impl Commit {
    /// Decodes a commit from its raw object.
    ///
    /// Only the `tree` and `parent` headers and the first message line are
    /// kept; author, committer and signature headers are skipped.
    pub fn parse(oid: Oid, raw: RawObject) -> Result<Self> {
        if raw.object_type != ObjectType::Commit {
            return Err(Error::TypeMismatch {
                expected: "commit",
                actual: raw.object_type.as_str(),
            });
        }

        let text = String::from_utf8_lossy(&raw.content);
        let (headers, message) = text.split_once("\n\n").unwrap_or((&text, ""));

        let mut tree = None;
        let mut parents = Vec::new();
        for line in headers.lines() {
            if let Some(value) = line.strip_prefix("tree ") {
                tree = Some(Oid::from_hex(value.trim())?);
            } else if let Some(value) = line.strip_prefix("parent ") {
                parents.push(Oid::from_hex(value.trim())?);
            }
        }

        let tree = tree.ok_or_else(|| Error::corrupt_object(&oid, "commit has no tree header"))?;
        Ok(Commit {
            oid,
            tree,
            parents,
            summary: message.lines().next().unwrap_or("").to_string(),
        })
    }

    /// Returns the commit's digest.
    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    /// Returns the root tree.
    pub fn tree(&self) -> &Oid {
        &self.tree
    }

    /// Returns the parents, first parent first.
    pub fn parents(&self) -> &[Oid] {
        &self.parents
    }

    /// Returns the first line of the message.
    pub fn summary(&self) -> &str {
        &self.summary
    }
}
