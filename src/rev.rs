//! Revision names: what a checkout target resolves to.

use crate::error::{Error, Result};
use crate::objects::oid::OID_HEX_LEN;
use crate::objects::{Commit, LooseObjectStore, ObjectType, Oid};
use crate::refs::{Head, RefStore};

const MAX_PEEL_DEPTH: usize = 10;

/// A resolved checkout target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    /// A local branch and the commit at its tip.
    Branch {
        /// Branch name without `refs/heads/`.
        name: String,
        /// The tip commit.
        commit: Oid,
    },
    /// A commit named directly, by tag or by a non-branch reference.
    Commit(Oid),
    /// A tree. Usable for path checkouts only.
    Tree(Oid),
}

impl Revision {
    /// Returns the commit, or `None` for a bare tree.
    pub fn commit_id(&self) -> Option<&Oid> {
        match self {
            Revision::Branch { commit, .. } | Revision::Commit(commit) => Some(commit),
            Revision::Tree(_) => None,
        }
    }

    /// Returns the root tree, reading the commit when needed.
    pub fn tree_id(&self, store: &LooseObjectStore) -> Result<Oid> {
        match self {
            Revision::Branch { commit, .. } | Revision::Commit(commit) => {
                Ok(*Commit::parse(*commit, store.read_raw(commit)?)?.tree())
            }
            Revision::Tree(tree) => Ok(*tree),
        }
    }

    /// Returns the branch name for branch targets.
    pub fn branch_name(&self) -> Option<&str> {
        match self {
            Revision::Branch { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Resolves `spec` to a revision.
///
/// Accepts, in this order: `HEAD`, a local branch name, a full
/// `refs/...` name, a tag name, and a full or abbreviated hex digest.
/// Annotated tags are peeled to what they point at.
///
/// # Errors
///
/// [`Error::RefNotFound`] if nothing matches, or HEAD is on a branch
/// with no commits. [`Error::InvalidOid`] for an ambiguous abbreviation.
pub fn resolve_revision(store: &LooseObjectStore, refs: &RefStore, spec: &str) -> Result<Revision> {
    if spec == "HEAD" {
        return match refs.head()? {
            Head::Branch {
                name,
                oid: Some(commit),
            } => Ok(Revision::Branch { name, commit }),
            Head::Branch { name, oid: None } => Err(Error::RefNotFound(format!("refs/heads/{}", name))),
            Head::Detached { oid } => peel(store, oid),
        };
    }

    let branch_ref = format!("refs/heads/{}", spec);
    if let Some(commit) = refs.try_resolve(&branch_ref)? {
        return Ok(Revision::Branch {
            name: spec.to_string(),
            commit,
        });
    }

    if spec.starts_with("refs/") {
        if let Some(oid) = refs.try_resolve(spec)? {
            return match spec.strip_prefix("refs/heads/") {
                Some(name) => Ok(Revision::Branch {
                    name: name.to_string(),
                    commit: oid,
                }),
                None => peel(store, oid),
            };
        }
    }

    if let Some(oid) = refs.try_resolve(&format!("refs/tags/{}", spec))? {
        return peel(store, oid);
    }

    if spec.len() >= 4 && spec.len() <= OID_HEX_LEN && spec.chars().all(|c| c.is_ascii_hexdigit()) {
        let matches = store.find_objects_by_prefix(spec)?;
        return match matches.as_slice() {
            [oid] => peel(store, *oid),
            [] => Err(Error::RefNotFound(spec.to_string())),
            _ => Err(Error::InvalidOid(format!(
                "ambiguous short object id: {} ({} matches)",
                spec,
                matches.len()
            ))),
        };
    }

    Err(Error::RefNotFound(spec.to_string()))
}

/// Follows annotated tags until a commit or tree is reached.
fn peel(store: &LooseObjectStore, mut oid: Oid) -> Result<Revision> {
    for _ in 0..MAX_PEEL_DEPTH {
        let raw = store.read_raw(&oid)?;
        match raw.object_type {
            ObjectType::Commit => return Ok(Revision::Commit(oid)),
            ObjectType::Tree => return Ok(Revision::Tree(oid)),
            ObjectType::Blob => {
                return Err(Error::TypeMismatch {
                    expected: "commit or tree",
                    actual: "blob",
                })
            }
            ObjectType::Tag => {
                let text = String::from_utf8_lossy(&raw.content);
                let target = text
                    .lines()
                    .find_map(|line| line.strip_prefix("object "))
                    .ok_or_else(|| Error::corrupt_object(&oid, "tag has no object header"))?;
                oid = Oid::from_hex(target.trim())?;
            }
        }
    }
    Err(Error::corrupt_object(&oid, "tag chain too deep"))
}
