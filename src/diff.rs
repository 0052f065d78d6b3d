//! Index-against-commit and worktree-against-index comparisons.
//!
//! Checkout uses these to find staged edits it has to carry over and
//! local modifications it must not overwrite.

use std::collections::BTreeMap;
use std::fs;

use crate::error::Result;
use crate::index::{Index, IndexEntry, Stage};
use crate::infra::hash_file;
use crate::objects::tree::ls_tree;
use crate::objects::{Commit, FileMode, LooseObjectStore, Oid};
use crate::repository::Repository;

/// How a staged path differs from the commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffStatus {
    /// Staged but absent from the commit.
    Added,
    /// In the commit but removed from the index.
    Deleted,
    /// Present in both with different content or mode.
    Modified,
}

impl DiffStatus {
    /// Returns a single character representing the status.
    pub fn as_char(&self) -> char {
        match self {
            DiffStatus::Added => 'A',
            DiffStatus::Deleted => 'D',
            DiffStatus::Modified => 'M',
        }
    }
}

/// One path whose staged state differs from the commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedChange {
    /// Repository-relative path.
    pub path: String,
    /// Digest and mode in the commit, if the commit has the path.
    pub before: Option<(Oid, FileMode)>,
    /// The stage 0 index entry, if the index has one.
    pub after: Option<IndexEntry>,
}

impl StagedChange {
    /// Classifies the change.
    pub fn status(&self) -> DiffStatus {
        match (&self.before, &self.after) {
            (None, _) => DiffStatus::Added,
            (_, None) => DiffStatus::Deleted,
            _ => DiffStatus::Modified,
        }
    }
}

/// Compares the stage 0 entries of `index` with the tree of `commit`.
///
/// `None` stands for a branch with no commits and compares against the
/// empty tree. Paths with unresolved conflict stages are left out.
pub fn diff_staged(
    store: &LooseObjectStore,
    index: &Index,
    commit: Option<&Oid>,
) -> Result<Vec<StagedChange>> {
    let mut committed = BTreeMap::new();
    if let Some(commit) = commit {
        let tree = *Commit::parse(*commit, store.read_raw(commit)?)?.tree();
        for item in ls_tree(store, &tree, true, &[])? {
            committed.insert(item.path, (item.oid, item.mode));
        }
    }

    let mut changes = Vec::new();
    for path in index.paths() {
        let entry = match index.find(path, Stage::Normal) {
            Some(entry) => entry,
            None => {
                committed.remove(path);
                continue;
            }
        };
        match committed.remove(path) {
            Some(before) if before == (*entry.oid(), entry.mode()) => {}
            before => changes.push(StagedChange {
                path: path.to_string(),
                before,
                after: Some(entry.clone()),
            }),
        }
    }

    for (path, before) in committed {
        changes.push(StagedChange {
            path,
            before: Some(before),
            after: None,
        });
    }

    changes.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));
    Ok(changes)
}

/// Lists stage 0 paths whose working-tree content no longer matches
/// the index.
///
/// A path counts when it has become a directory or hashes differently.
/// Missing files and skip-worktree entries are not reported.
pub fn diff_worktree(repo: &Repository, index: &Index) -> Result<Vec<String>> {
    let mut modified = Vec::new();
    for entry in index.iter() {
        if entry.stage() != Stage::Normal || entry.skip_worktree() {
            continue;
        }
        let file = repo.path().join(entry.path());
        let meta = match fs::symlink_metadata(&file) {
            Ok(meta) => meta,
            Err(_) => continue,
        };
        if meta.is_dir() || hash_file(&file)? != *entry.oid().as_bytes() {
            modified.push(entry.path().to_string());
        }
    }
    Ok(modified)
}
