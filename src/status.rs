//! Working-tree status classification.
//!
//! Compares index entries against what is on disk and reports one
//! [`StatusEntry`] per finding. Each selected mode contributes
//! independently, so a path may appear several times with different
//! codes.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::ignore::{self, IgnorePattern};
use crate::index::{Index, IndexEntry, Stage};
use crate::infra::{hash_file, path_exists};
use crate::pathspec::Pathspec;
use crate::repository::Repository;
use crate::untracked::{self, ScanOptions};

/// The file name of per-directory exclude files under `exclude_standard`.
pub const STANDARD_PER_DIRECTORY: &str = ".gitignore";

/// Which classifications to run and how to find untracked files.
#[derive(Debug, Clone, Default)]
pub struct StatusOptions {
    /// Report every selected index entry (`H`, or `S` for skip-worktree).
    /// Assumed when no other mode is selected.
    pub cached: bool,
    /// Report entries missing from disk (`R`).
    pub deleted: bool,
    /// Report entries whose content changed or became a directory (`C`).
    pub modified: bool,
    /// Report untracked files (`?`).
    pub others: bool,
    /// Report conflict-stage entries (`M`).
    pub unmerged: bool,
    /// Report paths that obstruct checking out an entry (`K`).
    pub killed: bool,
    /// With `others`, report a wholly untracked directory as `dir/`.
    pub directory: bool,
    /// With `directory`, leave out empty directories.
    pub no_empty_directory: bool,
    /// Use `info/exclude` and per-directory `.gitignore` files.
    pub exclude_standard: bool,
    /// Extra exclusion patterns, scoped to the root.
    pub exclude_patterns: Vec<String>,
    /// Extra exclude files, scoped to the root.
    pub exclude_files: Vec<PathBuf>,
    /// Exclude file names to read in every directory scanned.
    pub exclude_per_directory: Vec<String>,
    /// Fail if an explicit path matches no index entry.
    pub error_unmatch: bool,
}

impl StatusOptions {
    fn any_mode(&self) -> bool {
        self.cached || self.deleted || self.modified || self.others || self.unmerged || self.killed
    }
}

/// One-letter classification of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// `H`: tracked.
    Cached,
    /// `S`: tracked with skip-worktree.
    SkipWorktree,
    /// `R`: removed from disk.
    Removed,
    /// `M`: unresolved merge stage.
    Unmerged,
    /// `C`: content changed, or the path became a directory.
    Changed,
    /// `K`: in the way of a checkout.
    Killed,
    /// `?`: untracked.
    Other,
}

impl StatusCode {
    /// Returns the one-letter code.
    pub fn as_char(&self) -> char {
        match self {
            StatusCode::Cached => 'H',
            StatusCode::SkipWorktree => 'S',
            StatusCode::Removed => 'R',
            StatusCode::Unmerged => 'M',
            StatusCode::Changed => 'C',
            StatusCode::Killed => 'K',
            StatusCode::Other => '?',
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A path and its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    path: String,
    stage: Stage,
    code: StatusCode,
}

impl StatusEntry {
    /// Creates an entry.
    pub fn new(path: impl Into<String>, stage: Stage, code: StatusCode) -> Self {
        StatusEntry {
            path: path.into(),
            stage,
            code,
        }
    }

    fn from_index(entry: &IndexEntry, code: StatusCode) -> Self {
        StatusEntry::new(entry.path(), entry.stage(), code)
    }

    /// Returns the repository-relative path; untracked directories end in `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the stage of the index entry; untracked and killed paths
    /// report [`Stage::Normal`].
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns the classification.
    pub fn code(&self) -> StatusCode {
        self.code
    }
}

impl fmt::Display for StatusEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.path)
    }
}

/// Classifies the index of `repo` against its working tree.
///
/// `paths` are relative to the repository's current directory.
pub fn list_status(
    repo: &Repository,
    options: &StatusOptions,
    paths: &[&str],
) -> Result<Vec<StatusEntry>> {
    let index = repo.read_index()?;
    let pathspec = repo.pathspec(paths)?;
    classify(repo, &index, &pathspec, options)
}

/// Runs the classifier over an already loaded index.
pub fn classify(
    repo: &Repository,
    index: &Index,
    pathspec: &Pathspec,
    options: &StatusOptions,
) -> Result<Vec<StatusEntry>> {
    let work_dir = repo.path();
    let cached = options.cached || !options.any_mode();

    let mut results = Vec::new();
    let mut killed = BTreeSet::new();

    for entry in index.iter() {
        if !pathspec.selects(entry.path()) {
            continue;
        }
        let file = work_dir.join(entry.path());

        if options.killed {
            for obstruction in obstructions(work_dir, entry.path()) {
                if killed.insert(obstruction.clone()) {
                    results.push(StatusEntry::new(obstruction, Stage::Normal, StatusCode::Killed));
                }
            }
        }

        if cached {
            let code = if entry.skip_worktree() {
                StatusCode::SkipWorktree
            } else {
                StatusCode::Cached
            };
            results.push(StatusEntry::from_index(entry, code));
        }

        if options.deleted && !path_exists(&file) {
            results.push(StatusEntry::from_index(entry, StatusCode::Removed));
        }

        if options.unmerged && entry.stage() != Stage::Normal {
            results.push(StatusEntry::from_index(entry, StatusCode::Unmerged));
        }

        if options.modified && is_modified(&file, entry)? {
            results.push(StatusEntry::from_index(entry, StatusCode::Changed));
        }
    }

    if options.error_unmatch {
        let unmatched = pathspec.unmatched(index.entries().iter().map(IndexEntry::path));
        if let Some(path) = unmatched.into_iter().next() {
            return Err(Error::PathspecNotFound(path));
        }
    }

    if options.others {
        let patterns = exclude_patterns(repo.git_dir(), options)?;
        let mut tracked: Vec<String> = index.iter().map(|e| e.path().to_string()).collect();
        tracked.dedup();

        let mut per_directory = options.exclude_per_directory.clone();
        if options.exclude_standard {
            per_directory.push(STANDARD_PER_DIRECTORY.to_string());
        }
        let scan_options = ScanOptions {
            collapse_directories: options.directory,
            no_empty_directory: options.no_empty_directory,
            per_directory,
        };

        for path in untracked::scan(work_dir, &tracked, &scan_options, &patterns)? {
            if pathspec.selects(path.trim_end_matches('/')) {
                results.push(StatusEntry::new(path, Stage::Normal, StatusCode::Other));
            }
        }
    }

    results.sort_by(|a, b| (a.path.as_bytes(), a.stage).cmp(&(b.path.as_bytes(), b.stage)));
    debug!(entries = results.len(), "classified working tree");
    Ok(results)
}

/// Collects root-scoped exclusions: exclude files first, then patterns.
fn exclude_patterns(git_dir: &Path, options: &StatusOptions) -> Result<Vec<IgnorePattern>> {
    let mut files = options.exclude_files.clone();
    if options.exclude_standard {
        files.push(git_dir.join("info").join("exclude"));
    }

    let mut patterns = Vec::new();
    for file in &files {
        patterns.extend(ignore::from_file(file, "")?);
    }
    for pattern in &options.exclude_patterns {
        patterns.extend(IgnorePattern::new(pattern, "", 1, ""));
    }
    Ok(patterns)
}

/// Returns the paths that keep `path` from being checked out as a file.
///
/// Walks from the immediate parent toward the root and stops at the
/// first real directory; every non-directory ancestor on the way is an
/// obstruction. A directory at `path` itself is one as well.
pub fn obstructions(work_dir: &Path, path: &str) -> Vec<String> {
    let mut found = Vec::new();

    let mut ancestor = path;
    while let Some((parent, _)) = ancestor.rsplit_once('/') {
        match fs::symlink_metadata(work_dir.join(parent)) {
            Ok(meta) if meta.is_dir() => break,
            Ok(_) => found.push(parent.to_string()),
            Err(_) => {}
        }
        ancestor = parent;
    }

    if fs::symlink_metadata(work_dir.join(path)).map_or(false, |m| m.is_dir()) {
        found.push(path.to_string());
    }
    found
}

/// Reports a change when the path is a directory, cannot be stat'd, or
/// hashes to a different blob than the one staged.
///
/// A failed stat may mean the file or one of its parents is gone; both
/// count as changed.
fn is_modified(file: &Path, entry: &IndexEntry) -> Result<bool> {
    let meta = match fs::symlink_metadata(file) {
        Ok(meta) => meta,
        Err(_) => return Ok(true),
    };
    if meta.is_dir() {
        return Ok(true);
    }
    Ok(hash_file(file)? != *entry.oid().as_bytes())
}
