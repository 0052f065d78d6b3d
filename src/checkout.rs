//! Checkout: moving the working tree and index to a target.
//!
//! Three entry points share one materialization routine:
//!
//! * [`checkout_index`] writes index entries to disk.
//! * [`checkout_files`] copies selected paths from a tree into the index
//!   and working tree without moving HEAD.
//! * [`checkout_commit`] switches the whole working tree to a commit,
//!   keeping staged edits, and then moves HEAD.
//!
//! Pre-flight checks run before anything is written. Once the first
//! file or the index is written, a failure is reported as-is; running
//! the same checkout again is safe.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::diff::{diff_staged, diff_worktree};
use crate::error::{Error, Result};
use crate::index::{Index, IndexEntry, Stage, Stat};
use crate::infra::{hash_file, path_exists, remove_path, write_worktree_file};
use crate::objects::tree::ls_tree;
use crate::objects::{FileMode, Oid, TreeItem};
use crate::pathspec::repo_relative;
use crate::refs::{is_valid_branch_name, Head};
use crate::repository::Repository;
use crate::rev::Revision;
use crate::status::obstructions;
use crate::untracked::{self, ScanOptions};

/// Options for [`checkout_index`].
#[derive(Debug, Clone, Default)]
pub struct CheckoutIndexOptions {
    /// Check out every index entry. Excludes explicit paths.
    pub all: bool,
    /// Overwrite files that already exist.
    pub force: bool,
    /// Suppress per-file diagnostics.
    pub quiet: bool,
    /// Do not write files; only refresh stat data of files that already match.
    pub no_create: bool,
    /// Record the new modification time of written files in the index and
    /// save it.
    pub update_stat: bool,
    /// Prepended to every path to form the destination, e.g. `export/`.
    /// Stat data is never recorded when set.
    pub prefix: String,
}

/// Options for [`checkout_commit`] and [`checkout_files`].
#[derive(Debug, Clone, Default)]
pub struct CheckoutOptions {
    /// Skip the safety checks and discard staged edits.
    pub force: bool,
    /// Suppress per-file diagnostics.
    pub quiet: bool,
    /// Create this branch at the target and switch to it.
    pub branch: Option<String>,
    /// Let `branch` replace an existing branch.
    pub force_branch: bool,
    /// Detach HEAD even when the target is a branch.
    pub detach: bool,
    /// Treat skip-worktree entries like any other.
    pub ignore_skip_worktree_bits: bool,
}

/// What a checkout did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutReport {
    /// Paths written to disk.
    pub written: Vec<String>,
    /// Paths removed from disk.
    pub removed: Vec<String>,
    /// Paths left alone, with a diagnostic unless quiet.
    pub skipped: Vec<String>,
    /// Messages for the user, e.g. `"src/x.c already exists, no checkout"`.
    pub diagnostics: Vec<String>,
}

impl CheckoutReport {
    fn diagnose(&mut self, quiet: bool, message: String) {
        if !quiet {
            warn!("{}", message);
            self.diagnostics.push(message);
        }
    }
}

/// Writes index entries to the working tree.
///
/// `paths` are relative to the repository's current directory and must
/// name index entries exactly. Existing files are skipped with a
/// diagnostic unless `force` is set; missing or unmerged paths are
/// reported the same way. Failing to read an object aborts.
///
/// # Errors
///
/// [`Error::ConflictingArguments`] if `all` is combined with paths.
pub fn checkout_index(
    repo: &Repository,
    options: &CheckoutIndexOptions,
    paths: &[&str],
) -> Result<CheckoutReport> {
    if options.all && !paths.is_empty() {
        return Err(Error::ConflictingArguments(
            "cannot combine --all with explicit paths".to_string(),
        ));
    }

    let mut index = repo.read_index()?;
    let mut report = CheckoutReport::default();

    let selected: Vec<String> = if options.all {
        // Conflicted paths stay selected so they are reported as unmerged.
        index
            .paths()
            .into_iter()
            .filter(|path| {
                index
                    .find(path, Stage::Normal)
                    .map_or(true, |entry| !entry.skip_worktree())
            })
            .map(str::to_string)
            .collect()
    } else {
        let mut selected = Vec::with_capacity(paths.len());
        for path in paths {
            let relative = repo_relative(repo.path(), &repo.current_dir().join(path))?;
            if index.contains(&relative) {
                selected.push(relative);
            } else {
                report.diagnose(options.quiet, format!("{} is not in the cache", relative));
                report.skipped.push(relative);
            }
        }
        selected
    };

    materialize(repo, &mut index, options, &selected, &mut report)?;

    if options.update_stat {
        repo.write_index(&index)?;
    }
    Ok(report)
}

/// Copies `paths` from `tree` into the index and working tree.
///
/// Each path selects itself and everything below it; no paths selects
/// the whole tree below the current directory. Matching files are
/// overwritten unconditionally; HEAD does not move.
///
/// # Errors
///
/// [`Error::PathspecNotFound`] for the first path that matches nothing
/// in the tree.
pub fn checkout_files(
    repo: &Repository,
    options: &CheckoutOptions,
    tree: &Oid,
    paths: &[&str],
) -> Result<CheckoutReport> {
    let store = repo.objects();
    let pathspec = repo.pathspec(paths)?;
    let items: Vec<TreeItem> = ls_tree(&store, tree, true, &[])?
        .into_iter()
        .filter(|item| pathspec.selects(&item.path))
        .collect();

    if let Some(path) = pathspec
        .unmatched(items.iter().map(|item| item.path.as_str()))
        .into_iter()
        .next()
    {
        return Err(Error::PathspecNotFound(path));
    }

    let mut index = repo.read_index()?;
    let mut report = CheckoutReport::default();
    let mut selected = Vec::with_capacity(items.len());

    for item in items {
        let sparse = index
            .find(&item.path, Stage::Normal)
            .map_or(false, IndexEntry::skip_worktree);
        if sparse && !options.ignore_skip_worktree_bits {
            debug!(path = %item.path, "skip-worktree entry left alone");
            report.skipped.push(item.path);
            continue;
        }
        index.upsert(entry_from_tree(repo, &item)?);
        selected.push(item.path);
    }

    let index_options = CheckoutIndexOptions {
        force: true,
        quiet: options.quiet,
        update_stat: true,
        ..CheckoutIndexOptions::default()
    };
    materialize(repo, &mut index, &index_options, &selected, &mut report)?;
    repo.write_index(&index)?;

    info!(tree = %tree, files = report.written.len(), "checked out paths");
    Ok(report)
}

/// Switches the working tree, index and HEAD to `target`.
///
/// Without `force`, fails before touching anything if the switch would
/// overwrite untracked files or local modifications; staged edits are
/// carried into the new index and left on disk. With `force`, the
/// working tree is made to match the target exactly.
///
/// # Errors
///
/// * [`Error::ConflictingArguments`] for `branch` with `detach`.
/// * [`Error::BranchAlreadyExists`] if `branch` exists without `force_branch`.
/// * [`Error::WouldOverwriteUntracked`] / [`Error::WouldOverwriteLocalChanges`]
///   listing every offending path.
/// * [`Error::RefUpdateConflict`] if HEAD moved while the checkout ran.
pub fn checkout_commit(
    repo: &Repository,
    options: &CheckoutOptions,
    target: &Revision,
) -> Result<CheckoutReport> {
    let refs = repo.refs();
    let store = repo.objects();

    if options.branch.is_some() && options.detach {
        return Err(Error::ConflictingArguments(
            "cannot combine a new branch with --detach".to_string(),
        ));
    }
    if let Some(branch) = &options.branch {
        if !is_valid_branch_name(branch) {
            return Err(Error::InvalidRefName(branch.clone()));
        }
        if refs.exists(&format!("refs/heads/{}", branch))? && !options.force_branch {
            return Err(Error::BranchAlreadyExists(branch.clone()));
        }
    }

    let head = refs.head()?;
    let old_commit = head.oid().copied();

    let commit = *target.commit_id().ok_or(Error::TypeMismatch {
        expected: "commit",
        actual: "tree",
    })?;
    let tree = target.tree_id(&store)?;
    info!(from = %head.display_name(), to = %commit, force = options.force, "checkout started");

    let old_index = repo.read_index()?;
    let target_items = ls_tree(&store, &tree, true, &[])?;

    if !options.force {
        check_untracked(repo, &old_index, &target_items)?;
    }

    let staged = diff_staged(&store, &old_index, old_commit.as_ref())?;

    if !options.force {
        let modified = diff_worktree(repo, &old_index)?;
        if !modified.is_empty() {
            return Err(Error::WouldOverwriteLocalChanges(modified));
        }
    }

    let mut new_index = Index::empty(old_index.version());
    for item in &target_items {
        let mut entry = entry_from_tree(repo, item)?;
        if !options.ignore_skip_worktree_bits {
            if let Some(old) = old_index.find(&item.path, Stage::Normal) {
                entry.set_skip_worktree(old.skip_worktree());
            }
        }
        new_index.upsert(entry);
    }

    let mut report = CheckoutReport::default();
    let mut selected = Vec::new();
    for item in &target_items {
        let sparse = new_index
            .find(&item.path, Stage::Normal)
            .map_or(false, IndexEntry::skip_worktree);
        if sparse && !options.ignore_skip_worktree_bits {
            let file = repo.path().join(&item.path);
            if path_exists(&file) {
                remove_path(&file)?;
                report.removed.push(item.path.clone());
            }
            continue;
        }

        if !options.force {
            if let Some(change) = staged.iter().find(|c| c.path == item.path) {
                match &change.after {
                    Some(entry) => new_index.upsert(entry.clone()),
                    None => {
                        new_index.remove(&item.path);
                    }
                }
                debug!(path = %item.path, "kept staged change");
                continue;
            }
        }
        selected.push(item.path.clone());
    }

    if !options.force {
        for change in &staged {
            if let Some(entry) = &change.after {
                if !new_index.contains(&change.path) {
                    new_index.upsert(entry.clone());
                }
            }
        }
    }

    repo.write_index(&new_index)?;

    for (path, entry) in old_index.as_map() {
        if new_index.contains(path) || !is_clean(repo.path(), entry) {
            continue;
        }
        remove_path(&repo.path().join(path))?;
        prune_empty_parents(repo.path(), path)?;
        debug!(path = %path, "removed file");
        report.removed.push(path.to_string());
    }

    let index_options = CheckoutIndexOptions {
        force: true,
        quiet: options.quiet,
        update_stat: true,
        ..CheckoutIndexOptions::default()
    };
    materialize(repo, &mut new_index, &index_options, &selected, &mut report)?;
    repo.write_index(&new_index)?;

    move_head(repo, options, target, &head, &commit)?;
    Ok(report)
}

/// Points HEAD at the checked-out commit: a new branch, the target
/// branch, or the commit itself. A detached move fails if HEAD no longer
/// holds what `head` recorded.
fn move_head(
    repo: &Repository,
    options: &CheckoutOptions,
    target: &Revision,
    head: &Head,
    commit: &Oid,
) -> Result<()> {
    let refs = repo.refs();
    let from = head.display_name();

    if let Some(branch) = &options.branch {
        refs.create_branch(
            branch,
            commit,
            options.force_branch,
            &format!("branch: Created from {}", commit),
        )?;
        refs.set_symbolic(
            "HEAD",
            &format!("refs/heads/{}", branch),
            &format!("checkout: moving from {} to {}", from, branch),
        )?;
        info!(branch = %branch, "switched to a new branch");
        return Ok(());
    }

    if let (Revision::Branch { name, .. }, false) = (target, options.detach) {
        refs.set_symbolic(
            "HEAD",
            &format!("refs/heads/{}", name),
            &format!("checkout: moving from {} to {}", from, name),
        )?;
        info!(branch = %name, "switched branch");
        return Ok(());
    }

    refs.update(
        "HEAD",
        commit,
        head.oid(),
        &format!("checkout: moving from {} to {}", from, commit),
    )?;
    info!(commit = %commit, "HEAD is now detached");
    Ok(())
}

/// Resolves `target` (default `HEAD`) and runs a commit-level checkout
/// when `paths` is empty, otherwise a path checkout from its tree.
pub fn checkout(
    repo: &Repository,
    options: &CheckoutOptions,
    target: Option<&str>,
    paths: &[&str],
) -> Result<CheckoutReport> {
    let revision = repo.resolve_revision(target.unwrap_or("HEAD"))?;
    if paths.is_empty() {
        checkout_commit(repo, options, &revision)
    } else {
        let tree = revision.tree_id(&repo.objects())?;
        checkout_files(repo, options, &tree, paths)
    }
}

/// Fails if writing the target tree would replace untracked data.
///
/// Only the target paths are examined: an untracked file at one of them,
/// an untracked file where one of their parent directories must go, and
/// untracked files inside a directory where a file must go. Ignored
/// files count as untracked here.
fn check_untracked(repo: &Repository, index: &Index, target: &[TreeItem]) -> Result<()> {
    let work_dir = repo.path();
    let tracked: Vec<String> = index.paths().into_iter().map(str::to_string).collect();
    let is_tracked = |path: &str| tracked.binary_search_by(|p| p.as_str().cmp(path)).is_ok();

    let mut found = BTreeSet::new();
    for item in target {
        let path = item.path.as_str();
        match fs::symlink_metadata(work_dir.join(path)) {
            Ok(meta) if meta.is_dir() => {
                if item.mode != FileMode::Submodule {
                    found.extend(untracked::scan_within(
                        work_dir,
                        path,
                        &tracked,
                        &ScanOptions::default(),
                        &[],
                    )?);
                }
            }
            Ok(_) if !is_tracked(path) => {
                found.insert(path.to_string());
            }
            _ => {}
        }

        for blocker in obstructions(work_dir, path) {
            if blocker != path && !is_tracked(&blocker) {
                found.insert(blocker);
            }
        }
    }

    if found.is_empty() {
        return Ok(());
    }
    Err(Error::WouldOverwriteUntracked(found.into_iter().collect()))
}

/// Writes the stage 0 entries for `paths` from `index` to disk.
fn materialize(
    repo: &Repository,
    index: &mut Index,
    options: &CheckoutIndexOptions,
    paths: &[String],
    report: &mut CheckoutReport,
) -> Result<()> {
    let work_dir = repo.path();
    let store = repo.objects();
    let record_stat = options.update_stat && options.prefix.is_empty();

    for path in paths {
        let entry = match index.find(path, Stage::Normal) {
            Some(entry) => entry.clone(),
            None => {
                report.diagnose(options.quiet, format!("{} is unmerged", path));
                report.skipped.push(path.clone());
                continue;
            }
        };

        let target = work_dir.join(format!("{}{}", options.prefix, path));
        let exists = path_exists(&target);

        if exists && !options.force {
            report.diagnose(options.quiet, format!("{} already exists, no checkout", path));
            report.skipped.push(path.clone());
            continue;
        }

        if entry.mode() == FileMode::Submodule {
            fs::create_dir_all(&target)?;
            continue;
        }

        if options.no_create {
            let matches = exists
                && fs::symlink_metadata(&target).map_or(false, |m| !m.is_dir())
                && hash_file(&target)? == *entry.oid().as_bytes();
            if matches && record_stat {
                refresh_mtime(index, path, &target)?;
            }
            continue;
        }

        let blocking: Vec<String> = if options.prefix.is_empty() {
            obstructions(work_dir, path)
                .into_iter()
                .filter(|o| o != path)
                .collect()
        } else {
            Vec::new()
        };
        if !blocking.is_empty() && !options.force {
            report.diagnose(
                options.quiet,
                format!("{} cannot be created, {} is in the way", path, blocking[0]),
            );
            report.skipped.push(path.clone());
            continue;
        }

        let blob = store.get(entry.oid())?.into_blob();

        for obstruction in blocking {
            debug!(path = %obstruction, "removing obstruction");
            remove_path(&work_dir.join(&obstruction))?;
        }
        write_worktree_file(&target, blob.content(), entry.mode())?;
        debug!(path = %path, oid = %entry.oid(), "wrote file");
        report.written.push(path.clone());

        if record_stat {
            refresh_mtime(index, path, &target)?;
        }
    }

    Ok(())
}

fn refresh_mtime(index: &mut Index, path: &str, file: &Path) -> Result<()> {
    let stat = Stat::from_metadata(&fs::symlink_metadata(file)?);
    if let Some(entry) = index.find_mut(path, Stage::Normal) {
        entry.set_mtime(stat.mtime, stat.mtime_nanos);
    }
    Ok(())
}

fn entry_from_tree(repo: &Repository, item: &TreeItem) -> Result<IndexEntry> {
    let size = if item.mode == FileMode::Submodule {
        0
    } else {
        repo.objects().get(&item.oid)?.into_blob().size()
    };
    Ok(IndexEntry::new(item.path.clone(), item.oid, item.mode, size))
}

/// Returns true if the file on disk still holds the recorded content.
fn is_clean(work_dir: &Path, entry: &IndexEntry) -> bool {
    let file = work_dir.join(entry.path());
    match fs::symlink_metadata(&file) {
        Ok(meta) if !meta.is_dir() => {
            hash_file(&file).map_or(false, |digest| digest == *entry.oid().as_bytes())
        }
        _ => false,
    }
}

/// Removes directories left empty by deleting `path`, stopping at the root.
fn prune_empty_parents(work_dir: &Path, path: &str) -> Result<()> {
    let mut current = path;
    while let Some((parent, _)) = current.rsplit_once('/') {
        let dir = work_dir.join(parent);
        let empty = fs::read_dir(&dir).map_or(false, |mut entries| entries.next().is_none());
        if !empty {
            break;
        }
        fs::remove_dir(&dir)?;
        current = parent;
    }
    Ok(())
}
