//! Discovery of files present on disk but absent from the index.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::Result;
use crate::ignore::{self, IgnorePattern};

/// Name of the metadata directory, never scanned.
pub const METADATA_DIR: &str = ".git";

/// How the scan walks the tree.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Report a directory holding no tracked paths as a single `dir/`
    /// entry instead of descending into it.
    pub collapse_directories: bool,
    /// With `collapse_directories`, leave out empty directories.
    pub no_empty_directory: bool,
    /// Exclude file names read from every directory visited, e.g. `.gitignore`.
    pub per_directory: Vec<String>,
}

/// Lists untracked paths below `root`, relative to it.
///
/// `tracked` must be sorted by bytes; it is searched for both exact
/// paths and directory prefixes. `patterns` are the exclusions in force
/// at the root; per-directory exclude files extend them for their own
/// subtree. The order of the result carries no meaning.
pub fn scan(
    root: &Path,
    tracked: &[String],
    options: &ScanOptions,
    patterns: &[IgnorePattern],
) -> Result<Vec<String>> {
    let mut found = Vec::new();
    scan_dir(root, "", tracked, options, patterns.to_vec(), &mut found)?;
    debug!(root = %root.display(), untracked = found.len(), "scanned for untracked files");
    Ok(found)
}

/// Like [`scan`], but walks only the subtree at `dir`, a path relative to
/// `root`. Exclude files above `dir` are not read.
pub fn scan_within(
    root: &Path,
    dir: &str,
    tracked: &[String],
    options: &ScanOptions,
    patterns: &[IgnorePattern],
) -> Result<Vec<String>> {
    let mut found = Vec::new();
    scan_dir(root, dir, tracked, options, patterns.to_vec(), &mut found)?;
    Ok(found)
}

fn scan_dir(
    root: &Path,
    dir: &str,
    tracked: &[String],
    options: &ScanOptions,
    mut patterns: Vec<IgnorePattern>,
    found: &mut Vec<String>,
) -> Result<()> {
    let abs_dir = if dir.is_empty() {
        root.to_path_buf()
    } else {
        root.join(dir)
    };

    let entries = match fs::read_dir(&abs_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %abs_dir.display(), error = %e, "cannot read directory, skipping");
            return Ok(());
        }
    };

    for name in &options.per_directory {
        let file = abs_dir.join(name);
        if file.is_file() {
            debug!(file = %file.display(), "adding excludes");
            patterns.extend(ignore::from_file(&file, dir)?);
        }
    }

    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == METADATA_DIR {
            continue;
        }

        let path = if dir.is_empty() {
            name
        } else {
            format!("{}/{}", dir, name)
        };
        // Symlinks are reported as files, never followed.
        let is_dir = entry.file_type()?.is_dir();

        if ignore::matches(&patterns, &path, is_dir) {
            continue;
        }

        if !is_dir {
            if tracked.binary_search(&path).is_err() {
                found.push(path);
            }
            continue;
        }

        if options.collapse_directories && !has_tracked_below(tracked, &path) {
            if options.no_empty_directory && is_empty_dir(&root.join(&path)) {
                continue;
            }
            found.push(format!("{}/", path));
            continue;
        }

        scan_dir(root, &path, tracked, options, patterns.clone(), found)?;
    }

    Ok(())
}

/// Returns true if some entry of the sorted `tracked` list lives below `dir`.
fn has_tracked_below(tracked: &[String], dir: &str) -> bool {
    let prefix = format!("{}/", dir);
    let start = tracked.partition_point(|p| p.as_str() < prefix.as_str());
    tracked
        .get(start)
        .map_or(false, |p| p.starts_with(&prefix))
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
