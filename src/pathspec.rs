//! User-supplied path filters.
//!
//! Paths are given relative to the caller's current directory and are
//! resolved to repository-relative form before matching. A pathspec item
//! matches the path itself, anything below it, or, when it contains glob
//! characters, anything the glob matches.

use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::error::{Error, Result};
use crate::objects::tree::is_within;

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
struct Item {
    original: String,
    path: String,
    glob: Option<Pattern>,
}

impl Item {
    fn matches(&self, path: &str) -> bool {
        is_within(path, &self.path)
            || self
                .glob
                .as_ref()
                .map_or(false, |g| g.matches_with(path, GLOB_OPTIONS))
    }
}

/// A resolved set of path filters.
#[derive(Debug, Clone, Default)]
pub struct Pathspec {
    cwd_prefix: String,
    items: Vec<Item>,
}

impl Pathspec {
    /// Resolves `paths`, given relative to `current_dir`, against the
    /// working tree rooted at `work_dir`.
    ///
    /// # Errors
    ///
    /// [`Error::PathOutsideRepository`] if a path or the current
    /// directory lies outside the working tree.
    pub fn new(work_dir: &Path, current_dir: &Path, paths: &[&str]) -> Result<Self> {
        let cwd_prefix = repo_relative(work_dir, current_dir)?;

        let mut items = Vec::with_capacity(paths.len());
        for &original in paths {
            let path = repo_relative(work_dir, &current_dir.join(original))?;
            let glob = if has_glob_chars(original) {
                Pattern::new(&path).ok()
            } else {
                None
            };
            items.push(Item {
                original: original.to_string(),
                path,
                glob,
            });
        }

        Ok(Pathspec { cwd_prefix, items })
    }

    /// Returns true if no explicit paths were given.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the current directory relative to the working tree root.
    pub fn cwd_prefix(&self) -> &str {
        &self.cwd_prefix
    }

    /// Returns the resolved, repository-relative form of every item.
    pub fn paths(&self) -> Vec<String> {
        self.items.iter().map(|i| i.path.clone()).collect()
    }

    /// Returns the items as the user wrote them.
    pub fn originals(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|i| i.original.as_str())
    }

    /// Returns true if some item matches `path`.
    pub fn matches(&self, path: &str) -> bool {
        self.items.iter().any(|item| item.matches(path))
    }

    /// Returns true if `path` survives filtering.
    ///
    /// With explicit items a path must match one of them. Without items
    /// everything passes except paths outside the current directory,
    /// which cannot be shown relative to it.
    pub fn selects(&self, path: &str) -> bool {
        if !self.items.is_empty() {
            return self.matches(path);
        }
        self.cwd_prefix.is_empty() || is_within(path, &self.cwd_prefix)
    }

    /// Returns the originals of items that match none of `paths`.
    pub fn unmatched<'a, I>(&self, paths: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        self.items
            .iter()
            .filter(|item| !paths.clone().into_iter().any(|p| item.matches(p)))
            .map(|item| item.original.clone())
            .collect()
    }
}

/// Converts `path` to a slash-separated path relative to `work_dir`.
///
/// Both are normalized lexically first; `work_dir` itself maps to `""`.
pub fn repo_relative(work_dir: &Path, path: &Path) -> Result<String> {
    let path = normalize(path);
    let relative = path
        .strip_prefix(normalize(work_dir))
        .map_err(|_| Error::PathOutsideRepository(path.clone()))?;

    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

/// Resolves `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn has_glob_chars(s: &str) -> bool {
    s.contains(['*', '?', '['])
}
