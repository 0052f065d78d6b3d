//! The repository context every operation runs against.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::checkout::{self, CheckoutIndexOptions, CheckoutOptions, CheckoutReport};
use crate::error::{Error, Result};
use crate::index::{Index, DEFAULT_VERSION};
use crate::infra::write_file_atomic;
use crate::objects::{LooseObjectStore, Object, Oid};
use crate::pathspec::Pathspec;
use crate::refs::store::DEFAULT_IDENTITY;
use crate::refs::{Head, RefStore};
use crate::rev::{self, Revision};
use crate::status::{self, StatusEntry, StatusOptions};

/// Name of the metadata directory inside the working tree.
const GIT_DIR_NAME: &str = ".git";

/// A Git repository with a working tree.
///
/// Holds the working tree root, the metadata directory, the directory
/// relative paths are interpreted against, and the identity written to
/// reflogs. Nothing is cached: each operation reads the index and refs
/// it needs from disk.
#[derive(Debug, Clone)]
pub struct Repository {
    work_dir: PathBuf,
    git_dir: PathBuf,
    current_dir: PathBuf,
    identity: String,
}

impl Repository {
    /// Checks for the `HEAD` file and the `objects/` and `refs/` directories.
    fn validate_git_dir(git_dir: &Path) -> Result<()> {
        if !git_dir.is_dir()
            || !git_dir.join("HEAD").is_file()
            || !git_dir.join("objects").is_dir()
            || !git_dir.join("refs").is_dir()
        {
            return Err(Error::NotARepository(git_dir.to_path_buf()));
        }
        Ok(())
    }

    fn from_dirs(work_dir: PathBuf, git_dir: PathBuf) -> Self {
        Repository {
            current_dir: work_dir.clone(),
            work_dir,
            git_dir,
            identity: DEFAULT_IDENTITY.to_string(),
        }
    }

    /// Creates an empty repository at `path` on branch `main`.
    ///
    /// Writes `HEAD`, the object and ref directories and an empty index.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyARepository`] if `path/.git` exists.
    pub fn init<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        fs::create_dir_all(path)?;
        let work_dir = path.canonicalize()?;
        let git_dir = work_dir.join(GIT_DIR_NAME);
        if git_dir.exists() {
            return Err(Error::AlreadyARepository(work_dir));
        }

        fs::create_dir_all(git_dir.join("objects"))?;
        fs::create_dir_all(git_dir.join("refs/heads"))?;
        fs::create_dir_all(git_dir.join("refs/tags"))?;
        write_file_atomic(git_dir.join("HEAD"), b"ref: refs/heads/main\n")?;

        let repo = Self::from_dirs(work_dir, git_dir);
        repo.write_index(&Index::empty(DEFAULT_VERSION))?;
        info!(path = %repo.work_dir.display(), "initialized repository");
        Ok(repo)
    }

    /// Opens a repository given its working tree root or its `.git`
    /// directory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let abs_path = path
            .canonicalize()
            .map_err(|_| Error::NotARepository(path.to_path_buf()))?;

        let (work_dir, git_dir) = if abs_path.ends_with(GIT_DIR_NAME) {
            let work_dir = abs_path
                .parent()
                .ok_or_else(|| Error::NotARepository(path.to_path_buf()))?
                .to_path_buf();
            (work_dir, abs_path)
        } else {
            let git_dir = abs_path.join(GIT_DIR_NAME);
            (abs_path, git_dir)
        };

        Self::validate_git_dir(&git_dir)?;
        Ok(Self::from_dirs(work_dir, git_dir))
    }

    /// Searches `path` and its ancestors for a repository.
    ///
    /// The current directory of the result is `path`, so relative
    /// pathspecs resolve the way they would from a shell there.
    pub fn discover<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let start = path
            .canonicalize()
            .map_err(|_| Error::NotARepository(path.to_path_buf()))?;

        let mut current = start.as_path();
        loop {
            let git_dir = current.join(GIT_DIR_NAME);
            if Self::validate_git_dir(&git_dir).is_ok() {
                let mut repo = Self::from_dirs(current.to_path_buf(), git_dir);
                repo.current_dir = start.clone();
                return Ok(repo);
            }
            current = current
                .parent()
                .ok_or_else(|| Error::NotARepository(path.to_path_buf()))?;
        }
    }

    /// Sets the directory relative paths are resolved against.
    ///
    /// # Errors
    ///
    /// [`Error::PathOutsideRepository`] if `dir` is not inside the
    /// working tree.
    pub fn with_current_dir<P: AsRef<Path>>(mut self, dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let dir = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.work_dir.join(dir)
        };
        let dir = dir.canonicalize()?;
        if !dir.starts_with(&self.work_dir) {
            return Err(Error::PathOutsideRepository(dir));
        }
        self.current_dir = dir;
        Ok(self)
    }

    /// Sets the `Name <email>` recorded in reflogs.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Returns the working tree root.
    pub fn path(&self) -> &Path {
        &self.work_dir
    }

    /// Returns the metadata directory.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Returns the directory relative paths are resolved against.
    pub fn current_dir(&self) -> &Path {
        &self.current_dir
    }

    /// Returns the loose object store.
    pub fn objects(&self) -> LooseObjectStore {
        LooseObjectStore::new(self.git_dir.join("objects"))
    }

    /// Returns the reference store, writing reflogs as this repository's identity.
    pub fn refs(&self) -> RefStore {
        RefStore::new(&self.git_dir).with_identity(self.identity.clone())
    }

    /// Returns the path of the index file.
    pub fn index_path(&self) -> PathBuf {
        self.git_dir.join("index")
    }

    /// Loads the index.
    ///
    /// # Errors
    ///
    /// [`Error::CorruptIndex`] if the file is missing or malformed.
    pub fn read_index(&self) -> Result<Index> {
        Index::load(&self.index_path())
    }

    /// Replaces the index file atomically.
    pub fn write_index(&self, index: &Index) -> Result<()> {
        index.save(&self.index_path())
    }

    /// Reads HEAD.
    pub fn head(&self) -> Result<Head> {
        self.refs().head()
    }

    /// Retrieves a blob by digest.
    pub fn get_object(&self, oid: &Oid) -> Result<Object> {
        self.objects().get(oid)
    }

    /// Resolves a revision name, see [`rev::resolve_revision`].
    pub fn resolve_revision(&self, spec: &str) -> Result<Revision> {
        rev::resolve_revision(&self.objects(), &self.refs(), spec)
    }

    /// Builds a pathspec from paths relative to the current directory.
    pub fn pathspec(&self, paths: &[&str]) -> Result<Pathspec> {
        Pathspec::new(&self.work_dir, &self.current_dir, paths)
    }

    /// Classifies tracked and untracked paths, see [`status::list_status`].
    pub fn list_status(&self, options: &StatusOptions, paths: &[&str]) -> Result<Vec<StatusEntry>> {
        status::list_status(self, options, paths)
    }

    /// Writes index entries to disk, see [`checkout::checkout_index`].
    pub fn checkout_index(
        &self,
        options: &CheckoutIndexOptions,
        paths: &[&str],
    ) -> Result<CheckoutReport> {
        checkout::checkout_index(self, options, paths)
    }

    /// Copies paths out of a tree, see [`checkout::checkout_files`].
    pub fn checkout_files(
        &self,
        options: &CheckoutOptions,
        tree: &Oid,
        paths: &[&str],
    ) -> Result<CheckoutReport> {
        checkout::checkout_files(self, options, tree, paths)
    }

    /// Switches to a commit, see [`checkout::checkout_commit`].
    pub fn checkout_commit(&self, options: &CheckoutOptions, target: &Revision) -> Result<CheckoutReport> {
        checkout::checkout_commit(self, options, target)
    }

    /// Resolves `target` and checks it out, see [`checkout::checkout`].
    pub fn checkout(
        &self,
        options: &CheckoutOptions,
        target: Option<&str>,
        paths: &[&str],
    ) -> Result<CheckoutReport> {
        checkout::checkout(self, options, target, paths)
    }
}
