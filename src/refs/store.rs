//! Loose reference storage with optimistic updates and reflogs.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use super::head::Head;
use crate::error::{Error, Result};
use crate::infra::write_file_atomic;
use crate::objects::Oid;

/// Identity recorded in reflog entries unless the caller sets one.
pub const DEFAULT_IDENTITY: &str = "treesync <treesync@localhost>";

const MAX_SYMREF_DEPTH: usize = 10;

/// The content of one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefValue {
    /// Points at an object.
    Direct(Oid),
    /// Points at another reference, e.g. `HEAD` at `refs/heads/main`.
    Symbolic(String),
}

/// A reference followed to an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRef {
    /// The last reference in the chain, e.g. `refs/heads/main`.
    pub name: String,
    /// The object it points at.
    pub oid: Oid,
}

/// Reads and writes references under the metadata directory.
///
/// Loose reference files take precedence over `packed-refs`; writes
/// always produce loose files.
#[derive(Debug, Clone)]
pub struct RefStore {
    git_dir: PathBuf,
    identity: String,
}

impl RefStore {
    /// Creates a store for `git_dir` using [`DEFAULT_IDENTITY`].
    pub fn new<P: AsRef<Path>>(git_dir: P) -> Self {
        RefStore {
            git_dir: git_dir.as_ref().to_path_buf(),
            identity: DEFAULT_IDENTITY.to_string(),
        }
    }

    /// Sets the `Name <email>` written to reflogs.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Reads one reference without following it.
    pub fn read_ref_file(&self, name: &str) -> Result<RefValue> {
        match fs::read_to_string(self.git_dir.join(name)) {
            Ok(content) => {
                let content = content.trim();
                match content.strip_prefix("ref: ") {
                    Some(target) => Ok(RefValue::Symbolic(target.trim().to_string())),
                    None => Ok(RefValue::Direct(Oid::from_hex(content)?)),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => self
                .read_packed(name)?
                .map(RefValue::Direct)
                .ok_or_else(|| Error::RefNotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn read_packed(&self, name: &str) -> Result<Option<Oid>> {
        let content = match fs::read_to_string(self.git_dir.join("packed-refs")) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        for line in content.lines() {
            if line.starts_with('#') || line.starts_with('^') {
                continue;
            }
            if let Some((hex, ref_name)) = line.split_once(' ') {
                if ref_name.trim() == name {
                    return Ok(Some(Oid::from_hex(hex)?));
                }
            }
        }
        Ok(None)
    }

    /// Follows symbolic references until one names an object.
    ///
    /// # Errors
    ///
    /// [`Error::RefNotFound`] names the first missing reference in the
    /// chain, which for an unborn branch is the branch itself.
    pub fn resolve(&self, name: &str) -> Result<ResolvedRef> {
        let mut current = name.to_string();
        for _ in 0..MAX_SYMREF_DEPTH {
            match self.read_ref_file(&current)? {
                RefValue::Direct(oid) => return Ok(ResolvedRef { name: current, oid }),
                RefValue::Symbolic(target) => current = target,
            }
        }
        Err(Error::InvalidRefName(format!(
            "reference loop or too many levels: {}",
            name
        )))
    }

    /// Like [`RefStore::resolve`], but a missing reference is `None`.
    pub fn try_resolve(&self, name: &str) -> Result<Option<Oid>> {
        match self.resolve(name) {
            Ok(resolved) => Ok(Some(resolved.oid)),
            Err(Error::RefNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Returns true if the reference exists, loose or packed.
    pub fn exists(&self, name: &str) -> Result<bool> {
        match self.read_ref_file(name) {
            Ok(_) => Ok(true),
            Err(Error::RefNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Reads HEAD.
    pub fn head(&self) -> Result<Head> {
        match self.read_ref_file("HEAD")? {
            RefValue::Direct(oid) => Ok(Head::detached(oid)),
            RefValue::Symbolic(target) => {
                let name = target
                    .strip_prefix("refs/heads/")
                    .unwrap_or(&target)
                    .to_string();
                Ok(Head::Branch {
                    oid: self.try_resolve(&target)?,
                    name,
                })
            }
        }
    }

    /// Creates `refs/heads/<name>` pointing at `target`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRefName`] for a malformed name and
    /// [`Error::BranchAlreadyExists`] if the branch exists and `force`
    /// is not set.
    pub fn create_branch(&self, name: &str, target: &Oid, force: bool, message: &str) -> Result<()> {
        if !is_valid_branch_name(name) {
            return Err(Error::InvalidRefName(name.to_string()));
        }
        let ref_name = format!("refs/heads/{}", name);
        let old = self.try_resolve(&ref_name)?;
        if old.is_some() && !force {
            return Err(Error::BranchAlreadyExists(name.to_string()));
        }

        self.write_direct(&ref_name, target)?;
        self.append_reflog(&ref_name, old.as_ref(), Some(target), message)?;
        info!(branch = name, target = %target, "created branch");
        Ok(())
    }

    /// Points `name` directly at `new`, replacing whatever it held.
    ///
    /// The value `name` currently resolves to must equal `expected_old`
    /// (`None` meaning it resolves to nothing); otherwise another writer
    /// got there first and [`Error::RefUpdateConflict`] is returned.
    /// Symbolic references are overwritten, not followed.
    pub fn update(
        &self,
        name: &str,
        new: &Oid,
        expected_old: Option<&Oid>,
        message: &str,
    ) -> Result<()> {
        let actual = self.try_resolve(name)?;
        if actual.as_ref() != expected_old {
            return Err(Error::RefUpdateConflict {
                name: name.to_string(),
                expected: expected_old.copied(),
                actual,
            });
        }

        self.write_direct(name, new)?;
        self.append_reflog(name, actual.as_ref(), Some(new), message)?;
        debug!(reference = name, target = %new, "updated reference");
        Ok(())
    }

    /// Makes `name` a symbolic reference to `target`.
    pub fn set_symbolic(&self, name: &str, target: &str, message: &str) -> Result<()> {
        let old = self.try_resolve(name)?;
        write_file_atomic(self.git_dir.join(name), format!("ref: {}\n", target).as_bytes())?;
        let new = self.try_resolve(target)?;
        self.append_reflog(name, old.as_ref(), new.as_ref(), message)?;
        debug!(reference = name, target, "updated symbolic reference");
        Ok(())
    }

    fn write_direct(&self, name: &str, oid: &Oid) -> Result<()> {
        write_file_atomic(self.git_dir.join(name), format!("{}\n", oid).as_bytes())
    }

    /// Appends `<old> <new> <identity> <time> +0000\t<message>` to `logs/<name>`.
    fn append_reflog(
        &self,
        name: &str,
        old: Option<&Oid>,
        new: Option<&Oid>,
        message: &str,
    ) -> Result<()> {
        let path = self.git_dir.join("logs").join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let line = format!(
            "{} {} {} {} +0000\t{}\n",
            old.unwrap_or(&Oid::ZERO),
            new.unwrap_or(&Oid::ZERO),
            self.identity,
            timestamp,
            message.replace('\n', " "),
        );

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Checks a branch name against git's reference naming rules.
pub fn is_valid_branch_name(name: &str) -> bool {
    if name.is_empty()
        || name == "@"
        || name == "HEAD"
        || name.starts_with('-')
        || name.starts_with('/')
        || name.ends_with('/')
        || name.ends_with('.')
        || name.ends_with(".lock")
        || name.contains("..")
        || name.contains("//")
        || name.contains("@{")
    {
        return false;
    }
    if name
        .chars()
        .any(|c| c.is_ascii_control() || matches!(c, ' ' | '~' | '^' | ':' | '?' | '*' | '[' | '\\'))
    {
        return false;
    }
    name.split('/').all(|part| !part.starts_with('.'))
}
