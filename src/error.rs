//! Error types for treesync.

use std::path::PathBuf;

use crate::objects::Oid;

/// The main error type for treesync operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The specified path is not a valid Git repository.
    #[error("not a git repository: {}", .0.display())]
    NotARepository(PathBuf),

    /// Mutually exclusive options were passed together.
    #[error("conflicting arguments: {0}")]
    ConflictingArguments(String),

    /// No loose object exists for the digest.
    #[error("object not found: {0}")]
    ObjectNotFound(Oid),

    /// The object exists only inside a pack file, which this crate does not decode.
    #[error("object {0} is packed; packed objects are not supported")]
    PackedObjectUnsupported(Oid),

    /// The stored object could not be decoded or failed its integrity check.
    #[error("corrupt object {oid}: {reason}")]
    CorruptObject {
        /// The object ID.
        oid: Oid,
        /// What was wrong with it.
        reason: String,
    },

    /// The persisted index could not be read.
    #[error("corrupt index: {reason}")]
    CorruptIndex {
        /// What was wrong with it.
        reason: String,
    },

    /// Checkout would overwrite untracked files.
    #[error(
        "The following untracked working tree files would be overwritten by checkout:\n{}\nPlease move or remove them before you switch branches.",
        indent_paths(.0)
    )]
    WouldOverwriteUntracked(Vec<String>),

    /// Checkout would overwrite local modifications.
    #[error(
        "Your local changes to the following files would be overwritten by checkout:\n{}\nPlease commit your changes or discard them before switching branches.",
        indent_paths(.0)
    )]
    WouldOverwriteLocalChanges(Vec<String>),

    /// A requested path matched nothing.
    #[error("pathspec '{0}' did not match any file(s) known to git")]
    PathspecNotFound(String),

    /// The branch to create already exists.
    #[error("a branch named '{0}' already exists")]
    BranchAlreadyExists(String),

    /// A reference moved between being read and being updated.
    #[error("reference {name} changed concurrently: expected {}, found {}", fmt_opt(.expected), fmt_opt(.actual))]
    RefUpdateConflict {
        /// The reference name.
        name: String,
        /// The value the caller expected.
        expected: Option<Oid>,
        /// The value actually found.
        actual: Option<Oid>,
    },

    /// The requested reference was not found.
    #[error("reference not found: {0}")]
    RefNotFound(String),

    /// The provided string is not a valid object ID.
    #[error("invalid object id: {0}")]
    InvalidOid(String),

    /// The provided string is not a valid reference name.
    #[error("invalid reference name: {0}")]
    InvalidRefName(String),

    /// Type mismatch when expecting a specific object type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The expected type.
        expected: &'static str,
        /// The actual type.
        actual: &'static str,
    },

    /// A path does not live inside the working tree.
    #[error("'{}' is outside repository", .0.display())]
    PathOutsideRepository(PathBuf),

    /// A repository already exists at the specified path.
    #[error("repository already exists: {}", .0.display())]
    AlreadyARepository(PathBuf),
}

fn indent_paths(paths: &[String]) -> String {
    paths
        .iter()
        .map(|p| format!("\t{}", p))
        .collect::<Vec<_>>()
        .join("\n")
}

fn fmt_opt(oid: &Option<Oid>) -> String {
    oid.map(|o| o.to_hex()).unwrap_or_else(|| "nothing".to_string())
}

impl Error {
    pub(crate) fn corrupt_object(oid: &Oid, reason: impl Into<String>) -> Self {
        Error::CorruptObject {
            oid: *oid,
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt_index(reason: impl Into<String>) -> Self {
        Error::CorruptIndex {
            reason: reason.into(),
        }
    }
}

/// Result type alias for treesync operations.
pub type Result<T> = std::result::Result<T, Error>;
