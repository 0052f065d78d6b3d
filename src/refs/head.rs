//! Where HEAD points.

use crate::objects::Oid;

/// The state of HEAD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// HEAD is a symbolic reference to a branch.
    Branch {
        /// Branch name without the `refs/heads/` prefix.
        name: String,
        /// The branch tip, or `None` for a branch with no commits yet.
        oid: Option<Oid>,
    },
    /// HEAD names a commit directly.
    Detached {
        /// The commit HEAD points at.
        oid: Oid,
    },
}

impl Head {
    /// HEAD on a branch that has commits.
    pub fn branch(name: impl Into<String>, oid: Oid) -> Self {
        Head::Branch {
            name: name.into(),
            oid: Some(oid),
        }
    }

    /// HEAD on a branch with no commits yet.
    pub fn unborn(name: impl Into<String>) -> Self {
        Head::Branch {
            name: name.into(),
            oid: None,
        }
    }

    /// Detached HEAD.
    pub fn detached(oid: Oid) -> Self {
        Head::Detached { oid }
    }

    /// Returns the commit HEAD resolves to, if any.
    pub fn oid(&self) -> Option<&Oid> {
        match self {
            Head::Branch { oid, .. } => oid.as_ref(),
            Head::Detached { oid } => Some(oid),
        }
    }

    /// Returns the branch name when HEAD is on a branch.
    pub fn branch_name(&self) -> Option<&str> {
        match self {
            Head::Branch { name, .. } => Some(name),
            Head::Detached { .. } => None,
        }
    }

    /// Returns `true` for a detached HEAD.
    pub fn is_detached(&self) -> bool {
        matches!(self, Head::Detached { .. })
    }

    /// Returns the name shown in reflog messages: the branch name, or the
    /// full commit id when detached.
    pub fn display_name(&self) -> String {
        match self {
            Head::Branch { name, .. } => name.clone(),
            Head::Detached { oid } => oid.to_hex(),
        }
    }
}
