//! # treesync
//!
//! A pure Rust Git working-copy engine.
//!
//! treesync keeps three things in step: the index (staging area), the
//! loose object store, and the files on disk. It reads and writes the
//! Git index format, classifies working-tree paths the way
//! `git ls-files` does, and checks out paths, trees and commits without
//! ever silently overwriting local work.
//!
//! ## Features
//!
//! - Loose object retrieval with size and digest integrity checks
//!   (packed objects are detected and reported, not decoded)
//! - Index versions 2 and 3, including skip-worktree and intent-to-add flags
//! - gitignore-style exclusion with per-directory exclude files
//! - Status classification: cached, deleted, modified, unmerged, killed, others
//! - `checkout-index`, path checkout from a tree, and branch switching
//!   that preserves staged changes
//!
//! ## Quick Start
//!
//! ```no_run
//! use treesync::{CheckoutOptions, Repository, Result, StatusOptions};
//!
//! fn main() -> Result<()> {
//!     let repo = Repository::discover(".")?;
//!
//!     let options = StatusOptions {
//!         modified: true,
//!         others: true,
//!         exclude_standard: true,
//!         ..StatusOptions::default()
//!     };
//!     for entry in repo.list_status(&options, &[])? {
//!         println!("{}", entry);
//!     }
//!
//!     repo.checkout(&CheckoutOptions::default(), Some("main"), &[])?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`error`] - Error types and Result alias
//! - [`repository`] - The `Repository` context
//! - [`objects`] - Digests, the loose object store, trees and commits
//! - [`index`] - The staging area and its on-disk format
//! - [`ignore`] - Exclusion patterns
//! - [`pathspec`] - User path filters
//! - [`untracked`] - Untracked file discovery
//! - [`status`] - Working tree classification
//! - [`refs`] - HEAD, branches and reflogs
//! - [`rev`] - Revision names
//! - [`diff`] - Staged and worktree changes
//! - [`checkout`] - Checkout engine

pub mod checkout;
pub mod diff;
pub mod error;
pub mod ignore;
pub mod index;
pub mod objects;
pub mod pathspec;
pub mod refs;
pub mod repository;
pub mod rev;
pub mod status;
pub mod untracked;

// Internal modules (not part of public API)
pub(crate) mod infra;

pub use checkout::{CheckoutIndexOptions, CheckoutOptions, CheckoutReport};
pub use error::{Error, Result};
pub use repository::Repository;

pub use objects::{Blob, Commit, FileMode, Object, ObjectType, Oid, Tree, TreeEntry};

pub use refs::{Head, RefStore};

pub use rev::Revision;

pub use status::{StatusCode, StatusEntry, StatusOptions};

pub use index::{Index, IndexEntry, Stage};
