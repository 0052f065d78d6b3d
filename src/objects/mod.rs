//! Stored objects: digests, the loose object store, trees and commits.

pub mod commit;
pub mod oid;
pub mod store;
pub mod tree;

pub use commit::Commit;
pub use oid::Oid;
pub use store::{LooseObjectStore, ObjectType, RawObject};
pub use tree::{ls_tree, FileMode, Tree, TreeEntry, TreeItem};

/// File content retrieved from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    size: u64,
    content: Vec<u8>,
}

impl Blob {
    pub(crate) fn new(content: Vec<u8>) -> Self {
        Blob {
            size: content.len() as u64,
            content,
        }
    }

    /// Returns the size declared in the object header.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the content bytes.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Consumes the blob, returning its content.
    pub fn into_content(self) -> Vec<u8> {
        self.content
    }
}

/// An object returned by [`LooseObjectStore::get`].
///
/// Only blobs are materialized this way; trees and commits are decoded
/// from [`RawObject`]s by [`Tree::parse`] and [`Commit::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    /// File content.
    Blob(Blob),
}

impl Object {
    /// Returns the type of this object.
    pub fn kind(&self) -> ObjectType {
        match self {
            Object::Blob(_) => ObjectType::Blob,
        }
    }

    /// Consumes the object, returning the blob.
    pub fn into_blob(self) -> Blob {
        match self {
            Object::Blob(blob) => blob,
        }
    }
}
