//! Infrastructure utilities (hashing, compression, filesystem).

pub mod compression;
pub mod fs;
pub mod hash;

pub use compression::{compress, decompress};
pub use fs::{path_exists, read_file, remove_path, write_file_atomic, write_worktree_file};
pub use hash::{hash_file, hash_object, sha1};
