//! SHA-1 hashing of objects and working-tree files.

use std::path::Path;

use ::sha1::{Digest, Sha1};

use crate::error::Result;

/// SHA-1 hash size in bytes.
pub const SHA1_SIZE: usize = 20;

/// Computes the SHA-1 hash of the given data.
pub fn sha1(data: &[u8]) -> [u8; SHA1_SIZE] {
    Sha1::digest(data).into()
}

/// Computes the SHA-1 hash of a Git object: `{type} {size}\0{content}`.
///
/// The empty blob hash is `e69de29bb2d1d6434b8b29ae775ad8c2e48c5391`.
pub fn hash_object(object_type: &str, content: &[u8]) -> [u8; SHA1_SIZE] {
    let mut hasher = Sha1::new();
    hasher.update(format!("{} {}\0", object_type, content.len()).as_bytes());
    hasher.update(content);
    hasher.finalize().into()
}

/// Hashes a working-tree file as a blob.
///
/// Symbolic links hash their target path, the way git stores them.
pub fn hash_file(path: &Path) -> Result<[u8; SHA1_SIZE]> {
    let meta = std::fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        let target = std::fs::read_link(path)?;
        let target = target.to_string_lossy().replace('\\', "/");
        return Ok(hash_object("blob", target.as_bytes()));
    }
    let content = std::fs::read(path)?;
    Ok(hash_object("blob", &content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn to_hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    // H-001: Empty data hash
    #[test]
    fn test_sha1_empty() {
        assert_eq!(
            to_hex(&sha1(b"")),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }

    // H-002: Git object format hash (empty blob)
    #[test]
    fn test_hash_object_empty_blob() {
        assert_eq!(
            to_hex(&hash_object("blob", b"")),
            "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391"
        );
    }

    // H-003: matches `echo "hello" | git hash-object --stdin`
    #[test]
    fn test_hash_object_hello_blob() {
        assert_eq!(
            to_hex(&hash_object("blob", b"hello\n")),
            "ce013625030ba8dba906f756967f9e9ca394464a"
        );
    }

    // H-004: Files hash like their content
    #[test]
    fn test_hash_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hello.txt");
        std::fs::write(&path, b"hello\n").unwrap();

        assert_eq!(hash_file(&path).unwrap(), hash_object("blob", b"hello\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_hash_file_symlink() {
        let temp = TempDir::new().unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink("target/file", &link).unwrap();

        assert_eq!(
            hash_file(&link).unwrap(),
            hash_object("blob", b"target/file")
        );
    }
}
