//! Tree objects and the recursive tree listing used by checkout.

use super::oid::{Oid, OID_BYTES};
use super::store::{LooseObjectStore, ObjectType, RawObject};
use crate::error::{Error, Result};

/// The kind and permission bits of a tree or index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMode {
    /// Regular file, `100644`.
    Regular,
    /// Executable file, `100755`.
    Executable,
    /// Symbolic link, `120000`.
    Symlink,
    /// Subtree, `40000`.
    Directory,
    /// Submodule commit, `160000`.
    Submodule,
}

impl FileMode {
    /// Parses the octal form used in tree objects.
    pub fn from_octal(s: &str) -> Option<Self> {
        match s {
            "100644" | "644" => Some(FileMode::Regular),
            "100755" | "755" => Some(FileMode::Executable),
            "120000" => Some(FileMode::Symlink),
            "40000" | "040000" => Some(FileMode::Directory),
            "160000" => Some(FileMode::Submodule),
            _ => None,
        }
    }

    /// Returns the octal form used in tree objects.
    pub fn as_octal(&self) -> &'static str {
        match self {
            FileMode::Regular => "100644",
            FileMode::Executable => "100755",
            FileMode::Symlink => "120000",
            FileMode::Directory => "40000",
            FileMode::Submodule => "160000",
        }
    }

    /// Decodes the 32-bit mode field of an index entry.
    ///
    /// Regular files with any execute bit set are executable, as git
    /// normalizes them.
    pub fn from_index_mode(mode: u32) -> Option<Self> {
        match mode & 0o170000 {
            0o100000 if mode & 0o111 != 0 => Some(FileMode::Executable),
            0o100000 => Some(FileMode::Regular),
            0o120000 => Some(FileMode::Symlink),
            0o040000 => Some(FileMode::Directory),
            0o160000 => Some(FileMode::Submodule),
            _ => None,
        }
    }

    /// Returns the 32-bit mode field written to the index.
    pub fn as_index_mode(&self) -> u32 {
        match self {
            FileMode::Regular => 0o100644,
            FileMode::Executable => 0o100755,
            FileMode::Symlink => 0o120000,
            FileMode::Directory => 0o040000,
            FileMode::Submodule => 0o160000,
        }
    }

    /// Returns true for blob-backed modes.
    pub fn is_file(&self) -> bool {
        matches!(
            self,
            FileMode::Regular | FileMode::Executable | FileMode::Symlink
        )
    }

    /// Returns true for subtrees.
    pub fn is_directory(&self) -> bool {
        matches!(self, FileMode::Directory)
    }
}

/// One named entry of a tree object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    mode: FileMode,
    name: String,
    oid: Oid,
}

impl TreeEntry {
    /// Creates an entry.
    pub fn new(mode: FileMode, name: impl Into<String>, oid: Oid) -> Self {
        TreeEntry {
            mode,
            name: name.into(),
            oid,
        }
    }

    /// Returns the mode.
    pub fn mode(&self) -> FileMode {
        self.mode
    }

    /// Returns the single path component this entry names.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the digest of the referenced blob, tree or commit.
    pub fn oid(&self) -> &Oid {
        &self.oid
    }
}

/// A decoded tree object.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Builds a tree from entries, ordering them the way git does.
    ///
    /// Subtrees sort as if their name carried a trailing `/`.
    pub fn from_entries(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
        Tree { entries }
    }

    /// Decodes a tree from its raw object.
    ///
    /// The content is a sequence of `<octal mode> <name>\0<20-byte digest>`.
    pub fn parse(oid: &Oid, raw: RawObject) -> Result<Self> {
        if raw.object_type != ObjectType::Tree {
            return Err(Error::TypeMismatch {
                expected: "tree",
                actual: raw.object_type.as_str(),
            });
        }

        let content = &raw.content;
        let mut entries = Vec::new();
        let mut pos = 0;

        while pos < content.len() {
            let space = content[pos..]
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| Error::corrupt_object(oid, "missing space in tree entry"))?;
            let mode_str = std::str::from_utf8(&content[pos..pos + space])
                .map_err(|_| Error::corrupt_object(oid, "invalid UTF-8 in tree entry mode"))?;
            let mode = FileMode::from_octal(mode_str).ok_or_else(|| {
                Error::corrupt_object(oid, format!("unknown file mode: {}", mode_str))
            })?;
            pos += space + 1;

            let null = content[pos..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| Error::corrupt_object(oid, "missing null byte in tree entry"))?;
            let name = std::str::from_utf8(&content[pos..pos + null])
                .map_err(|_| Error::corrupt_object(oid, "invalid UTF-8 in tree entry name"))?
                .to_string();
            if !is_safe_entry_name(&name) {
                return Err(Error::corrupt_object(
                    oid,
                    format!("unsafe tree entry name: {:?}", name),
                ));
            }
            pos += null + 1;

            if pos + OID_BYTES > content.len() {
                return Err(Error::corrupt_object(oid, "truncated digest in tree entry"));
            }
            let mut bytes = [0u8; OID_BYTES];
            bytes.copy_from_slice(&content[pos..pos + OID_BYTES]);
            pos += OID_BYTES;

            entries.push(TreeEntry {
                mode,
                name,
                oid: Oid::from_bytes(bytes),
            });
        }

        Ok(Tree { entries })
    }

    /// Encodes the tree as object content.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for entry in &self.entries {
            out.extend_from_slice(entry.mode.as_octal().as_bytes());
            out.push(b' ');
            out.extend_from_slice(entry.name.as_bytes());
            out.push(0);
            out.extend_from_slice(entry.oid.as_bytes());
        }
        out
    }

    /// Returns the entries in stored order.
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// Finds an entry by name.
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Returns true if the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn sort_key(entry: &TreeEntry) -> Vec<u8> {
    let mut key = entry.name.as_bytes().to_vec();
    if entry.mode.is_directory() {
        key.push(b'/');
    }
    key
}

/// A path in a tree listing, relative to the listed tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeItem {
    /// Slash-separated path.
    pub path: String,
    /// Digest of the blob (or subtree when not recursing).
    pub oid: Oid,
    /// Entry mode.
    pub mode: FileMode,
}

/// Lists the entries of `tree`, ordered by path bytes.
///
/// With `recurse`, subtrees are expanded into their blobs; otherwise only
/// the top level is listed. A non-empty `filter` keeps items equal to or
/// below one of its paths, descending only into subtrees that can lead
/// to one.
pub fn ls_tree(
    store: &LooseObjectStore,
    tree: &Oid,
    recurse: bool,
    filter: &[String],
) -> Result<Vec<TreeItem>> {
    let mut items = Vec::new();
    collect_tree(store, tree, "", recurse, filter, &mut items)?;
    items.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));
    Ok(items)
}

fn collect_tree(
    store: &LooseObjectStore,
    tree_oid: &Oid,
    prefix: &str,
    recurse: bool,
    filter: &[String],
    items: &mut Vec<TreeItem>,
) -> Result<()> {
    let tree = Tree::parse(tree_oid, store.read_raw(tree_oid)?)?;

    for entry in tree.entries() {
        let path = if prefix.is_empty() {
            entry.name.clone()
        } else {
            format!("{}/{}", prefix, entry.name)
        };

        if entry.mode.is_directory() && recurse {
            if filter.is_empty() || filter.iter().any(|f| is_within(f, &path) || is_within(&path, f)) {
                collect_tree(store, &entry.oid, &path, recurse, filter, items)?;
            }
        } else if filter.is_empty() || filter.iter().any(|f| is_within(&path, f)) {
            items.push(TreeItem {
                path,
                oid: entry.oid,
                mode: entry.mode,
            });
        }
    }

    Ok(())
}

/// Returns true if `path` equals `dir` or lives below it.
/// Returns false for names that would leave their directory or reach
/// the metadata directory once joined onto a path.
pub(crate) fn is_safe_entry_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.eq_ignore_ascii_case(".git")
        && !name.contains(['/', '\\', '\0'])
}

pub(crate) fn is_within(path: &str, dir: &str) -> bool {
    let dir = dir.trim_end_matches('/');
    dir.is_empty()
        || path == dir
        || (path.len() > dir.len() && path.starts_with(dir) && path.as_bytes()[dir.len()] == b'/')
}
