//! Shared helpers for integration tests.
//!
//! Repositories are built directly through the object store and index,
//! without a git binary.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tempfile::TempDir;
use treesync::{
    CheckoutOptions, FileMode, IndexEntry, ObjectType, Oid, Repository, Revision, Tree, TreeEntry,
};

/// Creates an empty repository in a fresh temporary directory.
pub fn init_repo() -> (TempDir, Repository) {
    let temp = TempDir::new().unwrap();
    let repo = Repository::init(temp.path()).unwrap();
    (temp, repo)
}

/// Stores a blob.
pub fn blob(repo: &Repository, content: &[u8]) -> Oid {
    repo.objects().write(ObjectType::Blob, content).unwrap()
}

enum Node {
    File(Oid),
    Dir(BTreeMap<String, Node>),
}

fn insert(dir: &mut BTreeMap<String, Node>, path: &str, oid: Oid) {
    match path.split_once('/') {
        Some((head, rest)) => {
            let child = dir
                .entry(head.to_string())
                .or_insert_with(|| Node::Dir(BTreeMap::new()));
            if let Node::Dir(children) = child {
                insert(children, rest, oid);
            }
        }
        None => {
            dir.insert(path.to_string(), Node::File(oid));
        }
    }
}

fn store_dir(repo: &Repository, dir: &BTreeMap<String, Node>) -> Oid {
    let entries = dir
        .iter()
        .map(|(name, node)| match node {
            Node::File(oid) => TreeEntry::new(FileMode::Regular, name.as_str(), *oid),
            Node::Dir(children) => {
                TreeEntry::new(FileMode::Directory, name.as_str(), store_dir(repo, children))
            }
        })
        .collect();
    repo.objects()
        .write(ObjectType::Tree, &Tree::from_entries(entries).to_bytes())
        .unwrap()
}

/// Stores the blobs and nested trees for `files` and returns the root tree.
pub fn tree(repo: &Repository, files: &[(&str, &str)]) -> Oid {
    let mut root = BTreeMap::new();
    for (path, content) in files {
        insert(&mut root, path, blob(repo, content.as_bytes()));
    }
    store_dir(repo, &root)
}

/// Stores a commit of `files` on top of `parents`.
pub fn commit(repo: &Repository, files: &[(&str, &str)], parents: &[Oid], message: &str) -> Oid {
    let tree = tree(repo, files);
    let mut content = format!("tree {}\n", tree);
    for parent in parents {
        content.push_str(&format!("parent {}\n", parent));
    }
    content.push_str("author Test <test@example.com> 1700000000 +0000\n");
    content.push_str("committer Test <test@example.com> 1700000000 +0000\n");
    content.push_str(&format!("\n{}\n", message));
    repo.objects()
        .write(ObjectType::Commit, content.as_bytes())
        .unwrap()
}

/// Points `refs/heads/<name>` at `oid`.
pub fn set_branch(repo: &Repository, name: &str, oid: &Oid) {
    let path = repo.git_dir().join("refs/heads").join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, format!("{}\n", oid)).unwrap();
}

/// Commits `files` to `main` and force-checks it out, leaving a clean
/// working tree on branch `main`.
pub fn checked_out(repo: &Repository, files: &[(&str, &str)]) -> Oid {
    let oid = commit(repo, files, &[], "initial");
    set_branch(repo, "main", &oid);
    let options = CheckoutOptions {
        force: true,
        ..CheckoutOptions::default()
    };
    let target = Revision::Branch {
        name: "main".into(),
        commit: oid,
    };
    repo.checkout_commit(&options, &target).unwrap();
    oid
}

/// Records `files` in the index without touching the working tree.
pub fn stage(repo: &Repository, files: &[(&str, &str)]) {
    let mut index = repo.read_index().unwrap();
    for (path, content) in files {
        let oid = blob(repo, content.as_bytes());
        index.upsert(IndexEntry::new(*path, oid, FileMode::Regular, content.len() as u64));
    }
    repo.write_index(&index).unwrap();
}

/// Writes a file below `root`, creating parents.
pub fn write(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, content).unwrap();
}

/// Reads a file below `root` as text.
pub fn read(root: &Path, path: &str) -> String {
    fs::read_to_string(root.join(path)).unwrap()
}
