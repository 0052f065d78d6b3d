//! Integration tests for commit-level and path checkouts.
//!
//! Test cases: CK-001 to CK-017

mod common;

use std::fs;

use common::{blob, checked_out, commit, init_repo, read, set_branch, stage, write};
use treesync::{
    CheckoutOptions, Error, FileMode, Head, ObjectType, Revision, Stage, StatusOptions, Tree,
    TreeEntry,
};

fn switch(repo: &treesync::Repository, target: &str) -> treesync::Result<treesync::CheckoutReport> {
    repo.checkout(&CheckoutOptions::default(), Some(target), &[])
}

fn last_reflog(repo: &treesync::Repository, name: &str) -> String {
    let log = fs::read_to_string(repo.git_dir().join("logs").join(name)).unwrap();
    log.lines().last().unwrap().to_string()
}

fn index_paths(repo: &treesync::Repository) -> Vec<String> {
    repo.read_index()
        .unwrap()
        .iter()
        .map(|e| e.path().to_string())
        .collect()
}

// CK-001: an untracked file in the way aborts before anything changes
#[test]
fn test_untracked_file_blocks_checkout() {
    let (temp, repo) = init_repo();
    let main = checked_out(&repo, &[("README", "main\n")]);
    let other = commit(&repo, &[("README", "other\n"), ("notes.txt", "theirs\n")], &[main], "notes");
    set_branch(&repo, "other", &other);
    write(temp.path(), "notes.txt", "mine\n");
    let index_before = fs::read(repo.index_path()).unwrap();

    match switch(&repo, "other") {
        Err(Error::WouldOverwriteUntracked(paths)) => assert_eq!(paths, vec!["notes.txt"]),
        other => panic!("expected WouldOverwriteUntracked, got {:?}", other),
    }

    assert_eq!(read(temp.path(), "notes.txt"), "mine\n");
    assert_eq!(read(temp.path(), "README"), "main\n");
    assert_eq!(fs::read(repo.index_path()).unwrap(), index_before);
    assert_eq!(repo.head().unwrap(), Head::branch("main", main));
}

// CK-002: switching branches updates files, index and HEAD
#[test]
fn test_switch_branch() {
    let (temp, repo) = init_repo();
    let main = checked_out(
        &repo,
        &[("README", "main\n"), ("old.txt", "old\n"), ("dir/a.txt", "a\n")],
    );
    let other = commit(&repo, &[("README", "other\n"), ("new.txt", "new\n")], &[main], "other");
    set_branch(&repo, "other", &other);

    let report = switch(&repo, "other").unwrap();

    assert_eq!(read(temp.path(), "README"), "other\n");
    assert_eq!(read(temp.path(), "new.txt"), "new\n");
    assert!(!temp.path().join("old.txt").exists());
    assert!(!temp.path().join("dir").exists());
    assert_eq!(report.removed, vec!["dir/a.txt", "old.txt"]);
    assert_eq!(index_paths(&repo), vec!["README", "new.txt"]);
    assert_eq!(repo.head().unwrap(), Head::branch("other", other));
    assert!(last_reflog(&repo, "HEAD").ends_with("\tcheckout: moving from main to other"));

    let modified = StatusOptions {
        modified: true,
        deleted: true,
        others: true,
        ..StatusOptions::default()
    };
    assert!(repo.list_status(&modified, &[]).unwrap().is_empty());
}

// CK-003: local modifications block a checkout unless forced
#[test]
fn test_local_changes_block_checkout() {
    let (temp, repo) = init_repo();
    let main = checked_out(&repo, &[("f.txt", "1\n"), ("g.txt", "g\n")]);
    let other = commit(&repo, &[("f.txt", "2\n"), ("g.txt", "g\n")], &[main], "two");
    set_branch(&repo, "other", &other);
    write(temp.path(), "f.txt", "edited\n");

    match switch(&repo, "other") {
        Err(Error::WouldOverwriteLocalChanges(paths)) => assert_eq!(paths, vec!["f.txt"]),
        other => panic!("expected WouldOverwriteLocalChanges, got {:?}", other),
    }
    assert_eq!(read(temp.path(), "f.txt"), "edited\n");

    let force = CheckoutOptions {
        force: true,
        ..CheckoutOptions::default()
    };
    repo.checkout(&force, Some("other"), &[]).unwrap();
    assert_eq!(read(temp.path(), "f.txt"), "2\n");
}

// CK-004: staged edits and additions survive a branch switch
#[test]
fn test_staged_changes_preserved() {
    let (temp, repo) = init_repo();
    let main = checked_out(&repo, &[("a.txt", "1\n"), ("b.txt", "1\n")]);
    let other = commit(&repo, &[("a.txt", "1\n"), ("b.txt", "2\n")], &[main], "b2");
    set_branch(&repo, "other", &other);

    write(temp.path(), "a.txt", "staged\n");
    write(temp.path(), "extra.txt", "added\n");
    stage(&repo, &[("a.txt", "staged\n"), ("extra.txt", "added\n")]);

    switch(&repo, "other").unwrap();

    assert_eq!(read(temp.path(), "a.txt"), "staged\n");
    assert_eq!(read(temp.path(), "b.txt"), "2\n");
    assert_eq!(read(temp.path(), "extra.txt"), "added\n");

    let index = repo.read_index().unwrap();
    assert_eq!(
        index.find("a.txt", Stage::Normal).unwrap().oid(),
        &blob(&repo, b"staged\n")
    );
    assert!(index.find("extra.txt", Stage::Normal).is_some());
    assert_eq!(
        index.find("b.txt", Stage::Normal).unwrap().oid(),
        &blob(&repo, b"2\n")
    );
}

// CK-005: a staged deletion stays deleted
#[test]
fn test_staged_deletion_preserved() {
    let (temp, repo) = init_repo();
    let main = checked_out(&repo, &[("keep.txt", "k\n"), ("drop.txt", "d\n")]);
    let other = commit(&repo, &[("keep.txt", "k2\n"), ("drop.txt", "d\n")], &[main], "k2");
    set_branch(&repo, "other", &other);

    fs::remove_file(temp.path().join("drop.txt")).unwrap();
    let mut index = repo.read_index().unwrap();
    index.remove("drop.txt");
    repo.write_index(&index).unwrap();

    switch(&repo, "other").unwrap();

    assert!(!temp.path().join("drop.txt").exists());
    assert_eq!(index_paths(&repo), vec!["keep.txt"]);
    assert_eq!(read(temp.path(), "keep.txt"), "k2\n");
}

// CK-006: a new branch is created at the target and checked out
#[test]
fn test_create_branch() {
    let (_temp, repo) = init_repo();
    let main = checked_out(&repo, &[("README", "r\n")]);

    let options = CheckoutOptions {
        branch: Some("topic".into()),
        ..CheckoutOptions::default()
    };
    repo.checkout(&options, None, &[]).unwrap();

    assert_eq!(repo.head().unwrap(), Head::branch("topic", main));
    assert_eq!(repo.refs().try_resolve("refs/heads/topic").unwrap(), Some(main));
    assert!(last_reflog(&repo, "HEAD").ends_with("\tcheckout: moving from main to topic"));

    let existing = CheckoutOptions {
        branch: Some("main".into()),
        ..CheckoutOptions::default()
    };
    assert!(matches!(
        repo.checkout(&existing, None, &[]),
        Err(Error::BranchAlreadyExists(name)) if name == "main"
    ));

    let forced = CheckoutOptions {
        force_branch: true,
        ..existing
    };
    repo.checkout(&forced, None, &[]).unwrap();
    assert_eq!(repo.head().unwrap(), Head::branch("main", main));
}

// CK-007: a new branch together with detach is rejected
#[test]
fn test_branch_with_detach_conflicts() {
    let (_temp, repo) = init_repo();
    checked_out(&repo, &[("README", "r\n")]);

    let options = CheckoutOptions {
        branch: Some("topic".into()),
        detach: true,
        ..CheckoutOptions::default()
    };
    assert!(matches!(
        repo.checkout(&options, None, &[]),
        Err(Error::ConflictingArguments(_))
    ));
    assert!(!repo.refs().exists("refs/heads/topic").unwrap());
}

// CK-008: detached checkouts record commit ids in the reflog
#[test]
fn test_detached_head() {
    let (temp, repo) = init_repo();
    let main = checked_out(&repo, &[("v.txt", "1\n")]);
    let second = commit(&repo, &[("v.txt", "2\n")], &[main], "second");

    let detach = CheckoutOptions {
        detach: true,
        ..CheckoutOptions::default()
    };
    repo.checkout(&detach, Some("main"), &[]).unwrap();
    assert_eq!(repo.head().unwrap(), Head::detached(main));
    assert!(last_reflog(&repo, "HEAD").ends_with(&format!("\tcheckout: moving from main to {}", main)));

    switch(&repo, &second.to_hex()[..8]).unwrap();
    assert_eq!(repo.head().unwrap(), Head::detached(second));
    assert_eq!(read(temp.path(), "v.txt"), "2\n");
    assert!(last_reflog(&repo, "HEAD").ends_with(&format!("moving from {} to {}", main, second)));
    // The branch did not move.
    assert_eq!(repo.refs().try_resolve("refs/heads/main").unwrap(), Some(main));
}

// CK-009: paths are restored from HEAD or from another revision
#[test]
fn test_checkout_paths() {
    let (temp, repo) = init_repo();
    let main = checked_out(&repo, &[("a.txt", "1\n"), ("src/b.c", "1\n"), ("src/c.c", "1\n")]);
    let other = commit(&repo, &[("a.txt", "other\n"), ("src/b.c", "1\n")], &[main], "o");
    set_branch(&repo, "other", &other);

    write(temp.path(), "a.txt", "edited\n");
    write(temp.path(), "src/b.c", "edited\n");

    let report = repo.checkout(&CheckoutOptions::default(), None, &["src"]).unwrap();
    assert_eq!(report.written, vec!["src/b.c", "src/c.c"]);
    assert_eq!(read(temp.path(), "src/b.c"), "1\n");
    assert_eq!(read(temp.path(), "a.txt"), "edited\n");

    repo.checkout(&CheckoutOptions::default(), Some("other"), &["a.txt"]).unwrap();
    assert_eq!(read(temp.path(), "a.txt"), "other\n");
    let index = repo.read_index().unwrap();
    assert_eq!(
        index.find("a.txt", Stage::Normal).unwrap().oid(),
        &blob(&repo, b"other\n")
    );
    assert_eq!(repo.head().unwrap(), Head::branch("main", main));

    match repo.checkout(&CheckoutOptions::default(), None, &["nope"]) {
        Err(Error::PathspecNotFound(path)) => assert_eq!(path, "nope"),
        other => panic!("expected PathspecNotFound, got {:?}", other),
    }
}

// CK-010: skip-worktree entries stay off disk across a switch
#[test]
fn test_skip_worktree_carried_over() {
    let (temp, repo) = init_repo();
    let main = checked_out(&repo, &[("a.txt", "a\n"), ("sparse.txt", "1\n")]);
    let other = commit(&repo, &[("a.txt", "a\n"), ("sparse.txt", "2\n")], &[main], "s");
    set_branch(&repo, "other", &other);

    let mut index = repo.read_index().unwrap();
    index.find_mut("sparse.txt", Stage::Normal).unwrap().set_skip_worktree(true);
    repo.write_index(&index).unwrap();
    fs::remove_file(temp.path().join("sparse.txt")).unwrap();

    switch(&repo, "other").unwrap();

    assert!(!temp.path().join("sparse.txt").exists());
    let index = repo.read_index().unwrap();
    let entry = index.find("sparse.txt", Stage::Normal).unwrap();
    assert!(entry.skip_worktree());
    assert_eq!(entry.oid(), &blob(&repo, b"2\n"));
}

// CK-011: checking out from an unborn branch
#[test]
fn test_checkout_from_unborn_branch() {
    let (temp, repo) = init_repo();
    let feature = commit(&repo, &[("hello.txt", "hi\n")], &[], "first");
    set_branch(&repo, "feature", &feature);

    switch(&repo, "feature").unwrap();

    assert_eq!(read(temp.path(), "hello.txt"), "hi\n");
    assert_eq!(repo.head().unwrap(), Head::branch("feature", feature));
    assert!(last_reflog(&repo, "HEAD").ends_with("\tcheckout: moving from main to feature"));
}

// CK-012: a tree cannot be checked out as a commit
#[test]
fn test_tree_target_needs_paths() {
    let (_temp, repo) = init_repo();
    let tree = common::tree(&repo, &[("a", "a")]);

    assert!(matches!(
        repo.checkout_commit(&CheckoutOptions::default(), &Revision::Tree(tree)),
        Err(Error::TypeMismatch { .. })
    ));
}

fn forced() -> CheckoutOptions {
    CheckoutOptions {
        force: true,
        ..CheckoutOptions::default()
    }
}

// CK-013: an untracked file where the target needs a directory blocks the switch
#[test]
fn test_untracked_file_blocks_directory() {
    let (temp, repo) = init_repo();
    let main = checked_out(&repo, &[("README", "main\n")]);
    let other = commit(&repo, &[("README", "main\n"), ("a/b.txt", "b\n")], &[main], "a");
    set_branch(&repo, "other", &other);
    write(temp.path(), "a", "my notes\n");

    match switch(&repo, "other") {
        Err(Error::WouldOverwriteUntracked(paths)) => assert_eq!(paths, vec!["a"]),
        other => panic!("expected WouldOverwriteUntracked, got {:?}", other),
    }
    assert_eq!(read(temp.path(), "a"), "my notes\n");
    assert_eq!(repo.head().unwrap(), Head::branch("main", main));

    repo.checkout(&forced(), Some("other"), &[]).unwrap();
    assert_eq!(read(temp.path(), "a/b.txt"), "b\n");
}

// CK-014: untracked files inside a directory where the target needs a file
#[test]
fn test_untracked_directory_blocks_file() {
    let (temp, repo) = init_repo();
    let main = checked_out(&repo, &[("README", "main\n")]);
    let other = commit(&repo, &[("README", "main\n"), ("foo", "file\n")], &[main], "foo");
    set_branch(&repo, "other", &other);
    write(temp.path(), "foo/notes.txt", "keep\n");
    write(temp.path(), "foo/deep/more.txt", "keep\n");

    match switch(&repo, "other") {
        Err(Error::WouldOverwriteUntracked(paths)) => {
            assert_eq!(paths, vec!["foo/deep/more.txt", "foo/notes.txt"])
        }
        other => panic!("expected WouldOverwriteUntracked, got {:?}", other),
    }
    assert_eq!(read(temp.path(), "foo/notes.txt"), "keep\n");
    assert_eq!(index_paths(&repo), vec!["README"]);
}

// CK-015: a forced switch keeps a dropped file that was edited on disk
#[test]
fn test_forced_switch_keeps_edited_dropped_file() {
    let (temp, repo) = init_repo();
    let main = checked_out(&repo, &[("README", "main\n"), ("old.txt", "old\n")]);
    let other = commit(&repo, &[("README", "other\n")], &[main], "drop old");
    set_branch(&repo, "other", &other);
    write(temp.path(), "old.txt", "edited\n");

    let report = repo.checkout(&forced(), Some("other"), &[]).unwrap();

    assert_eq!(read(temp.path(), "old.txt"), "edited\n");
    assert_eq!(read(temp.path(), "README"), "other\n");
    assert!(report.removed.is_empty());
    assert_eq!(index_paths(&repo), vec!["README"]);
    assert_eq!(repo.head().unwrap(), Head::branch("other", other));
}

// CK-016: a path checkout without paths restores the whole tree
#[test]
fn test_checkout_files_without_paths() {
    let (temp, repo) = init_repo();
    checked_out(&repo, &[("README", "r\n"), ("dir/a.txt", "a\n")]);
    write(temp.path(), "README", "edited\n");
    fs::remove_file(temp.path().join("dir/a.txt")).unwrap();
    let tree = repo
        .resolve_revision("HEAD")
        .unwrap()
        .tree_id(&repo.objects())
        .unwrap();

    let report = repo
        .checkout_files(&CheckoutOptions::default(), &tree, &[])
        .unwrap();

    assert_eq!(report.written, vec!["README", "dir/a.txt"]);
    assert_eq!(read(temp.path(), "README"), "r\n");
    assert_eq!(read(temp.path(), "dir/a.txt"), "a\n");
}

// CK-017: a tree entry that climbs out of the working tree is refused
#[test]
fn test_escaping_tree_entry_refused() {
    let (temp, repo) = init_repo();
    let content = blob(&repo, b"outside\n");
    let escape = "../treesync-escape-check.txt";
    let tree = Tree::from_entries(vec![TreeEntry::new(FileMode::Regular, escape, content)]);
    let tree = repo
        .objects()
        .write(ObjectType::Tree, &tree.to_bytes())
        .unwrap();
    let evil = repo
        .objects()
        .write(
            ObjectType::Commit,
            format!(
                "tree {}\nauthor A <a@b> 0 +0000\ncommitter A <a@b> 0 +0000\n\nescape\n",
                tree
            )
            .as_bytes(),
        )
        .unwrap();

    let result = repo.checkout_commit(&forced(), &Revision::Commit(evil));

    assert!(matches!(result, Err(Error::CorruptObject { .. })));
    assert!(!temp.path().join(escape).exists());
    assert!(repo.read_index().unwrap().is_empty());
}
