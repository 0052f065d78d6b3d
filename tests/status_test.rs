//! Integration tests for working-tree classification.
//!
//! Test cases: LS-001 to LS-010

mod common;

use std::fs;

use common::{checked_out, init_repo, stage, write};
use treesync::{Error, FileMode, IndexEntry, Stage, StatusCode, StatusOptions};

fn codes(entries: &[treesync::StatusEntry]) -> Vec<(String, char)> {
    entries
        .iter()
        .map(|e| (e.path().to_string(), e.code().as_char()))
        .collect()
}

// LS-001: a removed working-tree file is reported once as R
#[test]
fn test_deleted_file_reported_once() {
    let (temp, repo) = init_repo();
    checked_out(&repo, &[("README", "readme\n"), ("src/x.c", "int x;\n")]);
    fs::remove_file(temp.path().join("src/x.c")).unwrap();

    let options = StatusOptions {
        deleted: true,
        ..StatusOptions::default()
    };
    let status = repo.list_status(&options, &[]).unwrap();

    assert_eq!(codes(&status), vec![("src/x.c".to_string(), 'R')]);
}

// LS-002: no mode flag means cached, with S for skip-worktree entries
#[test]
fn test_cached_is_default() {
    let (_temp, repo) = init_repo();
    stage(&repo, &[("b.txt", "b"), ("a.txt", "a")]);
    let mut index = repo.read_index().unwrap();
    index.find_mut("b.txt", Stage::Normal).unwrap().set_skip_worktree(true);
    repo.write_index(&index).unwrap();

    let status = repo.list_status(&StatusOptions::default(), &[]).unwrap();

    assert_eq!(
        codes(&status),
        vec![("a.txt".to_string(), 'H'), ("b.txt".to_string(), 'S')]
    );
}

// LS-003: content restored to its original bytes is not modified
#[test]
fn test_modified_compares_content() {
    let (temp, repo) = init_repo();
    checked_out(&repo, &[("file.txt", "original\n")]);
    let options = StatusOptions {
        modified: true,
        ..StatusOptions::default()
    };

    write(temp.path(), "file.txt", "edited\n");
    assert_eq!(
        codes(&repo.list_status(&options, &[]).unwrap()),
        vec![("file.txt".to_string(), 'C')]
    );

    write(temp.path(), "file.txt", "original\n");
    assert!(repo.list_status(&options, &[]).unwrap().is_empty());
}

// LS-004: missing files and directories count as modified
#[test]
fn test_modified_missing_and_directory() {
    let (temp, repo) = init_repo();
    checked_out(&repo, &[("gone.txt", "x"), ("dir.txt", "y")]);
    fs::remove_file(temp.path().join("gone.txt")).unwrap();
    fs::remove_file(temp.path().join("dir.txt")).unwrap();
    fs::create_dir(temp.path().join("dir.txt")).unwrap();

    let options = StatusOptions {
        modified: true,
        ..StatusOptions::default()
    };
    assert_eq!(
        codes(&repo.list_status(&options, &[]).unwrap()),
        vec![("dir.txt".to_string(), 'C'), ("gone.txt".to_string(), 'C')]
    );
}

// LS-005: a file where a directory should be is killed exactly once
#[test]
fn test_killed_reported_once() {
    let (temp, repo) = init_repo();
    stage(&repo, &[("a/b.txt", "b"), ("a/c.txt", "c")]);
    write(temp.path(), "a", "in the way");

    let options = StatusOptions {
        killed: true,
        ..StatusOptions::default()
    };
    let status = repo.list_status(&options, &[]).unwrap();

    assert_eq!(codes(&status), vec![("a".to_string(), 'K')]);
}

// LS-006: unmerged entries are reported per stage, in stage order
#[test]
fn test_unmerged_stages() {
    let (_temp, repo) = init_repo();
    let oid = common::blob(&repo, b"conflict");
    let mut index = repo.read_index().unwrap();
    for stage in [Stage::Theirs, Stage::Base, Stage::Ours] {
        index.upsert(IndexEntry::new("merge.txt", oid, FileMode::Regular, 8).with_stage(stage));
    }
    repo.write_index(&index).unwrap();

    let options = StatusOptions {
        unmerged: true,
        ..StatusOptions::default()
    };
    let status = repo.list_status(&options, &[]).unwrap();

    let stages: Vec<_> = status.iter().map(|e| (e.stage(), e.code())).collect();
    assert_eq!(
        stages,
        vec![
            (Stage::Base, StatusCode::Unmerged),
            (Stage::Ours, StatusCode::Unmerged),
            (Stage::Theirs, StatusCode::Unmerged),
        ]
    );
}

// LS-007: untracked files honour exclude patterns, last match wins
#[test]
fn test_others_with_excludes() {
    let (temp, repo) = init_repo();
    checked_out(&repo, &[("tracked.txt", "t")]);
    write(temp.path(), "debug.log", "");
    write(temp.path(), "keep.log", "");
    write(temp.path(), "notes.txt", "");
    write(temp.path(), "build/out.o", "");
    write(temp.path(), "sub/.gitignore", "*.tmp\n");
    write(temp.path(), "sub/scratch.tmp", "");
    write(temp.path(), "sub/kept.c", "");
    write(temp.path(), "scratch.tmp", "");

    let options = StatusOptions {
        others: true,
        exclude_standard: true,
        exclude_patterns: vec!["*.log".into(), "!keep.log".into(), "build/".into()],
        ..StatusOptions::default()
    };
    let paths: Vec<_> = repo
        .list_status(&options, &[])
        .unwrap()
        .into_iter()
        .map(|e| e.path().to_string())
        .collect();

    assert_eq!(
        paths,
        vec!["keep.log", "notes.txt", "scratch.tmp", "sub/.gitignore", "sub/kept.c"]
    );
}

// LS-008: directory view collapses wholly untracked directories
#[test]
fn test_others_directory_view() {
    let (temp, repo) = init_repo();
    checked_out(&repo, &[("src/lib.rs", "")]);
    write(temp.path(), "src/new.rs", "");
    write(temp.path(), "vendor/a/b.c", "");
    fs::create_dir_all(temp.path().join("empty")).unwrap();

    let options = StatusOptions {
        others: true,
        directory: true,
        no_empty_directory: true,
        ..StatusOptions::default()
    };
    let status = repo.list_status(&options, &[]).unwrap();

    assert_eq!(
        codes(&status),
        vec![("src/new.rs".to_string(), '?'), ("vendor/".to_string(), '?')]
    );
}

// LS-009: explicit paths filter every mode, relative to the current directory
#[test]
fn test_pathspec_filtering() {
    let (temp, repo) = init_repo();
    checked_out(
        &repo,
        &[("README", "r"), ("src/a.c", "a"), ("src/b.h", "b"), ("doc/x.md", "x")],
    );

    let status = repo
        .list_status(&StatusOptions::default(), &["src/*.c", "doc"])
        .unwrap();
    assert_eq!(
        codes(&status),
        vec![("doc/x.md".to_string(), 'H'), ("src/a.c".to_string(), 'H')]
    );

    let in_src = repo.clone().with_current_dir(temp.path().join("src")).unwrap();
    let status = in_src.list_status(&StatusOptions::default(), &[]).unwrap();
    assert_eq!(
        codes(&status),
        vec![("src/a.c".to_string(), 'H'), ("src/b.h".to_string(), 'H')]
    );
}

// LS-010: error_unmatch names the path that matched nothing
#[test]
fn test_error_unmatch() {
    let (_temp, repo) = init_repo();
    stage(&repo, &[("present.txt", "p")]);
    let options = StatusOptions {
        error_unmatch: true,
        ..StatusOptions::default()
    };

    assert_eq!(repo.list_status(&options, &["present.txt"]).unwrap().len(), 1);
    match repo.list_status(&options, &["present.txt", "absent.txt"]) {
        Err(Error::PathspecNotFound(path)) => assert_eq!(path, "absent.txt"),
        other => panic!("expected PathspecNotFound, got {:?}", other),
    }
}

// LS-011: output from several modes is sorted by path, then stage
#[test]
fn test_combined_modes_sorted() {
    let (temp, repo) = init_repo();
    checked_out(&repo, &[("b.txt", "b"), ("d.txt", "d")]);
    fs::remove_file(temp.path().join("d.txt")).unwrap();
    write(temp.path(), "a.txt", "new");
    write(temp.path(), "c.txt", "new");

    let options = StatusOptions {
        deleted: true,
        others: true,
        ..StatusOptions::default()
    };
    assert_eq!(
        codes(&repo.list_status(&options, &[]).unwrap()),
        vec![
            ("a.txt".to_string(), '?'),
            ("c.txt".to_string(), '?'),
            ("d.txt".to_string(), 'R'),
        ]
    );
}
