// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn ensure_and_remove_tree() {
    let tmp = tempfile::tempdir().unwrap();
    let nested = tmp.path().join("a/b/c");

    ensure_dir(&nested).unwrap();
    assert!(nested.is_dir());

    remove_tree(&tmp.path().join("a")).unwrap();
    assert!(!tmp.path().join("a").exists());

    // Removing again is a no-op
    remove_tree(&tmp.path().join("a")).unwrap();
}

#[test]
fn write_and_read_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("cpu.max");

    write_file(&path, "50000 100000").unwrap();
    assert_eq!(read_file(&path).unwrap(), "50000 100000");
}

#[test]
fn list_subdirs_skips_files_and_missing_base() {
    let tmp = tempfile::tempdir().unwrap();
    ensure_dir(&tmp.path().join("job-1")).unwrap();
    ensure_dir(&tmp.path().join("job-2")).unwrap();
    write_file(&tmp.path().join("stray.txt"), "x").unwrap();

    let mut names = list_subdirs(tmp.path()).unwrap();
    names.sort();
    assert_eq!(names, vec!["job-1", "job-2"]);

    assert!(list_subdirs(&tmp.path().join("missing")).unwrap().is_empty());
}

#[test]
fn clean_path_collapses_curdir_only() {
    assert_eq!(
        clean_path(Path::new("/base/./jobs/x")),
        PathBuf::from("/base/jobs/x")
    );
    // `..` survives so traversal guards can see it
    assert_eq!(
        clean_path(Path::new("/base/../etc")),
        PathBuf::from("/base/../etc")
    );
}
