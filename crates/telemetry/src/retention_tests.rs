// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn touch(base: &Path, job: &str, name: &str) {
    let dir = base.join(job);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), "{}\n").unwrap();
}

fn now() -> DateTime<Utc> {
    // 2024-02-01 00:00:00 UTC
    DateTime::parse_from_rfc3339("2024-02-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

#[test]
fn stale_job_directories_are_removed() {
    let tmp = tempfile::tempdir().unwrap();
    touch(tmp.path(), "old-job", "20240101-120000.jsonl"); // 30 days old
    touch(tmp.path(), "fresh-job", "20240131-120000.jsonl"); // < 1 day old

    let removed = sweep_once(tmp.path(), 7, now()).unwrap();
    assert_eq!(removed, 1);
    assert!(!tmp.path().join("old-job").exists());
    assert!(tmp.path().join("fresh-job").exists());
}

#[test]
fn one_fresh_file_keeps_the_directory() {
    let tmp = tempfile::tempdir().unwrap();
    touch(tmp.path(), "job", "20240101-000000.jsonl");
    touch(tmp.path(), "job", "20240131-000000.jsonl.gz");

    let removed = sweep_once(tmp.path(), 7, now()).unwrap();
    assert_eq!(removed, 0);
    assert!(tmp.path().join("job").exists());
}

#[test]
fn boundary_age_is_kept() {
    let tmp = tempfile::tempdir().unwrap();
    // Exactly 7 days before `now`
    touch(tmp.path(), "job", "20240125-000000.jsonl");

    let removed = sweep_once(tmp.path(), 7, now()).unwrap();
    assert_eq!(removed, 0);
}

#[test]
fn missing_base_is_empty_sweep() {
    let tmp = tempfile::tempdir().unwrap();
    let removed = sweep_once(&tmp.path().join("nope"), 7, now()).unwrap();
    assert_eq!(removed, 0);
}

#[test]
fn stamp_parses_with_and_without_gz() {
    assert!(parse_stamp("20240101-120000.jsonl").is_some());
    assert!(parse_stamp("20240101-120000.jsonl.gz").is_some());
    assert!(parse_stamp("overflow.jsonl").is_none());
}
