// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    hyphen = { "python-3.11", "python@3.11" },
    colon = { "python:3.11", "python@3.11" },
    already_normal = { "python@3.11", "python@3.11" },
    // Only the FIRST separator is rewritten; the rest stay as written.
    later_hyphens_kept = { "python-3.11-debug", "python@3.11-debug" },
    no_separator = { "python", "python" },
)]
fn normalize_rewrites_first_separator(input: &str, expected: &str) {
    assert_eq!(normalize_runtime_name(input), expected);
}

#[test]
fn parse_name_version() {
    let rt = RuntimeRef::parse("python-3.11").unwrap();
    assert_eq!(rt.name, "python");
    assert_eq!(rt.version, "3.11");
    assert_eq!(rt.build, None);
    assert_eq!(rt.dir_name(), "python@3.11");
}

#[test]
fn parse_with_build() {
    let rt = RuntimeRef::parse("python@3.11@1.0.0").unwrap();
    assert_eq!(rt.build.as_deref(), Some("1.0.0"));
    assert_eq!(rt.to_string(), "python@3.11@1.0.0");
}

#[test]
fn parse_rejects_bare_name() {
    assert!(RuntimeRef::parse("python").is_none());
    assert!(RuntimeRef::parse("").is_none());
}
