// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    plain = { "volumes/data", "volumes/data" },
    nested = { "volumes/a/b", "volumes/a/b" },
    curdir = { "./volumes/data", "volumes/data" },
    absolute_is_rerooted = { "/volumes/data", "volumes/data" },
)]
fn resolve_target_stays_under_root(target: &str, expected_suffix: &str) {
    let root = Path::new("/opt/joblet/jobs/j1");
    let resolved = FilesystemIsolator::resolve_target(root, Path::new(target)).unwrap();
    assert_eq!(resolved, root.join(expected_suffix));
}

#[yare::parameterized(
    parent = { "../escape" },
    nested_parent = { "volumes/../../escape" },
    deep = { "volumes/a/../../../etc" },
)]
fn resolve_target_rejects_traversal(target: &str) {
    let root = Path::new("/opt/joblet/jobs/j1");
    let err = FilesystemIsolator::resolve_target(root, Path::new(target)).unwrap_err();
    assert!(matches!(err, FilesystemError::TargetOutsideRoot(_)));
}

#[test]
fn root_path_is_per_job() {
    let isolator = FilesystemIsolator::new(
        &joblet_core::config::FilesystemConfig {
            base: PathBuf::from("/opt/joblet/jobs"),
            ..Default::default()
        },
        &joblet_core::config::RuntimesConfig::default(),
    );
    assert_eq!(
        isolator.root_path(&JobId::new("abc")),
        PathBuf::from("/opt/joblet/jobs/abc")
    );
}

#[test]
fn filesystem_volume_requires_host_path() {
    // Memory volumes carry no host path; filesystem volumes must.
    let volume = Volume::memory("scratch", 16);
    assert!(volume.host_path.is_none());

    let volume = Volume::filesystem("data", 100, PathBuf::from("/opt/joblet/volumes/data"));
    assert_eq!(
        volume.host_path.as_deref(),
        Some(Path::new("/opt/joblet/volumes/data"))
    );
}
