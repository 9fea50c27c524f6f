// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Volume definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Backing store for a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeKind {
    /// Persistent host directory, bind-mounted into jobs.
    Filesystem,
    /// Fresh tmpfs created at job start, sized by the quota.
    Memory,
}

/// A named filesystem resource mountable into jobs.
///
/// Lifecycle is independent of jobs; many jobs may mount the same volume,
/// but validation enforces at most one writer when a job declares
/// exclusive access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    pub kind: VolumeKind,
    /// Size quota in megabytes.
    pub size_mb: u64,
    /// Host directory for filesystem volumes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_path: Option<PathBuf>,
}

impl Volume {
    pub fn filesystem(name: impl Into<String>, size_mb: u64, host_path: PathBuf) -> Self {
        Self {
            name: name.into(),
            kind: VolumeKind::Filesystem,
            size_mb,
            host_path: Some(host_path),
        }
    }

    pub fn memory(name: impl Into<String>, size_mb: u64) -> Self {
        Self {
            name: name.into(),
            kind: VolumeKind::Memory,
            size_mb,
            host_path: None,
        }
    }
}
