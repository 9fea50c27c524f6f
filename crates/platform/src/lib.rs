// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! joblet-platform: Thin wrapper over the OS syscalls used by isolation code.
//!
//! Every mount, device-node, signal, and tree-removal call the daemon makes
//! goes through this crate, so the isolation and cleanup layers stay free
//! of raw `nix`/`libc` plumbing and tests can exercise their logic against
//! plain directories.

pub mod fs;
pub mod mount;
pub mod process;
pub mod signal;

use std::path::PathBuf;
use thiserror::Error;

/// Errors from platform operations. Paths are carried for log context.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("mount {source_path:?} -> {target:?}: {errno}")]
    Mount {
        source_path: Option<PathBuf>,
        target: PathBuf,
        errno: nix::Error,
    },
    #[error("unmount {target:?}: {errno}")]
    Unmount { target: PathBuf, errno: nix::Error },
    #[error("mknod {path:?}: {errno}")]
    Mknod { path: PathBuf, errno: nix::Error },
    #[error("signal {signal} to pid {pid}: {errno}")]
    Signal {
        pid: i32,
        signal: &'static str,
        errno: nix::Error,
    },
    #[error("{op} {path:?}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
