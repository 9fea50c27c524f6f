// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mount and unmount operations.

use crate::PlatformError;
use nix::mount::{mount, umount2, MntFlags, MsFlags};
use std::path::Path;
use tracing::debug;

/// Bind-mount `source` at `target`, optionally read-only.
///
/// Read-only binds need a second remount pass: the kernel ignores
/// `MS_RDONLY` on the initial `MS_BIND` call.
pub fn bind_mount(source: &Path, target: &Path, read_only: bool) -> Result<(), PlatformError> {
    let flags = MsFlags::MS_BIND | MsFlags::MS_REC;
    mount(Some(source), target, None::<&str>, flags, None::<&str>).map_err(|errno| {
        PlatformError::Mount {
            source_path: Some(source.to_path_buf()),
            target: target.to_path_buf(),
            errno,
        }
    })?;

    if read_only {
        let remount = flags | MsFlags::MS_REMOUNT | MsFlags::MS_RDONLY;
        mount(Some(source), target, None::<&str>, remount, None::<&str>).map_err(|errno| {
            PlatformError::Mount {
                source_path: Some(source.to_path_buf()),
                target: target.to_path_buf(),
                errno,
            }
        })?;
    }

    debug!(source = %source.display(), target = %target.display(), read_only, "bind mounted");
    Ok(())
}

/// Mount a fresh tmpfs of `size_bytes` at `target`.
pub fn mount_tmpfs(target: &Path, size_bytes: u64) -> Result<(), PlatformError> {
    let data = format!("size={}", size_bytes);
    mount(
        Some("tmpfs"),
        target,
        Some("tmpfs"),
        MsFlags::MS_NOSUID | MsFlags::MS_NODEV,
        Some(data.as_str()),
    )
    .map_err(|errno| PlatformError::Mount {
        source_path: None,
        target: target.to_path_buf(),
        errno,
    })?;

    debug!(target = %target.display(), size_bytes, "tmpfs mounted");
    Ok(())
}

/// Mount procfs read-only at `target` (the chroot's `/proc`).
pub fn mount_proc_readonly(target: &Path) -> Result<(), PlatformError> {
    mount(
        Some("proc"),
        target,
        Some("proc"),
        MsFlags::MS_RDONLY | MsFlags::MS_NOSUID | MsFlags::MS_NODEV | MsFlags::MS_NOEXEC,
        None::<&str>,
    )
    .map_err(|errno| PlatformError::Mount {
        source_path: None,
        target: target.to_path_buf(),
        errno,
    })
}

/// Unmount `target`, falling back to a lazy detach when busy.
pub fn unmount(target: &Path) -> Result<(), PlatformError> {
    match umount2(target, MntFlags::empty()) {
        Ok(()) => Ok(()),
        Err(nix::Error::EBUSY) => {
            debug!(target = %target.display(), "unmount busy, detaching lazily");
            umount2(target, MntFlags::MNT_DETACH).map_err(|errno| PlatformError::Unmount {
                target: target.to_path_buf(),
                errno,
            })
        }
        Err(nix::Error::EINVAL) => {
            // Not a mount point; nothing to do.
            Ok(())
        }
        Err(errno) => Err(PlatformError::Unmount {
            target: target.to_path_buf(),
            errno,
        }),
    }
}
