// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem helpers: directory trees, device nodes, small control files.

use crate::PlatformError;
use nix::sys::stat::{makedev, mknod, Mode, SFlag};
use std::path::{Path, PathBuf};

fn io_err(op: &'static str, path: &Path, source: std::io::Error) -> PlatformError {
    PlatformError::Io {
        op,
        path: path.to_path_buf(),
        source,
    }
}

/// Create a directory and all parents.
pub fn ensure_dir(path: &Path) -> Result<(), PlatformError> {
    std::fs::create_dir_all(path).map_err(|e| io_err("mkdir", path, e))
}

/// Remove a directory tree; missing trees are fine.
pub fn remove_tree(path: &Path) -> Result<(), PlatformError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err("rmtree", path, e)),
    }
}

/// Remove a single (empty) directory; missing is fine.
pub fn remove_dir(path: &Path) -> Result<(), PlatformError> {
    match std::fs::remove_dir(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err("rmdir", path, e)),
    }
}

/// Write a small control file (cgroup controller files and the like).
pub fn write_file(path: &Path, contents: &str) -> Result<(), PlatformError> {
    std::fs::write(path, contents).map_err(|e| io_err("write", path, e))
}

/// Read a small control file to a string.
pub fn read_file(path: &Path) -> Result<String, PlatformError> {
    std::fs::read_to_string(path).map_err(|e| io_err("read", path, e))
}

/// List immediate subdirectory names of `base`. A missing base is an empty
/// listing (the orphan scanner runs before first job creation).
pub fn list_subdirs(base: &Path) -> Result<Vec<String>, PlatformError> {
    let mut names = Vec::new();
    let entries = match std::fs::read_dir(base) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(e) => return Err(io_err("readdir", base, e)),
    };
    for entry in entries {
        let entry = entry.map_err(|e| io_err("readdir", base, e))?;
        let is_dir = entry
            .file_type()
            .map_err(|e| io_err("stat", &entry.path(), e))?
            .is_dir();
        if is_dir {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}

/// Create a character device node with the given major/minor numbers.
pub fn mknod_char(path: &Path, major: u64, minor: u64, mode: u32) -> Result<(), PlatformError> {
    let dev = makedev(major, minor);
    match mknod(path, SFlag::S_IFCHR, Mode::from_bits_truncate(mode), dev) {
        Ok(()) => Ok(()),
        // Already present from a previous attempt
        Err(nix::Error::EEXIST) => Ok(()),
        Err(errno) => Err(PlatformError::Mknod {
            path: path.to_path_buf(),
            errno,
        }),
    }
}

/// Stat a host device node, returning its (major, minor), or `None` when
/// the node does not exist.
pub fn device_numbers(path: &Path) -> Result<Option<(u64, u64)>, PlatformError> {
    use std::os::unix::fs::MetadataExt;
    match std::fs::metadata(path) {
        Ok(meta) => {
            let rdev = meta.rdev();
            Ok(Some((
                nix::sys::stat::major(rdev),
                nix::sys::stat::minor(rdev),
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err("stat", path, e)),
    }
}

/// Resolve a path lexically: collapse `.` segments and reject nothing.
///
/// Unlike `canonicalize` this does not touch the filesystem, so it works
/// for paths that do not exist yet. `..` segments are preserved; callers
/// guarding against traversal must reject them explicitly.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
