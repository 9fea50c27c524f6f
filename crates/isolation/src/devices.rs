// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device nodes for the chroot's minimal `/dev`.

use joblet_platform::{fs, PlatformError};
use std::path::Path;
use tracing::warn;

/// NVIDIA character device major number.
const NVIDIA_MAJOR: u64 = 195;
/// Minor of `/dev/nvidiactl`.
const NVIDIACTL_MINOR: u64 = 255;
/// Fallback major/minor for `/dev/nvidia-uvm` when the host node is absent.
const NVIDIA_UVM_FALLBACK: (u64, u64) = (237, 0);

/// Baseline nodes every job gets: (name, major, minor).
const BASE_NODES: [(&str, u64, u64); 5] = [
    ("null", 1, 3),
    ("zero", 1, 5),
    ("random", 1, 8),
    ("urandom", 1, 9),
    ("tty", 5, 0),
];

/// Populate the minimal `/dev` under the chroot root.
pub fn create_base_nodes(dev_dir: &Path) -> Result<(), PlatformError> {
    fs::ensure_dir(dev_dir)?;
    for (name, major, minor) in BASE_NODES {
        fs::mknod_char(&dev_dir.join(name), major, minor, 0o666)?;
    }
    Ok(())
}

/// Create the NVIDIA nodes for the allocated GPU indices.
///
/// Major/minor numbers are taken from the host's own nodes so the numbers
/// match what the driver registered; known defaults cover absent nodes.
pub fn create_gpu_nodes(dev_dir: &Path, indices: &[u32]) -> Result<(), PlatformError> {
    for index in indices {
        let name = format!("nvidia{}", index);
        let (major, minor) = host_numbers(&name, (NVIDIA_MAJOR, *index as u64))?;
        fs::mknod_char(&dev_dir.join(&name), major, minor, 0o666)?;
    }

    let (major, minor) = host_numbers("nvidiactl", (NVIDIA_MAJOR, NVIDIACTL_MINOR))?;
    fs::mknod_char(&dev_dir.join("nvidiactl"), major, minor, 0o666)?;

    let (major, minor) = host_numbers("nvidia-uvm", NVIDIA_UVM_FALLBACK)?;
    fs::mknod_char(&dev_dir.join("nvidia-uvm"), major, minor, 0o666)?;

    Ok(())
}

fn host_numbers(name: &str, fallback: (u64, u64)) -> Result<(u64, u64), PlatformError> {
    let host_path = Path::new("/dev").join(name);
    match fs::device_numbers(&host_path)? {
        Some(numbers) => Ok(numbers),
        None => {
            warn!(device = name, "host node absent, using registered defaults");
            Ok(fallback)
        }
    }
}
