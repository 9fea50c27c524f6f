// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chroot tree builder.
//!
//! Produces the per-job root under `<filesystem.base>/<uuid>`:
//!
//! ```text
//! bin/ usr/ lib/ lib64/    read-only binds of the host minimal root
//! etc/                     copied minima (passwd, group, hosts, resolv.conf)
//! proc/                    read-only procfs
//! dev/                     minimal device nodes (plus GPU nodes if allocated)
//! tmp/ work/               1 MiB tmpfs work dir when no volumes are mounted
//! volumes/<name>/          requested volume mounts
//! pipes/                   stdout/stderr plumbing directory
//! ```
//!
//! Runtime-build jobs instead get the whole host root bound read-write with
//! `/opt/joblet` masked out, because the build's products under
//! `/opt/joblet/runtimes` must be written through the real tree.

use crate::devices;
use joblet_core::config::{FilesystemConfig, RuntimesConfig};
use joblet_core::{JobId, Volume, VolumeKind};
use joblet_platform::{fs, mount};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Size of the scratch tmpfs mounted at `/work` for volume-less jobs.
const WORK_TMPFS_BYTES: u64 = 1024 * 1024;

/// Host directories bound read-only into every standard job root.
const MINIMAL_ROOT_DIRS: [&str; 4] = ["bin", "usr", "lib", "lib64"];

/// `/etc` files copied (not bound) so jobs can't observe host changes.
const ETC_MINIMA: [&str; 4] = ["passwd", "group", "hosts", "resolv.conf"];

#[derive(Debug, Error)]
pub enum FilesystemError {
    #[error("mount target {0} escapes job root")]
    TargetOutsideRoot(PathBuf),
    #[error("volume {0} has no host path")]
    VolumeWithoutHostPath(String),
    #[error(transparent)]
    Platform(#[from] joblet_platform::PlatformError),
}

/// A built chroot tree plus its mounts in mount order.
///
/// Owned by the isolator until cleanup; teardown unmounts in reverse order
/// before removing the tree.
#[derive(Debug)]
pub struct JobRoot {
    pub job_id: JobId,
    pub root: PathBuf,
    /// Absolute mounted paths, in the order they were mounted.
    pub mounts: Vec<PathBuf>,
    /// Runtime-build roots are preserved on teardown.
    pub runtime_build: bool,
}

impl JobRoot {
    /// The pipes directory for stdout/stderr plumbing.
    pub fn pipes_dir(&self) -> PathBuf {
        self.root.join("pipes")
    }
}

/// Builds and tears down per-job chroot trees.
pub struct FilesystemIsolator {
    base: PathBuf,
    runtimes_base: PathBuf,
}

impl FilesystemIsolator {
    pub fn new(config: &FilesystemConfig, runtimes: &RuntimesConfig) -> Self {
        Self {
            base: config.base.clone(),
            runtimes_base: runtimes.base_path.clone(),
        }
    }

    /// Root directory for a job.
    pub fn root_path(&self, job_id: &JobId) -> PathBuf {
        self.base.join(job_id.as_str())
    }

    /// Resolve a mount target inside the root, rejecting traversal.
    ///
    /// The target is cleaned and joined under the root; any `..` segment or
    /// resolution outside the root rejects the mount.
    pub fn resolve_target(root: &Path, target: &Path) -> Result<PathBuf, FilesystemError> {
        if target.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(FilesystemError::TargetOutsideRoot(target.to_path_buf()));
        }
        let relative: PathBuf = target
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();
        let resolved = fs::clean_path(&root.join(relative));
        if !resolved.starts_with(root) {
            return Err(FilesystemError::TargetOutsideRoot(target.to_path_buf()));
        }
        Ok(resolved)
    }

    /// Build a standard job root.
    pub fn build(
        &self,
        job_id: &JobId,
        volumes: &[Volume],
        runtime_dir: Option<&str>,
        gpu_indices: &[u32],
    ) -> Result<JobRoot, FilesystemError> {
        let root = self.root_path(job_id);
        let mut mounts = Vec::new();

        for dir in ["etc", "proc", "dev", "tmp", "work", "volumes", "pipes"] {
            fs::ensure_dir(&root.join(dir))?;
        }

        // Host minimal root, read-only
        for dir in MINIMAL_ROOT_DIRS {
            let source = Path::new("/").join(dir);
            if !source.exists() {
                continue;
            }
            let target = root.join(dir);
            fs::ensure_dir(&target)?;
            mount::bind_mount(&source, &target, true)?;
            mounts.push(target);
        }

        self.copy_etc_minima(&root)?;

        let proc_target = root.join("proc");
        mount::mount_proc_readonly(&proc_target)?;
        mounts.push(proc_target);

        devices::create_base_nodes(&root.join("dev"))?;
        if !gpu_indices.is_empty() {
            devices::create_gpu_nodes(&root.join("dev"), gpu_indices)?;
        }

        if volumes.is_empty() {
            let work = root.join("work");
            mount::mount_tmpfs(&work, WORK_TMPFS_BYTES)?;
            mounts.push(work);
        } else {
            for volume in volumes {
                let target =
                    Self::resolve_target(&root, &Path::new("volumes").join(&volume.name))?;
                fs::ensure_dir(&target)?;
                match volume.kind {
                    VolumeKind::Filesystem => {
                        let source = volume
                            .host_path
                            .as_ref()
                            .ok_or_else(|| {
                                FilesystemError::VolumeWithoutHostPath(volume.name.clone())
                            })?;
                        mount::bind_mount(source, &target, false)?;
                    }
                    VolumeKind::Memory => {
                        mount::mount_tmpfs(&target, volume.size_mb * 1024 * 1024)?;
                    }
                }
                mounts.push(target);
            }
        }

        if let Some(dir_name) = runtime_dir {
            let source = self.runtimes_base.join(dir_name);
            let target = Self::resolve_target(&root, Path::new("runtime"))?;
            fs::ensure_dir(&target)?;
            mount::bind_mount(&source, &target, true)?;
            mounts.push(target);
        }

        debug!(job_id = %job_id, root = %root.display(), mounts = mounts.len(), "job root built");
        Ok(JobRoot {
            job_id: job_id.clone(),
            root,
            mounts,
            runtime_build: false,
        })
    }

    /// Build a runtime-build root: the whole host bound read-write with
    /// `/opt/joblet` masked by an empty tmpfs.
    pub fn build_runtime_root(&self, job_id: &JobId) -> Result<JobRoot, FilesystemError> {
        let root = self.root_path(job_id);
        fs::ensure_dir(&root)?;
        let mut mounts = Vec::new();

        mount::bind_mount(Path::new("/"), &root, false)?;
        mounts.push(root.clone());

        let mask = root.join("opt/joblet");
        if mask.exists() {
            mount::mount_tmpfs(&mask, WORK_TMPFS_BYTES)?;
            mounts.push(mask);
        }

        fs::ensure_dir(&root.join("pipes"))?;

        debug!(job_id = %job_id, root = %root.display(), "runtime-build root built");
        Ok(JobRoot {
            job_id: job_id.clone(),
            root,
            mounts,
            runtime_build: true,
        })
    }

    /// Job IDs with a chroot tree on disk (for the orphan scanner).
    pub fn orphan_candidates(&self) -> Vec<String> {
        fs::list_subdirs(&self.base).unwrap_or_default()
    }

    /// Reconstruct a `JobRoot` for an orphaned tree found on disk, listing
    /// the mount points a standard build would have created so teardown
    /// can unmount them before removal.
    pub fn orphan_root(&self, job_id: &JobId) -> JobRoot {
        let root = self.root_path(job_id);
        let mut mounts = Vec::new();
        for dir in MINIMAL_ROOT_DIRS {
            mounts.push(root.join(dir));
        }
        mounts.push(root.join("proc"));
        mounts.push(root.join("work"));
        if let Ok(volumes) = fs::list_subdirs(&root.join("volumes")) {
            for name in volumes {
                mounts.push(root.join("volumes").join(name));
            }
        }
        mounts.push(root.join("runtime"));
        JobRoot {
            job_id: job_id.clone(),
            root,
            mounts,
            runtime_build: false,
        }
    }

    fn copy_etc_minima(&self, root: &Path) -> Result<(), FilesystemError> {
        for name in ETC_MINIMA {
            let source = Path::new("/etc").join(name);
            if !source.exists() {
                continue;
            }
            let target = root.join("etc").join(name);
            if let Err(e) = std::fs::copy(&source, &target) {
                warn!(file = name, error = %e, "etc minima copy failed");
            }
        }
        Ok(())
    }

    /// Unmount everything in reverse order, then remove the tree.
    ///
    /// Runtime-build roots keep their tree (the build products live under
    /// the real `/opt/joblet/runtimes` through the bind); only the binds
    /// and the root directory itself go.
    pub fn teardown(&self, job_root: &JobRoot) -> Result<(), FilesystemError> {
        let mut last_err = None;
        for target in job_root.mounts.iter().rev() {
            if let Err(e) = mount::unmount(target) {
                warn!(target = %target.display(), error = %e, "unmount failed");
                last_err = Some(e);
            }
        }

        if job_root.runtime_build {
            // The build's products were written through the host bind and
            // must survive; only the (now empty) mount point goes.
            let _ = fs::remove_dir(&job_root.root);
        } else if let Err(e) = fs::remove_tree(&job_root.root) {
            warn!(root = %job_root.root.display(), error = %e, "root removal failed");
            last_err = Some(e);
        }

        match last_err {
            None => Ok(()),
            Some(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "filesystem_tests.rs"]
mod tests;
