// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Isolation launcher: forks the job child into its namespaces.
//!
//! Namespace baseline is PID + Mount + IPC + UTS; the network namespace is
//! added for every job except runtime builds (which need host networking
//! for package downloads). No user namespace is used.
//!
//! The fork sequence runs in `pre_exec`, between `fork` and `execve`:
//! join the new process group, self-attach to the job cgroup, unshare the
//! namespace set, make mounts private, set the hostname, then pivot into
//! the prepared chroot. Any failure before `execve` travels back to the
//! parent over the close-on-exec status pipe that `std::process` maintains,
//! tagged so the runtime can distinguish isolation failures from exec
//! failures.

use joblet_core::JobId;
use nix::sched::CloneFlags;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tracing::{debug, info};

/// Marker prefixed to errors raised before the namespace/chroot work is
/// complete, so spawn failures can be classified.
const ISOLATION_TAG: &str = "isolation: ";

#[derive(Debug, Error)]
pub enum LaunchError {
    /// chroot/namespace/mount failed before exec.
    #[error("isolation failed: {0}")]
    Isolation(String),
    /// `execve` itself failed (command missing, not executable).
    #[error("exec failed: {0}")]
    Exec(String),
}

/// Everything needed to fork one job child.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub job_id: JobId,
    pub command: String,
    pub args: Vec<String>,
    /// Full child environment (regular and secret env merged by the caller).
    pub env: Vec<(String, String)>,
    pub hostname: String,
    /// Prepared chroot root.
    pub root: PathBuf,
    /// `proc/cgroup.procs` file the child writes itself into before unshare.
    pub cgroup_procs: Option<PathBuf>,
    /// False for runtime-build jobs (no CLONE_NEWNET).
    pub network_namespace: bool,
}

/// A launched child with its host PID.
pub struct SpawnedJob {
    pub pid: u32,
    pub child: tokio::process::Child,
}

/// Assembles namespace flags and process attributes and forks job children.
#[derive(Debug, Clone, Copy, Default)]
pub struct Launcher;

impl Launcher {
    pub fn new() -> Self {
        Self
    }

    /// The namespace set for a job.
    pub fn namespace_flags(network_namespace: bool) -> CloneFlags {
        let mut flags = CloneFlags::CLONE_NEWPID
            | CloneFlags::CLONE_NEWNS
            | CloneFlags::CLONE_NEWIPC
            | CloneFlags::CLONE_NEWUTS;
        if network_namespace {
            flags |= CloneFlags::CLONE_NEWNET;
        }
        flags
    }

    /// Fork the child into its sandbox and exec the command.
    ///
    /// stdout/stderr are piped back to the supervisor's log pumps; stdin is
    /// closed.
    #[allow(unsafe_code)]
    pub fn spawn(&self, spec: LaunchSpec) -> Result<SpawnedJob, LaunchError> {
        let flags = Self::namespace_flags(spec.network_namespace);
        debug!(
            job_id = %spec.job_id,
            command = %spec.command,
            ?flags,
            root = %spec.root.display(),
            "launching job child"
        );

        let mut cmd = std::process::Command::new(&spec.command);
        cmd.args(&spec.args)
            .env_clear()
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let hostname = spec.hostname.clone();
        let root = spec.root.clone();
        let cgroup_procs = spec.cgroup_procs.clone();

        // pre_exec runs in the child between fork and exec.
        // SAFETY: only async-signal-safe work plus writes to /sys and
        // /proc-style control files, which is the established pattern for
        // post-fork namespace setup on Linux.
        unsafe {
            cmd.pre_exec(move || {
                use nix::sched::unshare;
                use nix::unistd::{chdir, chroot, setpgid, sethostname, Pid};

                // New process group so signals target the whole job.
                setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(|e| isolation_err(format!("setpgid: {}", e)))?;

                // Self-attach to the job cgroup before unsharing; after the
                // chroot the cgroupfs path is gone.
                if let Some(procs) = &cgroup_procs {
                    std::fs::write(procs, std::process::id().to_string())
                        .map_err(|e| isolation_err(format!("cgroup attach: {}", e)))?;
                }

                unshare(flags).map_err(|e| isolation_err(format!("unshare({:?}): {}", flags, e)))?;

                // Stop mount events propagating back to the host.
                nix::mount::mount(
                    None::<&str>,
                    "/",
                    None::<&str>,
                    nix::mount::MsFlags::MS_REC | nix::mount::MsFlags::MS_PRIVATE,
                    None::<&str>,
                )
                .map_err(|e| isolation_err(format!("make-private: {}", e)))?;

                sethostname(&hostname)
                    .map_err(|e| isolation_err(format!("sethostname: {}", e)))?;

                chroot(&root).map_err(|e| isolation_err(format!("chroot: {}", e)))?;
                chdir("/").map_err(|e| isolation_err(format!("chdir: {}", e)))?;

                Ok(())
            });
        }

        let mut tokio_cmd = tokio::process::Command::from(cmd);
        let child = tokio_cmd.spawn().map_err(|e| classify_spawn_error(&e))?;

        let pid = child
            .id()
            .ok_or_else(|| LaunchError::Exec("child exited before pid observation".to_string()))?;

        info!(job_id = %spec.job_id, pid, "job child launched");
        Ok(SpawnedJob { pid, child })
    }
}

fn isolation_err(message: String) -> io::Error {
    io::Error::other(format!("{}{}", ISOLATION_TAG, message))
}

/// Failures tagged by `pre_exec` are isolation failures; everything else
/// (ENOENT, EACCES from `execve`) is an exec failure.
fn classify_spawn_error(error: &io::Error) -> LaunchError {
    let text = error.to_string();
    if let Some(stripped) = text.split(ISOLATION_TAG).nth(1) {
        LaunchError::Isolation(stripped.to_string())
    } else {
        LaunchError::Exec(text)
    }
}

#[cfg(test)]
#[path = "launcher_tests.rs"]
mod tests;
