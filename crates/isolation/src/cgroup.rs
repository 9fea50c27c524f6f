// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cgroup v2 manager: per-job cgroup creation, limit enforcement, teardown.
//!
//! Layout under the delegated base:
//!
//! ```text
//! <base>/joblet-main/          daemon process
//! <base>/job-<uuid>/           limit files (cpu.max, memory.max, …)
//! <base>/job-<uuid>/proc/      cgroup.procs holds the child PID
//! ```
//!
//! The `proc` subgroup exists to satisfy cgroup v2's no-internal-processes
//! rule: limits are written on the job directory while the process lives in
//! a leaf below it.

use joblet_core::config::CgroupConfig;
use joblet_core::{CpuCoreSet, JobId, ResourceLimits};
use joblet_platform::{fs, signal};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// `cpu.max` period is fixed; quota scales with the requested percent.
const CPU_PERIOD_USEC: u64 = 100_000;

#[derive(Debug, Error)]
pub enum CgroupError {
    #[error("cgroup path {0} escapes delegated base")]
    PathOutsideBase(PathBuf),
    #[error("cgroup for job {0} already exists")]
    AlreadyExists(JobId),
    #[error("{limit} limit not applied: {reason}")]
    LimitNotApplied { limit: &'static str, reason: String },
    #[error("limits requested but none could be enforced")]
    NoneEnforceable,
    #[error(transparent)]
    Platform(#[from] joblet_platform::PlatformError),
}

/// Creates, limits, and destroys per-job cgroups.
pub struct CgroupManager {
    base: PathBuf,
    controllers: Vec<String>,
    cleanup_grace: Duration,
    io_device: String,
}

impl CgroupManager {
    pub fn new(config: &CgroupConfig) -> Self {
        Self {
            base: config.base.clone(),
            controllers: config.controllers.clone(),
            cleanup_grace: Duration::from_secs(config.cleanup_timeout_secs),
            io_device: config.io_device.clone(),
        }
    }

    /// One-time (idempotent) setup.
    ///
    /// Moves the daemon into a `joblet-main` sibling subgroup so job
    /// subgroups become leaves, then enables the intersection of the
    /// configured controllers with what the kernel advertises.
    pub fn init(&self, daemon_pid: u32) -> Result<(), CgroupError> {
        fs::ensure_dir(&self.base)?;

        let main = self.base.join("joblet-main");
        fs::ensure_dir(&main)?;
        fs::write_file(&main.join("cgroup.procs"), &daemon_pid.to_string())?;

        let available = fs::read_file(&self.base.join("cgroup.controllers"))?;
        let tokens = enable_tokens(&available, &self.controllers);
        if !tokens.is_empty() {
            fs::write_file(&self.base.join("cgroup.subtree_control"), &tokens)?;
        }

        info!(base = %self.base.display(), controllers = %tokens, "cgroup manager initialised");
        Ok(())
    }

    /// The job's cgroup directory, guarded against escaping the base.
    pub fn job_path(&self, job_id: &JobId) -> Result<PathBuf, CgroupError> {
        let path = fs::clean_path(&self.base.join(format!("job-{}", job_id)));
        if !path.starts_with(&self.base)
            || path
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(CgroupError::PathOutsideBase(path));
        }
        Ok(path)
    }

    fn proc_path(&self, job_id: &JobId) -> Result<PathBuf, CgroupError> {
        Ok(self.job_path(job_id)?.join("proc"))
    }

    /// Create the job cgroup and apply the requested limits.
    ///
    /// All-or-nothing: a limit that cannot be applied destroys the
    /// partially-created cgroup. At most one process cgroup exists per job
    /// ID at any time.
    pub fn create(&self, job_id: &JobId, limits: &ResourceLimits) -> Result<PathBuf, CgroupError> {
        let path = self.job_path(job_id)?;
        if path.exists() {
            return Err(CgroupError::AlreadyExists(job_id.clone()));
        }

        fs::ensure_dir(&path.join("proc"))?;

        // Same controller set one level down so the proc leaf inherits.
        let tokens: String = self
            .controllers
            .iter()
            .map(|c| format!("+{}", c))
            .collect::<Vec<_>>()
            .join(" ");
        if let Err(e) = fs::write_file(&path.join("cgroup.subtree_control"), &tokens) {
            // Kernels reject enabling controllers unavailable on this level;
            // limits on the job dir still apply to the subtree.
            debug!(error = %e, "subtree_control on job cgroup not fully enabled");
        }

        match self.apply_limits(&path, limits) {
            Ok(applied) => {
                if limits.has_any() && applied == 0 {
                    let _ = fs::remove_dir(&path.join("proc"));
                    let _ = fs::remove_dir(&path);
                    return Err(CgroupError::NoneEnforceable);
                }
            }
            Err(e) => {
                let _ = fs::remove_dir(&path.join("proc"));
                let _ = fs::remove_dir(&path);
                return Err(e);
            }
        }

        debug!(job_id = %job_id, path = %path.display(), "cgroup created");
        Ok(path)
    }

    /// Apply limits; returns how many were written.
    fn apply_limits(&self, path: &Path, limits: &ResourceLimits) -> Result<usize, CgroupError> {
        let mut applied = 0;

        if limits.max_cpu > 0 {
            self.apply_cpu(path, limits.max_cpu)?;
            applied += 1;
        }
        if limits.max_memory > 0 {
            self.apply_memory(path, limits.max_memory)?;
            applied += 1;
        }
        if limits.max_io_bps > 0 {
            self.apply_io(path, limits.max_io_bps)?;
            applied += 1;
        }
        if let Some(cores) = &limits.cpu_cores {
            self.apply_cpuset(path, cores)?;
            applied += 1;
        }
        if !limits.gpu_indices.is_empty() {
            // cgroup v2 has no device controller; device isolation happens
            // via the chroot's /dev nodes. v1 hosts still get device allows.
            if self.apply_gpu_v1(path, &limits.gpu_indices)? {
                applied += 1;
            }
        }

        Ok(applied)
    }

    /// `cpu.max` = `quota period`, quota = percent × 1000. Falls back to
    /// `cpu.weight` (scaled 1–10000) where `cpu.max` is absent.
    fn apply_cpu(&self, path: &Path, percent: u32) -> Result<(), CgroupError> {
        let cpu_max = path.join("cpu.max");
        if cpu_max.exists() {
            let quota = percent as u64 * 1000;
            fs::write_file(&cpu_max, &format!("{} {}", quota, CPU_PERIOD_USEC)).map_err(|e| {
                CgroupError::LimitNotApplied {
                    limit: "cpu",
                    reason: e.to_string(),
                }
            })?;
            return Ok(());
        }

        let weight = (percent as u64 * 10_000 / 100).clamp(1, 10_000);
        fs::write_file(&path.join("cpu.weight"), &weight.to_string()).map_err(|e| {
            CgroupError::LimitNotApplied {
                limit: "cpu",
                reason: format!("cpu.max absent and cpu.weight failed: {}", e),
            }
        })
    }

    /// `memory.max` in bytes, with `memory.high` at 90% as the soft limit.
    fn apply_memory(&self, path: &Path, megabytes: u64) -> Result<(), CgroupError> {
        let bytes = megabytes * 1024 * 1024;
        fs::write_file(&path.join("memory.max"), &bytes.to_string()).map_err(|e| {
            CgroupError::LimitNotApplied {
                limit: "memory",
                reason: e.to_string(),
            }
        })?;

        let high = bytes * 9 / 10;
        if let Err(e) = fs::write_file(&path.join("memory.high"), &high.to_string()) {
            // Soft limit is advisory; the hard limit already applied.
            warn!(error = %e, "memory.high not applied");
        }
        Ok(())
    }

    /// `io.max` with `rbps`/`wbps` for the configured device. Two formats
    /// are attempted (combined line, then separate writes); the variant
    /// that succeeded is logged.
    fn apply_io(&self, path: &Path, bps: u64) -> Result<(), CgroupError> {
        let io_max = path.join("io.max");
        let combined = format!("{} rbps={} wbps={}", self.io_device, bps, bps);
        if fs::write_file(&io_max, &combined).is_ok() {
            debug!(device = %self.io_device, bps, format = "combined", "io.max applied");
            return Ok(());
        }

        let rbps = format!("{} rbps={}", self.io_device, bps);
        let wbps = format!("{} wbps={}", self.io_device, bps);
        fs::write_file(&io_max, &rbps)
            .and_then(|_| fs::write_file(&io_max, &wbps))
            .map_err(|e| CgroupError::LimitNotApplied {
                limit: "io",
                reason: e.to_string(),
            })?;
        debug!(device = %self.io_device, bps, format = "split", "io.max applied");
        Ok(())
    }

    /// `cpuset.cpus` from the core set; `cpuset.mems` pinned to node 0.
    fn apply_cpuset(&self, path: &Path, cores: &CpuCoreSet) -> Result<(), CgroupError> {
        fs::write_file(&path.join("cpuset.cpus"), cores.expr()).map_err(|e| {
            CgroupError::LimitNotApplied {
                limit: "cpuset",
                reason: e.to_string(),
            }
        })?;
        fs::write_file(&path.join("cpuset.mems"), "0").map_err(|e| {
            CgroupError::LimitNotApplied {
                limit: "cpuset",
                reason: e.to_string(),
            }
        })
    }

    /// Device allows for cgroup v1 hosts only (detected by `devices.allow`).
    ///
    /// Returns whether anything was written.
    fn apply_gpu_v1(&self, path: &Path, indices: &[u32]) -> Result<bool, CgroupError> {
        let allow = path.join("devices.allow");
        if !allow.exists() {
            return Ok(false);
        }
        for index in indices {
            fs::write_file(&allow, &format!("c 195:{} rwm", index)).map_err(|e| {
                CgroupError::LimitNotApplied {
                    limit: "gpu",
                    reason: e.to_string(),
                }
            })?;
        }
        // nvidiactl and nvidia-uvm
        for entry in ["c 195:255 rwm", "c 237:0 rwm"] {
            fs::write_file(&allow, entry).map_err(|e| CgroupError::LimitNotApplied {
                limit: "gpu",
                reason: e.to_string(),
            })?;
        }
        Ok(true)
    }

    /// Migrate a PID into the job's `proc` leaf.
    pub fn add_process(&self, job_id: &JobId, pid: u32) -> Result<(), CgroupError> {
        let procs = self.proc_path(job_id)?.join("cgroup.procs");
        fs::write_file(&procs, &pid.to_string())?;
        Ok(())
    }

    /// PIDs currently in the job's cgroup (both levels).
    pub fn procs(&self, job_id: &JobId) -> Result<Vec<u32>, CgroupError> {
        let mut pids = HashSet::new();
        for file in [
            self.job_path(job_id)?.join("cgroup.procs"),
            self.proc_path(job_id)?.join("cgroup.procs"),
        ] {
            if !file.exists() {
                continue;
            }
            for line in fs::read_file(&file)?.lines() {
                if let Ok(pid) = line.trim().parse::<u32>() {
                    pids.insert(pid);
                }
            }
        }
        let mut out: Vec<u32> = pids.into_iter().collect();
        out.sort_unstable();
        Ok(out)
    }

    /// Tear the job cgroup down: SIGTERM members, wait out the grace
    /// period, SIGKILL stragglers, then remove the directories.
    ///
    /// Errors are reported but the teardown continues; residual cgroups
    /// are reaped by the orphan scanner.
    pub async fn destroy(&self, job_id: &JobId) -> Result<(), CgroupError> {
        let path = self.job_path(job_id)?;
        if !path.exists() {
            return Ok(());
        }

        match self.procs(job_id) {
            Ok(pids) => {
                for pid in pids {
                    if let Err(e) = signal::terminate_with_grace(pid, self.cleanup_grace).await {
                        warn!(job_id = %job_id, pid, error = %e, "cgroup member refused to die");
                    }
                }
            }
            Err(e) => warn!(job_id = %job_id, error = %e, "could not read cgroup.procs"),
        }

        let mut last_err = None;
        if let Err(e) = fs::remove_dir(&path.join("proc")) {
            last_err = Some(e);
        }
        if let Err(e) = fs::remove_dir(&path) {
            last_err = Some(e);
        }
        match last_err {
            None => {
                debug!(job_id = %job_id, "cgroup removed");
                Ok(())
            }
            Some(e) => Err(e.into()),
        }
    }

    /// Job IDs with a cgroup directory on disk (for the orphan scanner).
    pub fn orphan_candidates(&self) -> Vec<String> {
        fs::list_subdirs(&self.base)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|name| name.strip_prefix("job-").map(str::to_string))
            .collect()
    }

    /// Decode `cpu.max` back into `(quota, period)` for verification.
    pub fn read_cpu_max(&self, job_id: &JobId) -> Result<Option<(u64, u64)>, CgroupError> {
        let path = self.job_path(job_id)?.join("cpu.max");
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_file(&path)?;
        let mut parts = raw.split_whitespace();
        let quota = parts.next().and_then(|s| s.parse().ok());
        let period = parts.next().and_then(|s| s.parse().ok());
        Ok(quota.zip(period))
    }
}

/// Intersect configured controllers with `cgroup.controllers` content and
/// build the `+name +name` token string for `cgroup.subtree_control`.
pub fn enable_tokens(available: &str, wanted: &[String]) -> String {
    let available: HashSet<&str> = available.split_whitespace().collect();
    wanted
        .iter()
        .filter(|c| available.contains(c.as_str()))
        .map(|c| format!("+{}", c))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[path = "cgroup_tests.rs"]
mod tests;
