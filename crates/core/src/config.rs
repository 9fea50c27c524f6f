// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed daemon configuration.
//!
//! The file is YAML, discovered at `/etc/joblet/joblet.yaml` or
//! `./joblet.yaml`, overridable with `JOBLET_CONFIG`. Every section has
//! serde defaults so a missing section means "defaults", and unit tests can
//! construct configs field-by-field.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that overrides config file discovery.
pub const CONFIG_ENV: &str = "JOBLET_CONFIG";

/// Conventional config file locations, checked in order.
pub const CONFIG_PATHS: [&str; 2] = ["/etc/joblet/joblet.yaml", "joblet.yaml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("config parse: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Cgroup section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CgroupConfig {
    /// Delegated cgroup v2 base the daemon may write under.
    pub base: PathBuf,
    /// Controllers to enable where available.
    pub controllers: Vec<String>,
    /// Grace period between SIGTERM and SIGKILL during teardown, seconds.
    pub cleanup_timeout_secs: u64,
    /// Device MAJOR:MINOR used for io.max writes.
    pub io_device: String,
}

impl Default for CgroupConfig {
    fn default() -> Self {
        Self {
            base: PathBuf::from("/sys/fs/cgroup/joblet.slice/joblet.service"),
            controllers: ["cpu", "memory", "io", "pids", "cpuset"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            cleanup_timeout_secs: 5,
            io_device: "8:0".to_string(),
        }
    }
}

/// Filesystem section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesystemConfig {
    /// Per-job chroot trees live under `<base>/<uuid>`.
    pub base: PathBuf,
    /// Per-job tmp expansion directory.
    pub tmp_dir: PathBuf,
    /// Per-job workspace directory.
    pub workspace_dir: PathBuf,
    /// Host paths that may be bind-mounted into jobs.
    pub allowed_mounts: Vec<PathBuf>,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            base: PathBuf::from("/opt/joblet/jobs"),
            tmp_dir: PathBuf::from("/opt/joblet/tmp"),
            workspace_dir: PathBuf::from("/opt/joblet/work"),
            allowed_mounts: vec![PathBuf::from("/opt/joblet/volumes")],
        }
    }
}

/// Bounds for one limit dimension; 0 means "no bound on this side".
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitBounds {
    pub min: u64,
    pub max: u64,
}

/// Job admission section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobletConfig {
    pub max_concurrent_jobs: usize,
    pub cpu_percent: LimitBounds,
    pub memory_mb: LimitBounds,
    pub io_bps: LimitBounds,
    /// Scheduled jobs: minimum seconds in the future.
    pub min_schedule_advance_secs: u64,
    /// Scheduled jobs: maximum seconds in the future.
    pub max_schedule_advance_secs: u64,
    /// Cap on outstanding scheduled jobs.
    pub max_scheduled_jobs: usize,
    /// Command base names that are always rejected.
    pub command_blocklist: Vec<String>,
    /// When non-empty, non-absolute commands must appear here.
    pub command_allowlist: Vec<String>,
}

impl Default for JobletConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 32,
            cpu_percent: LimitBounds { min: 0, max: 0 },
            memory_mb: LimitBounds { min: 0, max: 0 },
            io_bps: LimitBounds { min: 0, max: 0 },
            min_schedule_advance_secs: 10,
            max_schedule_advance_secs: 365 * 24 * 3600,
            max_scheduled_jobs: 1000,
            command_blocklist: ["shutdown", "reboot", "halt", "mkfs", "dd"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            command_allowlist: Vec::new(),
        }
    }
}

/// How a full telemetry queue treats new records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowStrategy {
    /// Drop the newest record and count it (metrics tolerate sampled loss).
    Sample,
    /// Block the producer until space frees up.
    Block,
    /// Compress queued records in place before dropping anything.
    Compress,
    /// Spill overflow to a side file.
    Spill,
}

/// Shared shape of the log and metrics pipeline sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Per-job on-disk history base directory.
    pub base: PathBuf,
    /// Bounded producer queue length.
    pub queue_size: usize,
    /// Batch size threshold for the disk writer.
    pub batch_size: usize,
    /// Flush interval in seconds, whichever fires first.
    pub flush_interval_secs: u64,
    /// Recent-history ring capacity per job.
    pub recent_capacity: usize,
    /// gzip history files instead of plain JSONL.
    pub compress: bool,
    pub overflow: OverflowStrategy,
    /// Job directories with no file newer than this are swept.
    pub retention_days: u32,
}

impl BufferConfig {
    fn defaults(base: &str) -> Self {
        Self {
            base: PathBuf::from(base),
            queue_size: 1000,
            batch_size: 100,
            flush_interval_secs: 5,
            recent_capacity: 100,
            compress: false,
            overflow: OverflowStrategy::Sample,
            retention_days: 7,
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self::defaults("/opt/joblet/metrics")
    }
}

/// Network section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    pub enabled: bool,
    pub default_network: String,
    /// User-defined networks: name → definition.
    pub networks: HashMap<String, NetworkDef>,
    /// Cap on user-defined networks.
    pub max_custom_networks: usize,
    /// CIDR of the built-in `bridge` network.
    pub bridge_cidr: String,
}

/// One user-defined network entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkDef {
    pub cidr: String,
    #[serde(default)]
    pub bridge: String,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            enabled: true,
            default_network: "bridge".to_string(),
            networks: HashMap::new(),
            max_custom_networks: 16,
            bridge_cidr: "172.20.0.0/16".to_string(),
        }
    }
}

/// Volumes section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumesConfig {
    pub base_path: PathBuf,
    pub default_quota_mb: u64,
}

impl Default for VolumesConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("/opt/joblet/volumes"),
            default_quota_mb: 1024,
        }
    }
}

/// Runtimes section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimesConfig {
    pub base_path: PathBuf,
    /// Host paths bind-mounted into every runtime job.
    pub common_paths: Vec<PathBuf>,
}

impl Default for RuntimesConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("/opt/joblet/runtimes"),
            common_paths: Vec::new(),
        }
    }
}

/// GPU section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    pub enabled: bool,
    /// Host CUDA library paths mounted into GPU jobs.
    pub cuda_paths: Vec<PathBuf>,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cuda_paths: vec![PathBuf::from("/usr/local/cuda")],
        }
    }
}

/// State-subprocess IPC section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub socket_path: PathBuf,
    pub pool_size: usize,
    pub request_timeout_secs: u64,
    pub batch_queue_size: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/run/joblet/state.sock"),
            pool_size: 10,
            request_timeout_secs: 5,
            batch_queue_size: 10_000,
        }
    }
}

fn default_logs_buffer() -> BufferConfig {
    BufferConfig::defaults("/opt/joblet/logs")
}

fn default_metrics_interval() -> u64 {
    5
}

fn default_orphan_scan_interval() -> u64 {
    60
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cgroup: CgroupConfig,
    pub filesystem: FilesystemConfig,
    pub joblet: JobletConfig,
    #[serde(default = "default_logs_buffer")]
    pub logs: BufferConfig,
    pub metrics: BufferConfig,
    pub network: NetworkSection,
    pub volumes: VolumesConfig,
    pub runtimes: RuntimesConfig,
    pub gpu: GpuConfig,
    pub state: StateConfig,
    /// Metrics collector tick, seconds.
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
    /// Orphan scanner interval, seconds.
    #[serde(default = "default_orphan_scan_interval")]
    pub orphan_scan_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cgroup: CgroupConfig::default(),
            filesystem: FilesystemConfig::default(),
            joblet: JobletConfig::default(),
            logs: default_logs_buffer(),
            metrics: BufferConfig::default(),
            network: NetworkSection::default(),
            volumes: VolumesConfig::default(),
            runtimes: RuntimesConfig::default(),
            gpu: GpuConfig::default(),
            state: StateConfig::default(),
            metrics_interval_secs: default_metrics_interval(),
            orphan_scan_interval_secs: default_orphan_scan_interval(),
        }
    }
}

impl Config {
    /// Parse a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    /// Discover and load, falling back to defaults when no file exists.
    pub fn discover() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }
        for candidate in CONFIG_PATHS {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load(path);
            }
        }
        Ok(Config::default())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
