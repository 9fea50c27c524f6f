// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Metrics sample schema.
//!
//! One `MetricsSample` is produced per collector tick and written as a
//! single JSONL line. Cumulative counters are recorded raw; per-second
//! rates are derived from deltas between consecutive samples, so the first
//! sample of a job always reports zero rates.

use crate::job::JobId;
use crate::limits::ResourceLimits;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// PSI averages for one of the `some`/`full` lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PsiAverages {
    pub avg10: f64,
    pub avg60: f64,
    pub avg300: f64,
    /// Cumulative stall time in microseconds.
    pub total: u64,
}

/// Pressure Stall Information from a `*.pressure` file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PsiStats {
    pub some: PsiAverages,
    /// Absent for `cpu.pressure` on kernels without the `full` line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full: Option<PsiAverages>,
}

/// CPU subrecord from `cpu.stat` and `cpu.pressure`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuMetrics {
    pub usage_usec: u64,
    pub user_usec: u64,
    pub system_usec: u64,
    pub nr_periods: u64,
    pub nr_throttled: u64,
    pub throttled_usec: u64,
    /// Derived: CPU usage over the sample interval, percent of one core.
    pub usage_percent: f64,
    /// Derived: share of periods throttled over the interval, percent.
    pub throttle_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<PsiStats>,
}

/// Memory subrecord from `memory.current`, `memory.max`, `memory.stat`,
/// `memory.events`, and `memory.pressure`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub current_bytes: u64,
    /// 0 when `memory.max` is `max` (unlimited).
    pub limit_bytes: u64,
    pub anon: u64,
    pub file: u64,
    pub kernel_stack: u64,
    pub slab: u64,
    pub sock: u64,
    pub shmem: u64,
    pub file_mapped: u64,
    pub file_dirty: u64,
    pub file_writeback: u64,
    pub pgfault: u64,
    pub pgmajfault: u64,
    pub oom_events: u64,
    pub oom_kills: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<PsiStats>,
}

/// Per-device counters from one `io.stat` line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IoDeviceStats {
    pub major: u32,
    pub minor: u32,
    pub rbytes: u64,
    pub wbytes: u64,
    pub rios: u64,
    pub wios: u64,
    pub dbytes: u64,
    pub dios: u64,
}

/// IO subrecord from `io.stat` and `io.pressure`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IoMetrics {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<IoDeviceStats>,
    /// Derived rates summed across devices.
    pub read_bps: f64,
    pub write_bps: f64,
    pub read_iops: f64,
    pub write_iops: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<PsiStats>,
}

/// Process subrecord from the `pids` controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessMetrics {
    pub pids_current: u64,
    /// 0 when `pids.max` is `max`.
    pub pids_limit: u64,
    /// Cumulative fork failures from `pids.events`.
    pub pids_events_max: u64,
}

/// One GPU's sample from `nvidia-smi`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuMetrics {
    pub index: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub utilization_percent: f64,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub temperature_c: f64,
    pub power_watts: f64,
    /// From the `--query-compute-apps` probe.
    pub process_count: u32,
    pub process_memory_mb: u64,
}

/// Snapshot of the limits in force when the sample was taken.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LimitsSnapshot {
    pub max_cpu: u32,
    pub max_memory_mb: u64,
    pub max_io_bps: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_cores: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gpu_indices: Vec<u32>,
}

impl From<&ResourceLimits> for LimitsSnapshot {
    fn from(limits: &ResourceLimits) -> Self {
        Self {
            max_cpu: limits.max_cpu,
            max_memory_mb: limits.max_memory,
            max_io_bps: limits.max_io_bps,
            cpu_cores: limits.cpu_cores.as_ref().map(|c| c.expr().to_string()),
            gpu_indices: limits.gpu_indices.clone(),
        }
    }
}

/// A single immutable time-point record of a job's resource usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    pub job_id: JobId,
    pub timestamp: DateTime<Utc>,
    /// Collector interval in effect when the sample was taken.
    pub interval_secs: f64,
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub io: IoMetrics,
    pub process: ProcessMetrics,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gpus: Vec<GpuMetrics>,
    pub limits: LimitsSnapshot,
}

#[cfg(test)]
#[path = "sample_tests.rs"]
mod tests;
