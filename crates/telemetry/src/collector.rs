// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job metrics collector.
//!
//! One collector task runs per job, ticking at the configured interval.
//! Each tick reads the job's cgroup controller files, derives rates from
//! the previous sample, optionally probes `nvidia-smi`, and publishes the
//! sample to the async metrics pipeline. Timestamps come from the
//! collector's own timer, so a job's samples are strictly increasing.

use crate::cgroup_stats::{parse_flat_keyed, parse_io_stat, parse_psi, parse_scalar};
use crate::gpu;
use crate::MetricsPipeline;
use chrono::{DateTime, Utc};
use joblet_core::{
    CpuMetrics, IoMetrics, JobId, LimitsSnapshot, MemoryMetrics, MetricsSample, ProcessMetrics,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

pub struct MetricsCollector {
    job_id: JobId,
    cgroup_dir: PathBuf,
    interval: Duration,
    limits: LimitsSnapshot,
    gpu_indices: Vec<u32>,
    pipeline: Arc<MetricsPipeline>,
}

impl MetricsCollector {
    pub fn new(
        job_id: JobId,
        cgroup_dir: PathBuf,
        interval: Duration,
        limits: LimitsSnapshot,
        gpu_indices: Vec<u32>,
        pipeline: Arc<MetricsPipeline>,
    ) -> Self {
        Self {
            job_id,
            cgroup_dir,
            interval,
            limits,
            gpu_indices,
            pipeline,
        }
    }

    /// Tick until shutdown. The first tick publishes a zero-rate sample.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut previous: Option<MetricsSample> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let mut sample = collect_sample(
                        &self.cgroup_dir,
                        &self.job_id,
                        &self.limits,
                        previous.as_ref(),
                        Utc::now(),
                        self.interval,
                    );
                    if !self.gpu_indices.is_empty() {
                        sample.gpus = gpu::sample_gpus(&self.gpu_indices).await;
                    }
                    previous = Some(sample.clone());
                    self.pipeline.publish(sample).await;
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!(job_id = %self.job_id, "metrics collector stopped");
    }
}

fn read(dir: &Path, name: &str) -> String {
    std::fs::read_to_string(dir.join(name)).unwrap_or_default()
}

/// Read one sample from the cgroup directory and derive rates against the
/// previous sample. Missing controller files read as zeros.
pub(crate) fn collect_sample(
    dir: &Path,
    job_id: &JobId,
    limits: &LimitsSnapshot,
    previous: Option<&MetricsSample>,
    now: DateTime<Utc>,
    interval: Duration,
) -> MetricsSample {
    let cpu_stat = read(dir, "cpu.stat");
    let cpu_stat = parse_flat_keyed(&cpu_stat);
    let memory_stat = read(dir, "memory.stat");
    let memory_stat = parse_flat_keyed(&memory_stat);
    let memory_events = read(dir, "memory.events");
    let memory_events = parse_flat_keyed(&memory_events);
    let pids_events = read(dir, "pids.events");
    let pids_events = parse_flat_keyed(&pids_events);

    let mut cpu = CpuMetrics {
        usage_usec: cpu_stat.get("usage_usec").copied().unwrap_or(0),
        user_usec: cpu_stat.get("user_usec").copied().unwrap_or(0),
        system_usec: cpu_stat.get("system_usec").copied().unwrap_or(0),
        nr_periods: cpu_stat.get("nr_periods").copied().unwrap_or(0),
        nr_throttled: cpu_stat.get("nr_throttled").copied().unwrap_or(0),
        throttled_usec: cpu_stat.get("throttled_usec").copied().unwrap_or(0),
        usage_percent: 0.0,
        throttle_percent: 0.0,
        pressure: parse_psi(&read(dir, "cpu.pressure")),
    };

    let memory = MemoryMetrics {
        current_bytes: parse_scalar(&read(dir, "memory.current")),
        limit_bytes: parse_scalar(&read(dir, "memory.max")),
        anon: memory_stat.get("anon").copied().unwrap_or(0),
        file: memory_stat.get("file").copied().unwrap_or(0),
        kernel_stack: memory_stat.get("kernel_stack").copied().unwrap_or(0),
        slab: memory_stat.get("slab").copied().unwrap_or(0),
        sock: memory_stat.get("sock").copied().unwrap_or(0),
        shmem: memory_stat.get("shmem").copied().unwrap_or(0),
        file_mapped: memory_stat.get("file_mapped").copied().unwrap_or(0),
        file_dirty: memory_stat.get("file_dirty").copied().unwrap_or(0),
        file_writeback: memory_stat.get("file_writeback").copied().unwrap_or(0),
        pgfault: memory_stat.get("pgfault").copied().unwrap_or(0),
        pgmajfault: memory_stat.get("pgmajfault").copied().unwrap_or(0),
        oom_events: memory_events.get("oom").copied().unwrap_or(0),
        oom_kills: memory_events.get("oom_kill").copied().unwrap_or(0),
        pressure: parse_psi(&read(dir, "memory.pressure")),
    };

    let mut io = IoMetrics {
        devices: parse_io_stat(&read(dir, "io.stat")),
        read_bps: 0.0,
        write_bps: 0.0,
        read_iops: 0.0,
        write_iops: 0.0,
        pressure: parse_psi(&read(dir, "io.pressure")),
    };

    let process = ProcessMetrics {
        pids_current: parse_scalar(&read(dir, "pids.current")),
        pids_limit: parse_scalar(&read(dir, "pids.max")),
        pids_events_max: pids_events.get("max").copied().unwrap_or(0),
    };

    if let Some(previous) = previous {
        let elapsed = (now - previous.timestamp).num_milliseconds() as f64 / 1000.0;
        if elapsed > 0.0 {
            derive_cpu_rates(&mut cpu, &previous.cpu, elapsed);
            derive_io_rates(&mut io, &previous.io, elapsed);
        }
    }

    MetricsSample {
        job_id: job_id.clone(),
        timestamp: now,
        interval_secs: interval.as_secs_f64(),
        cpu,
        memory,
        io,
        process,
        gpus: Vec::new(),
        limits: limits.clone(),
    }
}

fn derive_cpu_rates(cpu: &mut CpuMetrics, previous: &CpuMetrics, elapsed: f64) {
    let delta_usage = cpu.usage_usec.saturating_sub(previous.usage_usec) as f64;
    cpu.usage_percent = delta_usage / (elapsed * 1_000_000.0) * 100.0;

    let delta_periods = cpu.nr_periods.saturating_sub(previous.nr_periods);
    let delta_throttled = cpu.nr_throttled.saturating_sub(previous.nr_throttled);
    if delta_periods > 0 {
        cpu.throttle_percent = delta_throttled as f64 / delta_periods as f64 * 100.0;
    }
}

fn derive_io_rates(io: &mut IoMetrics, previous: &IoMetrics, elapsed: f64) {
    let mut read_bytes = 0u64;
    let mut write_bytes = 0u64;
    let mut read_ios = 0u64;
    let mut write_ios = 0u64;

    for device in &io.devices {
        let prev = previous
            .devices
            .iter()
            .find(|p| p.major == device.major && p.minor == device.minor);
        let Some(prev) = prev else { continue };
        read_bytes += device.rbytes.saturating_sub(prev.rbytes);
        write_bytes += device.wbytes.saturating_sub(prev.wbytes);
        read_ios += device.rios.saturating_sub(prev.rios);
        write_ios += device.wios.saturating_sub(prev.wios);
    }

    io.read_bps = read_bytes as f64 / elapsed;
    io.write_bps = write_bytes as f64 / elapsed;
    io.read_iops = read_ios as f64 / elapsed;
    io.write_iops = write_ios as f64 / elapsed;
}

#[cfg(test)]
#[path = "collector_tests.rs"]
mod tests;
