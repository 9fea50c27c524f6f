// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GPU sampling via `nvidia-smi`.
//!
//! Two probes per tick per GPU: the device query for utilisation, memory,
//! temperature, and power; and a lightweight compute-apps query for the
//! process count and their memory. Probes are best-effort with a 5 s
//! timeout; `[N/A]` fields parse as zero.

use joblet_core::GpuMetrics;
use joblet_platform::process::{run_with_timeout, GPU_PROBE_TIMEOUT};
use tokio::process::Command;
use tracing::debug;

const DEVICE_QUERY: &str =
    "name,utilization.gpu,memory.used,memory.total,temperature.gpu,power.draw";

/// Sample every allocated GPU. Failed probes are skipped with a debug log;
/// metrics loss never fails a job.
pub async fn sample_gpus(indices: &[u32]) -> Vec<GpuMetrics> {
    let mut samples = Vec::with_capacity(indices.len());
    for &index in indices {
        match sample_one(index).await {
            Ok(sample) => samples.push(sample),
            Err(e) => debug!(gpu = index, error = %e, "gpu probe failed"),
        }
    }
    samples
}

async fn sample_one(index: u32) -> Result<GpuMetrics, String> {
    let id_arg = format!("--id={}", index);

    let mut cmd = Command::new("nvidia-smi");
    cmd.arg(&id_arg)
        .arg(format!("--query-gpu={}", DEVICE_QUERY))
        .arg("--format=csv,noheader,nounits");
    let output = run_with_timeout(cmd, GPU_PROBE_TIMEOUT, "nvidia-smi query-gpu").await?;
    if !output.status.success() {
        return Err(format!("nvidia-smi exited with {}", output.status));
    }
    let line = String::from_utf8_lossy(&output.stdout);
    let mut metrics = parse_device_line(index, line.trim())
        .ok_or_else(|| format!("unparseable nvidia-smi output: {}", line.trim()))?;

    let mut cmd = Command::new("nvidia-smi");
    cmd.arg(&id_arg)
        .arg("--query-compute-apps=pid,used_memory")
        .arg("--format=csv,noheader,nounits");
    if let Ok(output) = run_with_timeout(cmd, GPU_PROBE_TIMEOUT, "nvidia-smi compute-apps").await {
        if output.status.success() {
            let raw = String::from_utf8_lossy(&output.stdout);
            let (count, memory_mb) = parse_compute_apps(&raw);
            metrics.process_count = count;
            metrics.process_memory_mb = memory_mb;
        }
    }

    Ok(metrics)
}

/// Parse one CSV line of the device query.
pub(crate) fn parse_device_line(index: u32, line: &str) -> Option<GpuMetrics> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 6 {
        return None;
    }
    Some(GpuMetrics {
        index,
        name: fields[0].to_string(),
        utilization_percent: na_f64(fields[1]),
        memory_used_mb: na_u64(fields[2]),
        memory_total_mb: na_u64(fields[3]),
        temperature_c: na_f64(fields[4]),
        power_watts: na_f64(fields[5]),
        process_count: 0,
        process_memory_mb: 0,
    })
}

/// Parse `pid, used_memory` lines into (process count, total MiB).
pub(crate) fn parse_compute_apps(raw: &str) -> (u32, u64) {
    let mut count = 0u32;
    let mut memory = 0u64;
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split(',').map(str::trim);
        let Some(_pid) = fields.next() else { continue };
        count += 1;
        if let Some(mem) = fields.next() {
            memory += na_u64(mem);
        }
    }
    (count, memory)
}

/// `N/A` (with or without brackets) reads as zero.
fn na_f64(field: &str) -> f64 {
    field.trim_matches(['[', ']']).parse().unwrap_or(0.0)
}

fn na_u64(field: &str) -> u64 {
    field.trim_matches(['[', ']']).parse().unwrap_or(0)
}

#[cfg(test)]
#[path = "gpu_tests.rs"]
mod tests;
