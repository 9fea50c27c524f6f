// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job child supervision: log pumps, exit reaping, stop handling.

use joblet_core::{JobId, LogChunk, LogStream};
use joblet_platform::signal;
use joblet_telemetry::LogPipeline;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Read size for one log chunk.
const CHUNK_SIZE: usize = 8192;

/// How the child left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    /// Normal exit with a code.
    Code(i32),
    /// Killed by a signal.
    Signal(i32),
    /// Stopped on request (SIGTERM → SIGKILL escalation).
    Stopped,
}

/// Pump one stream into the log pipeline until EOF.
///
/// Chunks preserve producer order: one pump per stream, and the pipeline
/// has a single consumer per job on disk.
async fn pump_stream<R>(
    job_id: JobId,
    stream: LogStream,
    mut reader: R,
    logs: Arc<LogPipeline>,
) where
    R: AsyncReadExt + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = LogChunk::new(
                    job_id.clone(),
                    stream,
                    buf[..n].to_vec(),
                    chrono::Utc::now(),
                );
                logs.publish(chunk).await;
            }
            Err(e) => {
                warn!(job_id = %job_id, %stream, error = %e, "log pump read failed");
                break;
            }
        }
    }
    debug!(job_id = %job_id, %stream, "log pump finished");
}

/// Supervise a launched child: attach both log pumps, wait for exit or a
/// stop signal, and reap.
///
/// A stop delivers SIGTERM, waits out `grace`, SIGKILLs, then reaps. Log
/// pumps run to EOF either way, so output captured up to failure is
/// preserved.
pub async fn supervise_child(
    job_id: JobId,
    mut child: tokio::process::Child,
    logs: Arc<LogPipeline>,
    mut stop_rx: watch::Receiver<bool>,
    grace: Duration,
) -> ChildExit {
    let stdout_pump = child.stdout.take().map(|stdout| {
        tokio::spawn(pump_stream(
            job_id.clone(),
            LogStream::Stdout,
            stdout,
            Arc::clone(&logs),
        ))
    });
    let stderr_pump = child.stderr.take().map(|stderr| {
        tokio::spawn(pump_stream(
            job_id.clone(),
            LogStream::Stderr,
            stderr,
            Arc::clone(&logs),
        ))
    });

    let mut stopped = false;
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            changed = stop_rx.changed() => {
                if changed.is_err() {
                    // Stop sender gone; nothing can ask for a stop anymore.
                    break child.wait().await;
                }
                if !*stop_rx.borrow() {
                    continue;
                }
                stopped = true;
                if let Some(pid) = child.id() {
                    if let Err(e) = signal::terminate_with_grace(pid, grace).await {
                        warn!(job_id = %job_id, pid, error = %e, "stop escalation failed");
                    }
                }
                break child.wait().await;
            }
        }
    };

    // Pumps end at EOF once the child (and its descendants holding the
    // pipe) are gone.
    if let Some(pump) = stdout_pump {
        let _ = pump.await;
    }
    if let Some(pump) = stderr_pump {
        let _ = pump.await;
    }

    match status {
        Ok(status) if stopped => {
            debug!(job_id = %job_id, %status, "child stopped on request");
            ChildExit::Stopped
        }
        Ok(status) => match status.code() {
            Some(code) => ChildExit::Code(code),
            None => {
                use std::os::unix::process::ExitStatusExt;
                ChildExit::Signal(status.signal().unwrap_or(0))
            }
        },
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "child reap failed");
            if stopped {
                ChildExit::Stopped
            } else {
                ChildExit::Signal(0)
            }
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
