// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job-level error kinds surfaced at the request boundary.
//!
//! These are semantic kinds, not transport codes. Component errors
//! (cgroup, filesystem, network, state) are mapped into one of these at the
//! job runtime; background errors log and recover without killing the job.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    /// Validation failure (command, schedule, limits, workflow). No state change.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Pool, IP, or concurrency cap hit. No state change.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// A cgroup controller refused a write; the job is not started.
    #[error("limits not enforceable: {0}")]
    LimitsNotEnforceable(String),

    /// chroot/namespace/mount failed before exec. Job fails; cleanup runs.
    #[error("isolation failed: {0}")]
    IsolationFailed(String),

    /// execve reported an error through the status pipe. Job fails; cleanup runs.
    #[error("exec failed: {0}")]
    ExecFailed(String),

    /// Child exited non-zero.
    #[error("job exited with code {0}")]
    Runtime(i32),

    /// Explicit user stop or workflow abort.
    #[error("job canceled")]
    Canceled,

    /// Disk or IPC error in logs/metrics/state; logged, does not kill the job.
    #[error("internal io: {0}")]
    InternalIo(String),

    /// Cleanup finished with one or more step failures.
    #[error("cleanup partial: {0}")]
    CleanupPartial(String),
}
