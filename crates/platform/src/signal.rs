// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signal delivery with graceful escalation.

use crate::PlatformError;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::time::Duration;
use tracing::debug;

/// How a process left after `terminate_with_grace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited within the grace period after SIGTERM.
    Graceful,
    /// Survived the grace period and was SIGKILLed.
    Killed,
    /// Was already gone.
    NotFound,
}

/// Poll interval while waiting out the grace period.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Whether a process with this PID currently exists (signal 0 probe).
pub fn process_exists(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Send SIGTERM to a process.
pub fn send_term(pid: u32) -> Result<(), PlatformError> {
    send(pid, Signal::SIGTERM, "SIGTERM")
}

/// Send SIGKILL to a process.
pub fn send_kill(pid: u32) -> Result<(), PlatformError> {
    send(pid, Signal::SIGKILL, "SIGKILL")
}

fn send(pid: u32, signal: Signal, name: &'static str) -> Result<(), PlatformError> {
    match kill(Pid::from_raw(pid as i32), signal) {
        Ok(()) => Ok(()),
        // Already reaped; treat as delivered.
        Err(nix::Error::ESRCH) => Ok(()),
        Err(errno) => Err(PlatformError::Signal {
            pid: pid as i32,
            signal: name,
            errno,
        }),
    }
}

/// SIGTERM, wait up to `grace`, then SIGKILL stragglers.
///
/// The caller (or the kernel, for cgroup members) reaps the process; this
/// only delivers signals and observes existence.
pub async fn terminate_with_grace(pid: u32, grace: Duration) -> Result<Termination, PlatformError> {
    if !process_exists(pid) {
        return Ok(Termination::NotFound);
    }

    send_term(pid)?;
    debug!(pid, grace_ms = grace.as_millis() as u64, "sent SIGTERM");

    let deadline = tokio::time::Instant::now() + grace;
    while tokio::time::Instant::now() < deadline {
        if !process_exists(pid) {
            return Ok(Termination::Graceful);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    send_kill(pid)?;
    debug!(pid, "grace expired, sent SIGKILL");
    Ok(Termination::Killed)
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
