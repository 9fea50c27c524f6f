// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record and status state machine.

use crate::clock::Clock;
use crate::limits::ResourceLimits;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

crate::define_id! {
    /// Unique identifier for a job instance.
    ///
    /// Each submitted job gets a UUID used to track its sandbox, cgroup,
    /// log/metrics directories, and state record.
    #[derive(Default)]
    pub struct JobId;
}

crate::define_id! {
    /// Identifier of the workflow a job belongs to, if any.
    pub struct WorkflowId;
}

/// Lifecycle status of a job.
///
/// Transitions form a DAG; once a terminal status is reached the status
/// never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Accepted with a future start time; waiting for the schedule to fire.
    Scheduled,
    /// Accepted and queued for launch.
    Pending,
    /// Child process is running inside its sandbox.
    Running,
    /// Child exited with code 0.
    Completed,
    /// Validation passed but the job failed to start or exited non-zero.
    Failed,
    /// Canceled before the child ever ran.
    Canceled,
    /// Stopped by explicit request while running.
    Stopped,
}

impl JobStatus {
    /// A terminal status never changes again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Canceled | JobStatus::Stopped
        )
    }

    /// Whether `self → next` is a legal edge in the status DAG.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match self {
            Scheduled => matches!(next, Pending | Canceled | Failed),
            Pending => matches!(next, Running | Canceled | Failed),
            Running => matches!(next, Completed | Failed | Stopped),
            Completed | Failed | Canceled | Stopped => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Scheduled => "SCHEDULED",
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Canceled => "CANCELED",
            JobStatus::Stopped => "STOPPED",
        };
        write!(f, "{}", s)
    }
}

/// Error returned for an illegal status transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal status transition {from} -> {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Everything a client supplies when submitting a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Secret environment; keys must be disjoint from `env`.
    #[serde(default)]
    pub secret_env: HashMap<String, String>,
    #[serde(default)]
    pub limits: ResourceLimits,
    /// Network name; empty selects the configured default.
    #[serde(default)]
    pub network: String,
    /// Volume names to mount under `/volumes/<name>`.
    #[serde(default)]
    pub volumes: Vec<String>,
    /// Runtime selection, e.g. `python-3.11@1.0.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    /// Schedule expression; `None` starts immediately.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    /// Set for jobs spawned by a workflow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,
    /// Runtime-build jobs get a host-root bind and no network namespace.
    #[serde(default)]
    pub runtime_build: bool,
}

/// A job instance owned by the job runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub spec: JobSpec,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Host PID of the sandboxed child while running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Single terminal-reason string surfaced in listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl Job {
    /// Create a job in `PENDING` (or `SCHEDULED` when a start time is set).
    pub fn new(id: JobId, spec: JobSpec, scheduled_for: Option<DateTime<Utc>>, clock: &dyn Clock) -> Self {
        let status = if scheduled_for.is_some() {
            JobStatus::Scheduled
        } else {
            JobStatus::Pending
        };
        Self {
            id,
            spec,
            status,
            created_at: clock.utc(),
            scheduled_for,
            started_at: None,
            ended_at: None,
            exit_code: None,
            pid: None,
            failure_reason: None,
        }
    }

    /// Apply a status transition, rejecting edges outside the DAG.
    ///
    /// Terminal statuses are immutable: any transition out of one fails.
    pub fn transition_to(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Mark the job running with the child's host PID.
    pub fn mark_running(&mut self, pid: u32, clock: &dyn Clock) -> Result<(), TransitionError> {
        self.transition_to(JobStatus::Running)?;
        self.pid = Some(pid);
        self.started_at = Some(clock.utc());
        Ok(())
    }

    /// Record a clean exit.
    pub fn mark_completed(&mut self, clock: &dyn Clock) -> Result<(), TransitionError> {
        self.transition_to(JobStatus::Completed)?;
        self.exit_code = Some(0);
        self.ended_at = Some(clock.utc());
        self.pid = None;
        Ok(())
    }

    /// Record a failure with an optional exit code and a terminal reason.
    pub fn mark_failed(
        &mut self,
        exit_code: Option<i32>,
        reason: impl Into<String>,
        clock: &dyn Clock,
    ) -> Result<(), TransitionError> {
        self.transition_to(JobStatus::Failed)?;
        self.exit_code = exit_code;
        self.failure_reason = Some(reason.into());
        self.ended_at = Some(clock.utc());
        self.pid = None;
        Ok(())
    }

    /// Record an explicit stop of a running job.
    pub fn mark_stopped(&mut self, clock: &dyn Clock) -> Result<(), TransitionError> {
        self.transition_to(JobStatus::Stopped)?;
        self.ended_at = Some(clock.utc());
        self.pid = None;
        Ok(())
    }

    /// Record cancellation of a job that never ran.
    pub fn mark_canceled(&mut self, clock: &dyn Clock) -> Result<(), TransitionError> {
        self.transition_to(JobStatus::Canceled)?;
        self.ended_at = Some(clock.utc());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
