// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request validation: commands, schedules, resource limits.
//!
//! Workflow-document validation lives in `joblet-workflow`; this module
//! covers the per-job checks and composes them for the runtime.

pub mod command;
pub mod limits;
pub mod schedule;

use chrono::{DateTime, Utc};
use joblet_core::config::JobletConfig;
use joblet_core::{Clock, JobSpec};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("command: {0}")]
    Command(#[from] command::CommandError),
    #[error("schedule: {0}")]
    Schedule(#[from] schedule::ScheduleError),
    #[error("limits: {0}")]
    Limits(#[from] limits::LimitError),
    #[error("env key {0} appears in both env and secret_env")]
    EnvKeyOverlap(String),
}

/// Composes the three validators over one job spec.
pub struct ValidationService {
    config: JobletConfig,
    host_cores: u32,
}

impl ValidationService {
    pub fn new(config: JobletConfig) -> Self {
        let host_cores = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1);
        Self { config, host_cores }
    }

    #[cfg(test)]
    pub fn with_host_cores(config: JobletConfig, host_cores: u32) -> Self {
        Self { config, host_cores }
    }

    /// Validate a spec; returns the parsed schedule time when one is set.
    ///
    /// `scheduled_count` is the current number of outstanding scheduled
    /// jobs, checked against the configured cap.
    pub fn validate_spec(
        &self,
        spec: &JobSpec,
        scheduled_count: usize,
        clock: &dyn Clock,
    ) -> Result<Option<DateTime<Utc>>, ValidationError> {
        command::validate_command(&spec.command, &spec.args, &self.config)?;
        limits::validate_limits(&spec.limits, &self.config, self.host_cores)?;

        for key in spec.env.keys() {
            if spec.secret_env.contains_key(key) {
                return Err(ValidationError::EnvKeyOverlap(key.clone()));
            }
        }

        match &spec.schedule {
            None => Ok(None),
            Some(raw) => {
                let when =
                    schedule::validate_schedule(raw, &self.config, scheduled_count, clock)?;
                Ok(Some(when))
            }
        }
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
