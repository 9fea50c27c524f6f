// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Due-time bookkeeping for `SCHEDULED` jobs.
//!
//! The runtime polls `due_jobs` on a coarse tick; firing precision is the
//! tick interval, which is ample for schedules bounded by a minimum
//! advance of seconds.

use chrono::{DateTime, Utc};
use joblet_core::JobId;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
pub struct ScheduleBook {
    entries: Mutex<HashMap<JobId, DateTime<Utc>>>,
}

impl ScheduleBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, job_id: JobId, due: DateTime<Utc>) {
        self.entries.lock().insert(job_id, due);
    }

    /// Cancel a schedule; false when the job was not scheduled (already
    /// fired or never added).
    pub fn cancel(&self, job_id: &JobId) -> bool {
        self.entries.lock().remove(job_id).is_some()
    }

    /// Remove and return every job due at `now`, earliest first.
    pub fn due_jobs(&self, now: DateTime<Utc>) -> Vec<JobId> {
        let mut entries = self.entries.lock();
        let mut due: Vec<(JobId, DateTime<Utc>)> = entries
            .iter()
            .filter(|(_, when)| **when <= now)
            .map(|(id, when)| (id.clone(), *when))
            .collect();
        due.sort_by_key(|(_, when)| *when);
        for (id, _) in &due {
            entries.remove(id);
        }
        due.into_iter().map(|(id, _)| id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
