// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory registry of live jobs.
//!
//! The registry caches the state subprocess's content for jobs this
//! daemon owns. Each entry carries a status watch so callers can await a
//! job's terminal transition, and a stop signal the supervisor listens on.

use joblet_core::{Job, JobId, JobStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::watch;

struct Entry {
    job: Job,
    status_tx: watch::Sender<JobStatus>,
    stop_tx: watch::Sender<bool>,
}

/// How many terminal statuses of removed jobs stay memoized for late
/// `wait_terminal` callers (workflow gates racing fast jobs).
const FINISHED_MEMO_CAP: usize = 1024;

#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, Entry>>,
    finished: Mutex<FinishedMemo>,
}

#[derive(Default)]
struct FinishedMemo {
    order: std::collections::VecDeque<JobId>,
    statuses: HashMap<JobId, JobStatus>,
}

impl FinishedMemo {
    fn record(&mut self, job_id: JobId, status: JobStatus) {
        if self.statuses.insert(job_id.clone(), status).is_none() {
            self.order.push_back(job_id);
            if self.order.len() > FINISHED_MEMO_CAP {
                if let Some(evicted) = self.order.pop_front() {
                    self.statuses.remove(&evicted);
                }
            }
        }
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Job) {
        let (status_tx, _) = watch::channel(job.status);
        let (stop_tx, _) = watch::channel(false);
        self.jobs.lock().insert(
            job.id.clone(),
            Entry {
                job,
                status_tx,
                stop_tx,
            },
        );
    }

    /// Fresh stop receiver for a job's supervisor.
    pub fn stop_receiver(&self, job_id: &JobId) -> Option<watch::Receiver<bool>> {
        self.jobs
            .lock()
            .get(job_id)
            .map(|entry| entry.stop_tx.subscribe())
    }

    pub fn get(&self, job_id: &JobId) -> Option<Job> {
        self.jobs.lock().get(job_id).map(|entry| entry.job.clone())
    }

    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .lock()
            .values()
            .map(|entry| entry.job.clone())
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub fn live_ids(&self) -> Vec<JobId> {
        self.jobs.lock().keys().cloned().collect()
    }

    pub fn running_count(&self) -> usize {
        self.jobs
            .lock()
            .values()
            .filter(|entry| !entry.job.status.is_terminal())
            .count()
    }

    pub fn scheduled_count(&self) -> usize {
        self.jobs
            .lock()
            .values()
            .filter(|entry| entry.job.status == JobStatus::Scheduled)
            .count()
    }

    /// Mutate a job under the lock; returns the updated copy for
    /// persistence. Status changes fan out to watchers.
    pub fn update<F>(&self, job_id: &JobId, mutate: F) -> Option<Job>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.lock();
        let entry = jobs.get_mut(job_id)?;
        mutate(&mut entry.job);
        let _ = entry.status_tx.send(entry.job.status);
        Some(entry.job.clone())
    }

    /// Signal a running job's supervisor to stop the child.
    pub fn signal_stop(&self, job_id: &JobId) -> bool {
        match self.jobs.lock().get(job_id) {
            Some(entry) => entry.stop_tx.send(true).is_ok(),
            None => false,
        }
    }

    /// Await the job's terminal status. Returns immediately when already
    /// terminal (or recently removed); `None` for unknown jobs.
    pub async fn wait_terminal(&self, job_id: &JobId) -> Option<JobStatus> {
        let mut rx = {
            let jobs = self.jobs.lock();
            match jobs.get(job_id) {
                Some(entry) if entry.job.status.is_terminal() => return Some(entry.job.status),
                Some(entry) => entry.status_tx.subscribe(),
                None => {
                    drop(jobs);
                    return self.finished.lock().statuses.get(job_id).copied();
                }
            }
        };

        loop {
            let status = *rx.borrow();
            if status.is_terminal() {
                return Some(status);
            }
            if rx.changed().await.is_err() {
                // Sender gone: job removed after cleanup
                return self.finished.lock().statuses.get(job_id).copied();
            }
        }
    }

    /// Drop a job after cleanup and final state flush. Its terminal
    /// status stays memoized for late waiters.
    pub fn remove(&self, job_id: &JobId) -> Option<Job> {
        let entry = self.jobs.lock().remove(job_id)?;
        self.finished
            .lock()
            .record(job_id.clone(), entry.job.status);
        Some(entry.job)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
