// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cleanup coordinator: exactly-once, race-free teardown of a job's
//! process, cgroup, filesystem, and network state.
//!
//! Every step runs regardless of earlier failures; failures aggregate
//! into one `Partial` error surfaced to operators via logs. The
//! active-cleanups set makes a concurrent second call fail fast instead
//! of racing the first.

use joblet_core::JobId;
use joblet_isolation::{CgroupManager, FilesystemIsolator, JobRoot};
use joblet_network::NetworkManager;
use joblet_platform::signal;
use joblet_state::StateBatcher;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Upper bound on the cgroup teardown step.
const CGROUP_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("cleanup already in progress for {0}")]
    AlreadyInProgress(JobId),
    #[error("cleanup finished with errors: {}", reasons.join("; "))]
    Partial { reasons: Vec<String> },
}

/// What cleanup needs to know about one job.
pub struct CleanupRequest {
    pub job_id: JobId,
    /// Child PID when the job got as far as launching.
    pub pid: Option<u32>,
    /// The chroot tree; `None` when the job never built one.
    pub job_root: Option<JobRoot>,
}

pub struct CleanupCoordinator {
    active: Mutex<HashSet<JobId>>,
    cgroup: Arc<CgroupManager>,
    isolator: Arc<FilesystemIsolator>,
    network: Arc<NetworkManager>,
    batcher: Arc<StateBatcher>,
    grace: Duration,
}

impl CleanupCoordinator {
    pub fn new(
        cgroup: Arc<CgroupManager>,
        isolator: Arc<FilesystemIsolator>,
        network: Arc<NetworkManager>,
        batcher: Arc<StateBatcher>,
        grace: Duration,
    ) -> Self {
        Self {
            active: Mutex::new(HashSet::new()),
            cgroup,
            isolator,
            network,
            batcher,
            grace,
        }
    }

    /// Whether a cleanup for this job is currently running.
    pub fn is_active(&self, job_id: &JobId) -> bool {
        self.active.lock().contains(job_id)
    }

    /// Run the teardown sequence once.
    ///
    /// A second call while one is in flight returns
    /// [`CleanupError::AlreadyInProgress`]; a later call after success is
    /// a no-op pass over already-absent resources.
    pub async fn cleanup(&self, request: CleanupRequest) -> Result<(), CleanupError> {
        if !self.active.lock().insert(request.job_id.clone()) {
            return Err(CleanupError::AlreadyInProgress(request.job_id));
        }

        let result = self.run_steps(&request).await;
        self.active.lock().remove(&request.job_id);
        result
    }

    async fn run_steps(&self, request: &CleanupRequest) -> Result<(), CleanupError> {
        let job_id = &request.job_id;
        let mut reasons: Vec<String> = Vec::new();

        // 1. Signal escalation on the direct child
        if let Some(pid) = request.pid {
            match signal::terminate_with_grace(pid, self.grace).await {
                Ok(outcome) => debug!(job_id = %job_id, pid, ?outcome, "child terminated"),
                Err(e) => reasons.push(format!("terminate: {}", e)),
            }
        }

        // 2. Cgroup (bounded; stragglers fall to the orphan scanner)
        match tokio::time::timeout(CGROUP_TEARDOWN_TIMEOUT, self.cgroup.destroy(job_id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => reasons.push(format!("cgroup: {}", e)),
            Err(_) => reasons.push("cgroup: teardown timed out".to_string()),
        }

        // 3. Filesystem (runtime-build roots keep their products)
        if let Some(job_root) = &request.job_root {
            if let Err(e) = self.isolator.teardown(job_root) {
                reasons.push(format!("filesystem: {}", e));
            }
        }

        // 4.–5. Network allocation and IP release
        if let Err(e) = self.network.detach(job_id).await {
            reasons.push(format!("network: {}", e));
        }

        // 6. Push the final state write out
        if let Err(e) = self.batcher.flush().await {
            reasons.push(format!("state flush: {}", e));
        }

        if reasons.is_empty() {
            info!(job_id = %job_id, "cleanup complete");
            Ok(())
        } else {
            warn!(job_id = %job_id, ?reasons, "cleanup finished with errors");
            Err(CleanupError::Partial { reasons })
        }
    }

    /// Compare on-disk artefacts with live jobs and reap the difference.
    ///
    /// Returns the orphans cleaned. Entries with an in-flight cleanup are
    /// skipped, not errors.
    pub async fn orphan_scan(&self, live: &[JobId]) -> Vec<JobId> {
        let mut orphans: HashSet<JobId> = HashSet::new();

        for name in self.cgroup.orphan_candidates() {
            orphans.insert(JobId::new(name));
        }
        for name in self.isolator.orphan_candidates() {
            orphans.insert(JobId::new(name));
        }

        let mut cleaned = Vec::new();
        for job_id in orphans {
            if live.contains(&job_id) || self.is_active(&job_id) {
                continue;
            }
            info!(job_id = %job_id, "reaping orphaned artefacts");
            let request = CleanupRequest {
                job_id: job_id.clone(),
                pid: None,
                job_root: Some(self.isolator.orphan_root(&job_id)),
            };
            match self.cleanup(request).await {
                Ok(()) => cleaned.push(job_id),
                Err(CleanupError::AlreadyInProgress(_)) => {}
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "orphan cleanup incomplete");
                    cleaned.push(job_id);
                }
            }
        }
        cleaned
    }
}

#[cfg(test)]
#[path = "cleanup_tests.rs"]
mod tests;
