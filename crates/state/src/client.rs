// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! High-level operations over the connection pool.

use crate::pool::ConnectionPool;
use crate::protocol::{
    JobFilter, RequestIdGen, StateError, StateOp, StateRequest, StateResponse,
};
use joblet_core::config::StateConfig;
use joblet_core::{Job, JobId};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Pooled state client. Cheap to clone.
#[derive(Clone)]
pub struct StateClient {
    pool: Arc<ConnectionPool>,
    ids: Arc<RequestIdGen>,
    timeout: Duration,
}

impl StateClient {
    pub fn new(config: &StateConfig) -> Self {
        Self {
            pool: Arc::new(ConnectionPool::new(
                config.socket_path.clone(),
                config.pool_size,
            )),
            ids: Arc::new(RequestIdGen::default()),
            timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
        }
    }

    async fn call(&self, request: StateRequest) -> Result<StateResponse, StateError> {
        // One retry on a broken connection: the pool evicts it and the
        // request ID keeps the retried operation idempotent.
        let mut last_err = None;
        for attempt in 0..2 {
            let mut pooled = self.pool.get().await?;
            match pooled.conn.call(&request, self.timeout).await {
                Ok(response) => {
                    self.pool.put(pooled);
                    if !response.success {
                        let reason = response
                            .error
                            .clone()
                            .unwrap_or_else(|| "unspecified".to_string());
                        return Err(StateError::Rejected(reason));
                    }
                    return Ok(response);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "state call failed, evicting connection");
                    self.pool.remove(pooled);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(StateError::ConnectionClosed))
    }

    fn request(&self, op: StateOp) -> StateRequest {
        StateRequest::new(op, self.ids.next())
    }

    pub async fn create_job(&self, job: &Job) -> Result<(), StateError> {
        let mut request = self.request(StateOp::Create);
        request.job = Some(job.clone());
        self.call(request).await.map(|_| ())
    }

    pub async fn update_job(&self, job: &Job) -> Result<(), StateError> {
        let mut request = self.request(StateOp::Update);
        request.job = Some(job.clone());
        self.call(request).await.map(|_| ())
    }

    pub async fn delete_job(&self, job_id: &JobId) -> Result<(), StateError> {
        let mut request = self.request(StateOp::Delete);
        request.job_id = Some(job_id.clone());
        self.call(request).await.map(|_| ())
    }

    pub async fn get_job(&self, job_id: &JobId) -> Result<Option<Job>, StateError> {
        let mut request = self.request(StateOp::Get);
        request.job_id = Some(job_id.clone());
        Ok(self.call(request).await?.job)
    }

    pub async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<Job>, StateError> {
        let mut request = self.request(StateOp::List);
        request.filter = Some(filter);
        Ok(self.call(request).await?.jobs.unwrap_or_default())
    }

    /// Bulk upsert.
    pub async fn sync_jobs(&self, jobs: Vec<Job>) -> Result<(), StateError> {
        let mut request = self.request(StateOp::Sync);
        request.jobs = Some(jobs);
        self.call(request).await.map(|_| ())
    }

    pub async fn ping(&self) -> Result<(), StateError> {
        let request = self.request(StateOp::Ping);
        self.call(request).await.map(|_| ())
    }
}
