// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The surface the RPC layer calls.
//!
//! The transport (mTLS gRPC) lives outside this crate; every handler
//! reduces to one of these methods. Log and metrics queries merge durable
//! history with the in-memory recent buffers, and live streams splice
//! replay before live delivery.

use crate::runtime::{JobRuntime, WorkflowRecord};
use crate::runtimes::FsRuntimeCatalog;
use crate::volumes::VolumeManager;
use chrono::{DateTime, Utc};
use joblet_core::{
    Job, JobError, JobId, JobSpec, LogChunk, MetricsSample, NetworkConfig, Volume, VolumeKind,
    WorkflowId,
};
use joblet_network::NetworkManager;
use joblet_telemetry::{HistoryReader, LogPipeline, MetricsPipeline, Subscription};
use joblet_workflow::WorkflowDoc;
use std::sync::Arc;

pub struct JobService {
    runtime: Arc<JobRuntime>,
    logs: Arc<LogPipeline>,
    metrics: Arc<MetricsPipeline>,
    log_history: HistoryReader,
    metrics_history: HistoryReader,
    network: Arc<NetworkManager>,
    volumes: Arc<VolumeManager>,
    runtimes: Arc<FsRuntimeCatalog>,
}

impl JobService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        runtime: Arc<JobRuntime>,
        logs: Arc<LogPipeline>,
        metrics: Arc<MetricsPipeline>,
        log_history: HistoryReader,
        metrics_history: HistoryReader,
        network: Arc<NetworkManager>,
        volumes: Arc<VolumeManager>,
        runtimes: Arc<FsRuntimeCatalog>,
    ) -> Self {
        Self {
            runtime,
            logs,
            metrics,
            log_history,
            metrics_history,
            network,
            volumes,
            runtimes,
        }
    }

    // Jobs

    pub async fn submit_job(&self, spec: JobSpec) -> Result<Job, JobError> {
        self.runtime.submit(spec).await
    }

    pub async fn stop_job(&self, job_id: &JobId) -> Result<Job, JobError> {
        self.runtime.stop(job_id).await
    }

    pub fn get_job(&self, job_id: &JobId) -> Option<Job> {
        self.runtime.get(job_id)
    }

    pub fn list_jobs(&self) -> Vec<Job> {
        self.runtime.list()
    }

    // Workflows

    pub fn submit_workflow(&self, doc: WorkflowDoc) -> Result<WorkflowId, JobError> {
        self.runtime.submit_workflow(doc)
    }

    pub fn workflow_status(&self, workflow_id: &WorkflowId) -> Option<WorkflowRecord> {
        self.runtime.workflow(workflow_id)
    }

    // Logs

    /// Historical chunks for a job (short UUID prefixes accepted).
    pub fn job_logs(
        &self,
        job_prefix: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<LogChunk>, JobError> {
        self.log_history
            .read(job_prefix, from, to)
            .map_err(|e| JobError::InternalIo(e.to_string()))
    }

    /// Recent-history replay plus live stream. A subscriber disconnect
    /// cancels only that subscription, never the job.
    pub fn stream_logs(&self, job_id: &JobId) -> Subscription<LogChunk> {
        self.logs.subscribe(job_id)
    }

    // Metrics

    pub fn job_metrics(
        &self,
        job_prefix: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<MetricsSample>, JobError> {
        self.metrics_history
            .read(job_prefix, from, to)
            .map_err(|e| JobError::InternalIo(e.to_string()))
    }

    pub fn stream_metrics(&self, job_id: &JobId) -> Subscription<MetricsSample> {
        self.metrics.subscribe(job_id)
    }

    // Networks

    pub fn list_networks(&self) -> Vec<NetworkConfig> {
        self.network.list()
    }

    pub fn create_network(&self, name: &str, cidr: &str) -> Result<(), JobError> {
        self.network
            .create_network(name, cidr, "")
            .map_err(|e| JobError::InvalidRequest(e.to_string()))
    }

    pub async fn remove_network(&self, name: &str) -> Result<(), JobError> {
        self.network
            .remove_network(name)
            .await
            .map_err(|e| JobError::InvalidRequest(e.to_string()))
    }

    // Volumes

    pub fn list_volumes(&self) -> Vec<Volume> {
        self.volumes.list()
    }

    pub fn create_volume(
        &self,
        name: &str,
        kind: VolumeKind,
        size_mb: Option<u64>,
    ) -> Result<Volume, JobError> {
        self.volumes
            .create(name, kind, size_mb)
            .map_err(|e| JobError::InvalidRequest(e.to_string()))
    }

    pub fn remove_volume(&self, name: &str) -> Result<(), JobError> {
        self.volumes
            .remove(name)
            .map_err(|e| JobError::InvalidRequest(e.to_string()))
    }

    // Runtimes

    pub fn list_runtimes(&self) -> Vec<String> {
        self.runtimes.list()
    }
}
