// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job runtime: top-level orchestrator for single jobs and workflows.
//!
//! Owns every live job's mutable record (through the registry) and drives
//! the full lifecycle: validation, resource reservation, chroot build,
//! namespace launch, telemetry attachment, terminal transition, cleanup.
//! Components never hold references to each other's state; everything
//! cross-component travels by job ID.

use crate::cleanup::{CleanupCoordinator, CleanupRequest};
use crate::registry::JobRegistry;
use crate::runtimes::FsRuntimeCatalog;
use crate::scheduler::ScheduleBook;
use crate::supervisor::{supervise_child, ChildExit};
use crate::validation::ValidationService;
use crate::volumes::VolumeManager;
use async_trait::async_trait;
use joblet_core::{
    Clock, Config, IdGen, Job, JobError, JobId, JobSpec, JobStatus, LimitsSnapshot, UuidIdGen,
    WorkflowId,
};
use joblet_isolation::{
    CgroupManager, FilesystemIsolator, JobRoot, LaunchError, LaunchSpec, Launcher,
};
use joblet_network::NetworkManager;
use joblet_state::StateBatcher;
use joblet_telemetry::{LogPipeline, MetricsCollector, MetricsPipeline};
use joblet_workflow::{
    ExecutionReport, WorkflowDoc, WorkflowExecutor, WorkflowJobDef, WorkflowJobRunner,
    WorkflowStatus, WorkflowValidator,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Everything the runtime composes over; built once in `main` (or by a
/// test harness with fakes behind the Arcs).
pub struct RuntimeDeps {
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub registry: Arc<JobRegistry>,
    pub validation: ValidationService,
    pub cgroup: Arc<CgroupManager>,
    pub isolator: Arc<FilesystemIsolator>,
    pub network: Arc<NetworkManager>,
    pub volumes: Arc<VolumeManager>,
    pub runtimes: Arc<FsRuntimeCatalog>,
    pub logs: Arc<LogPipeline>,
    pub metrics: Arc<MetricsPipeline>,
    pub batcher: Arc<StateBatcher>,
    pub cleanup: Arc<CleanupCoordinator>,
}

/// Outcome record for one workflow.
#[derive(Debug, Clone)]
pub struct WorkflowRecord {
    pub status: WorkflowStatus,
    pub report: Option<ExecutionReport>,
}

pub struct JobRuntime {
    deps: RuntimeDeps,
    ids: UuidIdGen,
    launcher: Launcher,
    schedules: ScheduleBook,
    workflows: Mutex<HashMap<WorkflowId, WorkflowRecord>>,
}

impl JobRuntime {
    pub fn new(deps: RuntimeDeps) -> Arc<Self> {
        Arc::new(Self {
            deps,
            ids: UuidIdGen,
            launcher: Launcher::new(),
            schedules: ScheduleBook::new(),
            workflows: Mutex::new(HashMap::new()),
        })
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.deps.registry
    }

    pub fn config(&self) -> &Config {
        &self.deps.config
    }

    /// Accept a job request: validate, reserve a slot, and either start it
    /// or park it until its schedule fires.
    pub async fn submit(self: &Arc<Self>, spec: JobSpec) -> Result<Job, JobError> {
        let scheduled_for = self
            .deps
            .validation
            .validate_spec(&spec, self.schedules.len(), self.deps.clock.as_ref())
            .map_err(|e| JobError::InvalidRequest(e.to_string()))?;

        let mut spec = spec;
        if spec.network.is_empty() {
            spec.network = self.deps.config.network.default_network.clone();
        }
        if !self.deps.network.exists(&spec.network) {
            return Err(JobError::InvalidRequest(format!(
                "unknown network: {}",
                spec.network
            )));
        }
        self.deps
            .volumes
            .resolve(&spec.volumes)
            .map_err(|e| JobError::InvalidRequest(e.to_string()))?;
        if let Some(runtime) = &spec.runtime {
            if self.deps.runtimes.resolve(runtime).is_none() {
                return Err(JobError::InvalidRequest(format!(
                    "runtime not installed: {}",
                    runtime
                )));
            }
        }

        let running = self.deps.registry.running_count();
        if running >= self.deps.config.joblet.max_concurrent_jobs {
            return Err(JobError::ResourceExhausted(format!(
                "{} jobs running (cap {})",
                running, self.deps.config.joblet.max_concurrent_jobs
            )));
        }

        let job_id = JobId::new(self.ids.next());
        let job = Job::new(
            job_id.clone(),
            spec,
            scheduled_for,
            self.deps.clock.as_ref(),
        );
        self.deps.registry.insert(job.clone());
        self.deps.batcher.create_async(job.clone());
        info!(job_id = %job_id, status = %job.status, "job accepted");

        match scheduled_for {
            Some(due) => self.schedules.add(job_id, due),
            None => self.spawn_job(job_id),
        }
        Ok(job)
    }

    /// Stop (or cancel) a job.
    ///
    /// Scheduled and pending jobs cancel; running jobs get the
    /// SIGTERM → SIGKILL escalation and end `STOPPED`.
    pub async fn stop(self: &Arc<Self>, job_id: &JobId) -> Result<Job, JobError> {
        let job = self
            .deps
            .registry
            .get(job_id)
            .ok_or_else(|| JobError::InvalidRequest(format!("unknown job: {}", job_id)))?;

        match job.status {
            JobStatus::Scheduled | JobStatus::Pending => {
                self.schedules.cancel(job_id);
                let clock = Arc::clone(&self.deps.clock);
                let updated = self.update_job(job_id, |job| {
                    let _ = job.mark_canceled(clock.as_ref());
                });
                info!(job_id = %job_id, "job canceled");
                updated.ok_or(JobError::Canceled)
            }
            JobStatus::Running => {
                self.deps.registry.signal_stop(job_id);
                Ok(job)
            }
            status => Err(JobError::InvalidRequest(format!(
                "job already terminal ({})",
                status
            ))),
        }
    }

    pub fn get(&self, job_id: &JobId) -> Option<Job> {
        self.deps.registry.get(job_id)
    }

    pub fn list(&self) -> Vec<Job> {
        self.deps.registry.list()
    }

    /// Validate and launch a workflow; execution continues in background.
    pub fn submit_workflow(self: &Arc<Self>, doc: WorkflowDoc) -> Result<WorkflowId, JobError> {
        let networks = NetworkCatalogAdapter(Arc::clone(&self.deps.network));
        let validator = WorkflowValidator {
            volumes: self.deps.volumes.as_ref(),
            networks: &networks,
            runtimes: self.deps.runtimes.as_ref(),
        };
        validator
            .validate(&doc)
            .map_err(|e| JobError::InvalidRequest(e.to_string()))?;

        let workflow_id = WorkflowId::new(self.ids.next());
        self.workflows.lock().insert(
            workflow_id.clone(),
            WorkflowRecord {
                status: WorkflowStatus::Running,
                report: None,
            },
        );

        let executor = WorkflowExecutor::new(self.deps.config.joblet.max_concurrent_jobs);
        let runner: Arc<dyn WorkflowJobRunner> = Arc::new(RuntimeJobRunner(Arc::clone(self)));
        let runtime = Arc::clone(self);
        let id = workflow_id.clone();
        tokio::spawn(async move {
            match executor.execute(&id, &doc, runner).await {
                Ok(report) => {
                    runtime.workflows.lock().insert(
                        id.clone(),
                        WorkflowRecord {
                            status: report.status,
                            report: Some(report),
                        },
                    );
                }
                Err(e) => {
                    error!(workflow_id = %id, error = %e, "workflow execution failed");
                    runtime.workflows.lock().insert(
                        id.clone(),
                        WorkflowRecord {
                            status: WorkflowStatus::Failed,
                            report: None,
                        },
                    );
                }
            }
        });

        Ok(workflow_id)
    }

    pub fn workflow(&self, workflow_id: &WorkflowId) -> Option<WorkflowRecord> {
        self.workflows.lock().get(workflow_id).cloned()
    }

    /// Background loop: fire due schedules, scan for orphans. Runs until
    /// shutdown.
    pub async fn run_background(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut schedule_tick = tokio::time::interval(Duration::from_secs(1));
        let mut orphan_tick = tokio::time::interval(Duration::from_secs(
            self.deps.config.orphan_scan_interval_secs.max(1),
        ));
        orphan_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = schedule_tick.tick() => {
                    let now = self.deps.clock.utc();
                    for job_id in self.schedules.due_jobs(now) {
                        debug!(job_id = %job_id, "schedule fired");
                        self.update_job(&job_id, |job| {
                            let _ = job.transition_to(JobStatus::Pending);
                        });
                        self.spawn_job(job_id);
                    }
                }
                _ = orphan_tick.tick() => {
                    let live = self.deps.registry.live_ids();
                    let cleaned = self.deps.cleanup.orphan_scan(&live).await;
                    if !cleaned.is_empty() {
                        info!(count = cleaned.len(), "orphans reaped");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    }

    fn spawn_job(self: &Arc<Self>, job_id: JobId) {
        let runtime = Arc::clone(self);
        tokio::spawn(async move {
            runtime.run_job(job_id).await;
        });
    }

    /// Persist a registry mutation through the batcher.
    fn update_job<F>(&self, job_id: &JobId, mutate: F) -> Option<Job>
    where
        F: FnOnce(&mut Job),
    {
        let updated = self.deps.registry.update(job_id, mutate)?;
        self.deps.batcher.update_async(updated.clone());
        Some(updated)
    }

    /// Drive one job from `PENDING` to its terminal status.
    async fn run_job(self: Arc<Self>, job_id: JobId) {
        let Some(job) = self.deps.registry.get(&job_id) else {
            return;
        };
        let spec = job.spec.clone();

        // Resource reservation: cgroup first, then the chroot tree.
        let cgroup_path = match self.deps.cgroup.create(&job_id, &spec.limits) {
            Ok(path) => path,
            Err(e) => {
                self.fail_before_start(&job_id, None, JobError::LimitsNotEnforceable(e.to_string()))
                    .await;
                return;
            }
        };

        let volumes = match self.deps.volumes.resolve(&spec.volumes) {
            Ok(volumes) => volumes,
            Err(e) => {
                self.fail_before_start(&job_id, None, JobError::InvalidRequest(e.to_string()))
                    .await;
                return;
            }
        };

        let runtime_dir = spec
            .runtime
            .as_deref()
            .and_then(|raw| self.deps.runtimes.resolve(raw));

        let build_result = if spec.runtime_build {
            self.deps.isolator.build_runtime_root(&job_id)
        } else {
            self.deps.isolator.build(
                &job_id,
                &volumes,
                runtime_dir.as_deref(),
                &spec.limits.gpu_indices,
            )
        };
        let job_root = match build_result {
            Ok(job_root) => job_root,
            Err(e) => {
                self.fail_before_start(&job_id, None, JobError::IsolationFailed(e.to_string()))
                    .await;
                return;
            }
        };

        // Launch into the namespaces. Only runtime builds skip the network
        // namespace; `none` keeps the namespace and simply gets no
        // interfaces configured in it.
        let hostname = format!("job-{}", job_id.short(8));
        let network_namespace = !spec.runtime_build;
        let mut env: Vec<(String, String)> = spec.env.clone().into_iter().collect();
        env.extend(spec.secret_env.clone());
        env.sort();

        let launch = LaunchSpec {
            job_id: job_id.clone(),
            command: spec.command.clone(),
            args: spec.args.clone(),
            env,
            hostname: hostname.clone(),
            root: job_root.root.clone(),
            cgroup_procs: Some(cgroup_path.join("proc/cgroup.procs")),
            network_namespace,
        };
        let spawned = match self.launcher.spawn(launch) {
            Ok(spawned) => spawned,
            Err(e) => {
                let kind = match e {
                    LaunchError::Isolation(reason) => JobError::IsolationFailed(reason),
                    LaunchError::Exec(reason) => JobError::ExecFailed(reason),
                };
                self.fail_before_start(&job_id, Some(job_root), kind).await;
                return;
            }
        };
        let pid = spawned.pid;

        // Network attachment needs the child's namespace, so it follows
        // the launch.
        if network_namespace {
            if let Err(e) = self
                .deps
                .network
                .attach(&job_id, &spec.network, pid, &hostname)
                .await
            {
                let _ = joblet_platform::signal::send_kill(pid);
                self.fail_before_start(&job_id, Some(job_root), JobError::IsolationFailed(e.to_string()))
                    .await;
                return;
            }
        }

        let clock = Arc::clone(&self.deps.clock);
        self.update_job(&job_id, |job| {
            let _ = job.mark_running(pid, clock.as_ref());
        });

        // Telemetry: one collector, two log pumps.
        let (collector_stop_tx, collector_stop_rx) = watch::channel(false);
        let collector = MetricsCollector::new(
            job_id.clone(),
            cgroup_path.clone(),
            Duration::from_secs(self.deps.config.metrics_interval_secs),
            LimitsSnapshot::from(&spec.limits),
            spec.limits.gpu_indices.clone(),
            Arc::clone(&self.deps.metrics),
        );
        let collector_handle = tokio::spawn(collector.run(collector_stop_rx));

        let stop_rx = match self.deps.registry.stop_receiver(&job_id) {
            Some(stop_rx) => stop_rx,
            None => watch::channel(false).1,
        };
        let grace = Duration::from_secs(self.deps.config.cgroup.cleanup_timeout_secs);
        let exit = supervise_child(
            job_id.clone(),
            spawned.child,
            Arc::clone(&self.deps.logs),
            stop_rx,
            grace,
        )
        .await;

        let _ = collector_stop_tx.send(true);
        let _ = collector_handle.await;

        let clock = Arc::clone(&self.deps.clock);
        self.update_job(&job_id, |job| {
            let result = match exit {
                ChildExit::Code(0) => job.mark_completed(clock.as_ref()),
                ChildExit::Code(code) => {
                    job.mark_failed(Some(code), format!("exited with code {}", code), clock.as_ref())
                }
                ChildExit::Signal(signal) => {
                    job.mark_failed(None, format!("killed by signal {}", signal), clock.as_ref())
                }
                ChildExit::Stopped => job.mark_stopped(clock.as_ref()),
            };
            if let Err(e) = result {
                warn!(job_id = %job.id, error = %e, "terminal transition rejected");
            }
        });

        self.finish(&job_id, None, Some(job_root)).await;
    }

    /// Failure before the child ran: record the reason, then clean up
    /// whatever was reserved.
    async fn fail_before_start(&self, job_id: &JobId, job_root: Option<JobRoot>, error: JobError) {
        warn!(job_id = %job_id, error = %error, "job failed before start");
        let clock = Arc::clone(&self.deps.clock);
        let reason = error.to_string();
        self.update_job(job_id, move |job| {
            let _ = job.mark_failed(None, reason, clock.as_ref());
        });
        self.finish(job_id, None, job_root).await;
    }

    /// Terminal path shared by success and failure: cleanup, final state
    /// flush, and removal from memory.
    async fn finish(&self, job_id: &JobId, pid: Option<u32>, job_root: Option<JobRoot>) {
        let request = CleanupRequest {
            job_id: job_id.clone(),
            pid,
            job_root,
        };
        if let Err(e) = self.deps.cleanup.cleanup(request).await {
            warn!(job_id = %job_id, error = %e, "cleanup reported errors");
        }

        if let Some(job) = self.deps.registry.get(job_id) {
            self.deps.batcher.update_async(job);
        }
        if let Err(e) = self.deps.batcher.flush().await {
            warn!(job_id = %job_id, error = %e, "final state flush failed");
        }
        self.deps.registry.remove(job_id);
        self.deps.metrics.remove_job(job_id);
        self.deps.logs.remove_job(job_id);
        debug!(job_id = %job_id, "job released from memory");
    }
}

/// `NetworkCatalog` view over the network manager for workflow validation.
struct NetworkCatalogAdapter(Arc<NetworkManager>);

impl joblet_workflow::NetworkCatalog for NetworkCatalogAdapter {
    fn network_exists(&self, name: &str) -> bool {
        self.0.exists(name)
    }
}

/// Workflow jobs run through the ordinary submit path and wait for the
/// terminal transition.
struct RuntimeJobRunner(Arc<JobRuntime>);

#[async_trait]
impl WorkflowJobRunner for RuntimeJobRunner {
    async fn run_job(
        &self,
        workflow_id: &WorkflowId,
        name: &str,
        definition: &WorkflowJobDef,
    ) -> JobStatus {
        let spec = JobSpec {
            command: definition.command.clone(),
            args: definition.args.clone(),
            env: definition.env.clone(),
            secret_env: definition.secret_env.clone(),
            limits: definition.limits.clone(),
            network: definition.network.clone(),
            volumes: definition.volumes.clone(),
            runtime: definition.runtime.clone(),
            schedule: None,
            workflow_id: Some(workflow_id.clone()),
            runtime_build: false,
        };

        let job = match self.0.submit(spec).await {
            Ok(job) => job,
            Err(e) => {
                warn!(workflow_id = %workflow_id, job = name, error = %e, "workflow job rejected");
                return JobStatus::Failed;
            }
        };

        self.0
            .deps
            .registry
            .wait_terminal(&job.id)
            .await
            .unwrap_or(JobStatus::Failed)
    }
}
