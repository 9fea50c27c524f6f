// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Topological workflow execution.
//!
//! Every job whose `requires` clause evaluates true runs as its own task,
//! bounded by `max_concurrent_jobs`. On each status change the executor
//! re-evaluates waiting gates: a gate that has become definitively false
//! (an upstream settled the wrong way) skips its job as `CANCELED`, so no
//! job waits forever on an outcome that can no longer happen.

use crate::document::{RequiresSpec, WorkflowDoc, WorkflowJobDef};
use crate::expr::{Expr, ExprError, Outcome};
use async_trait::async_trait;
use joblet_core::{JobStatus, WorkflowId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("job {job}: requires expression: {source}")]
    Expression {
        job: String,
        #[source]
        source: ExprError,
    },
    #[error("workflow task panicked: {0}")]
    TaskPanic(String),
}

/// Derived status of a whole workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
    Canceled,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowStatus::Running => "RUNNING",
            WorkflowStatus::Completed => "COMPLETED",
            WorkflowStatus::Failed => "FAILED",
            WorkflowStatus::Canceled => "CANCELED",
        };
        write!(f, "{}", s)
    }
}

/// `RUNNING` while anything is non-terminal, then `FAILED` over
/// `CANCELED` over `COMPLETED` by precedence.
pub fn derive_workflow_status<'a, I>(statuses: I) -> WorkflowStatus
where
    I: IntoIterator<Item = Option<&'a JobStatus>>,
{
    let mut any_failed = false;
    let mut any_canceled = false;
    for status in statuses {
        match status {
            None => return WorkflowStatus::Running,
            Some(status) if !status.is_terminal() => return WorkflowStatus::Running,
            Some(JobStatus::Failed) => any_failed = true,
            Some(JobStatus::Canceled) | Some(JobStatus::Stopped) => any_canceled = true,
            Some(_) => {}
        }
    }
    if any_failed {
        WorkflowStatus::Failed
    } else if any_canceled {
        WorkflowStatus::Canceled
    } else {
        WorkflowStatus::Completed
    }
}

/// Runs one workflow job to a terminal status. The job runtime implements
/// this; tests use scripted fakes.
#[async_trait]
pub trait WorkflowJobRunner: Send + Sync {
    async fn run_job(
        &self,
        workflow_id: &WorkflowId,
        name: &str,
        definition: &WorkflowJobDef,
    ) -> JobStatus;
}

/// Final per-job statuses and the derived workflow status.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub statuses: HashMap<String, JobStatus>,
    pub status: WorkflowStatus,
}

enum Gate {
    Always,
    Expr(Expr),
}

impl Gate {
    fn evaluate(&self, statuses: &HashMap<String, Option<JobStatus>>) -> Outcome {
        match self {
            Gate::Always => Outcome::True,
            Gate::Expr(expr) => expr.evaluate(&|job| statuses.get(job).copied().flatten()),
        }
    }
}

/// Builds each job's gate. A status map becomes an AND of equality
/// comparisons; an expression string parses once up front.
fn build_gate(name: &str, definition: &WorkflowJobDef) -> Result<Gate, WorkflowError> {
    match &definition.requires {
        None => Ok(Gate::Always),
        Some(RequiresSpec::StatusMap(map)) => {
            let mut combined: Option<Expr> = None;
            for (dependency, status) in map {
                let clause = Expr::Compare {
                    job: dependency.clone(),
                    negated: false,
                    statuses: vec![*status],
                };
                combined = Some(match combined {
                    None => clause,
                    Some(left) => Expr::And(Box::new(left), Box::new(clause)),
                });
            }
            Ok(combined.map(Gate::Expr).unwrap_or(Gate::Always))
        }
        Some(RequiresSpec::Expression(raw)) => {
            let expr = Expr::parse(raw).map_err(|source| WorkflowError::Expression {
                job: name.to_string(),
                source,
            })?;
            Ok(Gate::Expr(expr))
        }
    }
}

pub struct WorkflowExecutor {
    max_concurrent: usize,
}

impl WorkflowExecutor {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Run the workflow to completion.
    ///
    /// Assumes the document already passed validation (acyclic, references
    /// resolve); expression parse failures are still reported.
    pub async fn execute(
        &self,
        workflow_id: &WorkflowId,
        doc: &WorkflowDoc,
        runner: Arc<dyn WorkflowJobRunner>,
    ) -> Result<ExecutionReport, WorkflowError> {
        let mut gates: HashMap<String, Gate> = HashMap::new();
        for (name, definition) in &doc.jobs {
            gates.insert(name.clone(), build_gate(name, definition)?);
        }

        let mut statuses: HashMap<String, Option<JobStatus>> =
            doc.jobs.keys().map(|name| (name.clone(), None)).collect();
        let mut started: HashMap<String, bool> =
            doc.jobs.keys().map(|name| (name.clone(), false)).collect();

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks: JoinSet<(String, JobStatus)> = JoinSet::new();

        info!(workflow_id = %workflow_id, jobs = doc.jobs.len(), "workflow started");

        loop {
            // Fixpoint: start every gate that is true, skip every gate that
            // can no longer become true. Skipping may settle further gates.
            loop {
                let mut changed = false;
                for (name, definition) in &doc.jobs {
                    if started[name] {
                        continue;
                    }
                    let Some(gate) = gates.get(name) else { continue };
                    match gate.evaluate(&statuses) {
                        Outcome::True => {
                            started.insert(name.clone(), true);
                            changed = true;
                            self.spawn_job(
                                &mut tasks,
                                Arc::clone(&semaphore),
                                Arc::clone(&runner),
                                workflow_id.clone(),
                                name.clone(),
                                definition.clone(),
                            );
                        }
                        Outcome::False => {
                            debug!(workflow_id = %workflow_id, job = name, "gate unsatisfiable, skipping");
                            started.insert(name.clone(), true);
                            statuses.insert(name.clone(), Some(JobStatus::Canceled));
                            changed = true;
                        }
                        Outcome::Pending => {}
                    }
                }
                if !changed {
                    break;
                }
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            match joined {
                Ok((name, status)) => {
                    debug!(workflow_id = %workflow_id, job = %name, status = %status, "workflow job settled");
                    statuses.insert(name, Some(status));
                }
                Err(e) => {
                    warn!(workflow_id = %workflow_id, error = %e, "workflow job task failed");
                    return Err(WorkflowError::TaskPanic(e.to_string()));
                }
            }
        }

        let final_statuses: HashMap<String, JobStatus> = statuses
            .iter()
            .map(|(name, status)| (name.clone(), status.unwrap_or(JobStatus::Canceled)))
            .collect();
        let status = derive_workflow_status(statuses.values().map(|s| s.as_ref()));

        info!(workflow_id = %workflow_id, status = %status, "workflow finished");
        Ok(ExecutionReport {
            statuses: final_statuses,
            status,
        })
    }

    fn spawn_job(
        &self,
        tasks: &mut JoinSet<(String, JobStatus)>,
        semaphore: Arc<Semaphore>,
        runner: Arc<dyn WorkflowJobRunner>,
        workflow_id: WorkflowId,
        name: String,
        definition: WorkflowJobDef,
    ) {
        tasks.spawn(async move {
            // Concurrency cap applies to execution, not to readiness.
            let _permit = semaphore.acquire_owned().await.ok();
            let status = runner.run_job(&workflow_id, &name, &definition).await;
            (name, status)
        });
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
