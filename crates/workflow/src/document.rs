// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow document model and YAML parsing.
//!
//! ```yaml
//! name: etl
//! jobs:
//!   extract:
//!     command: python3
//!     args: ["extract.py"]
//!   transform:
//!     command: python3
//!     args: ["transform.py"]
//!     requires:
//!       extract: COMPLETED
//!   load:
//!     command: python3
//!     args: ["load.py"]
//!     requires: "extract == COMPLETED AND transform == COMPLETED"
//! ```
//!
//! `requires` is either a map of `job → status` pairs (all must hold) or a
//! boolean expression string over other jobs' statuses.

use indexmap::IndexMap;
use joblet_core::{JobStatus, ResourceLimits};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("workflow parse: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("workflow has no jobs")]
    Empty,
}

/// Dependency clause for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequiresSpec {
    /// Boolean expression over job names and status literals.
    Expression(String),
    /// `job → status` pairs; all must hold (AND semantics).
    StatusMap(IndexMap<String, JobStatus>),
}

/// One named job definition inside a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowJobDef {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub secret_env: HashMap<String, String>,
    #[serde(default)]
    pub limits: ResourceLimits,
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<RequiresSpec>,
}

/// An ordered set of named job definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDoc {
    #[serde(default)]
    pub name: String,
    pub jobs: IndexMap<String, WorkflowJobDef>,
}

impl WorkflowDoc {
    /// Parse a YAML workflow document.
    pub fn parse(raw: &str) -> Result<Self, DocumentError> {
        let doc: WorkflowDoc = serde_yaml::from_str(raw)?;
        if doc.jobs.is_empty() {
            return Err(DocumentError::Empty);
        }
        Ok(doc)
    }

    /// The job names each job depends on, from either requires form.
    ///
    /// Expression clauses contribute every job name they reference.
    pub fn dependency_names(&self, job: &WorkflowJobDef) -> Vec<String> {
        match &job.requires {
            None => Vec::new(),
            Some(RequiresSpec::StatusMap(map)) => map.keys().cloned().collect(),
            Some(RequiresSpec::Expression(raw)) => crate::expr::Expr::parse(raw)
                .map(|expr| expr.referenced_jobs())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
