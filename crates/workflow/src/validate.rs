// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow validation.
//!
//! Structural checks (references resolve, graph is acyclic) plus host
//! checks through injected capability traits, so tests run against fakes
//! and the daemon injects its real volume/network/runtime managers.

use crate::document::{RequiresSpec, WorkflowDoc};
use crate::expr::Expr;
use crate::graph::detect_cycle;
use indexmap::IndexMap;
use thiserror::Error;

/// Maximum environment value size (32 KiB).
const MAX_ENV_VALUE: usize = 32 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("job {job}: dependency {dependency} does not exist in the workflow")]
    UnknownDependency { job: String, dependency: String },
    #[error("job {job}: requires expression: {reason}")]
    BadExpression { job: String, reason: String },
    #[error("dependency cycle: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },
    #[error("job {job}: volume {volume} does not exist")]
    UnknownVolume { job: String, volume: String },
    #[error("job {job}: network {network} does not exist")]
    UnknownNetwork { job: String, network: String },
    #[error("job {job}: runtime {runtime} is not available")]
    UnknownRuntime { job: String, runtime: String },
    #[error("job {job}: invalid environment key {key:?}")]
    BadEnvKey { job: String, key: String },
    #[error("job {job}: environment value for {key} exceeds 32 KiB")]
    EnvValueTooLarge { job: String, key: String },
    #[error("job {job}: key {key} appears in both env and secret_env")]
    EnvKeyOverlap { job: String, key: String },
}

/// Does a named volume exist on this host?
pub trait VolumeCatalog: Send + Sync {
    fn volume_exists(&self, name: &str) -> bool;
}

/// Does a named network exist (built-in or user-defined)?
pub trait NetworkCatalog: Send + Sync {
    fn network_exists(&self, name: &str) -> bool;
}

/// Is a runtime advertised as installed?
pub trait RuntimeCatalog: Send + Sync {
    fn runtime_available(&self, name: &str) -> bool;
}

/// Validates workflow documents against the host's catalogs.
pub struct WorkflowValidator<'a> {
    pub volumes: &'a dyn VolumeCatalog,
    pub networks: &'a dyn NetworkCatalog,
    pub runtimes: &'a dyn RuntimeCatalog,
}

impl WorkflowValidator<'_> {
    /// Run every check; the first failure is returned.
    pub fn validate(&self, doc: &WorkflowDoc) -> Result<(), ValidationError> {
        let mut deps: IndexMap<String, Vec<String>> = IndexMap::new();

        for (name, job) in &doc.jobs {
            // Dependency references and expression syntax
            match &job.requires {
                None => {
                    deps.insert(name.clone(), Vec::new());
                }
                Some(RequiresSpec::StatusMap(map)) => {
                    for dependency in map.keys() {
                        if !doc.jobs.contains_key(dependency) {
                            return Err(ValidationError::UnknownDependency {
                                job: name.clone(),
                                dependency: dependency.clone(),
                            });
                        }
                    }
                    deps.insert(name.clone(), map.keys().cloned().collect());
                }
                Some(RequiresSpec::Expression(raw)) => {
                    let expr = Expr::parse(raw).map_err(|e| ValidationError::BadExpression {
                        job: name.clone(),
                        reason: e.to_string(),
                    })?;
                    let referenced = expr.referenced_jobs();
                    for dependency in &referenced {
                        if !doc.jobs.contains_key(dependency) {
                            return Err(ValidationError::UnknownDependency {
                                job: name.clone(),
                                dependency: dependency.clone(),
                            });
                        }
                    }
                    deps.insert(name.clone(), referenced);
                }
            }

            // Host resources
            for volume in &job.volumes {
                if !self.volumes.volume_exists(volume) {
                    return Err(ValidationError::UnknownVolume {
                        job: name.clone(),
                        volume: volume.clone(),
                    });
                }
            }
            if !job.network.is_empty() && !self.networks.network_exists(&job.network) {
                return Err(ValidationError::UnknownNetwork {
                    job: name.clone(),
                    network: job.network.clone(),
                });
            }
            if let Some(runtime) = &job.runtime {
                if !self.runtimes.runtime_available(runtime) {
                    return Err(ValidationError::UnknownRuntime {
                        job: name.clone(),
                        runtime: runtime.clone(),
                    });
                }
            }

            // Environment
            for key in job.env.keys().chain(job.secret_env.keys()) {
                if !valid_env_key(key) {
                    return Err(ValidationError::BadEnvKey {
                        job: name.clone(),
                        key: key.clone(),
                    });
                }
            }
            for (key, value) in job.env.iter().chain(job.secret_env.iter()) {
                if value.len() > MAX_ENV_VALUE {
                    return Err(ValidationError::EnvValueTooLarge {
                        job: name.clone(),
                        key: key.clone(),
                    });
                }
            }
            for key in job.env.keys() {
                if job.secret_env.contains_key(key) {
                    return Err(ValidationError::EnvKeyOverlap {
                        job: name.clone(),
                        key: key.clone(),
                    });
                }
            }
        }

        if let Some(path) = detect_cycle(&deps) {
            return Err(ValidationError::Cycle { path });
        }

        Ok(())
    }
}

/// `^[A-Za-z_][A-Za-z0-9_]*$`
fn valid_env_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
