// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource limit types and CPU core-set parsing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Errors from parsing resource limit expressions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitsError {
    #[error("empty core set")]
    EmptyCoreSet,
    #[error("invalid core number: {0}")]
    InvalidCore(String),
    #[error("invalid core range: {0}")]
    InvalidRange(String),
    #[error("duplicate core number: {0}")]
    DuplicateCore(u32),
}

/// Requested resource limits for a job.
///
/// Zero means "no limit on this resource"; the cgroup manager only writes
/// controller files for non-zero values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// CPU bandwidth as a percentage of one core (100 = one full core).
    #[serde(default)]
    pub max_cpu: u32,
    /// Memory ceiling in megabytes.
    #[serde(default)]
    pub max_memory: u64,
    /// IO bandwidth in bytes per second (applied to both reads and writes).
    #[serde(default)]
    pub max_io_bps: u64,
    /// CPU core pinning, e.g. `0-3` or `0,2,4`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_cores: Option<CpuCoreSet>,
    /// GPU device indices allocated to the job.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gpu_indices: Vec<u32>,
}

impl ResourceLimits {
    /// True when at least one limit is requested.
    pub fn has_any(&self) -> bool {
        self.max_cpu > 0
            || self.max_memory > 0
            || self.max_io_bps > 0
            || self.cpu_cores.is_some()
            || !self.gpu_indices.is_empty()
    }
}

/// A parsed CPU core set: `N`, `N-M`, or `N,M,…` (forms may be mixed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuCoreSet {
    /// Original expression, preserved for cpuset.cpus writes.
    expr: String,
    cores: BTreeSet<u32>,
}

impl CpuCoreSet {
    /// Parse a core-set expression.
    ///
    /// Duplicate core numbers are rejected, including duplicates produced
    /// by overlapping ranges.
    pub fn parse(expr: &str) -> Result<Self, LimitsError> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(LimitsError::EmptyCoreSet);
        }

        let mut cores = BTreeSet::new();
        for part in expr.split(',') {
            let part = part.trim();
            if let Some((lo, hi)) = part.split_once('-') {
                let lo: u32 = lo
                    .trim()
                    .parse()
                    .map_err(|_| LimitsError::InvalidRange(part.to_string()))?;
                let hi: u32 = hi
                    .trim()
                    .parse()
                    .map_err(|_| LimitsError::InvalidRange(part.to_string()))?;
                if lo > hi {
                    return Err(LimitsError::InvalidRange(part.to_string()));
                }
                for core in lo..=hi {
                    if !cores.insert(core) {
                        return Err(LimitsError::DuplicateCore(core));
                    }
                }
            } else {
                let core: u32 = part
                    .parse()
                    .map_err(|_| LimitsError::InvalidCore(part.to_string()))?;
                if !cores.insert(core) {
                    return Err(LimitsError::DuplicateCore(core));
                }
            }
        }

        Ok(Self {
            expr: expr.to_string(),
            cores,
        })
    }

    /// The expression as written (what goes into `cpuset.cpus`).
    pub fn expr(&self) -> &str {
        &self.expr
    }

    pub fn count(&self) -> usize {
        self.cores.len()
    }

    pub fn contains(&self, core: u32) -> bool {
        self.cores.contains(&core)
    }

    /// Highest core number in the set.
    pub fn max_core(&self) -> u32 {
        self.cores.iter().next_back().copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.cores.iter().copied()
    }
}

impl fmt::Display for CpuCoreSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

impl Serialize for CpuCoreSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.expr)
    }
}

impl<'de> Deserialize<'de> for CpuCoreSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let expr = String::deserialize(deserializer)?;
        Self::parse(&expr).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "limits_tests.rs"]
mod tests;
