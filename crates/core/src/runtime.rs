// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime environment references.
//!
//! A runtime is a pre-built language environment (e.g. Python 3.11) whose
//! files are mounted into a job's chroot. Runtimes are addressed as
//! `<name>@<version>` and stored in directories of the same shape.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rewrite the first `-` or `:` separator to `@`.
///
/// Accepts the legacy spellings `python-3.11` and `python:3.11` for
/// `python@3.11`. Only the first separator is rewritten: later hyphens are
/// part of the version (`python-3.11-debug` becomes `python@3.11-debug`).
pub fn normalize_runtime_name(name: &str) -> String {
    if name.contains('@') {
        return name.to_string();
    }
    for (i, c) in name.char_indices() {
        if c == '-' || c == ':' {
            let mut out = String::with_capacity(name.len());
            out.push_str(&name[..i]);
            out.push('@');
            out.push_str(&name[i + 1..]);
            return out;
        }
    }
    name.to_string()
}

/// A parsed runtime selection, e.g. `python@3.11` or `python@3.11@1.0.0`
/// (name, version, optional build).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuntimeRef {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
}

impl RuntimeRef {
    /// Parse a runtime selection after normalization.
    ///
    /// Returns `None` for a bare name with no version.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = normalize_runtime_name(raw.trim());
        let mut parts = normalized.splitn(3, '@');
        let name = parts.next()?.to_string();
        let version = parts.next()?.to_string();
        if name.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self {
            name,
            version,
            build: parts.next().map(str::to_string),
        })
    }

    /// Directory name under the runtimes base.
    pub fn dir_name(&self) -> String {
        match &self.build {
            Some(build) => format!("{}@{}@{}", self.name, self.version, build),
            None => format!("{}@{}", self.name, self.version),
        }
    }
}

impl fmt::Display for RuntimeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
