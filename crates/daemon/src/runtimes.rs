// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime catalog backed by the runtimes directory.
//!
//! Installed runtimes are directories named `<name>@<version>` (optionally
//! `@<build>`) under the configured base, produced by runtime-build jobs.

use joblet_core::config::RuntimesConfig;
use joblet_core::{normalize_runtime_name, RuntimeRef};
use joblet_platform::fs;
use std::path::PathBuf;

pub struct FsRuntimeCatalog {
    base: PathBuf,
}

impl FsRuntimeCatalog {
    pub fn new(config: &RuntimesConfig) -> Self {
        Self {
            base: config.base_path.clone(),
        }
    }

    /// Installed runtime directory names.
    pub fn list(&self) -> Vec<String> {
        let mut names = fs::list_subdirs(&self.base).unwrap_or_default();
        names.retain(|name| name.contains('@'));
        names.sort();
        names
    }

    /// Resolve a user-supplied selection to an installed directory name.
    pub fn resolve(&self, raw: &str) -> Option<String> {
        let runtime = RuntimeRef::parse(raw)?;
        let dir = runtime.dir_name();
        if self.base.join(&dir).is_dir() {
            return Some(dir);
        }
        // Selection without a build: any installed build of that version
        let prefix = format!("{}@", dir);
        self.list().into_iter().find(|name| name.starts_with(&prefix))
    }
}

impl joblet_workflow::RuntimeCatalog for FsRuntimeCatalog {
    fn runtime_available(&self, name: &str) -> bool {
        if self.resolve(name).is_some() {
            return true;
        }
        // Bare names with no version match any installed version
        let normalized = normalize_runtime_name(name);
        let prefix = format!("{}@", normalized);
        self.list().iter().any(|installed| installed.starts_with(&prefix))
    }
}

#[cfg(test)]
#[path = "runtimes_tests.rs"]
mod tests;
