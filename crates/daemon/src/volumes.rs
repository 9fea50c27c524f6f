// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Volume manager: named persistent directories and memory volumes.

use joblet_core::config::VolumesConfig;
use joblet_core::{Volume, VolumeKind};
use joblet_platform::fs;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("volume {0} already exists")]
    AlreadyExists(String),
    #[error("volume {0} does not exist")]
    NotFound(String),
    #[error("invalid volume name {0:?}")]
    BadName(String),
    #[error(transparent)]
    Platform(#[from] joblet_platform::PlatformError),
}

/// Owns the volume store. Filesystem volumes are directories under the
/// configured base; memory volumes only exist while a job mounts them.
pub struct VolumeManager {
    base: PathBuf,
    default_quota_mb: u64,
    volumes: Mutex<HashMap<String, Volume>>,
}

impl VolumeManager {
    /// Load the store, adopting directories already on disk.
    pub fn new(config: &VolumesConfig) -> Result<Self, VolumeError> {
        let mut volumes = HashMap::new();
        for name in fs::list_subdirs(&config.base_path)? {
            volumes.insert(
                name.clone(),
                Volume::filesystem(
                    name.clone(),
                    config.default_quota_mb,
                    config.base_path.join(&name),
                ),
            );
        }
        Ok(Self {
            base: config.base_path.clone(),
            default_quota_mb: config.default_quota_mb,
            volumes: Mutex::new(volumes),
        })
    }

    /// Create a volume. Filesystem volumes get their backing directory.
    pub fn create(
        &self,
        name: &str,
        kind: VolumeKind,
        size_mb: Option<u64>,
    ) -> Result<Volume, VolumeError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(VolumeError::BadName(name.to_string()));
        }

        let mut volumes = self.volumes.lock();
        if volumes.contains_key(name) {
            return Err(VolumeError::AlreadyExists(name.to_string()));
        }

        let size_mb = size_mb.unwrap_or(self.default_quota_mb);
        let volume = match kind {
            VolumeKind::Filesystem => {
                let path = self.base.join(name);
                fs::ensure_dir(&path)?;
                Volume::filesystem(name, size_mb, path)
            }
            VolumeKind::Memory => Volume::memory(name, size_mb),
        };
        volumes.insert(name.to_string(), volume.clone());
        info!(volume = name, ?kind, size_mb, "volume created");
        Ok(volume)
    }

    pub fn remove(&self, name: &str) -> Result<(), VolumeError> {
        let volume = self
            .volumes
            .lock()
            .remove(name)
            .ok_or_else(|| VolumeError::NotFound(name.to_string()))?;
        if let Some(path) = &volume.host_path {
            fs::remove_tree(path)?;
        }
        info!(volume = name, "volume removed");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Volume> {
        self.volumes.lock().get(name).cloned()
    }

    pub fn list(&self) -> Vec<Volume> {
        let mut list: Vec<Volume> = self.volumes.lock().values().cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// Resolve a job's volume names to definitions.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<Volume>, VolumeError> {
        names
            .iter()
            .map(|name| {
                self.get(name)
                    .ok_or_else(|| VolumeError::NotFound(name.clone()))
            })
            .collect()
    }
}

impl joblet_workflow::VolumeCatalog for VolumeManager {
    fn volume_exists(&self, name: &str) -> bool {
        // Either in the store or already a directory under the base
        self.volumes.lock().contains_key(name) || self.base.join(name).is_dir()
    }
}

#[cfg(test)]
#[path = "volumes_tests.rs"]
mod tests;
