// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retention sweeper for per-job history directories.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Remove job directories whose newest history file is older than
/// `retention_days`. Returns how many directories were removed.
///
/// File age comes from the `YYYYMMDD-HHMMSS` filename stamp, falling back
/// to filesystem mtime for names that don't carry one.
pub fn sweep_once(base: &Path, retention_days: u32, now: DateTime<Utc>) -> std::io::Result<usize> {
    let cutoff = now - chrono::Duration::days(retention_days as i64);
    let mut removed = 0;

    let entries = match std::fs::read_dir(base) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let dir = entry.path();
        let newest = newest_file_time(&dir)?;
        match newest {
            Some(newest) if newest >= cutoff => {}
            // Empty directories and all-stale directories both go.
            _ => {
                std::fs::remove_dir_all(&dir)?;
                info!(dir = %dir.display(), "stale history removed");
                removed += 1;
            }
        }
    }
    Ok(removed)
}

fn newest_file_time(dir: &Path) -> std::io::Result<Option<DateTime<Utc>>> {
    let mut newest: Option<DateTime<Utc>> = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let time = entry
            .file_name()
            .to_str()
            .and_then(parse_stamp)
            .or_else(|| {
                entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .ok()
                    .map(DateTime::<Utc>::from)
            });
        if let Some(time) = time {
            newest = Some(newest.map_or(time, |n| n.max(time)));
        }
    }
    Ok(newest)
}

/// Parse the `YYYYMMDD-HHMMSS` prefix of a history file name.
fn parse_stamp(name: &str) -> Option<DateTime<Utc>> {
    let stamp = name.split('.').next()?;
    NaiveDateTime::parse_from_str(stamp, "%Y%m%d-%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Periodic sweeper over the log and metrics bases.
pub fn spawn_retention_sweeper(
    bases: Vec<(PathBuf, u32)>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for (base, retention_days) in &bases {
                        if let Err(e) = sweep_once(base, *retention_days, Utc::now()) {
                            warn!(base = %base.display(), error = %e, "retention sweep failed");
                        }
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    })
}

#[cfg(test)]
#[path = "retention_tests.rs"]
mod tests;
