// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Historical reader over a job's on-disk JSONL history.

use crate::pipeline::JobRecord;
use chrono::{DateTime, Utc};
use flate2::read::MultiGzDecoder;
use joblet_core::JobId;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("no history for job {0}")]
    NotFound(String),
    #[error("ambiguous job prefix {0}")]
    AmbiguousPrefix(String),
    #[error("history io: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads per-job history directories under one base.
pub struct HistoryReader {
    base: PathBuf,
}

impl HistoryReader {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Resolve a (possibly short) job UUID prefix against the directory
    /// names. Exact matches win; otherwise the prefix must be unique.
    pub fn resolve_job(&self, prefix: &str) -> Result<JobId, ReadError> {
        let entries = match std::fs::read_dir(&self.base) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ReadError::NotFound(prefix.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut matches = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name == prefix {
                return Ok(JobId::new(name));
            }
            if name.starts_with(prefix) {
                matches.push(name);
            }
        }

        match matches.len() {
            0 => Err(ReadError::NotFound(prefix.to_string())),
            1 => Ok(JobId::new(matches.remove(0))),
            _ => Err(ReadError::AmbiguousPrefix(prefix.to_string())),
        }
    }

    /// Read a job's records, sorted by timestamp and filtered to the
    /// inclusive range. Gzipped files are decompressed transparently; a
    /// truncated gzip tail (writer died mid-file) ends that file's stream
    /// once at least one record was decoded from it.
    pub fn read<T>(
        &self,
        job_prefix: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<T>, ReadError>
    where
        T: JobRecord + DeserializeOwned,
    {
        let job_id = self.resolve_job(job_prefix)?;
        let dir = self.base.join(job_id.as_str());

        let mut file_names: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(".jsonl") || name.ends_with(".jsonl.gz") {
                    file_names.push(name.to_string());
                }
            }
        }
        file_names.sort();

        let mut records: Vec<T> = Vec::new();
        for name in &file_names {
            read_file(&dir.join(name), &mut records)?;
        }

        records.sort_by_key(|r| r.timestamp());
        records.retain(|r| {
            from.map_or(true, |from| r.timestamp() >= from)
                && to.map_or(true, |to| r.timestamp() <= to)
        });

        debug!(job_id = %job_id, files = file_names.len(), records = records.len(), "history read");
        Ok(records)
    }
}

fn read_file<T: DeserializeOwned>(path: &Path, out: &mut Vec<T>) -> Result<(), ReadError> {
    let file = File::open(path)?;
    let gz = path.extension().is_some_and(|ext| ext == "gz");
    let reader: Box<dyn Read> = if gz {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let mut reader = BufReader::new(reader);

    let mut decoded_here = 0usize;
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                if decoded_here > 0 {
                    // Truncated tail from a crashed writer: everything up to
                    // the last complete line counts.
                    debug!(path = %path.display(), error = %e, "truncated history tail");
                    break;
                }
                return Err(e.into());
            }
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(trimmed) {
            Ok(record) => {
                out.push(record);
                decoded_here += 1;
            }
            Err(_) => {
                // Partial final line (no newline made it to disk).
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
