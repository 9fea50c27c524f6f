// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-consumer disk writer for one record kind.
//!
//! Batches by count or interval, whichever fires first, and fsyncs after
//! each batch. Every job gets its own directory with one file per writer
//! session, named from the wall clock at first write:
//! `<base>/<job-uuid>/<YYYYMMDD-HHMMSS>.jsonl[.gz]`.

use crate::pipeline::JobRecord;
use flate2::write::GzEncoder;
use flate2::Compression;
use joblet_core::JobId;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

pub(crate) struct WriterConfig {
    pub base: PathBuf,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub compress: bool,
}

enum JobFile {
    Plain(File),
    Gzip(GzEncoder<File>),
}

impl JobFile {
    fn write_line(&mut self, line: &[u8]) -> std::io::Result<()> {
        match self {
            JobFile::Plain(file) => {
                file.write_all(line)?;
                file.write_all(b"\n")
            }
            JobFile::Gzip(encoder) => {
                encoder.write_all(line)?;
                encoder.write_all(b"\n")
            }
        }
    }

    /// Push buffered bytes to the kernel and fsync.
    fn sync(&mut self) -> std::io::Result<()> {
        match self {
            JobFile::Plain(file) => file.sync_all(),
            JobFile::Gzip(encoder) => {
                encoder.flush()?;
                encoder.get_ref().sync_all()
            }
        }
    }

    /// Finalize on shutdown; gzip needs its trailer written.
    fn finish(self) -> std::io::Result<()> {
        match self {
            JobFile::Plain(mut file) => file.sync_all(),
            JobFile::Gzip(encoder) => {
                let file = encoder.finish()?;
                file.sync_all()
            }
        }
    }
}

/// The consumer loop. Exits when the channel closes or shutdown fires;
/// both paths flush the partial batch first.
pub(crate) async fn run_writer<T: JobRecord>(
    mut rx: mpsc::Receiver<T>,
    mut shutdown: watch::Receiver<bool>,
    config: WriterConfig,
) {
    let mut batch: Vec<T> = Vec::with_capacity(config.batch_size);
    let mut files: HashMap<JobId, JobFile> = HashMap::new();
    let mut ticker = tokio::time::interval(config.flush_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            record = rx.recv() => match record {
                Some(record) => {
                    batch.push(record);
                    if batch.len() >= config.batch_size {
                        flush_batch(&config, &mut files, &mut batch);
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {
                flush_batch(&config, &mut files, &mut batch);
            }
            _ = shutdown.changed() => {
                // Drain whatever producers managed to enqueue.
                while let Ok(record) = rx.try_recv() {
                    batch.push(record);
                }
                break;
            }
        }
    }

    flush_batch(&config, &mut files, &mut batch);
    for (job_id, file) in files {
        if let Err(e) = file.finish() {
            warn!(job_id = %job_id, error = %e, "history file finalize failed");
        }
    }
    debug!("telemetry writer stopped");
}

fn flush_batch<T: JobRecord>(
    config: &WriterConfig,
    files: &mut HashMap<JobId, JobFile>,
    batch: &mut Vec<T>,
) {
    if batch.is_empty() {
        return;
    }

    let mut touched: Vec<JobId> = Vec::new();
    for record in batch.drain(..) {
        let job_id = record.job_id().clone();
        let line = match serde_json::to_vec(&record) {
            Ok(line) => line,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "record serialization failed");
                continue;
            }
        };

        let file = match files.entry(job_id.clone()) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                match open_job_file(config, entry.key()) {
                    Ok(file) => entry.insert(file),
                    Err(e) => {
                        error!(job_id = %job_id, error = %e, "history file open failed");
                        continue;
                    }
                }
            }
        };

        if let Err(e) = file.write_line(&line) {
            error!(job_id = %job_id, error = %e, "history write failed");
            continue;
        }
        if !touched.contains(&job_id) {
            touched.push(job_id);
        }
    }

    // Durability point: one fsync per touched file per batch.
    for job_id in touched {
        if let Some(file) = files.get_mut(&job_id) {
            if let Err(e) = file.sync() {
                error!(job_id = %job_id, error = %e, "history fsync failed");
            }
        }
    }
}

fn open_job_file(config: &WriterConfig, job_id: &JobId) -> std::io::Result<JobFile> {
    let dir = config.base.join(job_id.as_str());
    std::fs::create_dir_all(&dir)?;

    let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    let name = if config.compress {
        format!("{}.jsonl.gz", stamp)
    } else {
        format!("{}.jsonl", stamp)
    };
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(name))?;

    Ok(if config.compress {
        JobFile::Gzip(GzEncoder::new(file, Compression::default()))
    } else {
        JobFile::Plain(file)
    })
}
