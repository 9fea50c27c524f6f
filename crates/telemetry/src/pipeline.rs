// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The shared producer-side of the async log and metrics systems.
//!
//! `publish` never blocks on disk: records go into a bounded channel
//! consumed by the single disk writer, into the per-job recent-history
//! ring, and out to live subscribers. The configured overflow strategy
//! decides what a full channel does to the producer.

use crate::buffer::RecentBuffer;
use crate::writer;
use chrono::{DateTime, Utc};
use joblet_core::config::{BufferConfig, OverflowStrategy};
use joblet_core::JobId;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// A record the pipelines can route: keyed by job, ordered by timestamp.
pub trait JobRecord: Clone + Serialize + Send + Sync + 'static {
    fn job_id(&self) -> &JobId;
    fn timestamp(&self) -> DateTime<Utc>;
}

impl JobRecord for joblet_core::MetricsSample {
    fn job_id(&self) -> &JobId {
        &self.job_id
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl JobRecord for joblet_core::LogChunk {
    fn job_id(&self) -> &JobId {
        &self.job_id
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Per-subscriber live channel capacity.
const SUBSCRIBER_CAPACITY: usize = 256;

struct LiveSubscriber<T> {
    tx: mpsc::Sender<T>,
    /// Only records strictly after this timestamp are delivered, so the
    /// replay and the live stream splice without duplication.
    watermark: Option<DateTime<Utc>>,
}

struct JobBuffers<T> {
    ring: RecentBuffer<T>,
    subscribers: Vec<LiveSubscriber<T>>,
}

/// A subscription: replayed recent history plus the live receiver.
pub struct Subscription<T> {
    pub replay: Vec<T>,
    pub live: mpsc::Receiver<T>,
}

/// One record kind's pipeline; shared behind an `Arc`.
pub struct Pipeline<T: JobRecord> {
    tx: mpsc::Sender<T>,
    shutdown_tx: watch::Sender<bool>,
    writer_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    buffers: Arc<Mutex<HashMap<JobId, JobBuffers<T>>>>,
    dropped: Arc<AtomicU64>,
    overflow: OverflowStrategy,
    recent_capacity: usize,
    spill_path: PathBuf,
}

impl<T: JobRecord> Pipeline<T> {
    /// Start the pipeline: spawns the single disk-writer task.
    pub fn start(config: BufferConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_size.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let spill_path = config.base.join("overflow.jsonl");

        let writer_config = writer::WriterConfig {
            base: config.base.clone(),
            batch_size: config.batch_size.max(1),
            flush_interval: std::time::Duration::from_secs(config.flush_interval_secs.max(1)),
            compress: config.compress,
        };
        let writer_handle = tokio::spawn(writer::run_writer(rx, shutdown_rx, writer_config));

        Self {
            tx,
            shutdown_tx,
            writer_handle: Mutex::new(Some(writer_handle)),
            buffers: Arc::new(Mutex::new(HashMap::new())),
            dropped: Arc::new(AtomicU64::new(0)),
            overflow: config.overflow,
            recent_capacity: config.recent_capacity,
            spill_path,
        }
    }

    /// Publish one record.
    ///
    /// The ring and live subscribers are always updated; the disk queue is
    /// fed according to the overflow strategy. Only `Block` can suspend
    /// the caller.
    pub async fn publish(&self, record: T) {
        self.feed_ring_and_subscribers(&record);

        match self.overflow {
            OverflowStrategy::Sample => {
                if self.tx.try_send(record).is_err() {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
            OverflowStrategy::Block => {
                if self.tx.send(record).await.is_err() {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
            OverflowStrategy::Compress | OverflowStrategy::Spill => {
                if let Err(mpsc::error::TrySendError::Full(record))
                | Err(mpsc::error::TrySendError::Closed(record)) = self.tx.try_send(record)
                {
                    self.spill(&record);
                }
            }
        }
    }

    fn feed_ring_and_subscribers(&self, record: &T) {
        let mut buffers = self.buffers.lock();
        let entry = buffers
            .entry(record.job_id().clone())
            .or_insert_with(|| JobBuffers {
                ring: RecentBuffer::new(self.recent_capacity),
                subscribers: Vec::new(),
            });

        entry.ring.push(record.clone());

        let timestamp = record.timestamp();
        entry.subscribers.retain(|subscriber| {
            if let Some(watermark) = subscriber.watermark {
                if timestamp <= watermark {
                    return true;
                }
            }
            match subscriber.tx.try_send(record.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // Slow subscriber loses this record but keeps the stream.
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }

    /// Spill an overflowing record to the side file instead of dropping it.
    /// `Compress` appends a gzip member; `Spill` appends plain JSONL.
    fn spill(&self, record: &T) {
        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = self.spill_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let line = serde_json::to_vec(record)?;
            match self.overflow {
                OverflowStrategy::Compress => {
                    let path = self.spill_path.with_extension("jsonl.gz");
                    let file = std::fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(path)?;
                    let mut encoder =
                        flate2::write::GzEncoder::new(file, flate2::Compression::fast());
                    encoder.write_all(&line)?;
                    encoder.write_all(b"\n")?;
                    encoder.finish()?;
                }
                _ => {
                    let mut file = std::fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&self.spill_path)?;
                    file.write_all(&line)?;
                    file.write_all(b"\n")?;
                }
            }
            Ok(())
        })();
        if let Err(e) = result {
            warn!(error = %e, "overflow spill failed, record dropped");
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records dropped because the queue was full (and spilling failed).
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Subscribe to one job's stream: recent history replay plus live.
    ///
    /// The replay and the watermark are taken under the same lock that the
    /// publish path uses, so no record is lost or duplicated across the
    /// seam.
    pub fn subscribe(&self, job_id: &JobId) -> Subscription<T> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let mut buffers = self.buffers.lock();
        let entry = buffers
            .entry(job_id.clone())
            .or_insert_with(|| JobBuffers {
                ring: RecentBuffer::new(self.recent_capacity),
                subscribers: Vec::new(),
            });

        let replay = entry.ring.snapshot();
        let watermark = replay.last().map(|record| record.timestamp());
        entry.subscribers.push(LiveSubscriber { tx, watermark });

        debug!(job_id = %job_id, replayed = replay.len(), "subscriber attached");
        Subscription { replay, live: rx }
    }

    /// Drop a job's ring and subscribers after cleanup.
    pub fn remove_job(&self, job_id: &JobId) {
        self.buffers.lock().remove(job_id);
    }

    /// Flush the writer and stop. Any partial batch is written before the
    /// writer exits.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handle = self.writer_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "writer task join failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
