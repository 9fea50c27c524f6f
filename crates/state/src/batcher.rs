// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write batcher fronting the state client.
//!
//! Create/update/delete operations queue into a bounded channel; a single
//! dispatcher groups runs of the same kind (up to the bulk-write limit of
//! 25) and flushes on a 100 ms ticker, preserving submission order across
//! kinds. Synchronous callers get completion through a oneshot; `*_async`
//! callers drop with a warning when the queue is full.

use crate::client::StateClient;
use crate::protocol::StateError;
use joblet_core::{Job, JobId};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

/// Bulk-write group limit (DynamoDB write-batch ceiling downstream).
const MAX_GROUP: usize = 25;

/// Dispatcher flush tick.
const FLUSH_TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Create,
    Update,
    Delete,
}

struct QueuedOp {
    kind: OpKind,
    job: Option<Job>,
    job_id: Option<JobId>,
    done: Option<oneshot::Sender<Result<(), String>>>,
}

/// Flush barrier: completes when everything queued before it has been
/// dispatched.
enum Message {
    Op(QueuedOp),
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Clone)]
pub struct BatcherConfig {
    pub queue_size: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self { queue_size: 10_000 }
    }
}

pub struct StateBatcher {
    tx: mpsc::Sender<Message>,
    shutdown_tx: watch::Sender<bool>,
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl StateBatcher {
    pub fn start(client: StateClient, config: BatcherConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_size.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(dispatcher(client, rx, shutdown_rx));
        Self {
            tx,
            shutdown_tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    async fn submit_sync(&self, mut op: QueuedOp) -> Result<(), StateError> {
        let (done_tx, done_rx) = oneshot::channel();
        op.done = Some(done_tx);
        self.tx
            .send(Message::Op(op))
            .await
            .map_err(|_| StateError::ConnectionClosed)?;
        match done_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(StateError::Rejected(reason)),
            Err(_) => Err(StateError::ConnectionClosed),
        }
    }

    fn submit_async(&self, op: QueuedOp) {
        if self.tx.try_send(Message::Op(op)).is_err() {
            warn!("state batcher queue full, dropping async operation");
        }
    }

    pub async fn create(&self, job: Job) -> Result<(), StateError> {
        self.submit_sync(QueuedOp {
            kind: OpKind::Create,
            job: Some(job),
            job_id: None,
            done: None,
        })
        .await
    }

    pub async fn update(&self, job: Job) -> Result<(), StateError> {
        self.submit_sync(QueuedOp {
            kind: OpKind::Update,
            job: Some(job),
            job_id: None,
            done: None,
        })
        .await
    }

    pub async fn delete(&self, job_id: JobId) -> Result<(), StateError> {
        self.submit_sync(QueuedOp {
            kind: OpKind::Delete,
            job: None,
            job_id: Some(job_id),
            done: None,
        })
        .await
    }

    pub fn create_async(&self, job: Job) {
        self.submit_async(QueuedOp {
            kind: OpKind::Create,
            job: Some(job),
            job_id: None,
            done: None,
        });
    }

    pub fn update_async(&self, job: Job) {
        self.submit_async(QueuedOp {
            kind: OpKind::Update,
            job: Some(job),
            job_id: None,
            done: None,
        });
    }

    pub fn delete_async(&self, job_id: JobId) {
        self.submit_async(QueuedOp {
            kind: OpKind::Delete,
            job: None,
            job_id: Some(job_id),
            done: None,
        });
    }

    /// Wait until everything queued so far has been dispatched.
    pub async fn flush(&self) -> Result<(), StateError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Message::Flush(done_tx))
            .await
            .map_err(|_| StateError::ConnectionClosed)?;
        done_rx.await.map_err(|_| StateError::ConnectionClosed)
    }

    /// Flush remaining batches and stop the dispatcher.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "batcher task join failed");
            }
        }
    }
}

async fn dispatcher(
    client: StateClient,
    mut rx: mpsc::Receiver<Message>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut queue: VecDeque<QueuedOp> = VecDeque::new();
    let mut ticker = tokio::time::interval(FLUSH_TICK);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(Message::Op(op)) => {
                    queue.push_back(op);
                    while leading_group_len(&queue) >= MAX_GROUP {
                        dispatch_leading_group(&client, &mut queue).await;
                    }
                }
                Some(Message::Flush(done)) => {
                    drain(&client, &mut queue).await;
                    let _ = done.send(());
                }
                None => break,
            },
            _ = ticker.tick() => {
                drain(&client, &mut queue).await;
            }
            _ = shutdown.changed() => {
                while let Ok(message) = rx.try_recv() {
                    match message {
                        Message::Op(op) => queue.push_back(op),
                        Message::Flush(done) => {
                            let _ = done.send(());
                        }
                    }
                }
                break;
            }
        }
    }

    drain(&client, &mut queue).await;
    debug!("state batcher stopped");
}

fn leading_group_len(queue: &VecDeque<QueuedOp>) -> usize {
    let Some(first) = queue.front() else { return 0 };
    queue
        .iter()
        .take(MAX_GROUP)
        .take_while(|op| op.kind == first.kind)
        .count()
}

async fn drain(client: &StateClient, queue: &mut VecDeque<QueuedOp>) {
    while !queue.is_empty() {
        dispatch_leading_group(client, queue).await;
    }
}

/// Dispatch the maximal same-kind prefix (≤ 25 items) as one bulk call.
async fn dispatch_leading_group(client: &StateClient, queue: &mut VecDeque<QueuedOp>) {
    let len = leading_group_len(queue);
    if len == 0 {
        return;
    }
    let group: Vec<QueuedOp> = queue.drain(..len).collect();
    let kind = group[0].kind;

    let result: Result<(), StateError> = match kind {
        OpKind::Create | OpKind::Update => {
            let jobs: Vec<Job> = group.iter().filter_map(|op| op.job.clone()).collect();
            client.sync_jobs(jobs).await
        }
        OpKind::Delete => {
            let mut outcome = Ok(());
            for op in &group {
                if let Some(job_id) = &op.job_id {
                    if let Err(e) = client.delete_job(job_id).await {
                        outcome = Err(e);
                    }
                }
            }
            outcome
        }
    };

    let failure = result.as_ref().err().map(|e| e.to_string());
    if let Some(reason) = &failure {
        warn!(?kind, size = group.len(), error = %reason, "state batch dispatch failed");
    }
    for op in group {
        if let Some(done) = op.done {
            let _ = done.send(match &failure {
                None => Ok(()),
                Some(reason) => Err(reason.clone()),
            });
        }
    }
}

#[cfg(test)]
#[path = "batcher_tests.rs"]
mod tests;
