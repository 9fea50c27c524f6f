// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire format for the state IPC channel.
//!
//! Frames are single lines of JSON terminated by `\n`:
//!
//! ```text
//! {"op":"create","job":{…},"requestId":"req-…","timestamp":"…"}
//! {"requestId":"req-…","success":true}
//! ```
//!
//! Request IDs are monotonic (`req-<unix-nanos>-<counter>`), and the
//! subprocess treats operations as idempotent by request ID, so a retried
//! frame after a broken connection cannot double-apply.

use chrono::{DateTime, Utc};
use joblet_core::{Job, JobId, JobStatus, WorkflowId};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Frame size cap; a full job list response stays far below this.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state io: {0}")]
    Io(#[from] std::io::Error),
    #[error("state frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("state request timed out")]
    Timeout,
    #[error("state subprocess rejected request: {0}")]
    Rejected(String),
}

/// Operations the state subprocess accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateOp {
    Create,
    Update,
    Delete,
    Get,
    List,
    /// Bulk upsert.
    Sync,
    Ping,
}

/// Listing filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,
}

/// One request frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRequest {
    pub op: StateOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<Job>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<Vec<Job>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<JobFilter>,
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

/// One response frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    pub request_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<Job>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<Vec<Job>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StateRequest {
    pub fn new(op: StateOp, request_id: String) -> Self {
        Self {
            op,
            job_id: None,
            job: None,
            jobs: None,
            filter: None,
            request_id,
            timestamp: Utc::now(),
        }
    }
}

/// Monotonic request-ID generator: `req-<unix-nanos>-<counter>`.
#[derive(Debug, Default)]
pub struct RequestIdGen {
    counter: AtomicU64,
}

impl RequestIdGen {
    pub fn next(&self) -> String {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let count = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("req-{}-{}", nanos, count)
    }
}

/// Encode a frame (JSON line with trailing newline).
pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>, StateError> {
    let mut line = serde_json::to_vec(message)?;
    if line.len() > MAX_FRAME_SIZE {
        return Err(StateError::FrameTooLarge(line.len()));
    }
    line.push(b'\n');
    Ok(line)
}

/// Read one frame from a buffered async reader.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, StateError>
where
    R: tokio::io::AsyncBufReadExt + Unpin,
    T: serde::de::DeserializeOwned,
{
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(StateError::ConnectionClosed);
    }
    if line.len() > MAX_FRAME_SIZE {
        return Err(StateError::FrameTooLarge(line.len()));
    }
    Ok(serde_json::from_str(line.trim_end())?)
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
