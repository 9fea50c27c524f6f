// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log chunk record: an opaque slice of a job's stdout or stderr.

use crate::job::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl fmt::Display for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogStream::Stdout => write!(f, "stdout"),
            LogStream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Appended-only record of captured output. Never mutated; the
/// concatenation of a job's chunks in order equals the child's raw byte
/// stream for that descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogChunk {
    pub job_id: JobId,
    pub timestamp: DateTime<Utc>,
    pub stream: LogStream,
    pub data: Vec<u8>,
}

impl LogChunk {
    pub fn new(
        job_id: JobId,
        stream: LogStream,
        data: Vec<u8>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id,
            timestamp,
            stream,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
