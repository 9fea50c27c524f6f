// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-size connection pool over the state unix socket.
//!
//! Get/Put/Remove semantics: `get` hands out an idle connection or dials a
//! new one lazily; `put` returns it; a connection that errored is removed
//! and its slot replaced by the next lazy dial. A semaphore caps the total
//! outstanding connections at the pool size.

use crate::protocol::{encode_frame, read_frame, StateError, StateRequest, StateResponse};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

/// One NDJSON request/response channel. Single-threaded once acquired.
pub struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    async fn dial(path: &PathBuf) -> Result<Self, StateError> {
        let stream = UnixStream::connect(path).await?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        })
    }

    /// Send one request and wait for its response.
    ///
    /// Responses are correlated by request ID; frames for other IDs
    /// (stale responses from a previous, timed-out call on this
    /// connection) are discarded.
    pub async fn call(
        &mut self,
        request: &StateRequest,
        timeout: Duration,
    ) -> Result<StateResponse, StateError> {
        let frame = encode_frame(request)?;
        tokio::time::timeout(timeout, self.writer.write_all(&frame))
            .await
            .map_err(|_| StateError::Timeout)??;

        loop {
            let response: StateResponse = tokio::time::timeout(timeout, read_frame(&mut self.reader))
                .await
                .map_err(|_| StateError::Timeout)??;
            if response.request_id == request.request_id {
                return Ok(response);
            }
            debug!(
                expected = %request.request_id,
                got = %response.request_id,
                "discarding stale state response"
            );
        }
    }
}

/// A checked-out connection; return it with [`ConnectionPool::put`] or
/// drop it (after an error) to free the slot.
pub struct PooledConnection {
    pub conn: Connection,
    _permit: OwnedSemaphorePermit,
}

pub struct ConnectionPool {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
    slots: Arc<Semaphore>,
}

impl ConnectionPool {
    pub fn new(path: PathBuf, size: usize) -> Self {
        Self {
            path,
            idle: Mutex::new(Vec::with_capacity(size)),
            slots: Arc::new(Semaphore::new(size.max(1))),
        }
    }

    /// Acquire a connection, dialing lazily when the idle list is empty.
    pub async fn get(&self) -> Result<PooledConnection, StateError> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| StateError::ConnectionClosed)?;

        let existing = self.idle.lock().pop();
        let conn = match existing {
            Some(conn) => conn,
            None => Connection::dial(&self.path).await.inspect_err(|e| {
                warn!(path = %self.path.display(), error = %e, "state dial failed");
            })?,
        };
        Ok(PooledConnection {
            conn,
            _permit: permit,
        })
    }

    /// Return a healthy connection to the idle list.
    pub fn put(&self, pooled: PooledConnection) {
        self.idle.lock().push(pooled.conn);
        // The permit drops with `pooled`, freeing the slot.
    }

    /// Drop a broken connection; the slot refills lazily on the next get.
    pub fn remove(&self, pooled: PooledConnection) {
        drop(pooled);
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }
}
