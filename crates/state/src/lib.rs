// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! joblet-state: pooled IPC client to the persistent-state subprocess.
//!
//! The state subprocess owns the durable job store; the daemon talks to it
//! over a unix socket carrying newline-delimited JSON frames. A fixed pool
//! amortises connections, and the batcher fronts the client so state
//! writes at every job transition group into bulk calls.

pub mod batcher;
pub mod client;
pub mod pool;
pub mod protocol;

#[cfg(any(test, feature = "test-support"))]
pub mod testserver;

pub use batcher::{BatcherConfig, StateBatcher};
pub use client::StateClient;
pub use pool::ConnectionPool;
pub use protocol::{JobFilter, StateError, StateOp, StateRequest, StateResponse};
