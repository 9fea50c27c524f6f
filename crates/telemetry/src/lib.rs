// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! joblet-telemetry: metrics collection and the async log/metrics pipelines.
//!
//! Both pipelines share one shape: producers publish into a bounded queue
//! and never block on disk; a single consumer batches records and appends
//! them to per-job JSONL (optionally gzip) files; a per-job ring buffer
//! replays recent history to new subscribers before splicing them onto the
//! live stream.

pub mod buffer;
pub mod cgroup_stats;
pub mod collector;
pub mod gpu;
pub mod pipeline;
pub mod reader;
pub mod retention;
mod writer;

pub use buffer::RecentBuffer;
pub use collector::MetricsCollector;
pub use pipeline::{JobRecord, Pipeline, Subscription};
pub use reader::{HistoryReader, ReadError};
pub use retention::spawn_retention_sweeper;

use joblet_core::{LogChunk, MetricsSample};

/// The async metrics system.
pub type MetricsPipeline = Pipeline<MetricsSample>;
/// The async log system.
pub type LogPipeline = Pipeline<LogChunk>;
