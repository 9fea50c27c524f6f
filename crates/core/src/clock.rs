// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for deterministic time in tests.
//!
//! All components take a `Clock` at construction instead of reading the
//! system time directly, so schedule math, sample timestamps, and timer
//! deadlines can be driven by a `FakeClock` in tests.

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of wall-clock and monotonic time.
pub trait Clock: Send + Sync {
    /// Monotonic instant for deadlines and elapsed-time math.
    fn now(&self) -> Instant;

    /// Milliseconds since the Unix epoch.
    fn epoch_ms(&self) -> u64;

    /// Wall-clock timestamp for serialized records.
    fn utc(&self) -> DateTime<Utc> {
        let ms = self.epoch_ms();
        Utc.timestamp_millis_opt(ms as i64)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// Production clock backed by the OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock for tests.
#[derive(Clone)]
pub struct FakeClock {
    inner: Arc<Mutex<FakeClockInner>>,
}

struct FakeClockInner {
    base: Instant,
    offset: Duration,
    epoch_ms: u64,
}

impl FakeClock {
    /// Create a clock starting at an arbitrary fixed epoch.
    pub fn new() -> Self {
        Self::at_epoch_ms(1_700_000_000_000)
    }

    /// Create a clock starting at the given epoch milliseconds.
    pub fn at_epoch_ms(epoch_ms: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeClockInner {
                base: Instant::now(),
                offset: Duration::ZERO,
                epoch_ms,
            })),
        }
    }

    /// Advance both monotonic and wall-clock time.
    pub fn advance(&self, d: Duration) {
        let mut inner = self.inner.lock();
        inner.offset += d;
        inner.epoch_ms += d.as_millis() as u64;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        let inner = self.inner.lock();
        inner.base + inner.offset
    }

    fn epoch_ms(&self) -> u64 {
        self.inner.lock().epoch_ms
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
