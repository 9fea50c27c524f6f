// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule parsing and admission.
//!
//! Accepted forms:
//! - RFC3339, with or without a zone (`2026-03-01T09:00:00Z`,
//!   `2026-03-01T09:00:00`)
//! - `YYYY-MM-DD HH:MM:SS` (local time)
//! - `+DURATION` relative to now (`+15m`, `+2h`)
//! - Unix timestamps, seconds or milliseconds chosen by magnitude

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use joblet_core::config::JobletConfig;
use joblet_core::Clock;
use std::time::Duration;
use thiserror::Error;

/// Clock-skew grace: schedules this many seconds in the past are still
/// accepted.
const PAST_GRACE_SECS: i64 = 30;

/// Timestamps above this magnitude are read as milliseconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("unrecognised schedule format {0:?}")]
    Unparseable(String),
    #[error("invalid duration: {0}")]
    BadDuration(String),
    #[error("schedule is in the past")]
    InPast,
    #[error("schedule is less than {0}s in the future")]
    TooSoon(u64),
    #[error("schedule is more than {0}s in the future")]
    TooFar(u64),
    #[error("scheduled job cap ({0}) reached")]
    TooManyScheduled(usize),
}

/// Parse a duration string like "30s", "5m", "1h" into a Duration.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the numeric prefix
    let (num_str, suffix) = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| (&s[..i], &s[i..]))
        .unwrap_or((s, ""));

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid number in duration: {}", s))?;

    let multiplier = match suffix.trim() {
        "ms" | "millis" | "millisecond" | "milliseconds" => {
            return Ok(Duration::from_millis(num));
        }
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
        "d" | "day" | "days" => 86400,
        other => return Err(format!("unknown duration suffix: {}", other)),
    };

    Ok(Duration::from_secs(num * multiplier))
}

/// Parse one schedule expression against `now`.
pub fn parse_schedule(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
    let raw = raw.trim();

    if let Some(duration) = raw.strip_prefix('+') {
        let duration = parse_duration(duration).map_err(ScheduleError::BadDuration)?;
        let delta = chrono::Duration::from_std(duration)
            .map_err(|e| ScheduleError::BadDuration(e.to_string()))?;
        return Ok(now + delta);
    }

    if let Ok(value) = raw.parse::<i64>() {
        let parsed = if value.abs() >= MILLIS_THRESHOLD {
            Utc.timestamp_millis_opt(value).single()
        } else {
            Utc.timestamp_opt(value, 0).single()
        };
        return parsed.ok_or_else(|| ScheduleError::Unparseable(raw.to_string()));
    }

    if let Ok(zoned) = DateTime::parse_from_rfc3339(raw) {
        return Ok(zoned.with_timezone(&Utc));
    }

    // RFC3339 shape without a zone: read as local time
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        if let Some(local) = Local.from_local_datetime(&naive).single() {
            return Ok(local.with_timezone(&Utc));
        }
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        if let Some(local) = Local.from_local_datetime(&naive).single() {
            return Ok(local.with_timezone(&Utc));
        }
    }

    Err(ScheduleError::Unparseable(raw.to_string()))
}

/// Parse and admit a schedule under the configured bounds and cap.
pub fn validate_schedule(
    raw: &str,
    config: &JobletConfig,
    scheduled_count: usize,
    clock: &dyn Clock,
) -> Result<DateTime<Utc>, ScheduleError> {
    if scheduled_count >= config.max_scheduled_jobs {
        return Err(ScheduleError::TooManyScheduled(config.max_scheduled_jobs));
    }

    let now = clock.utc();
    let when = parse_schedule(raw, now)?;

    if when < now - chrono::Duration::seconds(PAST_GRACE_SECS) {
        return Err(ScheduleError::InPast);
    }
    let min_advance = chrono::Duration::seconds(config.min_schedule_advance_secs as i64);
    if when < now + min_advance {
        return Err(ScheduleError::TooSoon(config.min_schedule_advance_secs));
    }
    let max_advance = chrono::Duration::seconds(config.max_schedule_advance_secs as i64);
    if when > now + max_advance {
        return Err(ScheduleError::TooFar(config.max_schedule_advance_secs));
    }

    Ok(when)
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
