// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use joblet_core::FakeClock;

fn config() -> JobletConfig {
    JobletConfig {
        min_schedule_advance_secs: 10,
        max_schedule_advance_secs: 3600,
        max_scheduled_jobs: 3,
        ..JobletConfig::default()
    }
}

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

#[yare::parameterized(
    seconds = { "30s", 30 },
    minutes = { "15m", 900 },
    hours = { "2h", 7200 },
    days = { "1d", 86400 },
    bare_number = { "45", 45 },
)]
fn durations_parse(raw: &str, secs: u64) {
    assert_eq!(parse_duration(raw).unwrap(), Duration::from_secs(secs));
}

#[test]
fn bad_durations_rejected() {
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10x").is_err());
    assert!(parse_duration("m").is_err());
}

#[test]
fn rfc3339_with_zone() {
    let when = parse_schedule("2026-03-01T15:30:00Z", now()).unwrap();
    assert_eq!(when.to_rfc3339(), "2026-03-01T15:30:00+00:00");

    let offset = parse_schedule("2026-03-01T15:30:00+02:00", now()).unwrap();
    assert_eq!(offset.to_rfc3339(), "2026-03-01T13:30:00+00:00");
}

#[test]
fn relative_duration_from_now() {
    let when = parse_schedule("+15m", now()).unwrap();
    assert_eq!(when, now() + chrono::Duration::minutes(15));
}

#[test]
fn unix_timestamps_by_magnitude() {
    // Seconds
    let when = parse_schedule("1767225600", now()).unwrap();
    assert_eq!(when.timestamp(), 1_767_225_600);
    // Milliseconds
    let when = parse_schedule("1767225600000", now()).unwrap();
    assert_eq!(when.timestamp(), 1_767_225_600);
}

#[test]
fn local_formats_parse() {
    // Both naive forms parse in local time; just assert they parse
    assert!(parse_schedule("2026-03-01T15:30:00", now()).is_ok());
    assert!(parse_schedule("2026-03-01 15:30:00", now()).is_ok());
}

#[test]
fn garbage_rejected() {
    assert!(matches!(
        parse_schedule("next tuesday", now()),
        Err(ScheduleError::Unparseable(_))
    ));
}

#[test]
fn exact_min_advance_accepted() {
    let clock = FakeClock::new();
    let raw = "+10s";
    validate_schedule(raw, &config(), 0, &clock).unwrap();
}

#[test]
fn below_min_advance_rejected() {
    let clock = FakeClock::new();
    assert!(matches!(
        validate_schedule("+5s", &config(), 0, &clock),
        Err(ScheduleError::TooSoon(10))
    ));
}

#[test]
fn beyond_max_advance_rejected() {
    let clock = FakeClock::new();
    assert!(matches!(
        validate_schedule("+2h", &config(), 0, &clock),
        Err(ScheduleError::TooFar(3600))
    ));
}

#[test]
fn past_beyond_grace_rejected() {
    let clock = FakeClock::new();
    let past = clock.utc() - chrono::Duration::seconds(60);
    let raw = past.timestamp().to_string();
    assert!(matches!(
        validate_schedule(&raw, &config(), 0, &clock),
        Err(ScheduleError::InPast)
    ));
}

#[test]
fn scheduled_cap_enforced() {
    let clock = FakeClock::new();
    assert!(matches!(
        validate_schedule("+15m", &config(), 3, &clock),
        Err(ScheduleError::TooManyScheduled(3))
    ));
}
