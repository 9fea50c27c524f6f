// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::FakeClock;
use proptest::prelude::*;

fn spec(command: &str) -> JobSpec {
    JobSpec {
        command: command.to_string(),
        ..JobSpec::default()
    }
}

fn pending_job() -> (Job, FakeClock) {
    let clock = FakeClock::new();
    let job = Job::new(JobId::new("job-1"), spec("echo"), None, &clock);
    (job, clock)
}

#[test]
fn new_job_is_pending_without_schedule() {
    let (job, _) = pending_job();
    assert_eq!(job.status, JobStatus::Pending);
    assert!(!job.is_terminal());
}

#[test]
fn new_job_is_scheduled_with_start_time() {
    let clock = FakeClock::new();
    let when = clock.utc() + chrono::Duration::minutes(15);
    let job = Job::new(JobId::new("job-1"), spec("echo"), Some(when), &clock);
    assert_eq!(job.status, JobStatus::Scheduled);
    assert_eq!(job.scheduled_for, Some(when));
}

#[test]
fn happy_path_transitions() {
    let (mut job, clock) = pending_job();

    job.mark_running(4242, &clock).unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.pid, Some(4242));
    assert!(job.started_at.is_some());

    job.mark_completed(&clock).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.exit_code, Some(0));
    assert!(job.ended_at.is_some());
    assert_eq!(job.pid, None, "pid cleared on exit");
}

#[test]
fn failure_records_exit_code_and_reason() {
    let (mut job, clock) = pending_job();
    job.mark_running(1, &clock).unwrap();
    job.mark_failed(Some(7), "exited with code 7", &clock).unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.exit_code, Some(7));
    assert_eq!(job.failure_reason.as_deref(), Some("exited with code 7"));
}

#[test]
fn stop_only_from_running() {
    let (mut job, clock) = pending_job();
    assert!(job.mark_stopped(&clock).is_err(), "cannot stop a pending job");

    job.mark_running(1, &clock).unwrap();
    job.mark_stopped(&clock).unwrap();
    assert_eq!(job.status, JobStatus::Stopped);
}

#[test]
fn cancel_from_scheduled_and_pending() {
    let clock = FakeClock::new();
    let when = clock.utc() + chrono::Duration::minutes(5);
    let mut scheduled = Job::new(JobId::new("a"), spec("echo"), Some(when), &clock);
    scheduled.mark_canceled(&clock).unwrap();
    assert_eq!(scheduled.status, JobStatus::Canceled);

    let (mut pending, clock) = pending_job();
    pending.mark_canceled(&clock).unwrap();
    assert_eq!(pending.status, JobStatus::Canceled);
}

#[test]
fn status_roundtrips_screaming_snake_case() {
    let json = serde_json::to_string(&JobStatus::Scheduled).unwrap();
    assert_eq!(json, "\"SCHEDULED\"");
    let back: JobStatus = serde_json::from_str("\"CANCELED\"").unwrap();
    assert_eq!(back, JobStatus::Canceled);
}

fn any_status() -> impl Strategy<Value = JobStatus> {
    prop_oneof![
        Just(JobStatus::Scheduled),
        Just(JobStatus::Pending),
        Just(JobStatus::Running),
        Just(JobStatus::Completed),
        Just(JobStatus::Failed),
        Just(JobStatus::Canceled),
        Just(JobStatus::Stopped),
    ]
}

proptest! {
    /// Terminal statuses admit no outgoing edge whatsoever.
    #[test]
    fn terminal_statuses_are_immutable(from in any_status(), to in any_status()) {
        if from.is_terminal() {
            prop_assert!(!from.can_transition_to(to));
        }
    }

    /// Every legal edge either stays non-terminal or enters a terminal
    /// status; no edge leaves a terminal one (the DAG property).
    #[test]
    fn transition_edges_never_leave_terminal(from in any_status(), to in any_status()) {
        if from.can_transition_to(to) {
            prop_assert!(!from.is_terminal());
            prop_assert_ne!(from, to);
        }
    }
}
