// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use joblet_core::{Clock, FakeClock, JobSpec};
use std::sync::Arc;

fn job(id: &str) -> Job {
    let clock = FakeClock::new();
    Job::new(
        JobId::new(id),
        JobSpec {
            command: "echo".to_string(),
            ..JobSpec::default()
        },
        None,
        &clock,
    )
}

#[test]
fn insert_get_list() {
    let registry = JobRegistry::new();
    registry.insert(job("a"));
    registry.insert(job("b"));

    assert!(registry.get(&JobId::new("a")).is_some());
    assert!(registry.get(&JobId::new("ghost")).is_none());
    assert_eq!(registry.list().len(), 2);
    assert_eq!(registry.running_count(), 2, "pending counts as live");
}

#[test]
fn update_mutates_and_returns_copy() {
    let registry = JobRegistry::new();
    registry.insert(job("a"));
    let clock = FakeClock::new();

    let updated = registry
        .update(&JobId::new("a"), |job| {
            job.mark_running(42, &clock).unwrap();
        })
        .unwrap();
    assert_eq!(updated.status, JobStatus::Running);
    assert_eq!(updated.pid, Some(42));
    assert_eq!(registry.get(&JobId::new("a")).unwrap().pid, Some(42));
}

#[tokio::test]
async fn wait_terminal_resolves_on_transition() {
    let registry = Arc::new(JobRegistry::new());
    registry.insert(job("a"));

    let waiter = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.wait_terminal(&JobId::new("a")).await })
    };

    // Give the waiter a chance to subscribe first
    tokio::task::yield_now().await;

    let clock = FakeClock::new();
    registry.update(&JobId::new("a"), |job| {
        job.mark_running(1, &clock).unwrap();
    });
    registry.update(&JobId::new("a"), |job| {
        job.mark_completed(&clock).unwrap();
    });

    assert_eq!(waiter.await.unwrap(), Some(JobStatus::Completed));
}

#[tokio::test]
async fn wait_terminal_immediate_when_already_terminal() {
    let registry = JobRegistry::new();
    let clock = FakeClock::new();
    let mut done = job("a");
    done.mark_canceled(&clock).unwrap();
    registry.insert(done);

    assert_eq!(
        registry.wait_terminal(&JobId::new("a")).await,
        Some(JobStatus::Canceled)
    );
}

#[tokio::test]
async fn wait_terminal_uses_memo_after_removal() {
    let registry = JobRegistry::new();
    let clock = FakeClock::new();
    let mut done = job("a");
    done.mark_running(1, &clock).unwrap();
    done.mark_completed(&clock).unwrap();
    registry.insert(done);
    registry.remove(&JobId::new("a"));

    assert!(registry.get(&JobId::new("a")).is_none());
    assert_eq!(
        registry.wait_terminal(&JobId::new("a")).await,
        Some(JobStatus::Completed)
    );
}

#[tokio::test]
async fn wait_terminal_unknown_job_is_none() {
    let registry = JobRegistry::new();
    assert_eq!(registry.wait_terminal(&JobId::new("ghost")).await, None);
}

#[test]
fn stop_signal_reaches_receiver() {
    let registry = JobRegistry::new();
    registry.insert(job("a"));

    let mut stop_rx = registry.stop_receiver(&JobId::new("a")).unwrap();
    assert!(!*stop_rx.borrow());

    assert!(registry.signal_stop(&JobId::new("a")));
    assert!(*stop_rx.borrow_and_update());

    assert!(!registry.signal_stop(&JobId::new("ghost")));
}

#[test]
fn scheduled_count_tracks_status() {
    let registry = JobRegistry::new();
    let clock = FakeClock::new();
    let when = clock.utc() + chrono::Duration::minutes(10);
    registry.insert(Job::new(
        JobId::new("s"),
        JobSpec {
            command: "echo".to_string(),
            ..JobSpec::default()
        },
        Some(when),
        &clock,
    ));
    registry.insert(job("p"));

    assert_eq!(registry.scheduled_count(), 1);
}
