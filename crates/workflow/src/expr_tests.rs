// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

fn eval(raw: &str, statuses: &[(&str, JobStatus)]) -> Outcome {
    let map: HashMap<String, JobStatus> = statuses
        .iter()
        .map(|(name, status)| (name.to_string(), *status))
        .collect();
    Expr::parse(raw)
        .unwrap()
        .evaluate(&|job| map.get(job).copied())
}

#[test]
fn equality_comparison() {
    assert_eq!(
        eval("a == COMPLETED", &[("a", JobStatus::Completed)]),
        Outcome::True
    );
    assert_eq!(
        eval("a == COMPLETED", &[("a", JobStatus::Failed)]),
        Outcome::False
    );
    assert_eq!(
        eval("a == COMPLETED", &[("a", JobStatus::Running)]),
        Outcome::Pending
    );
    // Unstarted job may still complete
    assert_eq!(eval("a == COMPLETED", &[]), Outcome::Pending);
}

#[test]
fn and_or_with_keywords_and_symbols() {
    let both = &[("a", JobStatus::Completed), ("b", JobStatus::Completed)][..];
    assert_eq!(eval("a == COMPLETED AND b == COMPLETED", both), Outcome::True);
    assert_eq!(eval("a == COMPLETED && b == COMPLETED", both), Outcome::True);

    let one_failed = &[("a", JobStatus::Completed), ("b", JobStatus::Failed)][..];
    assert_eq!(
        eval("a == COMPLETED AND b == COMPLETED", one_failed),
        Outcome::False
    );
    assert_eq!(
        eval("a == COMPLETED OR b == COMPLETED", one_failed),
        Outcome::True
    );
    assert_eq!(
        eval("a == COMPLETED || b == COMPLETED", one_failed),
        Outcome::True
    );
}

#[test]
fn short_circuit_beats_pending() {
    // b is still running, but a already satisfies the OR
    let statuses = &[("a", JobStatus::Completed), ("b", JobStatus::Running)][..];
    assert_eq!(eval("a == COMPLETED OR b == COMPLETED", statuses), Outcome::True);

    // a already failed, so the AND can never hold
    let statuses = &[("a", JobStatus::Failed), ("b", JobStatus::Running)][..];
    assert_eq!(
        eval("a == COMPLETED AND b == COMPLETED", statuses),
        Outcome::False
    );
}

#[test]
fn not_and_inequality() {
    assert_eq!(
        eval("NOT (a == COMPLETED)", &[("a", JobStatus::Failed)]),
        Outcome::True
    );
    assert_eq!(
        eval("a != FAILED", &[("a", JobStatus::Completed)]),
        Outcome::True
    );
    assert_eq!(
        eval("a != FAILED", &[("a", JobStatus::Failed)]),
        Outcome::False
    );
    // Negated comparisons stay pending until the job settles
    assert_eq!(
        eval("a != FAILED", &[("a", JobStatus::Running)]),
        Outcome::Pending
    );
}

#[test]
fn in_and_not_in_sets() {
    assert_eq!(
        eval("a IN (COMPLETED, STOPPED)", &[("a", JobStatus::Stopped)]),
        Outcome::True
    );
    assert_eq!(
        eval("a IN (COMPLETED, STOPPED)", &[("a", JobStatus::Failed)]),
        Outcome::False
    );
    assert_eq!(
        eval("a NOT_IN (FAILED, CANCELED)", &[("a", JobStatus::Completed)]),
        Outcome::True
    );
    assert_eq!(
        eval("a NOT_IN (FAILED, CANCELED)", &[("a", JobStatus::Canceled)]),
        Outcome::False
    );
}

#[test]
fn bare_job_name_means_completed() {
    assert_eq!(eval("a", &[("a", JobStatus::Completed)]), Outcome::True);
    assert_eq!(eval("a", &[("a", JobStatus::Failed)]), Outcome::False);
    assert_eq!(
        eval("a AND b", &[("a", JobStatus::Completed), ("b", JobStatus::Completed)]),
        Outcome::True
    );
}

#[test]
fn non_terminal_status_comparison() {
    assert_eq!(
        eval("a == RUNNING", &[("a", JobStatus::Running)]),
        Outcome::True
    );
    // Terminal job can never be RUNNING again
    assert_eq!(
        eval("a == RUNNING", &[("a", JobStatus::Completed)]),
        Outcome::False
    );
}

#[test]
fn parentheses_group() {
    let statuses = &[
        ("a", JobStatus::Failed),
        ("b", JobStatus::Completed),
        ("c", JobStatus::Completed),
    ][..];
    assert_eq!(
        eval("(a == COMPLETED OR b == COMPLETED) AND c == COMPLETED", statuses),
        Outcome::True
    );
}

#[test]
fn referenced_jobs_collects_unique_names() {
    let expr = Expr::parse("a == COMPLETED AND (b == FAILED OR a == STOPPED)").unwrap();
    assert_eq!(expr.referenced_jobs(), vec!["a".to_string(), "b".to_string()]);
}

#[yare::parameterized(
    empty = { "" },
    dangling_op = { "a ==" },
    unbalanced = { "(a == COMPLETED" },
    bad_status = { "a == FINISHED" },
    trailing = { "a == COMPLETED b" },
    lone_operator = { "AND" },
    bad_char = { "a == COMPLETED; rm" },
)]
fn malformed_expressions_rejected(raw: &str) {
    assert!(Expr::parse(raw).is_err(), "{:?} should not parse", raw);
}

#[test]
fn hyphenated_job_names_parse() {
    let expr = Expr::parse("build-app == COMPLETED").unwrap();
    assert_eq!(expr.referenced_jobs(), vec!["build-app".to_string()]);
}
