// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    single = { "3", &[3] },
    range = { "0-3", &[0, 1, 2, 3] },
    list = { "0,2,4", &[0, 2, 4] },
    mixed = { "0-1,4", &[0, 1, 4] },
    spaces = { " 1 , 3 ", &[1, 3] },
)]
fn core_set_parses(expr: &str, expected: &[u32]) {
    let set = CpuCoreSet::parse(expr).unwrap();
    let cores: Vec<u32> = set.iter().collect();
    assert_eq!(cores, expected);
    assert_eq!(set.count(), expected.len());
}

#[yare::parameterized(
    empty = { "" },
    word = { "abc" },
    backwards_range = { "3-1" },
    trailing_comma_item = { "1,," },
    negative = { "-1" },
)]
fn core_set_rejects_malformed(expr: &str) {
    assert!(CpuCoreSet::parse(expr).is_err());
}

#[test]
fn core_set_rejects_duplicates() {
    assert_eq!(
        CpuCoreSet::parse("1,1"),
        Err(LimitsError::DuplicateCore(1))
    );
    // Overlapping ranges duplicate core 2
    assert_eq!(
        CpuCoreSet::parse("0-2,2-4"),
        Err(LimitsError::DuplicateCore(2))
    );
}

#[test]
fn core_set_preserves_expression() {
    let set = CpuCoreSet::parse("0-3").unwrap();
    assert_eq!(set.expr(), "0-3");
    assert_eq!(set.to_string(), "0-3");
    assert_eq!(set.max_core(), 3);
    assert!(set.contains(2));
    assert!(!set.contains(4));
}

#[test]
fn core_set_serde_roundtrip() {
    let set = CpuCoreSet::parse("0,2,4").unwrap();
    let json = serde_json::to_string(&set).unwrap();
    assert_eq!(json, "\"0,2,4\"");
    let back: CpuCoreSet = serde_json::from_str(&json).unwrap();
    assert_eq!(back, set);
}

#[test]
fn zero_limits_request_nothing() {
    let limits = ResourceLimits::default();
    assert!(!limits.has_any());
}

#[test]
fn any_single_limit_counts() {
    let limits = ResourceLimits {
        max_memory: 64,
        ..ResourceLimits::default()
    };
    assert!(limits.has_any());

    let pinned = ResourceLimits {
        cpu_cores: Some(CpuCoreSet::parse("0-1").unwrap()),
        ..ResourceLimits::default()
    };
    assert!(pinned.has_any());
}
