// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use joblet_core::CpuCoreSet;

fn config() -> JobletConfig {
    JobletConfig {
        cpu_percent: LimitBounds { min: 10, max: 800 },
        memory_mb: LimitBounds { min: 16, max: 32_768 },
        io_bps: LimitBounds { min: 0, max: 0 },
        ..JobletConfig::default()
    }
}

#[test]
fn zero_limits_always_pass() {
    validate_limits(&ResourceLimits::default(), &config(), 8).unwrap();
}

#[test]
fn in_bounds_limits_pass() {
    let limits = ResourceLimits {
        max_cpu: 200,
        max_memory: 512,
        max_io_bps: 123_456_789,
        cpu_cores: Some(CpuCoreSet::parse("0-3").unwrap()),
        gpu_indices: Vec::new(),
    };
    validate_limits(&limits, &config(), 8).unwrap();
}

#[test]
fn bounds_enforced_both_sides() {
    let low = ResourceLimits {
        max_cpu: 5,
        ..ResourceLimits::default()
    };
    assert!(matches!(
        validate_limits(&low, &config(), 8),
        Err(LimitError::BelowMinimum { what: "cpu percent", .. })
    ));

    let high = ResourceLimits {
        max_memory: 65_536,
        ..ResourceLimits::default()
    };
    assert!(matches!(
        validate_limits(&high, &config(), 8),
        Err(LimitError::AboveMaximum { what: "memory MB", .. })
    ));
}

#[test]
fn zero_bound_side_is_open() {
    // io_bps has no bounds configured
    let limits = ResourceLimits {
        max_io_bps: u64::MAX,
        ..ResourceLimits::default()
    };
    validate_limits(&limits, &config(), 8).unwrap();
}

#[test]
fn nonexistent_core_rejected() {
    let limits = ResourceLimits {
        cpu_cores: Some(CpuCoreSet::parse("0,9").unwrap()),
        ..ResourceLimits::default()
    };
    assert!(matches!(
        validate_limits(&limits, &config(), 8),
        Err(LimitError::NoSuchCore(9, 8))
    ));
}

#[test]
fn cpu_percent_capped_by_core_set() {
    // Two cores allow at most 200%
    let limits = ResourceLimits {
        max_cpu: 250,
        cpu_cores: Some(CpuCoreSet::parse("0-1").unwrap()),
        ..ResourceLimits::default()
    };
    assert!(matches!(
        validate_limits(&limits, &config(), 8),
        Err(LimitError::CpuOverCoreBudget { percent: 250, cores: 2, budget: 200 })
    ));

    let fits = ResourceLimits {
        max_cpu: 200,
        cpu_cores: Some(CpuCoreSet::parse("0-1").unwrap()),
        ..ResourceLimits::default()
    };
    validate_limits(&fits, &config(), 8).unwrap();
}
