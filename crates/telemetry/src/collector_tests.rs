// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use joblet_core::JobId;
use std::time::Duration;

fn write_cgroup_fixture(dir: &Path, usage_usec: u64, throttled: u64, rbytes: u64) {
    std::fs::write(
        dir.join("cpu.stat"),
        format!(
            "usage_usec {}\nuser_usec {}\nsystem_usec 0\nnr_periods 100\nnr_throttled {}\nthrottled_usec 0\n",
            usage_usec,
            usage_usec,
            throttled
        ),
    )
    .unwrap();
    std::fs::write(
        dir.join("cpu.pressure"),
        "some avg10=0.50 avg60=0.10 avg300=0.00 total=1000\n",
    )
    .unwrap();
    std::fs::write(dir.join("memory.current"), "1048576\n").unwrap();
    std::fs::write(dir.join("memory.max"), "max\n").unwrap();
    std::fs::write(
        dir.join("memory.stat"),
        "anon 524288\nfile 262144\nkernel_stack 8192\nslab 4096\nsock 0\nshmem 0\n\
         file_mapped 0\nfile_dirty 0\nfile_writeback 0\npgfault 10\npgmajfault 1\n",
    )
    .unwrap();
    std::fs::write(dir.join("memory.events"), "oom 0\noom_kill 0\n").unwrap();
    std::fs::write(
        dir.join("io.stat"),
        format!("8:0 rbytes={} wbytes=0 rios=10 wios=0 dbytes=0 dios=0\n", rbytes),
    )
    .unwrap();
    std::fs::write(dir.join("pids.current"), "3\n").unwrap();
    std::fs::write(dir.join("pids.max"), "max\n").unwrap();
    std::fs::write(dir.join("pids.events"), "max 0\n").unwrap();
}

#[test]
fn first_sample_has_zero_rates() {
    let tmp = tempfile::tempdir().unwrap();
    write_cgroup_fixture(tmp.path(), 1_000_000, 0, 0);

    let sample = collect_sample(
        tmp.path(),
        &JobId::new("j1"),
        &LimitsSnapshot::default(),
        None,
        chrono::Utc::now(),
        Duration::from_secs(5),
    );

    assert_eq!(sample.cpu.usage_usec, 1_000_000);
    assert_eq!(sample.cpu.usage_percent, 0.0);
    assert_eq!(sample.io.read_bps, 0.0);
    assert_eq!(sample.memory.current_bytes, 1_048_576);
    assert_eq!(sample.memory.limit_bytes, 0, "max parses as unlimited");
    assert_eq!(sample.process.pids_current, 3);
    assert!(sample.cpu.pressure.is_some());
}

#[test]
fn rates_derive_from_deltas() {
    let tmp = tempfile::tempdir().unwrap();
    let job = JobId::new("j1");
    let limits = LimitsSnapshot::default();
    let t0 = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let t1 = t0 + chrono::Duration::seconds(5);

    write_cgroup_fixture(tmp.path(), 1_000_000, 10, 0);
    let first = collect_sample(tmp.path(), &job, &limits, None, t0, Duration::from_secs(5));

    // +2.5 CPU-seconds over 5 wall seconds = 50%; +512000 read bytes over 5s
    write_cgroup_fixture(tmp.path(), 3_500_000, 20, 512_000);
    let second = collect_sample(
        tmp.path(),
        &job,
        &limits,
        Some(&first),
        t1,
        Duration::from_secs(5),
    );

    assert!((second.cpu.usage_percent - 50.0).abs() < 0.01);
    assert!((second.io.read_bps - 102_400.0).abs() < 0.01);
    assert!((second.io.read_iops - 0.0).abs() < 0.01, "rios unchanged");
    // nr_periods stayed at 100, so throttle percent guards the zero delta
    assert_eq!(second.cpu.throttle_percent, 0.0);
    assert!(second.timestamp > first.timestamp);
}

#[test]
fn missing_controller_files_read_as_zero() {
    let tmp = tempfile::tempdir().unwrap();
    let sample = collect_sample(
        tmp.path(),
        &JobId::new("j1"),
        &LimitsSnapshot::default(),
        None,
        chrono::Utc::now(),
        Duration::from_secs(5),
    );
    assert_eq!(sample.cpu.usage_usec, 0);
    assert_eq!(sample.memory.current_bytes, 0);
    assert!(sample.io.devices.is_empty());
    assert!(sample.cpu.pressure.is_none());
}

#[test]
fn limits_snapshot_rides_along() {
    let tmp = tempfile::tempdir().unwrap();
    let limits = LimitsSnapshot {
        max_cpu: 50,
        max_memory_mb: 64,
        ..LimitsSnapshot::default()
    };
    let sample = collect_sample(
        tmp.path(),
        &JobId::new("j1"),
        &limits,
        None,
        chrono::Utc::now(),
        Duration::from_secs(5),
    );
    assert_eq!(sample.limits.max_cpu, 50);
    assert_eq!(sample.limits.max_memory_mb, 64);
}
