// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sample() -> MetricsSample {
    MetricsSample {
        job_id: JobId::new("job-1"),
        timestamp: chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        interval_secs: 5.0,
        cpu: CpuMetrics {
            usage_usec: 12_500_000,
            user_usec: 10_000_000,
            system_usec: 2_500_000,
            nr_periods: 50,
            nr_throttled: 5,
            throttled_usec: 300_000,
            usage_percent: 50.0,
            throttle_percent: 10.0,
            pressure: Some(PsiStats {
                some: PsiAverages {
                    avg10: 1.5,
                    avg60: 0.8,
                    avg300: 0.2,
                    total: 123_456,
                },
                full: None,
            }),
        },
        memory: MemoryMetrics {
            current_bytes: 32 << 20,
            limit_bytes: 64 << 20,
            anon: 30 << 20,
            file: 2 << 20,
            ..MemoryMetrics::default()
        },
        io: IoMetrics {
            devices: vec![IoDeviceStats {
                major: 8,
                minor: 0,
                rbytes: 1024,
                wbytes: 2048,
                rios: 4,
                wios: 8,
                dbytes: 0,
                dios: 0,
            }],
            read_bps: 204.8,
            write_bps: 409.6,
            read_iops: 0.8,
            write_iops: 1.6,
            pressure: None,
        },
        process: ProcessMetrics {
            pids_current: 3,
            pids_limit: 0,
            pids_events_max: 0,
        },
        gpus: Vec::new(),
        limits: LimitsSnapshot {
            max_cpu: 50,
            max_memory_mb: 64,
            ..LimitsSnapshot::default()
        },
    }
}

/// JSON serialisation round-trips field-for-field.
#[test]
fn sample_json_roundtrip() {
    let original = sample();
    let json = serde_json::to_string(&original).unwrap();
    let back: MetricsSample = serde_json::from_str(&json).unwrap();
    assert_eq!(back, original);
}

#[test]
fn empty_gpu_list_is_omitted() {
    let json = serde_json::to_string(&sample()).unwrap();
    assert!(!json.contains("\"gpus\""));
    assert!(!json.contains("\"full\""), "absent PSI full line omitted");
}

#[test]
fn limits_snapshot_mirrors_limits() {
    let limits = ResourceLimits {
        max_cpu: 150,
        max_memory: 512,
        max_io_bps: 1_000_000,
        cpu_cores: Some(crate::limits::CpuCoreSet::parse("0-1").unwrap()),
        gpu_indices: vec![0],
    };
    let snap = LimitsSnapshot::from(&limits);
    assert_eq!(snap.max_cpu, 150);
    assert_eq!(snap.max_memory_mb, 512);
    assert_eq!(snap.cpu_cores.as_deref(), Some("0-1"));
    assert_eq!(snap.gpu_indices, vec![0]);
}
