// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level behaviour specs spanning crate boundaries.

use joblet_core::config::BufferConfig;
use joblet_core::{JobId, JobStatus, MetricsSample};
use joblet_network::IpPool;
use joblet_telemetry::{HistoryReader, MetricsPipeline};
use joblet_workflow::{derive_workflow_status, WorkflowDoc, WorkflowStatus};
use std::collections::HashSet;

fn sample(job: &str, seq: i64) -> MetricsSample {
    MetricsSample {
        job_id: JobId::new(job),
        timestamp: chrono::DateTime::from_timestamp(1_700_000_000 + seq, 0).unwrap(),
        interval_secs: 5.0,
        ..MetricsSample::default()
    }
}

/// Samples written through the pipeline read back identically, in order,
/// and range queries slice them the way a live monitoring client expects.
#[tokio::test]
async fn metrics_pipeline_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let pipeline = MetricsPipeline::start(BufferConfig {
        base: tmp.path().to_path_buf(),
        ..BufferConfig::default()
    });

    // A ten-minute job sampled every five seconds
    let written: Vec<MetricsSample> = (0..120).map(|i| sample("job-1", i * 5)).collect();
    for record in &written {
        pipeline.publish(record.clone()).await;
    }
    pipeline.shutdown().await;

    let reader = HistoryReader::new(tmp.path());
    let all: Vec<MetricsSample> = reader.read("job-1", None, None).unwrap();
    assert_eq!(all, written);

    // Last five minutes ≈ half the samples
    let from = written[60].timestamp;
    let recent: Vec<MetricsSample> = reader.read("job-1", Some(from), None).unwrap();
    assert_eq!(recent.len(), 60);
    assert!(recent.iter().all(|s| s.timestamp >= from));
}

/// Short-prefix resolution works against the real on-disk layout.
#[tokio::test]
async fn short_uuid_prefix_resolution() {
    let tmp = tempfile::tempdir().unwrap();
    let pipeline = MetricsPipeline::start(BufferConfig {
        base: tmp.path().to_path_buf(),
        ..BufferConfig::default()
    });

    pipeline
        .publish(sample("4f9d2c1a-aaaa-bbbb-cccc-000000000001", 0))
        .await;
    pipeline
        .publish(sample("8e1b3f5c-dddd-eeee-ffff-000000000002", 0))
        .await;
    pipeline.shutdown().await;

    let reader = HistoryReader::new(tmp.path());
    let records: Vec<MetricsSample> = reader.read("4f9d", None, None).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].job_id,
        "4f9d2c1a-aaaa-bbbb-cccc-000000000001"
    );
}

/// The documented three-job scenario: B gated on A by status map, C gated
/// on both via an expression; every referenced dependency must exist and
/// the graph must be acyclic.
#[test]
fn workflow_document_scenario_validates() {
    let doc = WorkflowDoc::parse(
        r#"
jobs:
  a:
    command: echo
  b:
    command: echo
    requires:
      a: COMPLETED
  c:
    command: echo
    requires: "a == COMPLETED AND b == COMPLETED"
"#,
    )
    .unwrap();

    // Dependency extraction feeds the same names the executor gates on
    assert_eq!(doc.dependency_names(&doc.jobs["c"]).len(), 2);

    // Status derivation for the failure path of that scenario
    let statuses = [
        Some(JobStatus::Failed),
        Some(JobStatus::Canceled),
        Some(JobStatus::Canceled),
    ];
    assert_eq!(
        derive_workflow_status(statuses.iter().map(|s| s.as_ref())),
        WorkflowStatus::Failed
    );
}

/// Two concurrent allocations on the default bridge CIDR: distinct, both
/// at or above `.2`, never the gateway.
#[test]
fn bridge_pool_concurrent_allocations() {
    let pool = IpPool::new("172.20.0.0/16".parse().unwrap());
    let gateway = pool.gateway();
    assert_eq!(gateway.to_string(), "172.20.0.1");

    let mut seen = HashSet::new();
    let first_usable: u32 = u32::from("172.20.0.2".parse::<std::net::Ipv4Addr>().unwrap());
    for _ in 0..64 {
        let ip = pool.allocate().unwrap();
        assert!(u32::from(ip) >= first_usable);
        assert_ne!(ip, gateway);
        assert!(seen.insert(ip), "duplicate allocation {}", ip);
    }
}
