// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use joblet_core::MetricsSample;
use std::io::Write;

fn sample(job: &str, seq: i64) -> MetricsSample {
    MetricsSample {
        job_id: JobId::new(job),
        timestamp: chrono::DateTime::from_timestamp(1_700_000_000 + seq, 0).unwrap(),
        interval_secs: 5.0,
        ..MetricsSample::default()
    }
}

fn write_plain(dir: &Path, job: &str, name: &str, samples: &[MetricsSample]) {
    let job_dir = dir.join(job);
    std::fs::create_dir_all(&job_dir).unwrap();
    let mut file = File::create(job_dir.join(name)).unwrap();
    for sample in samples {
        serde_json::to_writer(&mut file, sample).unwrap();
        file.write_all(b"\n").unwrap();
    }
}

fn write_gz(dir: &Path, job: &str, name: &str, samples: &[MetricsSample], truncate: Option<usize>) {
    let job_dir = dir.join(job);
    std::fs::create_dir_all(&job_dir).unwrap();
    let mut raw = Vec::new();
    {
        let mut encoder =
            flate2::write::GzEncoder::new(&mut raw, flate2::Compression::default());
        for sample in samples {
            serde_json::to_writer(&mut encoder, sample).unwrap();
            encoder.write_all(b"\n").unwrap();
        }
        encoder.finish().unwrap();
    }
    if let Some(keep) = truncate {
        raw.truncate(keep);
    }
    std::fs::write(job_dir.join(name), raw).unwrap();
}

#[test]
fn reads_sorted_across_files() {
    let tmp = tempfile::tempdir().unwrap();
    // Later samples in the lexically-earlier file to prove sorting
    write_plain(
        tmp.path(),
        "job-1",
        "20240101-000000.jsonl",
        &[sample("job-1", 5), sample("job-1", 6)],
    );
    write_plain(
        tmp.path(),
        "job-1",
        "20240101-000100.jsonl",
        &[sample("job-1", 1), sample("job-1", 2)],
    );

    let reader = HistoryReader::new(tmp.path());
    let records: Vec<MetricsSample> = reader.read("job-1", None, None).unwrap();
    assert_eq!(records.len(), 4);
    for pair in records.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
}

#[test]
fn range_filter_is_inclusive() {
    let tmp = tempfile::tempdir().unwrap();
    let samples: Vec<MetricsSample> = (0..10).map(|seq| sample("job-1", seq)).collect();
    write_plain(tmp.path(), "job-1", "20240101-000000.jsonl", &samples);

    let reader = HistoryReader::new(tmp.path());
    let from = samples[3].timestamp;
    let to = samples[6].timestamp;
    let records: Vec<MetricsSample> = reader.read("job-1", Some(from), Some(to)).unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records[0].timestamp, from);
    assert_eq!(records[3].timestamp, to);
}

#[test]
fn short_prefix_resolves_unique_job() {
    let tmp = tempfile::tempdir().unwrap();
    write_plain(
        tmp.path(),
        "aabbccdd-1111",
        "20240101-000000.jsonl",
        &[sample("aabbccdd-1111", 0)],
    );
    write_plain(
        tmp.path(),
        "eeffeeff-2222",
        "20240101-000000.jsonl",
        &[sample("eeffeeff-2222", 0)],
    );

    let reader = HistoryReader::new(tmp.path());
    assert_eq!(reader.resolve_job("aabb").unwrap(), "aabbccdd-1111");

    let records: Vec<MetricsSample> = reader.read("eeff", None, None).unwrap();
    assert_eq!(records[0].job_id, "eeffeeff-2222");
}

#[test]
fn ambiguous_prefix_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    write_plain(tmp.path(), "aa-1", "20240101-000000.jsonl", &[sample("aa-1", 0)]);
    write_plain(tmp.path(), "aa-2", "20240101-000000.jsonl", &[sample("aa-2", 0)]);

    let reader = HistoryReader::new(tmp.path());
    assert!(matches!(
        reader.resolve_job("aa"),
        Err(ReadError::AmbiguousPrefix(_))
    ));
    // Exact match wins over prefix ambiguity
    assert_eq!(reader.resolve_job("aa-1").unwrap(), "aa-1");
}

#[test]
fn unknown_job_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let reader = HistoryReader::new(tmp.path());
    assert!(matches!(
        reader.resolve_job("ghost"),
        Err(ReadError::NotFound(_))
    ));
}

#[test]
fn gzip_reads_like_plain() {
    let tmp = tempfile::tempdir().unwrap();
    let samples: Vec<MetricsSample> = (0..5).map(|seq| sample("job-1", seq)).collect();
    write_gz(tmp.path(), "job-1", "20240101-000000.jsonl.gz", &samples, None);

    let reader = HistoryReader::new(tmp.path());
    let records: Vec<MetricsSample> = reader.read("job-1", None, None).unwrap();
    assert_eq!(records, samples);
}

#[test]
fn truncated_gzip_tail_yields_complete_prefix() {
    let tmp = tempfile::tempdir().unwrap();
    let samples: Vec<MetricsSample> = (0..50).map(|seq| sample("job-1", seq)).collect();
    // Cut the gzip stream short, as a crashed writer would
    let mut full = Vec::new();
    {
        let mut encoder =
            flate2::write::GzEncoder::new(&mut full, flate2::Compression::default());
        for sample in &samples {
            serde_json::to_writer(&mut encoder, sample).unwrap();
            encoder.write_all(b"\n").unwrap();
        }
        encoder.finish().unwrap();
    }
    write_gz(
        tmp.path(),
        "job-1",
        "20240101-000000.jsonl.gz",
        &samples,
        Some(full.len() * 2 / 3),
    );

    let reader = HistoryReader::new(tmp.path());
    let records: Vec<MetricsSample> = reader.read("job-1", None, None).unwrap();
    assert!(!records.is_empty(), "decoded the complete prefix");
    assert!(records.len() < samples.len(), "tail was lost");
    assert_eq!(records[..], samples[..records.len()]);
}

#[test]
fn partial_final_line_is_dropped() {
    let tmp = tempfile::tempdir().unwrap();
    let job_dir = tmp.path().join("job-1");
    std::fs::create_dir_all(&job_dir).unwrap();
    let mut content = Vec::new();
    serde_json::to_writer(&mut content, &sample("job-1", 0)).unwrap();
    content.extend_from_slice(b"\n{\"job_id\":\"job-1\",\"trunc");
    std::fs::write(job_dir.join("20240101-000000.jsonl"), content).unwrap();

    let reader = HistoryReader::new(tmp.path());
    let records: Vec<MetricsSample> = reader.read("job-1", None, None).unwrap();
    assert_eq!(records.len(), 1);
}
