// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write;

#[test]
fn defaults_are_complete() {
    let config = Config::default();
    assert_eq!(config.cgroup.cleanup_timeout_secs, 5);
    assert_eq!(config.metrics_interval_secs, 5);
    assert_eq!(config.metrics.base, PathBuf::from("/opt/joblet/metrics"));
    assert_eq!(config.logs.base, PathBuf::from("/opt/joblet/logs"));
    assert_eq!(config.network.default_network, "bridge");
    assert_eq!(config.state.pool_size, 10);
    assert_eq!(config.logs.retention_days, 7);
}

#[test]
fn partial_yaml_fills_defaults() {
    let yaml = r#"
joblet:
  max_concurrent_jobs: 4
network:
  default_network: isolated
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.joblet.max_concurrent_jobs, 4);
    assert_eq!(config.network.default_network, "isolated");
    // Untouched sections keep defaults
    assert_eq!(config.cgroup.io_device, "8:0");
    assert_eq!(config.metrics.batch_size, 100);
}

#[test]
fn custom_networks_parse() {
    let yaml = r#"
network:
  networks:
    team-a:
      cidr: 10.10.0.0/24
      bridge: br-team-a
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    let net = &config.network.networks["team-a"];
    assert_eq!(net.cidr, "10.10.0.0/24");
    assert_eq!(net.bridge, "br-team-a");
}

#[test]
fn overflow_strategy_parses_lowercase() {
    let yaml = "metrics:\n  overflow: block\n";
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.metrics.overflow, OverflowStrategy::Block);
}

#[test]
fn load_reads_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "metrics_interval_secs: 10").unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.metrics_interval_secs, 10);
}

#[test]
fn load_missing_file_errors() {
    let err = Config::load(Path::new("/nonexistent/joblet.yaml"));
    assert!(matches!(err, Err(ConfigError::Io(_, _))));
}
