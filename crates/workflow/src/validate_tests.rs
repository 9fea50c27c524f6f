// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::document::WorkflowDoc;

struct FakeCatalogs {
    volumes: Vec<&'static str>,
    networks: Vec<&'static str>,
    runtimes: Vec<&'static str>,
}

impl Default for FakeCatalogs {
    fn default() -> Self {
        Self {
            volumes: vec!["data"],
            networks: vec!["none", "isolated", "bridge"],
            runtimes: vec!["python@3.11"],
        }
    }
}

impl VolumeCatalog for FakeCatalogs {
    fn volume_exists(&self, name: &str) -> bool {
        self.volumes.contains(&name)
    }
}

impl NetworkCatalog for FakeCatalogs {
    fn network_exists(&self, name: &str) -> bool {
        self.networks.contains(&name)
    }
}

impl RuntimeCatalog for FakeCatalogs {
    fn runtime_available(&self, name: &str) -> bool {
        self.runtimes.contains(&name)
    }
}

fn validate(raw: &str) -> Result<(), ValidationError> {
    let catalogs = FakeCatalogs::default();
    let validator = WorkflowValidator {
        volumes: &catalogs,
        networks: &catalogs,
        runtimes: &catalogs,
    };
    validator.validate(&WorkflowDoc::parse(raw).unwrap())
}

#[test]
fn valid_workflow_passes() {
    validate(
        r#"
jobs:
  a:
    command: echo
    volumes: [data]
    network: bridge
    runtime: python@3.11
  b:
    command: echo
    requires:
      a: COMPLETED
"#,
    )
    .unwrap();
}

#[test]
fn unknown_dependency_in_map_rejected() {
    let err = validate(
        r#"
jobs:
  b:
    command: echo
    requires:
      ghost: COMPLETED
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::UnknownDependency { .. }));
}

#[test]
fn unknown_dependency_in_expression_rejected() {
    let err = validate(
        r#"
jobs:
  b:
    command: echo
    requires: "ghost == COMPLETED"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::UnknownDependency { .. }));
}

#[test]
fn cycle_rejected() {
    let err = validate(
        r#"
jobs:
  a:
    command: echo
    requires:
      b: COMPLETED
  b:
    command: echo
    requires:
      a: COMPLETED
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::Cycle { .. }));
}

#[test]
fn expression_dependencies_participate_in_cycle_detection() {
    let err = validate(
        r#"
jobs:
  a:
    command: echo
    requires: "b == COMPLETED"
  b:
    command: echo
    requires: "a == COMPLETED"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::Cycle { .. }));
}

#[test]
fn unknown_volume_network_runtime_rejected() {
    let volume = validate("jobs:\n  a:\n    command: echo\n    volumes: [ghost]\n").unwrap_err();
    assert!(matches!(volume, ValidationError::UnknownVolume { .. }));

    let network = validate("jobs:\n  a:\n    command: echo\n    network: ghost\n").unwrap_err();
    assert!(matches!(network, ValidationError::UnknownNetwork { .. }));

    let runtime = validate("jobs:\n  a:\n    command: echo\n    runtime: ghost@1\n").unwrap_err();
    assert!(matches!(runtime, ValidationError::UnknownRuntime { .. }));
}

#[test]
fn malformed_expression_rejected() {
    let err = validate("jobs:\n  a:\n    command: echo\n    requires: \"==\"\n").unwrap_err();
    assert!(matches!(err, ValidationError::BadExpression { .. }));
}

#[yare::parameterized(
    leading_digit = { "1BAD" },
    hyphen = { "BAD-KEY" },
    space = { "BAD KEY" },
    empty = { "" },
)]
fn bad_env_keys_rejected(key: &str) {
    let raw = format!("jobs:\n  a:\n    command: echo\n    env:\n      \"{}\": x\n", key);
    let err = validate(&raw).unwrap_err();
    assert!(matches!(err, ValidationError::BadEnvKey { .. }));
}

#[test]
fn env_secret_overlap_rejected() {
    let err = validate(
        "jobs:\n  a:\n    command: echo\n    env:\n      TOKEN: a\n    secret_env:\n      TOKEN: b\n",
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::EnvKeyOverlap { .. }));
}

#[test]
fn oversized_env_value_rejected() {
    let big = "x".repeat(32 * 1024 + 1);
    let raw = format!("jobs:\n  a:\n    command: echo\n    env:\n      BIG: \"{}\"\n", big);
    let err = validate(&raw).unwrap_err();
    assert!(matches!(err, ValidationError::EnvValueTooLarge { .. }));
}

#[test]
fn valid_env_key_shapes() {
    assert!(valid_env_key("PATH"));
    assert!(valid_env_key("_private"));
    assert!(valid_env_key("MY_VAR_2"));
    assert!(!valid_env_key("2VAR"));
}
