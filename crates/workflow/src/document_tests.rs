// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const ETL: &str = r#"
name: etl
jobs:
  extract:
    command: python3
    args: ["extract.py"]
    volumes: [data]
  transform:
    command: python3
    args: ["transform.py"]
    requires:
      extract: COMPLETED
  load:
    command: python3
    args: ["load.py"]
    requires: "extract == COMPLETED AND transform == COMPLETED"
"#;

#[test]
fn parses_both_requires_forms() {
    let doc = WorkflowDoc::parse(ETL).unwrap();
    assert_eq!(doc.name, "etl");
    assert_eq!(doc.jobs.len(), 3);

    match &doc.jobs["transform"].requires {
        Some(RequiresSpec::StatusMap(map)) => {
            assert_eq!(map["extract"], JobStatus::Completed);
        }
        other => panic!("expected status map, got {:?}", other),
    }
    match &doc.jobs["load"].requires {
        Some(RequiresSpec::Expression(raw)) => {
            assert!(raw.contains("AND"));
        }
        other => panic!("expected expression, got {:?}", other),
    }
    assert!(doc.jobs["extract"].requires.is_none());
}

#[test]
fn job_order_is_preserved() {
    let doc = WorkflowDoc::parse(ETL).unwrap();
    let names: Vec<&str> = doc.jobs.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["extract", "transform", "load"]);
}

#[test]
fn dependency_names_from_both_forms() {
    let doc = WorkflowDoc::parse(ETL).unwrap();
    assert!(doc.dependency_names(&doc.jobs["extract"]).is_empty());
    assert_eq!(
        doc.dependency_names(&doc.jobs["transform"]),
        vec!["extract".to_string()]
    );
    assert_eq!(
        doc.dependency_names(&doc.jobs["load"]),
        vec!["extract".to_string(), "transform".to_string()]
    );
}

#[test]
fn empty_workflow_rejected() {
    assert!(matches!(
        WorkflowDoc::parse("name: x\njobs: {}\n"),
        Err(DocumentError::Empty)
    ));
}

#[test]
fn malformed_yaml_rejected() {
    assert!(matches!(
        WorkflowDoc::parse(":\n  - ["),
        Err(DocumentError::Yaml(_))
    ));
}

#[test]
fn limits_and_env_parse() {
    let raw = r#"
jobs:
  train:
    command: python3
    env:
      EPOCHS: "10"
    limits:
      max_cpu: 200
      max_memory: 4096
      cpu_cores: "0-3"
"#;
    let doc = WorkflowDoc::parse(raw).unwrap();
    let job = &doc.jobs["train"];
    assert_eq!(job.env["EPOCHS"], "10");
    assert_eq!(job.limits.max_cpu, 200);
    assert_eq!(job.limits.cpu_cores.as_ref().unwrap().expr(), "0-3");
}
