// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! joblet-workflow: workflow documents, dependency expressions, and the
//! DAG executor.

pub mod document;
pub mod expr;
pub mod executor;
pub mod graph;
pub mod validate;

pub use document::{RequiresSpec, WorkflowDoc, WorkflowJobDef};
pub use executor::{
    derive_workflow_status, ExecutionReport, WorkflowExecutor, WorkflowJobRunner, WorkflowStatus,
};
pub use expr::{Expr, ExprError, Outcome};
pub use graph::{kahn_order, CycleError};
pub use validate::{
    NetworkCatalog, RuntimeCatalog, ValidationError, VolumeCatalog, WorkflowValidator,
};
