// Copyright 2025 LLM Workbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core data model for LLM Workbench.
//!
//! This crate holds everything the other workbench crates agree on: the
//! benchmark data model (instances, profiles, tasks, outcomes), the
//! configuration schema, the profile and task registries, and the
//! validation error taxonomy.
//!
//! Instances, profiles and tasks are loaded once per process and are
//! read-only afterwards; the only sanctioned mutation is an explicit,
//! validated task registration on [`TaskRegistry`].

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod profiles;
pub mod tasks;
pub mod types;

pub use config::{ExecutionMode, WorkbenchConfig};
pub use error::ValidationError;
pub use profiles::ProfileRegistry;
pub use tasks::TaskRegistry;
pub use types::{
    Approach, HardwareProfile, Instance, OutcomeData, OutcomeStatus, Task, TaskOutcome,
    WorkflowCategory,
};

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, ValidationError>;
