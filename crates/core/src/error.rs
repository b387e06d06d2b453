// Copyright 2025 LLM Workbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Validation errors for task and configuration definitions.
//!
//! Everything in this module is rejected *before* a run starts. Errors that
//! occur while a run is in flight live with the component that produces them
//! (`OrchestrationError` in the orchestrator crate, `RequestError` in the
//! engine crate).

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Approach;

/// Errors raised when a task or configuration definition is rejected.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The requested hardware profile is not configured.
    #[error("unknown profile: {0}")]
    UnknownProfile(String),

    /// A profile was configured without any backend instances.
    #[error("profile '{0}' has no instances")]
    EmptyProfile(String),

    /// A profile was configured with a zero sample size.
    #[error("profile '{0}' has a non-positive sample size")]
    NonPositiveSampleSize(String),

    /// A task was registered with an empty id.
    #[error("task id must not be empty")]
    EmptyTaskId,

    /// A task was registered with an empty display name.
    #[error("task '{0}' has an empty name")]
    EmptyTaskName(String),

    /// A task was registered with an empty prompt for one approach.
    #[error("task '{task}' has an empty {approach} prompt")]
    EmptyPrompt {
        /// Task id.
        task: String,
        /// Approach whose prompt is missing.
        approach: Approach,
    },

    /// A task was registered with a zero timeout.
    #[error("task '{0}' has a non-positive timeout")]
    NonPositiveTimeout(String),

    /// A retry budget below zero was supplied at the configuration boundary.
    #[error("retry budget must not be negative (got {0})")]
    NegativeRetryBudget(i64),

    /// A task references a target file that does not exist on disk.
    #[error("task '{task}' references missing target file {path}")]
    MissingTargetFile {
        /// Task id.
        task: String,
        /// The missing path.
        path: PathBuf,
    },

    /// A task with the same id is already registered.
    #[error("task '{0}' is already registered")]
    DuplicateTaskId(String),

    /// The configuration file could not be read or parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
