// Copyright 2025 LLM Workbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Orchestration errors.

use thiserror::Error;

/// Errors that can occur while bringing backends up or down.
///
/// Any of these aborts the run for the affected profile; teardown is still
/// guaranteed by the caller.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// The lifecycle command could not be spawned at all.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        /// The command line that failed.
        command: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The lifecycle command ran but exited non-zero.
    #[error("`{command}` exited with status {status}")]
    Lifecycle {
        /// The command line that failed.
        command: String,
        /// Process exit code, or -1 when killed by a signal.
        status: i32,
    },

    /// No instance became healthy within the startup budget.
    #[error("no instances became ready within {timeout_secs}s")]
    NoInstancesReady {
        /// The exhausted budget, in seconds.
        timeout_secs: u64,
    },
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestrationError>;
