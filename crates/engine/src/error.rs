// Copyright 2025 LLM Workbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Request-level errors.
//!
//! A [`RequestError`] belongs to exactly one work item. It is captured into
//! that item's terminal outcome and never propagated past the engine
//! boundary, so one failing sample cannot abort its siblings.

use thiserror::Error;

/// Errors from a single request/response cycle.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The request exceeded its timeout.
    #[error("request timed out after {timeout_secs}s")]
    Timeout {
        /// The exhausted budget, in seconds.
        timeout_secs: u64,
    },

    /// The backend could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The backend answered with an error status.
    #[error("backend returned HTTP {status}: {message}")]
    Http {
        /// Response status code.
        status: u16,
        /// Response body, truncated.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("failed to parse backend response: {0}")]
    Parse(String),

    /// The backend reported a model-level problem.
    #[error("model error: {0}")]
    Model(String),
}

impl RequestError {
    /// Whether this error is a timeout; timeouts get their own terminal
    /// outcome status.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RequestError::Timeout { .. })
    }

    /// Classify a transport error from the HTTP client.
    pub fn from_reqwest(error: reqwest::Error, timeout_secs: u64) -> Self {
        if error.is_timeout() {
            RequestError::Timeout { timeout_secs }
        } else if error.is_connect() {
            RequestError::Connection(error.to_string())
        } else if error.is_decode() {
            RequestError::Parse(error.to_string())
        } else {
            RequestError::Connection(error.to_string())
        }
    }
}

/// Result type for request operations.
pub type Result<T> = std::result::Result<T, RequestError>;
