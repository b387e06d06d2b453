// Copyright 2025 LLM Workbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark data model.
//!
//! The types here flow through every stage of a run: an [`Instance`] is a
//! single addressable model-serving backend, a [`Task`] pairs a baseline
//! prompt with a tools-assisted prompt, and a [`TaskOutcome`] is the
//! terminal, immutable record of one (task, approach, instance, sample)
//! work item.
//!
//! # Invariants
//!
//! - Instances and tasks are immutable after registry load.
//! - A `TaskOutcome` transitions exactly once from `Running` to a terminal
//!   state (`Completed`, `Failed` or `Timeout`) and is never mutated again.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named hardware/capacity tier mapping to a set of backend instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareProfile {
    /// Small models, low concurrency.
    Light,
    /// Mid-sized models.
    Medium,
    /// Large models, high per-instance concurrency.
    Heavy,
}

impl HardwareProfile {
    /// All known profiles, in ascending capacity order.
    pub fn all() -> [HardwareProfile; 3] {
        [
            HardwareProfile::Light,
            HardwareProfile::Medium,
            HardwareProfile::Heavy,
        ]
    }

    /// The profile name as used in configuration files and CLI arguments.
    pub fn as_str(&self) -> &'static str {
        match self {
            HardwareProfile::Light => "light",
            HardwareProfile::Medium => "medium",
            HardwareProfile::Heavy => "heavy",
        }
    }
}

impl std::fmt::Display for HardwareProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HardwareProfile {
    type Err = crate::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(HardwareProfile::Light),
            "medium" => Ok(HardwareProfile::Medium),
            "heavy" => Ok(HardwareProfile::Heavy),
            other => Err(crate::ValidationError::UnknownProfile(other.to_string())),
        }
    }
}

/// One addressable model-serving backend.
///
/// Owned by the profile registry and immutable after load; the execution
/// engine holds references, never copies it into mutable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Unique instance name within its profile (e.g. "medium-a").
    pub name: String,
    /// Model identifier the backend is expected to serve.
    pub model_id: String,
    /// Host the backend listens on.
    pub host: String,
    /// Port the backend listens on.
    pub port: u16,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Concurrency ceiling: no more than this many in-flight requests.
    pub max_concurrent: usize,
}

impl Instance {
    /// Base URL of the backend, without a trailing slash.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Per-request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// One of the two workflows being compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approach {
    /// The unassisted reference workflow.
    Baseline,
    /// The tools-assisted workflow under measurement.
    Tools,
}

impl Approach {
    /// Both approaches, baseline first.
    pub fn both() -> [Approach; 2] {
        [Approach::Baseline, Approach::Tools]
    }

    /// Lowercase label used in snapshots and log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Approach::Baseline => "baseline",
            Approach::Tools => "tools",
        }
    }
}

impl std::fmt::Display for Approach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow family a benchmark task belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowCategory {
    /// Reading and explaining existing code.
    CodeAnalysis,
    /// Restructuring code without changing behavior.
    Refactoring,
    /// Locating and fixing a defect.
    BugFix,
    /// Producing or updating documentation.
    Documentation,
    /// Writing or extending tests.
    Testing,
    /// Anything outside the built-in families.
    Custom(String),
}

impl std::fmt::Display for WorkflowCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowCategory::CodeAnalysis => f.write_str("code_analysis"),
            WorkflowCategory::Refactoring => f.write_str("refactoring"),
            WorkflowCategory::BugFix => f.write_str("bug_fix"),
            WorkflowCategory::Documentation => f.write_str("documentation"),
            WorkflowCategory::Testing => f.write_str("testing"),
            WorkflowCategory::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

/// A benchmark task: two prompts for the same piece of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Workflow family this task exercises.
    pub workflow_category: WorkflowCategory,
    /// Prompt used for the baseline approach.
    pub baseline_prompt: String,
    /// Prompt used for the tools-assisted approach.
    pub tools_prompt: String,
    /// Per-work-item timeout in seconds.
    pub timeout_secs: u64,
    /// How many times a failed work item may be re-issued.
    pub max_retries: u32,
    /// Files the task operates on; must exist at registration time.
    #[serde(default)]
    pub target_files: Vec<PathBuf>,
}

impl Task {
    /// The prompt for the given approach.
    pub fn prompt(&self, approach: Approach) -> &str {
        match approach {
            Approach::Baseline => &self.baseline_prompt,
            Approach::Tools => &self.tools_prompt,
        }
    }

    /// Per-work-item timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Status of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Created but not yet started.
    Pending,
    /// Request in flight.
    Running,
    /// Terminal: request/response cycle succeeded.
    Completed,
    /// Terminal: the work item failed for a non-timeout reason.
    Failed,
    /// Terminal: the work item hit its timeout.
    Timeout,
}

impl OutcomeStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OutcomeStatus::Completed | OutcomeStatus::Failed | OutcomeStatus::Timeout
        )
    }
}

/// What one request/response cycle produced, approach-agnostic.
///
/// Both the live tools path and the simulated baseline path reduce to this
/// black-box shape, so the engine never branches on the approach.
#[derive(Debug, Clone)]
pub struct OutcomeData {
    /// Generated text.
    pub text: String,
    /// Tokens consumed by the prompt.
    pub input_tokens: u64,
    /// Tokens produced by the backend.
    pub output_tokens: u64,
    /// Duration as reported by the producing side.
    pub duration: Duration,
}

/// The terminal, immutable record of one work item.
///
/// Created when the work item begins, mutated exactly once into a terminal
/// state by the worker that produced it, then handed to the metrics
/// collector by value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Task that was executed.
    pub task_id: String,
    /// Approach that was executed.
    pub approach: Approach,
    /// Instance the request targeted.
    pub instance_name: String,
    /// Model served by that instance.
    pub model_id: String,
    /// Current status; terminal once recorded.
    pub status: OutcomeStatus,
    /// When the work item began.
    pub start_time: DateTime<Utc>,
    /// When the work item reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Wall-clock duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Tokens consumed by the prompt.
    pub input_tokens: u64,
    /// Tokens produced by the backend.
    pub output_tokens: u64,
    /// Classified error message when status is `Failed` or `Timeout`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Which sample in `[0, sample_size)` this work item was.
    pub sample_index: usize,
    /// How many attempts were issued, including the recorded one.
    pub attempts: u32,
}

impl TaskOutcome {
    /// Create a running outcome for a work item that is starting now.
    pub fn begin(
        task_id: impl Into<String>,
        approach: Approach,
        instance: &Instance,
        sample_index: usize,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            approach,
            instance_name: instance.name.clone(),
            model_id: instance.model_id.clone(),
            status: OutcomeStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            duration_ms: None,
            input_tokens: 0,
            output_tokens: 0,
            error: None,
            sample_index,
            attempts: 0,
        }
    }

    /// Mark completed, recording tokens and wall-clock duration.
    pub fn complete(&mut self, data: &OutcomeData) {
        self.input_tokens = data.input_tokens;
        self.output_tokens = data.output_tokens;
        self.finish(OutcomeStatus::Completed);
    }

    /// Mark failed with a classified error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.finish(OutcomeStatus::Failed);
    }

    /// Mark timed out. The duration still reflects wall clock.
    pub fn timed_out(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.finish(OutcomeStatus::Timeout);
    }

    fn finish(&mut self, status: OutcomeStatus) {
        let now = Utc::now();
        self.end_time = Some(now);
        self.duration_ms = Some(
            now.signed_duration_since(self.start_time)
                .num_milliseconds()
                .unsigned_abs(),
        );
        self.status = status;
    }

    /// Whether this outcome is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Input plus output tokens.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}
