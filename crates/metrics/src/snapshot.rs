// Copyright 2025 LLM Workbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Aggregate statistics over a set of task outcomes.
//!
//! [`MetricsSnapshot::from_outcomes`] is a pure function: the same outcome
//! set and wall clock always produce the same snapshot, so callers are free
//! to recompute per filter/partition instead of maintaining incremental
//! counters.

use std::collections::BTreeMap;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use llm_workbench_core::{OutcomeStatus, TaskOutcome};

/// Weight of the success rate in the efficiency score.
const W_SUCCESS: f64 = 0.4;
/// Weight of normalized throughput.
const W_THROUGHPUT: f64 = 0.3;
/// Weight of normalized token rate.
const W_TOKEN_RATE: f64 = 0.2;
/// Weight of normalized speed.
const W_SPEED: f64 = 0.1;

/// Throughput that scores 1.0 on the normalized scale, in completed
/// work items per second.
const REFERENCE_THROUGHPUT: f64 = 1.0;
/// Token rate that scores 1.0 on the normalized scale, in tokens/second.
const REFERENCE_TOKEN_RATE: f64 = 200.0;
/// Mean duration that scores 1.0 on the normalized speed scale.
const REFERENCE_DURATION_MS: f64 = 60_000.0;

/// Coarse error family, derived from error messages for reporting only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorBucket {
    /// The request hit a timeout.
    Timeout,
    /// The backend was unreachable.
    Connection,
    /// The backend answered with an error status.
    Http,
    /// The response could not be decoded.
    Parse,
    /// The backend rejected or mishandled the model.
    Model,
    /// Anything unclassified.
    Unknown,
}

impl ErrorBucket {
    /// Stable label used as a histogram key.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorBucket::Timeout => "timeout",
            ErrorBucket::Connection => "connection",
            ErrorBucket::Http => "http",
            ErrorBucket::Parse => "parse",
            ErrorBucket::Model => "model",
            ErrorBucket::Unknown => "unknown",
        }
    }
}

static ERROR_PATTERNS: Lazy<Vec<(ErrorBucket, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        (ErrorBucket::Timeout, vec!["timed out", "timeout"]),
        (
            ErrorBucket::Connection,
            vec!["connection", "connect", "refused", "unreachable", "dns", "network"],
        ),
        (ErrorBucket::Http, vec!["http", "status"]),
        (
            ErrorBucket::Parse,
            vec!["parse", "json", "decode", "malformed"],
        ),
        (ErrorBucket::Model, vec!["model"]),
    ]
});

/// Classify an error message into a coarse bucket by substring matching.
///
/// Classification never fails; unrecognized messages land in
/// [`ErrorBucket::Unknown`].
pub fn classify_error(message: &str) -> ErrorBucket {
    let lower = message.to_lowercase();
    for (bucket, patterns) in ERROR_PATTERNS.iter() {
        if patterns.iter().any(|p| lower.contains(p)) {
            return *bucket;
        }
    }
    ErrorBucket::Unknown
}

/// Aggregate counters and derived statistics for a set of outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Number of outcomes in the set.
    pub total_tasks: usize,
    /// Outcomes that completed.
    pub completed_tasks: usize,
    /// Outcomes that failed for a non-timeout reason.
    pub failed_tasks: usize,
    /// Outcomes that timed out.
    pub timeout_tasks: usize,
    /// `completed / total`, 0 when the set is empty.
    pub success_rate: f64,
    /// Mean recorded duration in milliseconds.
    pub mean_duration_ms: f64,
    /// Duration percentiles (p25/p50/p75/p90/p95/p99) in milliseconds.
    /// Empty unless at least two durations were recorded.
    pub duration_percentiles: BTreeMap<String, f64>,
    /// Total prompt tokens.
    pub total_input_tokens: u64,
    /// Total completion tokens.
    pub total_output_tokens: u64,
    /// Prompt plus completion tokens.
    pub total_tokens: u64,
    /// Mean tokens per outcome.
    pub avg_tokens_per_task: f64,
    /// Completed outcomes per wall-clock second.
    pub throughput: f64,
    /// Total tokens per wall-clock second.
    pub tokens_per_second: f64,
    /// Composite efficiency score in `[0, 1]`.
    pub efficiency_score: f64,
    /// Error histogram keyed by [`ErrorBucket`] label.
    pub error_counts: BTreeMap<String, usize>,
    /// Wall-clock window the set was collected over, in seconds.
    pub wall_clock_secs: f64,
}

impl MetricsSnapshot {
    /// Compute a snapshot from an outcome set and its wall-clock window.
    pub fn from_outcomes(outcomes: &[TaskOutcome], wall_clock: Duration) -> Self {
        let total_tasks = outcomes.len();
        let completed_tasks = count_status(outcomes, OutcomeStatus::Completed);
        let failed_tasks = count_status(outcomes, OutcomeStatus::Failed);
        let timeout_tasks = count_status(outcomes, OutcomeStatus::Timeout);

        let success_rate = if total_tasks == 0 {
            0.0
        } else {
            completed_tasks as f64 / total_tasks as f64
        };

        let durations: Vec<f64> = outcomes
            .iter()
            .filter_map(|o| o.duration_ms)
            .map(|d| d as f64)
            .collect();
        let mean_duration_ms = mean(&durations);
        let duration_percentiles = percentiles(&durations);

        let total_input_tokens: u64 = outcomes.iter().map(|o| o.input_tokens).sum();
        let total_output_tokens: u64 = outcomes.iter().map(|o| o.output_tokens).sum();
        let total_tokens = total_input_tokens + total_output_tokens;
        let avg_tokens_per_task = if total_tasks == 0 {
            0.0
        } else {
            total_tokens as f64 / total_tasks as f64
        };

        let wall_clock_secs = wall_clock.as_secs_f64();
        let throughput = if wall_clock_secs > 0.0 {
            completed_tasks as f64 / wall_clock_secs
        } else {
            0.0
        };
        let tokens_per_second = if wall_clock_secs > 0.0 {
            total_tokens as f64 / wall_clock_secs
        } else {
            0.0
        };

        let efficiency_score = efficiency_score(
            success_rate,
            throughput,
            tokens_per_second,
            mean_duration_ms,
        );

        let mut error_counts = BTreeMap::new();
        for outcome in outcomes {
            if let Some(message) = &outcome.error {
                let bucket = classify_error(message).as_str().to_string();
                *error_counts.entry(bucket).or_insert(0) += 1;
            }
        }

        Self {
            total_tasks,
            completed_tasks,
            failed_tasks,
            timeout_tasks,
            success_rate,
            mean_duration_ms,
            duration_percentiles,
            total_input_tokens,
            total_output_tokens,
            total_tokens,
            avg_tokens_per_task,
            throughput,
            tokens_per_second,
            efficiency_score,
            error_counts,
            wall_clock_secs,
        }
    }

    /// Sum of recorded durations in milliseconds.
    pub fn total_duration_ms(outcomes: &[TaskOutcome]) -> f64 {
        outcomes
            .iter()
            .filter_map(|o| o.duration_ms)
            .map(|d| d as f64)
            .sum()
    }
}

fn count_status(outcomes: &[TaskOutcome], status: OutcomeStatus) -> usize {
    outcomes.iter().filter(|o| o.status == status).count()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Nearest-rank percentiles over the recorded durations.
fn percentiles(durations: &[f64]) -> BTreeMap<String, f64> {
    let mut result = BTreeMap::new();
    if durations.len() < 2 {
        return result;
    }
    let mut sorted = durations.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    for p in [25usize, 50, 75, 90, 95, 99] {
        let index = (n * p / 100).min(n - 1);
        result.insert(format!("p{p}"), sorted[index]);
    }
    result
}

/// Weighted blend of success rate, throughput, token rate and speed, each
/// sub-term clamped to `[0, 1]` before weighting.
fn efficiency_score(
    success_rate: f64,
    throughput: f64,
    tokens_per_second: f64,
    mean_duration_ms: f64,
) -> f64 {
    let norm_throughput = (throughput / REFERENCE_THROUGHPUT).clamp(0.0, 1.0);
    let norm_token_rate = (tokens_per_second / REFERENCE_TOKEN_RATE).clamp(0.0, 1.0);
    let norm_speed = if mean_duration_ms > 0.0 {
        (REFERENCE_DURATION_MS / mean_duration_ms).clamp(0.0, 1.0)
    } else {
        0.0
    };
    W_SUCCESS * success_rate.clamp(0.0, 1.0)
        + W_THROUGHPUT * norm_throughput
        + W_TOKEN_RATE * norm_token_rate
        + W_SPEED * norm_speed
}
