// Copyright 2025 LLM Workbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Baseline-versus-tools comparison.
//!
//! Pairs the two approaches' snapshots over the same task/instance
//! population and derives reduction percentages plus a significance
//! estimate. With fewer than two samples on either side the estimate is 0,
//! never an error.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use llm_workbench_core::TaskOutcome;

use crate::snapshot::MetricsSnapshot;

/// Effect size below which a difference is reported as low confidence.
const SMALL_EFFECT: f64 = 0.2;
/// Effect size above which a difference is reported as high confidence.
const LARGE_EFFECT: f64 = 0.8;

/// Coarse confidence label derived from the significance estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    /// Too few samples or a negligible effect.
    Low,
    /// A moderate effect.
    Medium,
    /// A large effect.
    High,
}

/// Reduction/efficiency deltas between the two approaches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonSnapshot {
    /// Aggregate metrics for the baseline approach.
    pub baseline: MetricsSnapshot,
    /// Aggregate metrics for the tools approach.
    pub tools: MetricsSnapshot,
    /// `min(|baseline outcomes|, |tools outcomes|)`.
    pub sample_size: usize,
    /// Percent of baseline tokens saved by the tools approach. Negative
    /// when the tools approach used more tokens.
    pub token_reduction_percent: f64,
    /// Percent of baseline execution time saved by the tools approach.
    pub time_reduction_percent: f64,
    /// Pooled-std-normalized mean duration difference; 0 when either side
    /// has fewer than two samples.
    pub significance: f64,
    /// Label derived from [`ComparisonSnapshot::significance`].
    pub confidence: ConfidenceLevel,
}

/// Compare baseline outcomes against tools outcomes.
pub fn compare(
    baseline: &[TaskOutcome],
    tools: &[TaskOutcome],
    wall_clock: Duration,
) -> ComparisonSnapshot {
    let baseline_snapshot = MetricsSnapshot::from_outcomes(baseline, wall_clock);
    let tools_snapshot = MetricsSnapshot::from_outcomes(tools, wall_clock);

    let token_reduction_percent = reduction_percent(
        baseline_snapshot.total_tokens as f64,
        tools_snapshot.total_tokens as f64,
    );
    let time_reduction_percent = reduction_percent(
        MetricsSnapshot::total_duration_ms(baseline),
        MetricsSnapshot::total_duration_ms(tools),
    );

    let significance = pooled_effect_size(&durations_of(baseline), &durations_of(tools));
    let sample_size = baseline.len().min(tools.len());
    let confidence = if sample_size < 2 || significance < SMALL_EFFECT {
        ConfidenceLevel::Low
    } else if significance < LARGE_EFFECT {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::High
    };

    ComparisonSnapshot {
        baseline: baseline_snapshot,
        tools: tools_snapshot,
        sample_size,
        token_reduction_percent,
        time_reduction_percent,
        significance,
        confidence,
    }
}

/// `(baseline - tools) / baseline * 100`, 0 when the baseline is 0.
fn reduction_percent(baseline: f64, tools: f64) -> f64 {
    if baseline <= 0.0 {
        return 0.0;
    }
    (baseline - tools) / baseline * 100.0
}

fn durations_of(outcomes: &[TaskOutcome]) -> Vec<f64> {
    outcomes
        .iter()
        .filter_map(|o| o.duration_ms)
        .map(|d| d as f64)
        .collect()
}

/// Two-sample significance proxy: absolute mean difference normalized by
/// the pooled standard deviation. Returns 0 when either side has fewer
/// than two samples or the pooled deviation vanishes.
fn pooled_effect_size(a: &[f64], b: &[f64]) -> f64 {
    if a.len() < 2 || b.len() < 2 {
        return 0.0;
    }
    let (mean_a, var_a) = mean_and_variance(a);
    let (mean_b, var_b) = mean_and_variance(b);
    let pooled = (((a.len() - 1) as f64 * var_a + (b.len() - 1) as f64 * var_b)
        / (a.len() + b.len() - 2) as f64)
        .sqrt();
    if pooled == 0.0 {
        return 0.0;
    }
    (mean_a - mean_b).abs() / pooled
}

fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance)
}
