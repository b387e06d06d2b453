// Copyright 2025 LLM Workbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Concurrency-safe outcome accumulation.
//!
//! Many workers call [`MetricsCollector::add_outcome`] concurrently; one
//! mutex serializes them. Every critical section is O(1) push/clone work,
//! and the lock is never held across a network call or an await point.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use llm_workbench_core::{Approach, TaskOutcome};

use crate::comparison::{compare, ComparisonSnapshot};
use crate::snapshot::MetricsSnapshot;

#[derive(Debug, Default)]
struct CollectorState {
    outcomes: Vec<TaskOutcome>,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
}

/// Thread-safe accumulator of task outcomes for one benchmark run.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    state: Mutex<CollectorState>,
}

impl MetricsCollector {
    /// An empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of the collection window.
    pub fn start_collection(&self) {
        let mut state = self.state.lock().expect("collector mutex poisoned");
        state.started_at = Some(Utc::now());
        state.stopped_at = None;
    }

    /// Record the end of the collection window.
    pub fn stop_collection(&self) {
        let mut state = self.state.lock().expect("collector mutex poisoned");
        state.stopped_at = Some(Utc::now());
    }

    /// Add one terminal outcome. Safe to call from many workers.
    pub fn add_outcome(&self, outcome: TaskOutcome) {
        debug!(
            task_id = %outcome.task_id,
            approach = %outcome.approach,
            instance = %outcome.instance_name,
            status = ?outcome.status,
            "recording outcome"
        );
        let mut state = self.state.lock().expect("collector mutex poisoned");
        state.outcomes.push(outcome);
    }

    /// Number of recorded outcomes.
    pub fn outcome_count(&self) -> usize {
        self.state.lock().expect("collector mutex poisoned").outcomes.len()
    }

    /// A copy of all recorded outcomes.
    pub fn outcomes(&self) -> Vec<TaskOutcome> {
        self.state
            .lock()
            .expect("collector mutex poisoned")
            .outcomes
            .clone()
    }

    /// The collection window. Falls back to "start until now" while the
    /// run is still open, and to zero before `start_collection`.
    pub fn wall_clock(&self) -> Duration {
        let state = self.state.lock().expect("collector mutex poisoned");
        match (state.started_at, state.stopped_at) {
            (Some(start), Some(stop)) => signed_to_duration(stop, start),
            (Some(start), None) => signed_to_duration(Utc::now(), start),
            _ => Duration::ZERO,
        }
    }

    /// Compute aggregate metrics, optionally filtered to one approach.
    pub fn compute_metrics(&self, approach: Option<Approach>) -> MetricsSnapshot {
        let wall_clock = self.wall_clock();
        let outcomes = self.outcomes();
        let filtered: Vec<TaskOutcome> = match approach {
            Some(a) => outcomes.into_iter().filter(|o| o.approach == a).collect(),
            None => outcomes,
        };
        MetricsSnapshot::from_outcomes(&filtered, wall_clock)
    }

    /// Compute the baseline-versus-tools comparison.
    pub fn compute_comparison(&self) -> ComparisonSnapshot {
        let wall_clock = self.wall_clock();
        let outcomes = self.outcomes();
        let (baseline, tools): (Vec<_>, Vec<_>) = outcomes
            .into_iter()
            .partition(|o| o.approach == Approach::Baseline);
        compare(&baseline, &tools, wall_clock)
    }

    /// Per-task snapshots, keyed by task id.
    pub fn by_task(&self) -> BTreeMap<String, MetricsSnapshot> {
        self.breakdown(|o| o.task_id.clone())
    }

    /// Per-model snapshots, keyed by model id.
    pub fn by_model(&self) -> BTreeMap<String, MetricsSnapshot> {
        self.breakdown(|o| o.model_id.clone())
    }

    /// Partition outcomes by key and re-apply the same aggregation to each
    /// partition.
    fn breakdown(&self, key: impl Fn(&TaskOutcome) -> String) -> BTreeMap<String, MetricsSnapshot> {
        let wall_clock = self.wall_clock();
        let mut partitions: BTreeMap<String, Vec<TaskOutcome>> = BTreeMap::new();
        for outcome in self.outcomes() {
            partitions.entry(key(&outcome)).or_default().push(outcome);
        }
        partitions
            .into_iter()
            .map(|(k, outcomes)| (k, MetricsSnapshot::from_outcomes(&outcomes, wall_clock)))
            .collect()
    }
}

fn signed_to_duration(later: DateTime<Utc>, earlier: DateTime<Utc>) -> Duration {
    later
        .signed_duration_since(earlier)
        .to_std()
        .unwrap_or(Duration::ZERO)
}
