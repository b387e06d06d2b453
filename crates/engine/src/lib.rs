// Copyright 2025 LLM Workbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Execution engine for LLM Workbench.
//!
//! Fans the Cartesian product {task} × {approach} × {ready instance} ×
//! {sample index} out as independent work items and runs them under the
//! configured scheduling mode, feeding every terminal outcome into the
//! metrics collector.
//!
//! # Invariants
//!
//! - No more than `max_concurrent` requests are ever in flight against one
//!   instance, in any scheduling mode. Each instance owns a counting
//!   semaphore; a work item holds a permit for exactly the span of one
//!   request attempt.
//! - Work items never raise past the engine boundary. Every failure
//!   (network, timeout, malformed response, even an aborted worker) is
//!   captured into a terminal [`TaskOutcome`].

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod client;
pub mod error;

pub use client::{BaselineSimulator, GenerateOptions, GenerationClient, WorkflowClient};
pub use error::RequestError;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use llm_workbench_core::config::{ExecutionConfig, ExecutionMode};
use llm_workbench_core::{Approach, Instance, OutcomeData, Task, TaskOutcome};
use llm_workbench_metrics::MetricsCollector;

/// The per-approach execution clients.
///
/// Approach dispatch is data, not control flow: the engine looks the client
/// up by approach and otherwise treats both identically.
#[derive(Clone)]
pub struct ApproachClients {
    baseline: Arc<dyn WorkflowClient>,
    tools: Arc<dyn WorkflowClient>,
}

impl ApproachClients {
    /// Pair a baseline client with a tools client.
    pub fn new(baseline: Arc<dyn WorkflowClient>, tools: Arc<dyn WorkflowClient>) -> Self {
        Self { baseline, tools }
    }

    /// The same client for both approaches.
    pub fn uniform(client: Arc<dyn WorkflowClient>) -> Self {
        Self {
            baseline: client.clone(),
            tools: client,
        }
    }

    fn client_for(&self, approach: Approach) -> Arc<dyn WorkflowClient> {
        match approach {
            Approach::Baseline => self.baseline.clone(),
            Approach::Tools => self.tools.clone(),
        }
    }
}

/// One (task, approach, instance, sample) execution unit.
struct WorkItem {
    task: Arc<Task>,
    approach: Approach,
    instance: Arc<Instance>,
    sample_index: usize,
}

/// Guard that guarantees a terminal outcome reaches the collector on every
/// exit path. If the worker is torn down before finalizing (a panic, an
/// aborted future), the drop impl records a failure instead of losing the
/// work item.
struct OutcomeRecorder {
    collector: Arc<MetricsCollector>,
    outcome: Option<TaskOutcome>,
}

impl OutcomeRecorder {
    fn begin(collector: Arc<MetricsCollector>, outcome: TaskOutcome) -> Self {
        Self {
            collector,
            outcome: Some(outcome),
        }
    }

    fn complete(mut self, data: &OutcomeData, attempts: u32) {
        if let Some(mut outcome) = self.outcome.take() {
            outcome.attempts = attempts;
            outcome.complete(data);
            self.collector.add_outcome(outcome);
        }
    }

    fn fail(mut self, error: &RequestError, attempts: u32) {
        if let Some(mut outcome) = self.outcome.take() {
            outcome.attempts = attempts;
            if error.is_timeout() {
                outcome.timed_out(error.to_string());
            } else {
                outcome.fail(error.to_string());
            }
            self.collector.add_outcome(outcome);
        }
    }
}

impl Drop for OutcomeRecorder {
    fn drop(&mut self) {
        if let Some(mut outcome) = self.outcome.take() {
            outcome.fail("work item aborted before completion");
            self.collector.add_outcome(outcome);
        }
    }
}

/// Runs a task set against a profile's ready instances.
pub struct ExecutionEngine {
    clients: ApproachClients,
    execution: ExecutionConfig,
}

impl ExecutionEngine {
    /// Create an engine with the given clients and scheduling config.
    pub fn new(clients: ApproachClients, execution: ExecutionConfig) -> Self {
        Self { clients, execution }
    }

    /// Run every (task, approach, instance, sample) combination, recording
    /// one terminal outcome per work item into the collector.
    ///
    /// This never fails: request-level errors become `failed`/`timeout`
    /// outcomes and scheduling continues. The number of recorded outcomes
    /// equals `tasks × 2 × instances × sample_size`.
    pub async fn run(
        &self,
        tasks: &[Task],
        instances: &[Instance],
        sample_size: usize,
        collector: Arc<MetricsCollector>,
    ) {
        let semaphores = instance_semaphores(instances);
        let items = build_work_items(tasks, instances, sample_size);
        info!(
            mode = %self.execution.mode,
            work_items = items.len(),
            instances = instances.len(),
            sample_size,
            "starting execution"
        );

        match self.execution.mode {
            ExecutionMode::Sequential => {
                for item in items {
                    let semaphore = semaphores[&item.instance.name].clone();
                    execute_work_item(item, semaphore, self.clients.clone(), collector.clone())
                        .await;
                }
            }
            ExecutionMode::BoundedParallel => {
                let ceiling = Arc::new(Semaphore::new(self.execution.global_ceiling()));
                let handles: Vec<_> = items
                    .into_iter()
                    .map(|item| {
                        let semaphore = semaphores[&item.instance.name].clone();
                        let clients = self.clients.clone();
                        let collector = collector.clone();
                        let ceiling = ceiling.clone();
                        tokio::spawn(async move {
                            let _slot = ceiling.acquire_owned().await;
                            execute_work_item(item, semaphore, clients, collector).await;
                        })
                    })
                    .collect();
                join_workers(handles).await;
            }
            ExecutionMode::FullyConcurrent => {
                let handles: Vec<_> = items
                    .into_iter()
                    .map(|item| {
                        let semaphore = semaphores[&item.instance.name].clone();
                        let clients = self.clients.clone();
                        let collector = collector.clone();
                        tokio::spawn(async move {
                            execute_work_item(item, semaphore, clients, collector).await;
                        })
                    })
                    .collect();
                join_workers(handles).await;
            }
        }
    }
}

async fn join_workers(handles: Vec<tokio::task::JoinHandle<()>>) {
    for result in futures::future::join_all(handles).await {
        if let Err(e) = result {
            // The recorder's drop impl already captured the outcome.
            warn!(error = %e, "work item worker aborted");
        }
    }
}

fn instance_semaphores(instances: &[Instance]) -> HashMap<String, Arc<Semaphore>> {
    instances
        .iter()
        .map(|i| (i.name.clone(), Arc::new(Semaphore::new(i.max_concurrent))))
        .collect()
}

fn build_work_items(
    tasks: &[Task],
    instances: &[Instance],
    sample_size: usize,
) -> Vec<WorkItem> {
    let tasks: Vec<Arc<Task>> = tasks.iter().cloned().map(Arc::new).collect();
    let instances: Vec<Arc<Instance>> = instances.iter().cloned().map(Arc::new).collect();

    let mut items = Vec::with_capacity(tasks.len() * 2 * instances.len() * sample_size);
    for task in &tasks {
        for approach in Approach::both() {
            for instance in &instances {
                for sample_index in 0..sample_size {
                    items.push(WorkItem {
                        task: task.clone(),
                        approach,
                        instance: instance.clone(),
                        sample_index,
                    });
                }
            }
        }
    }
    items
}

/// Execute one work item: acquire the instance permit, run the request with
/// a timeout, retry up to the task's budget, and record exactly one
/// terminal outcome.
///
/// The permit spans a single attempt; a retry releases it and re-acquires
/// before the next request.
async fn execute_work_item(
    item: WorkItem,
    semaphore: Arc<Semaphore>,
    clients: ApproachClients,
    collector: Arc<MetricsCollector>,
) {
    let recorder = OutcomeRecorder::begin(
        collector,
        TaskOutcome::begin(&item.task.id, item.approach, &item.instance, item.sample_index),
    );

    let client = clients.client_for(item.approach);
    let prompt = item.task.prompt(item.approach);
    // The request budget is the tighter of the task's and the instance's.
    let budget = item.task.timeout().min(item.instance.timeout());
    let max_attempts = item.task.max_retries + 1;

    let mut attempt = 0;
    loop {
        attempt += 1;

        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                // Only possible if the semaphore was closed, which the
                // engine never does.
                recorder.fail(
                    &RequestError::Connection("instance permit unavailable".to_string()),
                    attempt,
                );
                return;
            }
        };

        let result = tokio::time::timeout(budget, client.execute(&item.instance, prompt)).await;
        drop(permit);

        let error = match result {
            Ok(Ok(data)) => {
                recorder.complete(&data, attempt);
                return;
            }
            Ok(Err(e)) => e,
            Err(_) => RequestError::Timeout {
                timeout_secs: budget.as_secs(),
            },
        };

        if attempt < max_attempts {
            debug!(
                task_id = %item.task.id,
                approach = %item.approach,
                instance = %item.instance.name,
                attempt,
                error = %error,
                "work item attempt failed; retrying"
            );
            continue;
        }

        recorder.fail(&error, attempt);
        return;
    }
}
