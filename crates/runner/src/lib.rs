// Copyright 2025 LLM Workbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark runner for LLM Workbench.
//!
//! The composition root: wires the profile and task registries, the
//! backend orchestrator, the execution engine and the metrics collector
//! into named benchmark runs. A run never raises to the caller; failures
//! come back as a [`BenchmarkRun`] with `status = Failed` and an error
//! message, so sequential multi-profile drivers can keep going. Backend
//! teardown is invoked on every exit path after a successful start.

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod io;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use llm_workbench_core::config::ExecutionConfig;
use llm_workbench_core::{
    ExecutionMode, HardwareProfile, Instance, ProfileRegistry, Task, TaskOutcome, TaskRegistry,
    ValidationError, WorkbenchConfig,
};
use llm_workbench_engine::{
    ApproachClients, BaselineSimulator, ExecutionEngine, GenerationClient,
};
use llm_workbench_metrics::{ComparisonSnapshot, MetricsCollector, MetricsSnapshot};
use llm_workbench_orchestrator::BackendOrchestrator;

/// Identity of one benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkInfo {
    /// The hardware profile that was exercised.
    pub profile: HardwareProfile,
    /// Number of tasks in the run's task set.
    pub total_tasks: usize,
    /// Samples per (task, approach, instance).
    pub sample_size: usize,
    /// Names of the instances that were ready.
    pub instances: Vec<String>,
    /// Scheduling mode the engine ran under.
    pub execution_mode: ExecutionMode,
    /// When the run started.
    pub timestamp: DateTime<Utc>,
}

/// Terminal status of a benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The run executed its work items and produced metrics.
    Completed,
    /// The run aborted before producing work items.
    Failed,
}

/// The JSON-serializable result snapshot of one benchmark run.
///
/// This is the sole handoff to the reporting layer: raw outcomes, the
/// overall snapshot, the approach comparison and both breakdowns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRun {
    /// Unique run id.
    pub run_id: Uuid,
    /// Whether the run completed.
    pub status: RunStatus,
    /// Error message when the run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Run identity.
    pub benchmark_info: BenchmarkInfo,
    /// Every terminal outcome, in recording order.
    pub outcomes: Vec<TaskOutcome>,
    /// Aggregate metrics over all outcomes.
    pub metrics: MetricsSnapshot,
    /// Baseline-versus-tools comparison.
    pub comparison: ComparisonSnapshot,
    /// Per-task metrics.
    pub by_task: BTreeMap<String, MetricsSnapshot>,
    /// Per-model metrics.
    pub by_model: BTreeMap<String, MetricsSnapshot>,
}

/// Per-run overrides on top of the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Override the profile's sample size.
    pub sample_size: Option<usize>,
    /// Override the configured scheduling mode.
    pub mode: Option<ExecutionMode>,
}

/// Wires registries, orchestrator, engine and collector into runs.
pub struct BenchmarkRunner {
    config: WorkbenchConfig,
    profiles: ProfileRegistry,
    tasks: TaskRegistry,
    orchestrator: BackendOrchestrator,
    clients: Option<ApproachClients>,
}

impl BenchmarkRunner {
    /// Build the production runner from a validated configuration.
    pub fn from_config(config: WorkbenchConfig) -> Result<Self, ValidationError> {
        let profiles = ProfileRegistry::from_config(&config)?;
        let tasks = TaskRegistry::with_default_tasks(&config.tasks);
        let orchestrator = BackendOrchestrator::from_config(&config.orchestrator);
        Ok(Self::new(config, profiles, tasks, orchestrator))
    }

    /// Build a runner from explicit parts. No ambient state: everything the
    /// runner touches is passed in here.
    pub fn new(
        config: WorkbenchConfig,
        profiles: ProfileRegistry,
        tasks: TaskRegistry,
        orchestrator: BackendOrchestrator,
    ) -> Self {
        Self {
            config,
            profiles,
            tasks,
            orchestrator,
            clients: None,
        }
    }

    /// Replace the approach clients; used for dry runs and tests.
    pub fn with_clients(mut self, clients: ApproachClients) -> Self {
        self.clients = Some(clients);
        self
    }

    /// The profile registry.
    pub fn profiles(&self) -> &ProfileRegistry {
        &self.profiles
    }

    /// The task registry.
    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    /// Mutable task registry access, for registering custom tasks before a
    /// run starts.
    pub fn tasks_mut(&mut self) -> &mut TaskRegistry {
        &mut self.tasks
    }

    /// Run the benchmark for a profile with default options.
    pub async fn run(&self, profile: HardwareProfile) -> BenchmarkRun {
        self.run_with(profile, RunOptions::default()).await
    }

    /// Run the benchmark for a profile.
    ///
    /// Brings the profile's backends up, fans the task set out against the
    /// ready instances, aggregates metrics, and tears the backends down.
    /// Teardown runs on every exit path after a successful start.
    pub async fn run_with(&self, profile: HardwareProfile, options: RunOptions) -> BenchmarkRun {
        let run_id = Uuid::new_v4();
        let timestamp = Utc::now();
        let sample_size = options
            .sample_size
            .unwrap_or_else(|| self.profiles.get_sample_size(profile));
        let mut execution = self.config.execution.clone();
        if let Some(mode) = options.mode {
            execution.mode = mode;
        }
        info!(%profile, %run_id, sample_size, mode = %execution.mode, "starting benchmark run");

        let instances = match self.profiles.get_instances(profile) {
            Ok(instances) => instances,
            Err(e) => {
                return failed_run(run_id, profile, sample_size, execution.mode, timestamp, e)
            }
        };

        let ready = match self.orchestrator.start(profile, instances).await {
            Ok(ready) => ready,
            Err(e) => {
                error!(%profile, error = %e, "backend startup failed");
                // Startup may have partially created backends; tear down
                // before reporting the failure.
                self.teardown(profile).await;
                return failed_run(run_id, profile, sample_size, execution.mode, timestamp, e);
            }
        };
        let ready_instances: Vec<Instance> =
            ready.into_iter().map(|r| r.instance).collect();

        let tasks: Vec<Task> = self.tasks.list_tasks().into_iter().cloned().collect();
        let collector = Arc::new(MetricsCollector::new());
        let engine = ExecutionEngine::new(self.build_clients(&execution), execution.clone());

        collector.start_collection();
        engine
            .run(&tasks, &ready_instances, sample_size, collector.clone())
            .await;
        collector.stop_collection();

        self.teardown(profile).await;

        let outcomes = collector.outcomes();
        info!(
            %profile,
            %run_id,
            outcomes = outcomes.len(),
            "benchmark run complete"
        );

        BenchmarkRun {
            run_id,
            status: RunStatus::Completed,
            error_message: None,
            benchmark_info: BenchmarkInfo {
                profile,
                total_tasks: tasks.len(),
                sample_size,
                instances: ready_instances.iter().map(|i| i.name.clone()).collect(),
                execution_mode: execution.mode,
                timestamp,
            },
            metrics: collector.compute_metrics(None),
            comparison: collector.compute_comparison(),
            by_task: collector.by_task(),
            by_model: collector.by_model(),
            outcomes,
        }
    }

    /// Tear a profile down. Failures are logged, not propagated; the
    /// collected results stand regardless.
    async fn teardown(&self, profile: HardwareProfile) {
        if let Err(e) = self.orchestrator.stop(profile).await {
            warn!(%profile, error = %e, "backend teardown failed");
        }
    }

    fn build_clients(&self, execution: &ExecutionConfig) -> ApproachClients {
        if let Some(clients) = &self.clients {
            return clients.clone();
        }
        let tools = Arc::new(GenerationClient::default());
        if execution.simulate_baseline {
            ApproachClients::new(Arc::new(BaselineSimulator::default()), tools)
        } else {
            ApproachClients::new(tools.clone(), tools)
        }
    }
}

fn failed_run(
    run_id: Uuid,
    profile: HardwareProfile,
    sample_size: usize,
    execution_mode: ExecutionMode,
    timestamp: DateTime<Utc>,
    error: impl std::fmt::Display,
) -> BenchmarkRun {
    let empty = MetricsSnapshot::from_outcomes(&[], std::time::Duration::ZERO);
    BenchmarkRun {
        run_id,
        status: RunStatus::Failed,
        error_message: Some(error.to_string()),
        benchmark_info: BenchmarkInfo {
            profile,
            total_tasks: 0,
            sample_size,
            instances: Vec::new(),
            execution_mode,
            timestamp,
        },
        outcomes: Vec::new(),
        metrics: empty,
        comparison: llm_workbench_metrics::compare(&[], &[], std::time::Duration::ZERO),
        by_task: BTreeMap::new(),
        by_model: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use llm_workbench_core::config::TaskDefaults;
    use llm_workbench_core::{OutcomeData, WorkflowCategory};
    use llm_workbench_engine::{RequestError, WorkflowClient};
    use llm_workbench_orchestrator::{
        HealthProbe, HealthStatus, LifecycleDriver, OrchestrationError,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeDriver {
        up_ok: bool,
        downs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LifecycleDriver for FakeDriver {
        async fn up(&self, _profile: HardwareProfile) -> Result<(), OrchestrationError> {
            if self.up_ok {
                Ok(())
            } else {
                Err(OrchestrationError::Lifecycle {
                    command: "docker compose up".to_string(),
                    status: 1,
                })
            }
        }

        async fn down(&self, _profile: HardwareProfile) -> Result<(), OrchestrationError> {
            self.downs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ReadyProbe;

    #[async_trait]
    impl HealthProbe for ReadyProbe {
        async fn check(&self, instance: &Instance) -> HealthStatus {
            HealthStatus {
                reachable: true,
                loaded_models: vec![instance.model_id.clone()],
            }
        }
    }

    struct NeverReadyProbe;

    #[async_trait]
    impl HealthProbe for NeverReadyProbe {
        async fn check(&self, _instance: &Instance) -> HealthStatus {
            HealthStatus::default()
        }
    }

    struct OkClient;

    #[async_trait]
    impl WorkflowClient for OkClient {
        async fn execute(
            &self,
            _instance: &Instance,
            prompt: &str,
        ) -> Result<OutcomeData, RequestError> {
            let tokens = prompt.len() as u64;
            Ok(OutcomeData {
                text: "done".to_string(),
                input_tokens: tokens,
                output_tokens: tokens / 2,
                duration: Duration::from_millis(1),
            })
        }
    }

    fn one_task_registry() -> TaskRegistry {
        let mut registry = TaskRegistry::new();
        registry
            .register_task(Task {
                id: "only-task".to_string(),
                name: "only task".to_string(),
                workflow_category: WorkflowCategory::CodeAnalysis,
                baseline_prompt: "a rather long baseline prompt with plenty of context".to_string(),
                tools_prompt: "short tools prompt".to_string(),
                timeout_secs: 5,
                max_retries: 0,
                target_files: Vec::new(),
            })
            .unwrap();
        registry
    }

    fn runner(
        up_ok: bool,
        ready: bool,
        downs: Arc<AtomicUsize>,
    ) -> BenchmarkRunner {
        let config = WorkbenchConfig::default();
        let profiles = ProfileRegistry::from_config(&config).unwrap();
        let probe: Box<dyn HealthProbe> = if ready {
            Box::new(ReadyProbe)
        } else {
            Box::new(NeverReadyProbe)
        };
        let orchestrator = BackendOrchestrator::new(
            Box::new(FakeDriver { up_ok, downs }),
            probe,
            Duration::from_millis(50),
            Duration::from_millis(10),
        );
        BenchmarkRunner::new(config, profiles, one_task_registry(), orchestrator)
            .with_clients(ApproachClients::uniform(Arc::new(OkClient)))
    }

    #[tokio::test]
    async fn test_medium_profile_scenario() {
        // medium has 2 instances; 1 task x 2 approaches x 2 instances x 3
        // samples = 12 outcomes.
        let downs = Arc::new(AtomicUsize::new(0));
        let runner = runner(true, true, downs.clone());
        let run = runner
            .run_with(
                HardwareProfile::Medium,
                RunOptions {
                    sample_size: Some(3),
                    mode: Some(ExecutionMode::FullyConcurrent),
                },
            )
            .await;

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.outcomes.len(), 12);
        assert!(run.outcomes.iter().all(|o| o.is_terminal()));
        assert_eq!(run.benchmark_info.instances.len(), 2);
        assert_eq!(run.metrics.total_tasks, 12);
        assert_eq!(downs.load(Ordering::SeqCst), 1, "stop invoked exactly once");
    }

    #[tokio::test]
    async fn test_no_ready_instances_fails_and_tears_down() {
        let downs = Arc::new(AtomicUsize::new(0));
        let runner = runner(true, false, downs.clone());
        let run = runner.run(HardwareProfile::Light).await;

        assert_eq!(run.status, RunStatus::Failed);
        assert!(run
            .error_message
            .as_deref()
            .unwrap()
            .contains("no instances became ready"));
        assert!(run.outcomes.is_empty());
        assert_eq!(downs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_up_command_yields_failed_run() {
        let downs = Arc::new(AtomicUsize::new(0));
        let runner = runner(false, true, downs.clone());
        let run = runner.run(HardwareProfile::Light).await;

        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error_message.is_some());
        // Teardown still runs after a failed start.
        assert_eq!(downs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_profile_fails_without_lifecycle_commands() {
        let downs = Arc::new(AtomicUsize::new(0));
        let config = WorkbenchConfig::default();
        let mut stripped = config.clone();
        stripped.profiles.remove(&HardwareProfile::Heavy);
        let profiles = ProfileRegistry::from_config(&stripped).unwrap();
        let orchestrator = BackendOrchestrator::new(
            Box::new(FakeDriver {
                up_ok: true,
                downs: downs.clone(),
            }),
            Box::new(ReadyProbe),
            Duration::from_millis(50),
            Duration::from_millis(10),
        );
        let runner = BenchmarkRunner::new(config, profiles, one_task_registry(), orchestrator);

        let run = runner.run(HardwareProfile::Heavy).await;
        assert_eq!(run.status, RunStatus::Failed);
        // Nothing was started, so nothing is torn down.
        assert_eq!(downs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_comparison_present_in_completed_run() {
        let downs = Arc::new(AtomicUsize::new(0));
        let runner = runner(true, true, downs);
        let run = runner
            .run_with(
                HardwareProfile::Light,
                RunOptions {
                    sample_size: Some(2),
                    mode: Some(ExecutionMode::Sequential),
                },
            )
            .await;

        assert_eq!(run.status, RunStatus::Completed);
        // The baseline prompt is longer than the tools prompt, so the fake
        // client yields a positive token reduction.
        assert!(run.comparison.token_reduction_percent > 0.0);
        assert_eq!(run.by_task.len(), 1);
        assert_eq!(run.by_model.len(), 1);
    }

    #[tokio::test]
    async fn test_custom_task_registration_extends_run() {
        let downs = Arc::new(AtomicUsize::new(0));
        let mut runner = runner(true, true, downs);
        runner
            .tasks_mut()
            .register_task(Task {
                id: "extra".to_string(),
                name: "extra".to_string(),
                workflow_category: WorkflowCategory::Custom("x".to_string()),
                baseline_prompt: "b".to_string(),
                tools_prompt: "t".to_string(),
                timeout_secs: 5,
                max_retries: 0,
                target_files: Vec::new(),
            })
            .unwrap();

        let run = runner
            .run_with(
                HardwareProfile::Light,
                RunOptions {
                    sample_size: Some(1),
                    mode: Some(ExecutionMode::Sequential),
                },
            )
            .await;
        // 2 tasks x 2 approaches x 1 instance x 1 sample.
        assert_eq!(run.outcomes.len(), 4);
        assert_eq!(run.benchmark_info.total_tasks, 2);
    }

    #[test]
    fn test_task_defaults_reach_registry() {
        let defaults = TaskDefaults {
            timeout_secs: 42,
            max_retries: 1,
        };
        let registry = TaskRegistry::with_default_tasks(&defaults);
        assert!(registry
            .list_tasks()
            .iter()
            .all(|t| t.timeout_secs == 42 && t.max_retries == 1));
    }

    #[test]
    fn test_run_snapshot_round_trip() {
        let empty = MetricsSnapshot::from_outcomes(&[], Duration::ZERO);
        let run = BenchmarkRun {
            run_id: Uuid::new_v4(),
            status: RunStatus::Completed,
            error_message: None,
            benchmark_info: BenchmarkInfo {
                profile: HardwareProfile::Medium,
                total_tasks: 1,
                sample_size: 3,
                instances: vec!["medium-a".to_string()],
                execution_mode: ExecutionMode::Sequential,
                timestamp: Utc::now(),
            },
            outcomes: Vec::new(),
            metrics: empty,
            comparison: llm_workbench_metrics::compare(&[], &[], Duration::ZERO),
            by_task: BTreeMap::new(),
            by_model: BTreeMap::new(),
        };
        let json = serde_json::to_string(&run).unwrap();
        let back: BenchmarkRun = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status, RunStatus::Completed);
        assert_eq!(back.benchmark_info.sample_size, 3);
    }
}
