// Copyright 2025 LLM Workbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration schema and loader.
//!
//! The workbench is configured from a single YAML document mapping hardware
//! profiles to backend instances plus execution, orchestrator and task
//! defaults. Every field has a default, so an absent file yields a usable
//! local configuration; a present-but-malformed file is an error, not a
//! silent fallback.
//!
//! ```yaml
//! profiles:
//!   light:
//!     sample_size: 6
//!     instances:
//!       - { name: light-a, model_id: qwen2.5-coder-1.5b, host: 127.0.0.1,
//!           port: 11434, timeout_secs: 120, max_concurrent: 2 }
//! execution:
//!   mode: bounded_parallel
//!   max_concurrent_batches: 2
//!   simulate_baseline: true
//! orchestrator:
//!   program: docker
//!   up_args: [compose, -f, "compose.{profile}.yml", up, -d]
//!   down_args: [compose, -f, "compose.{profile}.yml", down]
//!   startup_timeout_secs: 180
//!   poll_interval_secs: 10
//! tasks:
//!   timeout_secs: 300
//!   max_retries: 2
//! output_dir: results
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{HardwareProfile, Instance};

/// Documented fallback when a profile does not set `sample_size`.
pub const DEFAULT_SAMPLE_SIZE: usize = 6;

/// How work items are scheduled across a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Strictly one work item after another.
    Sequential,
    /// A global ceiling on simultaneously running work items.
    BoundedParallel,
    /// All work items launched together; per-instance limits still hold.
    FullyConcurrent,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionMode::Sequential => "sequential",
            ExecutionMode::BoundedParallel => "bounded_parallel",
            ExecutionMode::FullyConcurrent => "fully_concurrent",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(ExecutionMode::Sequential),
            "bounded_parallel" | "bounded-parallel" => Ok(ExecutionMode::BoundedParallel),
            "fully_concurrent" | "fully-concurrent" => Ok(ExecutionMode::FullyConcurrent),
            other => Err(ValidationError::InvalidConfig(format!(
                "unknown execution mode '{other}'"
            ))),
        }
    }
}

/// Instances and sampling for one hardware profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// How many samples to run per (task, approach, instance).
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    /// The backend instances this profile brings up.
    pub instances: Vec<Instance>,
}

fn default_sample_size() -> usize {
    DEFAULT_SAMPLE_SIZE
}

/// Scheduling configuration for the execution engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Scheduling mode for the run.
    pub mode: ExecutionMode,
    /// Sizing knob for [`ExecutionMode::BoundedParallel`]: the global
    /// ceiling is `2 * max_concurrent_batches`.
    pub max_concurrent_batches: usize,
    /// When true, the baseline approach runs a deterministic simulation
    /// instead of a live backend call.
    pub simulate_baseline: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::BoundedParallel,
            max_concurrent_batches: 2,
            simulate_baseline: true,
        }
    }
}

impl ExecutionConfig {
    /// The global concurrency ceiling for bounded-parallel scheduling.
    pub fn global_ceiling(&self) -> usize {
        (2 * self.max_concurrent_batches).max(1)
    }
}

/// Lifecycle-command and readiness-polling configuration.
///
/// The process manager is opaque: a program plus argument lists, with
/// `{profile}` substituted at invocation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Process-manager executable.
    pub program: String,
    /// Arguments for bringing a profile up.
    pub up_args: Vec<String>,
    /// Arguments for tearing a profile down.
    pub down_args: Vec<String>,
    /// Wall-clock budget for backends to become ready.
    pub startup_timeout_secs: u64,
    /// Interval between readiness probes.
    pub poll_interval_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
            up_args: vec![
                "compose".to_string(),
                "-f".to_string(),
                "compose.{profile}.yml".to_string(),
                "up".to_string(),
                "-d".to_string(),
            ],
            down_args: vec![
                "compose".to_string(),
                "-f".to_string(),
                "compose.{profile}.yml".to_string(),
                "down".to_string(),
            ],
            startup_timeout_secs: 180,
            poll_interval_secs: 10,
        }
    }
}

impl OrchestratorConfig {
    /// `up` arguments with `{profile}` substituted.
    pub fn up_args_for(&self, profile: HardwareProfile) -> Vec<String> {
        substitute_profile(&self.up_args, profile)
    }

    /// `down` arguments with `{profile}` substituted.
    pub fn down_args_for(&self, profile: HardwareProfile) -> Vec<String> {
        substitute_profile(&self.down_args, profile)
    }

    /// Startup budget as a [`Duration`].
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn substitute_profile(args: &[String], profile: HardwareProfile) -> Vec<String> {
    args.iter()
        .map(|a| a.replace("{profile}", profile.as_str()))
        .collect()
}

/// Defaults applied to tasks that do not set their own limits.
///
/// `max_retries` is signed: the configuration boundary is where a negative
/// budget can be expressed, and where it is rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDefaults {
    /// Per-work-item timeout in seconds.
    pub timeout_secs: u64,
    /// Retry budget for failed work items.
    pub max_retries: i64,
}

impl Default for TaskDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            max_retries: 2,
        }
    }
}

impl TaskDefaults {
    /// The validated retry budget.
    pub fn retry_budget(&self) -> u32 {
        self.max_retries.max(0) as u32
    }
}

/// Root configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbenchConfig {
    /// Hardware profiles and their backend instances.
    pub profiles: BTreeMap<HardwareProfile, ProfileConfig>,
    /// Execution engine settings.
    pub execution: ExecutionConfig,
    /// Backend orchestrator settings.
    pub orchestrator: OrchestratorConfig,
    /// Task defaults.
    pub tasks: TaskDefaults,
    /// Where result snapshots are written.
    pub output_dir: PathBuf,
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            HardwareProfile::Light,
            ProfileConfig {
                sample_size: DEFAULT_SAMPLE_SIZE,
                instances: vec![Instance {
                    name: "light-a".to_string(),
                    model_id: "qwen2.5-coder-1.5b".to_string(),
                    host: "127.0.0.1".to_string(),
                    port: 11434,
                    timeout_secs: 120,
                    max_concurrent: 2,
                }],
            },
        );
        profiles.insert(
            HardwareProfile::Medium,
            ProfileConfig {
                sample_size: DEFAULT_SAMPLE_SIZE,
                instances: vec![
                    Instance {
                        name: "medium-a".to_string(),
                        model_id: "qwen2.5-coder-7b".to_string(),
                        host: "127.0.0.1".to_string(),
                        port: 11435,
                        timeout_secs: 300,
                        max_concurrent: 2,
                    },
                    Instance {
                        name: "medium-b".to_string(),
                        model_id: "qwen2.5-coder-7b".to_string(),
                        host: "127.0.0.1".to_string(),
                        port: 11436,
                        timeout_secs: 300,
                        max_concurrent: 2,
                    },
                ],
            },
        );
        profiles.insert(
            HardwareProfile::Heavy,
            ProfileConfig {
                sample_size: DEFAULT_SAMPLE_SIZE,
                instances: vec![Instance {
                    name: "heavy-a".to_string(),
                    model_id: "qwen2.5-coder-32b".to_string(),
                    host: "127.0.0.1".to_string(),
                    port: 11437,
                    timeout_secs: 600,
                    max_concurrent: 4,
                }],
            },
        );

        Self {
            profiles,
            execution: ExecutionConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            tasks: TaskDefaults::default(),
            output_dir: PathBuf::from("results"),
        }
    }
}

impl WorkbenchConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: WorkbenchConfig = serde_yaml::from_str(&contents).map_err(|e| {
            ValidationError::InvalidConfig(format!("cannot parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check structural invariants: every profile has at least one instance,
    /// positive sample sizes and timeouts, non-negative retry budget.
    pub fn validate(&self) -> crate::Result<()> {
        for (profile, pc) in &self.profiles {
            if pc.instances.is_empty() {
                return Err(ValidationError::EmptyProfile(profile.to_string()));
            }
            if pc.sample_size == 0 {
                return Err(ValidationError::NonPositiveSampleSize(profile.to_string()));
            }
            for instance in &pc.instances {
                if instance.timeout_secs == 0 {
                    return Err(ValidationError::InvalidConfig(format!(
                        "instance '{}' has a zero timeout",
                        instance.name
                    )));
                }
                if instance.max_concurrent == 0 {
                    return Err(ValidationError::InvalidConfig(format!(
                        "instance '{}' has a zero concurrency ceiling",
                        instance.name
                    )));
                }
            }
        }
        if self.tasks.max_retries < 0 {
            return Err(ValidationError::NegativeRetryBudget(self.tasks.max_retries));
        }
        if self.tasks.timeout_secs == 0 {
            return Err(ValidationError::InvalidConfig(
                "task timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
