// Copyright 2025 LLM Workbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle commands against the external process manager.
//!
//! The process manager is opaque to the workbench: a configured program plus
//! argument lists with the profile name substituted in. Anything that honors
//! "non-zero exit is failure" works: docker compose, podman-compose, a
//! shell script.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use llm_workbench_core::config::OrchestratorConfig;
use llm_workbench_core::HardwareProfile;

use crate::error::{OrchestrationError, Result};

/// Seam for issuing `up`/`down` commands to the process manager.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LifecycleDriver: Send + Sync {
    /// Bring the profile's backends up.
    async fn up(&self, profile: HardwareProfile) -> Result<()>;

    /// Tear the profile's backends down. Idempotent: tearing down an
    /// already-stopped profile succeeds.
    async fn down(&self, profile: HardwareProfile) -> Result<()>;
}

/// Production driver: spawns the configured process-manager command.
pub struct CommandLifecycle {
    config: OrchestratorConfig,
}

impl CommandLifecycle {
    /// Create a driver from orchestrator configuration.
    pub fn new(config: OrchestratorConfig) -> Self {
        Self { config }
    }

    async fn run(&self, args: Vec<String>) -> Result<()> {
        let command_line = format!("{} {}", self.config.program, args.join(" "));
        debug!(command = %command_line, "running lifecycle command");

        let status = Command::new(&self.config.program)
            .args(&args)
            .status()
            .await
            .map_err(|source| OrchestrationError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        if !status.success() {
            return Err(OrchestrationError::Lifecycle {
                command: command_line,
                status: status.code().unwrap_or(-1),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl LifecycleDriver for CommandLifecycle {
    async fn up(&self, profile: HardwareProfile) -> Result<()> {
        info!(%profile, "bringing backends up");
        self.run(self.config.up_args_for(profile)).await
    }

    async fn down(&self, profile: HardwareProfile) -> Result<()> {
        info!(%profile, "tearing backends down");
        self.run(self.config.down_args_for(profile)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell_config(up: &str, down: &str) -> OrchestratorConfig {
        OrchestratorConfig {
            program: "sh".to_string(),
            up_args: vec!["-c".to_string(), up.to_string()],
            down_args: vec!["-c".to_string(), down.to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_successful_command() {
        let driver = CommandLifecycle::new(shell_config("exit 0", "exit 0"));
        assert!(driver.up(HardwareProfile::Light).await.is_ok());
        assert!(driver.down(HardwareProfile::Light).await.is_ok());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_lifecycle_error() {
        let driver = CommandLifecycle::new(shell_config("exit 3", "exit 0"));
        let err = driver.up(HardwareProfile::Light).await.unwrap_err();
        match err {
            OrchestrationError::Lifecycle { status, .. } => assert_eq!(status, 3),
            other => panic!("expected Lifecycle error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let config = OrchestratorConfig {
            program: "definitely-not-a-real-binary".to_string(),
            up_args: vec![],
            down_args: vec![],
            ..Default::default()
        };
        let driver = CommandLifecycle::new(config);
        assert!(matches!(
            driver.up(HardwareProfile::Light).await,
            Err(OrchestrationError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn test_profile_substitution_reaches_command() {
        // The command fails unless the substituted profile name is present.
        let config = OrchestratorConfig {
            program: "sh".to_string(),
            up_args: vec![
                "-c".to_string(),
                "test \"$0\" = medium".to_string(),
                "{profile}".to_string(),
            ],
            down_args: vec!["-c".to_string(), "exit 0".to_string()],
            ..Default::default()
        };
        let driver = CommandLifecycle::new(config);
        assert!(driver.up(HardwareProfile::Medium).await.is_ok());
        assert!(driver.up(HardwareProfile::Light).await.is_err());
    }
}
