// Copyright 2025 LLM Workbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Backend orchestrator for LLM Workbench.
//!
//! Brings a hardware profile's model-serving backends up, polls them until
//! each reports the expected model loaded or the startup budget expires,
//! and tears them down afterwards. Both operations are coarse-grained and
//! may block for seconds to minutes; callers must not assume sub-second
//! latency.
//!
//! # Partial readiness
//!
//! Instances that become ready within the budget are returned; instances
//! that never do are logged and omitted. The only fatal case is *zero*
//! ready instances, which fails with
//! [`OrchestrationError::NoInstancesReady`].

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod error;
pub mod health;
pub mod lifecycle;

pub use error::OrchestrationError;
pub use health::{HealthProbe, HealthStatus, HttpHealthProbe};
pub use lifecycle::{CommandLifecycle, LifecycleDriver};

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{info, warn};

use llm_workbench_core::config::OrchestratorConfig;
use llm_workbench_core::{HardwareProfile, Instance};

use crate::error::Result;

/// An instance that passed its readiness probe.
#[derive(Debug, Clone)]
pub struct ReadyInstance {
    /// The instance descriptor, as configured.
    pub instance: Instance,
    /// When the instance first probed ready.
    pub ready_at: DateTime<Utc>,
}

/// Brings profiles' backends up and down around a benchmark run.
pub struct BackendOrchestrator {
    driver: Box<dyn LifecycleDriver>,
    probe: Box<dyn HealthProbe>,
    startup_timeout: Duration,
    poll_interval: Duration,
}

impl BackendOrchestrator {
    /// Build the production orchestrator from configuration.
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(
            Box::new(CommandLifecycle::new(config.clone())),
            Box::new(HttpHealthProbe::new()),
            config.startup_timeout(),
            config.poll_interval(),
        )
    }

    /// Build an orchestrator from explicit parts; the seam tests and the
    /// runner use to inject fakes.
    pub fn new(
        driver: Box<dyn LifecycleDriver>,
        probe: Box<dyn HealthProbe>,
        startup_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            driver,
            probe,
            startup_timeout,
            poll_interval,
        }
    }

    /// Bring the profile's backends up and wait for readiness.
    ///
    /// Issues the lifecycle `up` command, then polls every instance's
    /// health endpoint on the configured interval until all are ready or
    /// the startup budget elapses. Returns the instances that became
    /// ready; fails only when the lifecycle command fails or no instance
    /// became ready at all.
    pub async fn start(
        &self,
        profile: HardwareProfile,
        instances: &[Instance],
    ) -> Result<Vec<ReadyInstance>> {
        self.driver.up(profile).await?;

        let deadline = Instant::now() + self.startup_timeout;
        let mut pending: Vec<&Instance> = instances.iter().collect();
        let mut ready = Vec::new();

        loop {
            let mut still_pending = Vec::new();
            for instance in pending {
                let status = self.probe.check(instance).await;
                if status.is_ready_for(&instance.model_id) {
                    info!(instance = %instance.name, model = %instance.model_id, "instance ready");
                    ready.push(ReadyInstance {
                        instance: instance.clone(),
                        ready_at: Utc::now(),
                    });
                } else {
                    still_pending.push(instance);
                }
            }
            pending = still_pending;

            if pending.is_empty() || Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        for instance in &pending {
            warn!(
                instance = %instance.name,
                timeout_secs = self.startup_timeout.as_secs(),
                "instance never became ready; omitting from run"
            );
        }

        if ready.is_empty() {
            return Err(OrchestrationError::NoInstancesReady {
                timeout_secs: self.startup_timeout.as_secs(),
            });
        }
        Ok(ready)
    }

    /// Tear the profile's backends down.
    ///
    /// Idempotent: stopping an already-stopped profile is not an error, as
    /// long as the process manager honors that (compose-style managers do).
    pub async fn stop(&self, profile: HardwareProfile) -> Result<()> {
        self.driver.down(profile).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::MockHealthProbe;
    use crate::lifecycle::MockLifecycleDriver;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn make_instance(name: &str, model: &str) -> Instance {
        Instance {
            name: name.to_string(),
            model_id: model.to_string(),
            host: "127.0.0.1".to_string(),
            port: 11434,
            timeout_secs: 30,
            max_concurrent: 2,
        }
    }

    fn ok_driver() -> MockLifecycleDriver {
        let mut driver = MockLifecycleDriver::new();
        driver.expect_up().returning(|_| Ok(()));
        driver.expect_down().returning(|_| Ok(()));
        driver
    }

    fn orchestrator(driver: MockLifecycleDriver, probe: MockHealthProbe) -> BackendOrchestrator {
        BackendOrchestrator::new(
            Box::new(driver),
            Box::new(probe),
            Duration::from_millis(80),
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn test_all_instances_ready() {
        let mut probe = MockHealthProbe::new();
        probe.expect_check().returning(|i| HealthStatus {
            reachable: true,
            loaded_models: vec![i.model_id.clone()],
        });

        let instances = vec![make_instance("a", "m1"), make_instance("b", "m2")];
        let ready = orchestrator(ok_driver(), probe)
            .start(HardwareProfile::Medium, &instances)
            .await
            .unwrap();
        assert_eq!(ready.len(), 2);
    }

    #[tokio::test]
    async fn test_partial_readiness_is_not_fatal() {
        // Two of three become ready; the third never does.
        let mut probe = MockHealthProbe::new();
        probe.expect_check().returning(|i| {
            if i.name == "c" {
                HealthStatus::default()
            } else {
                HealthStatus {
                    reachable: true,
                    loaded_models: vec![i.model_id.clone()],
                }
            }
        });

        let instances = vec![
            make_instance("a", "m"),
            make_instance("b", "m"),
            make_instance("c", "m"),
        ];
        let ready = orchestrator(ok_driver(), probe)
            .start(HardwareProfile::Medium, &instances)
            .await
            .unwrap();
        let names: Vec<_> = ready.iter().map(|r| r.instance.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_zero_ready_fails() {
        let mut probe = MockHealthProbe::new();
        probe
            .expect_check()
            .returning(|_| HealthStatus::default());

        let instances = vec![make_instance("a", "m")];
        let err = orchestrator(ok_driver(), probe)
            .start(HardwareProfile::Light, &instances)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::NoInstancesReady { .. }));
    }

    #[tokio::test]
    async fn test_wrong_model_is_not_ready() {
        let mut probe = MockHealthProbe::new();
        probe.expect_check().returning(|_| HealthStatus {
            reachable: true,
            loaded_models: vec!["some-other-model".to_string()],
        });

        let instances = vec![make_instance("a", "expected-model")];
        assert!(orchestrator(ok_driver(), probe)
            .start(HardwareProfile::Light, &instances)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_instance_becomes_ready_after_polls() {
        // Not ready for the first two probes, ready on the third.
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let mut probe = MockHealthProbe::new();
        probe.expect_check().returning(move |i| {
            if calls_clone.fetch_add(1, Ordering::SeqCst) < 2 {
                HealthStatus::default()
            } else {
                HealthStatus {
                    reachable: true,
                    loaded_models: vec![i.model_id.clone()],
                }
            }
        });

        let instances = vec![make_instance("a", "m")];
        let ready = orchestrator(ok_driver(), probe)
            .start(HardwareProfile::Light, &instances)
            .await
            .unwrap();
        assert_eq!(ready.len(), 1);
        assert!(calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_failed_up_command_propagates() {
        let mut driver = MockLifecycleDriver::new();
        driver.expect_up().returning(|_| {
            Err(OrchestrationError::Lifecycle {
                command: "docker compose up".to_string(),
                status: 1,
            })
        });
        let probe = MockHealthProbe::new();

        let instances = vec![make_instance("a", "m")];
        let err = orchestrator(driver, probe)
            .start(HardwareProfile::Light, &instances)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::Lifecycle { .. }));
    }

    #[tokio::test]
    async fn test_stop_delegates_to_driver() {
        let mut driver = MockLifecycleDriver::new();
        driver.expect_down().times(1).returning(|_| Ok(()));
        let orchestrator = BackendOrchestrator::new(
            Box::new(driver),
            Box::new(MockHealthProbe::new()),
            Duration::from_millis(10),
            Duration::from_millis(10),
        );
        assert!(orchestrator.stop(HardwareProfile::Heavy).await.is_ok());
    }
}
