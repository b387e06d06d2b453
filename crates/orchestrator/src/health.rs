// Copyright 2025 LLM Workbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Backend readiness probing.
//!
//! A backend is ready when its health endpoint is reachable *and* the
//! expected model appears in its loaded-model list. The probe itself never
//! fails the orchestration: an unreachable endpoint is simply "not ready
//! yet" and the caller keeps polling.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::trace;

use llm_workbench_core::Instance;

/// Timeout for a single health probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// What one readiness probe observed.
#[derive(Debug, Clone, Default)]
pub struct HealthStatus {
    /// The endpoint answered with a success status.
    pub reachable: bool,
    /// Model identifiers the backend reports as loaded.
    pub loaded_models: Vec<String>,
}

impl HealthStatus {
    /// Whether the backend is ready to serve the given model.
    pub fn is_ready_for(&self, model_id: &str) -> bool {
        self.reachable && self.loaded_models.iter().any(|m| m == model_id)
    }
}

/// Seam for probing one instance's readiness endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Probe the instance once. Unreachable backends yield a default
    /// (not-reachable) status, never an error.
    async fn check(&self, instance: &Instance) -> HealthStatus;
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    models: Vec<String>,
}

/// Production probe: `GET {instance.url}/health`.
pub struct HttpHealthProbe {
    http: reqwest::Client,
}

impl Default for HttpHealthProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpHealthProbe {
    /// Create a probe with its own short-timeout HTTP client.
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { http }
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self, instance: &Instance) -> HealthStatus {
        let url = format!("{}/health", instance.url());
        let response = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                trace!(instance = %instance.name, error = %e, "health probe unreachable");
                return HealthStatus::default();
            }
        };
        if !response.status().is_success() {
            trace!(instance = %instance.name, status = %response.status(), "health probe not ready");
            return HealthStatus::default();
        }
        match response.json::<HealthResponse>().await {
            Ok(body) => {
                let healthy = body
                    .status
                    .as_deref()
                    .map(|s| matches!(s, "ok" | "ready" | "healthy"))
                    // A 2xx without a status field still counts as reachable.
                    .unwrap_or(true);
                HealthStatus {
                    reachable: healthy,
                    loaded_models: body.models,
                }
            }
            Err(e) => {
                trace!(instance = %instance.name, error = %e, "health probe body unparsable");
                HealthStatus::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_requires_model_in_list() {
        let status = HealthStatus {
            reachable: true,
            loaded_models: vec!["qwen2.5-coder-7b".to_string()],
        };
        assert!(status.is_ready_for("qwen2.5-coder-7b"));
        assert!(!status.is_ready_for("qwen2.5-coder-32b"));
    }

    #[test]
    fn test_unreachable_is_never_ready() {
        let status = HealthStatus {
            reachable: false,
            loaded_models: vec!["m".to_string()],
        };
        assert!(!status.is_ready_for("m"));
    }

    #[test]
    fn test_health_response_tolerates_missing_fields() {
        let body: HealthResponse = serde_json::from_str("{}").unwrap();
        assert!(body.status.is_none());
        assert!(body.models.is_empty());
    }
}
