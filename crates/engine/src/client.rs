// Copyright 2025 LLM Workbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Approach execution clients.
//!
//! Both workflows reduce to the same black-box contract: take an instance
//! and a prompt, produce `(text, input_tokens, output_tokens, duration)` or
//! a classified [`RequestError`]. The engine's fan-out logic never knows
//! which approach it is driving.
//!
//! The tools path is a live call against the instance's generation
//! endpoint; the baseline path may be wired to the same client or to the
//! deterministic [`BaselineSimulator`], depending on configuration.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use llm_workbench_core::{Instance, OutcomeData};

use crate::error::{RequestError, Result};

/// One request/response cycle against a backend, approach-agnostic.
#[async_trait]
pub trait WorkflowClient: Send + Sync {
    /// Execute the prompt against the instance and report what it cost.
    async fn execute(&self, instance: &Instance, prompt: &str) -> Result<OutcomeData>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    options: GenerateOptions,
}

/// Generation parameters sent with every request.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GenerateOptions {
    /// Sampling temperature; benchmarks want near-greedy decoding.
    pub temperature: f32,
    /// Completion length cap.
    pub max_tokens: u32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 2048,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    error: Option<String>,
}

/// Live client for `POST {instance.url}/generate`.
pub struct GenerationClient {
    http: reqwest::Client,
    options: GenerateOptions,
}

impl Default for GenerationClient {
    fn default() -> Self {
        Self::new(GenerateOptions::default())
    }
}

impl GenerationClient {
    /// Create a client with the given generation options.
    ///
    /// Per-request timeouts come from each instance, so the underlying
    /// HTTP client carries none of its own.
    pub fn new(options: GenerateOptions) -> Self {
        Self {
            http: reqwest::Client::new(),
            options,
        }
    }
}

#[async_trait]
impl WorkflowClient for GenerationClient {
    async fn execute(&self, instance: &Instance, prompt: &str) -> Result<OutcomeData> {
        let url = format!("{}/generate", instance.url());
        let request = GenerateRequest {
            model: &instance.model_id,
            prompt,
            options: self.options,
        };

        let started = Instant::now();
        let response = self
            .http
            .post(&url)
            .timeout(instance.timeout())
            .json(&request)
            .send()
            .await
            .map_err(|e| RequestError::from_reqwest(e, instance.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RequestError::Http {
                status: status.as_u16(),
                message: truncate(&message, 200),
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| RequestError::Parse(e.to_string()))?;
        if let Some(error) = body.error {
            return Err(RequestError::Model(error));
        }

        let duration = started.elapsed();
        debug!(
            instance = %instance.name,
            prompt_tokens = body.prompt_tokens,
            completion_tokens = body.completion_tokens,
            duration_ms = duration.as_millis() as u64,
            "generation complete"
        );
        Ok(OutcomeData {
            text: body.text,
            input_tokens: body.prompt_tokens,
            output_tokens: body.completion_tokens,
            duration,
        })
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}

/// Rough token estimate: about four characters per token.
fn estimate_tokens(text: &str) -> u64 {
    (text.len() as u64 / 4).max(1)
}

/// Verbosity multiplier for the simulated baseline: unassisted sessions
/// echo the pasted context back in their answers.
const BASELINE_OUTPUT_FACTOR: u64 = 3;

/// Deterministic stand-in for the baseline workflow.
///
/// Token counts and latency derive from the prompt alone; repeated runs of
/// the same task set are exactly reproducible.
pub struct BaselineSimulator {
    base_latency: Duration,
}

impl Default for BaselineSimulator {
    fn default() -> Self {
        Self {
            base_latency: Duration::from_millis(25),
        }
    }
}

impl BaselineSimulator {
    /// Create a simulator with a custom base latency.
    pub fn new(base_latency: Duration) -> Self {
        Self { base_latency }
    }
}

#[async_trait]
impl WorkflowClient for BaselineSimulator {
    async fn execute(&self, instance: &Instance, prompt: &str) -> Result<OutcomeData> {
        let input_tokens = estimate_tokens(prompt);
        let output_tokens = input_tokens * BASELINE_OUTPUT_FACTOR;
        let latency = self.base_latency + Duration::from_millis((prompt.len() % 40) as u64);

        let started = Instant::now();
        tokio::time::sleep(latency).await;

        Ok(OutcomeData {
            text: format!(
                "[baseline:{model}] synthesized {output_tokens} tokens",
                model = instance.model_id
            ),
            input_tokens,
            output_tokens,
            duration: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_instance() -> Instance {
        Instance {
            name: "a".to_string(),
            model_id: "m".to_string(),
            host: "127.0.0.1".to_string(),
            port: 1,
            timeout_secs: 10,
            max_concurrent: 1,
        }
    }

    #[test]
    fn test_estimate_tokens_floor() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let truncated = truncate("héllo wörld", 6);
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= 9);
    }

    #[tokio::test]
    async fn test_simulator_is_deterministic_in_tokens() {
        let simulator = BaselineSimulator::new(Duration::from_millis(1));
        let instance = make_instance();
        let a = simulator.execute(&instance, "same prompt").await.unwrap();
        let b = simulator.execute(&instance, "same prompt").await.unwrap();
        assert_eq!(a.input_tokens, b.input_tokens);
        assert_eq!(a.output_tokens, b.output_tokens);
        assert_eq!(a.output_tokens, a.input_tokens * BASELINE_OUTPUT_FACTOR);
    }

    #[tokio::test]
    async fn test_simulator_scales_with_prompt() {
        let simulator = BaselineSimulator::new(Duration::from_millis(1));
        let instance = make_instance();
        let short = simulator.execute(&instance, "hi").await.unwrap();
        let long = simulator
            .execute(&instance, &"long prompt ".repeat(50))
            .await
            .unwrap();
        assert!(long.input_tokens > short.input_tokens);
    }

    #[test]
    fn test_generate_response_tolerates_missing_fields() {
        let body: GenerateResponse = serde_json::from_str("{\"text\":\"ok\"}").unwrap();
        assert_eq!(body.text, "ok");
        assert_eq!(body.prompt_tokens, 0);
        assert!(body.error.is_none());
    }
}
