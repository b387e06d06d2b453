// Copyright 2025 LLM Workbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Metrics collection and comparative statistics for LLM Workbench.
//!
//! The [`MetricsCollector`] is the only shared mutable state in a benchmark
//! run: workers push terminal [`llm_workbench_core::TaskOutcome`]s into it
//! concurrently. Everything derived from those outcomes
//! ([`MetricsSnapshot`], [`ComparisonSnapshot`], the by-task/by-model
//! breakdowns) is a pure function of the collected set, recomputed on
//! demand and never mutated in place.

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod collector;
pub mod comparison;
pub mod snapshot;

pub use collector::MetricsCollector;
pub use comparison::{compare, ComparisonSnapshot, ConfidenceLevel};
pub use snapshot::{classify_error, ErrorBucket, MetricsSnapshot};
