// Copyright 2025 LLM Workbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Task registry: task id → task definition.
//!
//! The registry ships with a curated default task set covering the
//! benchmarked workflow families; deployments append their own tasks via
//! [`TaskRegistry::register_task`], which validates the definition fully
//! before it becomes visible. Registration is single-writer: it takes
//! `&mut self`, while lookups borrow shared.

use std::collections::BTreeMap;

use crate::config::TaskDefaults;
use crate::error::ValidationError;
use crate::types::{Approach, Task, WorkflowCategory};

/// Mapping from task id to an immutable task definition.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<String, Task>,
}

impl TaskRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with the built-in benchmark task set.
    pub fn with_default_tasks(defaults: &TaskDefaults) -> Self {
        let mut registry = Self::new();
        for task in default_tasks(defaults) {
            // Built-in tasks are known-valid; a failure here is a bug.
            registry
                .register_task(task)
                .expect("built-in task definition must validate");
        }
        registry
    }

    /// Look up a task by id.
    pub fn get_task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// All registered tasks, ordered by id.
    pub fn list_tasks(&self) -> Vec<&Task> {
        self.tasks.values().collect()
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the registry holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Validate and register a task.
    ///
    /// On any validation failure the registry is left unchanged; a
    /// successful registration is visible to all subsequent lookups.
    pub fn register_task(&mut self, task: Task) -> crate::Result<()> {
        validate_task(&task)?;
        if self.tasks.contains_key(&task.id) {
            return Err(ValidationError::DuplicateTaskId(task.id));
        }
        tracing::debug!(task_id = %task.id, "registered task");
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }
}

fn validate_task(task: &Task) -> crate::Result<()> {
    if task.id.trim().is_empty() {
        return Err(ValidationError::EmptyTaskId);
    }
    if task.name.trim().is_empty() {
        return Err(ValidationError::EmptyTaskName(task.id.clone()));
    }
    for approach in Approach::both() {
        if task.prompt(approach).trim().is_empty() {
            return Err(ValidationError::EmptyPrompt {
                task: task.id.clone(),
                approach,
            });
        }
    }
    if task.timeout_secs == 0 {
        return Err(ValidationError::NonPositiveTimeout(task.id.clone()));
    }
    for path in &task.target_files {
        if !path.exists() {
            return Err(ValidationError::MissingTargetFile {
                task: task.id.clone(),
                path: path.clone(),
            });
        }
    }
    Ok(())
}

/// The built-in benchmark task set.
///
/// One task per workflow family. The baseline prompts spell everything out
/// the way an unassisted session would have to; the tools prompts assume the
/// assistant can consult analyzers and ask for targeted context instead of
/// pasting it.
fn default_tasks(defaults: &TaskDefaults) -> Vec<Task> {
    let timeout_secs = defaults.timeout_secs;
    let max_retries = defaults.retry_budget();

    vec![
        Task {
            id: "analyze-module".to_string(),
            name: "Explain an unfamiliar module".to_string(),
            workflow_category: WorkflowCategory::CodeAnalysis,
            baseline_prompt: "Below is the full source of a module from a mid-sized \
                service, together with every file it imports. Read all of it and \
                explain what the module does, its public entry points, and which \
                invariants callers must uphold. Quote the relevant code for each \
                claim you make."
                .to_string(),
            tools_prompt: "Use the pattern-similarity and context analyzers to map the \
                module's entry points and dependencies, then explain what the module \
                does and which invariants callers must uphold. Request only the \
                snippets the analyzers flag as relevant."
                .to_string(),
            timeout_secs,
            max_retries,
            target_files: Vec::new(),
        },
        Task {
            id: "refactor-error-handling".to_string(),
            name: "Unify ad-hoc error handling".to_string(),
            workflow_category: WorkflowCategory::Refactoring,
            baseline_prompt: "The following files each roll their own error handling \
                with string-typed errors. Rewrite them to share a single typed error \
                enum, updating every call site. The complete contents of all affected \
                files are included below; return the full rewritten files."
                .to_string(),
            tools_prompt: "Run the impact analyzer over the modules that still use \
                string-typed errors, then introduce a shared typed error enum and \
                update only the call sites the analyzer reports. Return a unified \
                diff per file."
                .to_string(),
            timeout_secs,
            max_retries,
            target_files: Vec::new(),
        },
        Task {
            id: "fix-race-condition".to_string(),
            name: "Fix a reported race condition".to_string(),
            workflow_category: WorkflowCategory::BugFix,
            baseline_prompt: "A user reports intermittent double-writes under load. \
                Below is the full source of the writer, the scheduler, and the test \
                that sometimes fails, plus the last three failing logs. Find the \
                race and produce a fix with an explanation."
                .to_string(),
            tools_prompt: "A user reports intermittent double-writes under load. Use \
                the diff and safety-risk analyzers on the writer and scheduler to \
                locate the unsynchronized access, then produce a minimal fix with an \
                explanation."
                .to_string(),
            timeout_secs,
            max_retries,
            target_files: Vec::new(),
        },
        Task {
            id: "document-public-api".to_string(),
            name: "Document a public API surface".to_string(),
            workflow_category: WorkflowCategory::Documentation,
            baseline_prompt: "Write reference documentation for the public API below. \
                The full source of every public type and function is included; cover \
                parameters, return values, error cases, and one usage example per \
                entry point."
                .to_string(),
            tools_prompt: "Use the context analyzer to enumerate the public API \
                surface, then write reference documentation covering parameters, \
                return values, error cases, and one usage example per entry point, \
                fetching signatures on demand."
                .to_string(),
            timeout_secs,
            max_retries,
            target_files: Vec::new(),
        },
        Task {
            id: "extend-test-coverage".to_string(),
            name: "Extend coverage for edge cases".to_string(),
            workflow_category: WorkflowCategory::Testing,
            baseline_prompt: "Below are a parser and its existing test suite in full. \
                Identify untested edge cases and write additional tests for them, \
                keeping the existing test style."
                .to_string(),
            tools_prompt: "Use the pattern-similarity analyzer to find the parser's \
                untested branches relative to its test suite, then write tests for \
                the reported gaps, keeping the existing test style."
                .to_string(),
            timeout_secs,
            max_retries,
            target_files: Vec::new(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use std::path::PathBuf;

    fn valid_task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            name: "a task".to_string(),
            workflow_category: WorkflowCategory::Custom("bench".to_string()),
            baseline_prompt: "do it the long way".to_string(),
            tools_prompt: "do it with tools".to_string(),
            timeout_secs: 60,
            max_retries: 1,
            target_files: Vec::new(),
        }
    }

    #[test]
    fn test_default_tasks_cover_categories() {
        let registry = TaskRegistry::with_default_tasks(&TaskDefaults::default());
        assert_eq!(registry.len(), 5);
        assert!(registry.get_task("fix-race-condition").is_some());
        let categories: Vec<_> = registry
            .list_tasks()
            .iter()
            .map(|t| t.workflow_category.clone())
            .collect();
        assert!(categories.contains(&WorkflowCategory::Testing));
        assert!(categories.contains(&WorkflowCategory::Refactoring));
    }

    #[test]
    fn test_register_then_lookup() {
        let mut registry = TaskRegistry::new();
        registry.register_task(valid_task("custom-1")).unwrap();
        assert_eq!(registry.get_task("custom-1").unwrap().name, "a task");
        assert_eq!(registry.list_tasks().len(), 1);
    }

    #[test]
    fn test_empty_id_rejected_registry_unchanged() {
        let mut registry = TaskRegistry::new();
        let mut task = valid_task("");
        task.id = "  ".to_string();
        assert!(matches!(
            registry.register_task(task),
            Err(ValidationError::EmptyTaskId)
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_empty_prompt_rejected() {
        let mut registry = TaskRegistry::new();
        let mut task = valid_task("t");
        task.tools_prompt = String::new();
        let err = registry.register_task(task).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::EmptyPrompt {
                approach: Approach::Tools,
                ..
            }
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut registry = TaskRegistry::new();
        let mut task = valid_task("t");
        task.timeout_secs = 0;
        assert!(matches!(
            registry.register_task(task),
            Err(ValidationError::NonPositiveTimeout(_))
        ));
    }

    #[test]
    fn test_missing_target_file_rejected() {
        let mut registry = TaskRegistry::new();
        let mut task = valid_task("t");
        task.target_files = vec![PathBuf::from("/definitely/not/here.rs")];
        assert!(matches!(
            registry.register_task(task),
            Err(ValidationError::MissingTargetFile { .. })
        ));
    }

    #[test]
    fn test_existing_target_file_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.rs");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "fn main() {{}}").unwrap();

        let mut registry = TaskRegistry::new();
        let mut task = valid_task("t");
        task.target_files = vec![path];
        assert!(registry.register_task(task).is_ok());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = TaskRegistry::new();
        registry.register_task(valid_task("t")).unwrap();
        assert!(matches!(
            registry.register_task(valid_task("t")),
            Err(ValidationError::DuplicateTaskId(_))
        ));
        assert_eq!(registry.len(), 1);
    }
}
