//! Planning mode — multi-step task execution behind one opaque call
//!
//! The executor treats a planner as a black box: raw task text in, one
//! final string out. The bundled implementation decomposes the task into
//! sub-tasks with a single JSON completion call, runs them concurrently
//! under a semaphore with per-task timeouts, and merges the results.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ApiClient, ApiMessage};

/// The planning-mode capability. Results are final — never re-routed or
/// re-classified by the caller.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn run(&self, task: &str) -> Result<String>;
}

/// Configuration for the task planner
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub max_subtasks: usize,
    pub max_concurrent: usize,
    pub subtask_timeout_secs: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_subtasks: 4,
            max_concurrent: 3,
            subtask_timeout_secs: 120,
        }
    }
}

/// Result of one planner sub-task
#[derive(Debug, Clone)]
struct SubTaskResult {
    description: String,
    output: String,
    success: bool,
}

const DECOMPOSE_SYSTEM: &str =
    "You are a task planning system. Output only valid JSON.";

const SUBTASK_SYSTEM: &str = "\
You are a focused specialist working on one sub-task of a larger request. \
Respond with your findings directly. Be concise. Provide informative \
content only — do not format emails or professional correspondence.";

const MERGE_SYSTEM: &str = "\
You synthesize results from multiple research steps into one coherent, \
well-organized answer. Return only the final answer.";

/// Planner over the completion service
pub struct TaskPlanner {
    api: ApiClient,
    config: PlannerConfig,
}

impl TaskPlanner {
    pub fn new(api: ApiClient, config: PlannerConfig) -> Self {
        Self { api, config }
    }

    /// Break the task into sub-task prompts. A failed or unusable
    /// decomposition degrades to running the whole task as one step.
    async fn decompose(&self, task: &str) -> Vec<String> {
        let prompt = format!(
            r#"Break this task into at most {} independent sub-tasks that can run in parallel. Respond with ONLY valid JSON, no explanation.

Task: {task}

JSON schema to follow:
{{"subtasks": ["<sub-task 1>", "<sub-task 2>"]}}

Rules:
- Each sub-task must be self-contained and answerable on its own
- Use fewer sub-tasks when the task does not divide naturally"#,
            self.config.max_subtasks,
        );

        let messages = vec![ApiMessage::user(prompt)];
        match self.api.generate(&messages, DECOMPOSE_SYSTEM).await {
            Ok(text) => {
                let subtasks = parse_subtasks(&text, self.config.max_subtasks);
                if subtasks.is_empty() {
                    debug!("Decomposition yielded no sub-tasks, running task whole");
                    vec![task.to_string()]
                } else {
                    subtasks
                }
            }
            Err(e) => {
                warn!("Task decomposition failed: {}, running task whole", e);
                vec![task.to_string()]
            }
        }
    }

    async fn run_subtask(
        api: ApiClient,
        description: String,
        timeout_secs: u64,
    ) -> SubTaskResult {
        let messages = vec![ApiMessage::user(description.clone())];
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(timeout_secs),
            api.generate(&messages, SUBTASK_SYSTEM),
        )
        .await;

        match result {
            Ok(Ok(output)) => SubTaskResult {
                description,
                output,
                success: true,
            },
            Ok(Err(e)) => SubTaskResult {
                description,
                output: format!("Error: {e}"),
                success: false,
            },
            Err(_) => SubTaskResult {
                description,
                output: "Sub-task timed out".to_string(),
                success: false,
            },
        }
    }

    /// Merge sub-task results into one answer, with a deterministic
    /// concatenation fallback when the merge call fails.
    async fn merge(&self, task: &str, results: &[SubTaskResult]) -> String {
        if results.len() == 1 && results[0].success {
            return results[0].output.clone();
        }

        let prompt = format!(
            "Synthesize these research step results into one coherent answer.\n\n\
             Original task: \"{task}\"\n\n{}",
            format_results(results),
        );

        let messages = vec![ApiMessage::user(prompt)];
        match self.api.generate(&messages, MERGE_SYSTEM).await {
            Ok(merged) => merged,
            Err(e) => {
                warn!("Result merge failed: {}, returning formatted results", e);
                format_results(results)
            }
        }
    }
}

#[async_trait]
impl Planner for TaskPlanner {
    async fn run(&self, task: &str) -> Result<String> {
        let plan_id = Uuid::new_v4();
        info!("Planner {} starting: {:.80}", plan_id, task);

        let subtasks = self.decompose(task).await;
        info!("Planner {} running {} sub-tasks", plan_id, subtasks.len());

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let mut handles = Vec::new();
        for subtask in subtasks {
            let api = self.api.clone();
            let sem = semaphore.clone();
            let timeout_secs = self.config.subtask_timeout_secs;
            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                Self::run_subtask(api, subtask, timeout_secs).await
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => results.push(SubTaskResult {
                    description: "unknown".to_string(),
                    output: format!("Sub-task panicked: {e}"),
                    success: false,
                }),
            }
        }

        if results.iter().all(|r| !r.success) {
            return Err(anyhow!("All planner sub-tasks failed"));
        }

        let merged = self.merge(task, &results).await;
        info!("Planner {} complete", plan_id);
        Ok(merged)
    }
}

/// Extract the sub-task list from a decomposition response
fn parse_subtasks(text: &str, max_subtasks: usize) -> Vec<String> {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Vec::new();
    };
    if end < start {
        return Vec::new();
    }

    let Ok(value) = serde_json::from_str::<serde_json::Value>(&text[start..=end]) else {
        return Vec::new();
    };

    let mut subtasks: Vec<String> = value
        .get("subtasks")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|s| s.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default();

    subtasks.truncate(max_subtasks);
    subtasks
}

/// Format sub-task results as readable sections
fn format_results(results: &[SubTaskResult]) -> String {
    let mut output = String::from("## Results\n\n");
    for (i, result) in results.iter().enumerate() {
        let status = if result.success { "completed" } else { "failed" };
        output.push_str(&format!("### Step {} ({})\n", i + 1, status));
        output.push_str(&format!("Task: {}\n\n", result.description));
        output.push_str(&result.output);
        output.push_str("\n\n");
    }
    output
}
