//! [`Worker`]: a role-specialized subtask executor, grounded in
//! `worker.py::WorkerAgent`.
//!
//! Two execution modes (chain-of-thought vs. specialized-with-tools) and
//! the self-review / peer-review / correction operations are carried
//! over unchanged in meaning; prompt text and LLM-response parsing are
//! adapted from the original's f-strings and `json.loads` calls, and all
//! LLM calls route through [`ApiPool::execute_with_failover`] rather
//! than a per-worker provider client, per spec Design Notes.

pub mod tool;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ToolError;
use crate::pool::{ApiPool, EndpointRequest};
use crate::provider::GenerateParams;
use crate::task::{Review, Subtask, WorkerRole};

use tool::ToolRegistry;

/// Which prompting strategy a [`Worker`] uses, per spec §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Used when exactly one endpoint exists: a single stepwise
    /// THOUGHT/ACTION/OBSERVATION/FINAL_ANSWER prompt, no tool use.
    ChainOfThought,
    /// Used when multiple endpoints exist: a role-specific prompt that
    /// may invoke tools before producing a FINAL_ANSWER.
    Specialized,
}

/// Runtime status of a [`Worker`], surfaced via `Workers()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Idle,
    Executing,
    Error,
}

/// The verdict [`Worker::self_review`] returns, per spec §4.3's
/// self-review schema.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SelfReviewVerdict {
    #[serde(default)]
    pub needs_correction: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// A role-specialized subtask executor.
///
/// `current_load` is an atomic counter incremented on dispatch and
/// decremented on completion or failure (spec §5); `status` is a plain
/// field behind the same external synchronization the Orchestrator uses
/// to serialize access to a given worker (at most one subtask at a time).
pub struct Worker {
    pub id: Uuid,
    pub role: WorkerRole,
    pub mode: ExecutionMode,
    current_load: AtomicU32,
    pool: Arc<ApiPool>,
    tools: Arc<ToolRegistry>,
    /// Cap on tool-use round trips within one `Specialized`-mode
    /// execution, spec §6's `executionStepCap` (default 5).
    step_cap: u32,
}

impl Worker {
    pub fn new(role: WorkerRole, mode: ExecutionMode, pool: Arc<ApiPool>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            mode,
            current_load: AtomicU32::new(0),
            pool,
            tools,
            step_cap: 5,
        }
    }

    pub fn with_step_cap(mut self, step_cap: u32) -> Self {
        self.step_cap = step_cap;
        self
    }

    /// Current in-flight subtask count. `0` means idle.
    pub fn current_load(&self) -> u32 {
        self.current_load.load(Ordering::SeqCst)
    }

    /// Run `subtask`, dispatching on [`ExecutionMode`].
    ///
    /// Increments `current_load` on entry and decrements it on every
    /// exit path (success or failure), per spec §5.
    pub async fn execute_subtask(
        &self,
        subtask: &Subtask,
        context: &Value,
    ) -> anyhow::Result<String> {
        self.current_load.fetch_add(1, Ordering::SeqCst);
        let result = match self.mode {
            ExecutionMode::ChainOfThought => self.execute_chain_of_thought(subtask, context).await,
            ExecutionMode::Specialized => self.execute_specialized(subtask, context).await,
        };
        self.current_load.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let request = EndpointRequest::default();
        let response = self
            .pool
            .execute_with_failover(&request, prompt, &GenerateParams::default())
            .await?;
        Ok(response.text)
    }

    async fn execute_chain_of_thought(
        &self,
        subtask: &Subtask,
        context: &Value,
    ) -> anyhow::Result<String> {
        let prompt = build_cot_prompt(&subtask.description, context);
        let response = self.generate(&prompt).await?;
        Ok(extract_final_answer(&response).to_string())
    }

    async fn execute_specialized(
        &self,
        subtask: &Subtask,
        context: &Value,
    ) -> anyhow::Result<String> {
        let prompt = build_role_prompt(self.role, &subtask.description, context);
        let mut response = self.generate(&prompt).await?;

        for _ in 0..self.step_cap {
            let Some((tool_name, args)) = parse_tool_call(&response) else {
                break;
            };

            let tool_result = self.tools.invoke(self.role, &tool_name, &args).await;
            let continuation = match tool_result {
                Ok(result) => build_tool_continuation_prompt(&tool_name, &result.text),
                Err(err) => build_tool_error_prompt(&tool_name, &err),
            };

            response = self.generate(&continuation).await?;

            if extract_final_answer_if_present(&response).is_some() {
                break;
            }
        }

        Ok(extract_final_answer(&response).to_string())
    }

    /// Ask the LLM to critique its own just-produced result, degrading
    /// to a non-correcting verdict on a parse failure, per
    /// `worker.py::self_review`.
    pub async fn self_review(&self, subtask: &Subtask) -> SelfReviewVerdict {
        let prompt = build_self_review_prompt(&subtask.description, subtask.result.as_deref());
        match self.generate(&prompt).await {
            Ok(response) => parse_self_review(&response),
            Err(_) => SelfReviewVerdict::default(),
        }
    }

    /// Peer-review another worker's completed subtask.
    pub async fn review_subtask(&self, subtask: &Subtask) -> Review {
        let prompt = build_peer_review_prompt(
            &subtask.description,
            subtask.result.as_deref(),
            subtask.role,
        );
        let response = self.generate(&prompt).await;
        let parsed = response
            .ok()
            .map(|r| crate::manager::schema::parse_review(&r))
            .unwrap_or_default();

        Review {
            reviewer_id: self.id,
            needs_correction: parsed.needs_correction,
            accuracy_score: parsed.accuracy_score,
            completeness_score: parsed.completeness_score,
            quality_score: parsed.quality_score,
            issues: parsed.issues,
            improvements: parsed.improvements,
            confidence: parsed.confidence,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Produce a corrected result addressing every issue in `reviews`.
    /// Returns the uncorrected result if the correction call fails.
    pub async fn correct_subtask(&self, subtask: &Subtask, reviews: &[Review]) -> String {
        let current = subtask.result.clone().unwrap_or_default();
        let prompt = build_correction_prompt(&subtask.description, &current, reviews);
        self.generate(&prompt).await.unwrap_or(current)
    }
}

/// Build the chain-of-thought prompt, per
/// `worker.py::_execute_chain_of_thought`.
pub fn build_cot_prompt(description: &str, context: &Value) -> String {
    format!(
        "You are an AI agent executing a task step by step.\n\n\
Task: {description}\n\n\
Context: {}\n\n\
Think through this task carefully:\n\
1. Break down your approach into clear steps\n\
2. Execute each step methodically\n\
3. Verify your work at each stage\n\
4. Provide the final result\n\n\
Use this format:\n\
THOUGHT: [Your reasoning about the task]\n\
ACTION: [What you need to do]\n\
OBSERVATION: [Result of the action]\n\
...\n\
FINAL_ANSWER: [Your complete final result]\n\n\
Be thorough and check for errors.",
        serde_json::to_string_pretty(context).unwrap_or_default()
    )
}

/// Build the role-specific specialized-mode prompt, per
/// `worker.py::_build_role_prompt`.
pub fn build_role_prompt(role: WorkerRole, description: &str, context: &Value) -> String {
    let instructions = match role {
        WorkerRole::Researcher => {
            "Your role is to research and gather information.\n\
- Search for accurate, up-to-date information\n\
- Analyze multiple sources\n\
- Provide well-sourced, factual responses\n\
- Use TOOL:web_search if you need to search the web"
        }
        WorkerRole::Executor => {
            "Your role is to execute actions and perform tasks.\n\
- You can execute shell commands, manage files, and control browsers\n\
- Be careful and verify before making changes\n\
- Report exactly what was done\n\
- Use TOOL:shell_execute or TOOL:file_operation as needed"
        }
        WorkerRole::Auditor => {
            "Your role is to review and validate work.\n\
- Check for errors, bugs, and security issues\n\
- Verify correctness and completeness\n\
- Identify potential risks\n\
- Provide constructive feedback"
        }
        WorkerRole::Coder => {
            "Your role is to write and debug code.\n\
- Write clean, well-documented code\n\
- Follow best practices\n\
- Include error handling\n\
- Test your code when possible"
        }
        WorkerRole::Analyst => {
            "Your role is to analyze data and create reports.\n\
- Find patterns and insights\n\
- Present data clearly\n\
- Support conclusions with evidence\n\
- Create actionable recommendations"
        }
        WorkerRole::Creative => {
            "Your role is to generate creative content.\n\
- Be original and innovative\n\
- Consider user preferences\n\
- Iterate based on feedback\n\
- Deliver polished outputs"
        }
        WorkerRole::General => {
            "Your role is to handle general tasks.\n\
- Be adaptable and thorough\n\
- Ask for clarification when needed\n\
- Provide complete solutions"
        }
    };

    format!(
        "You are a {} agent in a multi-agent orchestration system.\n\n\
Task: {description}\n\n\
Context: {}\n\n\
{instructions}",
        role.to_string().to_uppercase(),
        serde_json::to_string_pretty(context).unwrap_or_default()
    )
}

fn build_tool_continuation_prompt(tool_name: &str, tool_text: &str) -> String {
    format!(
        "You used tool {tool_name} and got:\n{tool_text}\n\n\
Continue with your task and provide the FINAL_ANSWER."
    )
}

fn build_tool_error_prompt(tool_name: &str, err: &ToolError) -> String {
    format!(
        "You tried to use tool {tool_name} but it failed: {err}\n\n\
Continue with your task and provide the FINAL_ANSWER without that tool."
    )
}

/// Build the self-review prompt, per `worker.py::self_review`.
pub fn build_self_review_prompt(description: &str, result: Option<&str>) -> String {
    format!(
        "Review your work on this task:\n\n\
Task: {description}\n\n\
Your Result: {}\n\n\
Evaluate:\n\
1. Is the result complete and correct?\n\
2. Are there any errors or issues?\n\
3. Could the quality be improved?\n\
4. Are there any edge cases not handled?\n\n\
Respond in JSON:\n\
{{\n  \"needs_correction\": true,\n  \"issues\": [\"issue 1\"],\n  \"suggestions\": [\"suggestion 1\"]\n}}",
        result.unwrap_or("(no result)")
    )
}

/// Build the peer-review prompt, per `worker.py::review_subtask`.
pub fn build_peer_review_prompt(description: &str, result: Option<&str>, role: WorkerRole) -> String {
    format!(
        "You are reviewing work done by another agent.\n\n\
Original Task: {description}\n\n\
Result: {}\n\n\
Worker Role: {role}\n\n\
Provide a thorough review:\n\
1. Accuracy: Is the result correct?\n\
2. Completeness: Does it address all requirements?\n\
3. Quality: Is the work well-done?\n\
4. Issues: Any bugs, errors, or problems?\n\
5. Improvements: Suggestions for better results?\n\n\
Respond in JSON:\n\
{{\n  \"needs_correction\": true,\n  \"accuracy_score\": 0.9,\n  \"completeness_score\": 0.9,\n  \"quality_score\": 0.9,\n  \"issues\": [],\n  \"improvements\": [],\n  \"confidence\": 0.9\n}}",
        result.unwrap_or("(no result)")
    )
}

/// Build the correction prompt, per `worker.py::correct_subtask`.
pub fn build_correction_prompt(description: &str, current_result: &str, reviews: &[Review]) -> String {
    let feedback = serde_json::to_string_pretty(reviews).unwrap_or_default();
    format!(
        "Correct the following task based on review feedback:\n\n\
Original Task: {description}\n\n\
Current Result: {current_result}\n\n\
Review Feedback: {feedback}\n\n\
Provide the corrected result addressing all issues.\n\n\
Respond with the complete corrected output."
    )
}

/// Extract the `FINAL_ANSWER:` segment if present, otherwise return the
/// whole response, per `worker.py`'s `"FINAL_ANSWER:" in response` check.
fn extract_final_answer(response: &str) -> &str {
    extract_final_answer_if_present(response).unwrap_or(response)
}

fn extract_final_answer_if_present(response: &str) -> Option<&str> {
    response.split_once("FINAL_ANSWER:").map(|(_, rest)| rest.trim())
}

/// Parse a `TOOL:`/`PARAMS:` line pair out of `response`, per
/// `worker.py::_handle_tool_use`. A malformed `PARAMS:` line is treated
/// as an empty object rather than aborting the tool call.
fn parse_tool_call(response: &str) -> Option<(String, Value)> {
    let mut tool_name = None;
    let mut params = Value::Object(Default::default());

    for line in response.lines() {
        if let Some(rest) = line.strip_prefix("TOOL:") {
            tool_name = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("PARAMS:") {
            if let Ok(parsed) = serde_json::from_str(rest.trim()) {
                params = parsed;
            }
        }
    }

    tool_name.map(|name| (name, params))
}

fn parse_self_review(response: &str) -> SelfReviewVerdict {
    let start = response.find('{');
    let end = response.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if s <= e => {
            serde_json::from_str(&response[s..=e]).unwrap_or_default()
        }
        _ => SelfReviewVerdict::default(),
    }
}
