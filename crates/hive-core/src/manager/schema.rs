//! JSON response schemas produced by the LLM and consumed by
//! [`super::Manager`], per spec §6's decomposition/compilation schemas.
//!
//! Every field is `#[serde(default)]` so a partially-malformed response
//! still deserializes instead of failing outright; `Manager` falls back
//! to a mechanical result only when the payload isn't valid JSON at all,
//! mirroring `manager.py`'s `try: json.loads(...) except Exception:`
//! split between "couldn't parse" and "parsed but sparse."

use serde::{Deserialize, Serialize};

/// One element of [`DecompositionResponse::subtasks`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SubtaskSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub dependencies: Vec<u32>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_role() -> String {
    "general".to_string()
}

fn default_max_iterations() -> u32 {
    3
}

/// The decomposition response schema from spec §6.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DecompositionResponse {
    #[serde(default)]
    pub subtasks: Vec<SubtaskSpec>,
    #[serde(default)]
    pub reasoning: String,
}

/// The compilation response schema from spec §6.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompilationResponse {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub detailed_results: String,
    #[serde(default)]
    pub key_findings: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub confidence_score: f32,
}

/// The review response schema from spec §6, before a `reviewer_id` and
/// `timestamp` are stamped on by the caller to produce a
/// [`crate::task::Review`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResponse {
    #[serde(default)]
    pub needs_correction: bool,
    #[serde(default = "default_score")]
    pub accuracy_score: f32,
    #[serde(default = "default_score")]
    pub completeness_score: f32,
    #[serde(default = "default_score")]
    pub quality_score: f32,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default = "default_score")]
    pub confidence: f32,
}

/// Missing scores (and `confidence`) default to 0.5, per spec §9 -- a
/// derived `Default` would silently give 0.0 instead, since `#[serde(default
/// = ...)]` attributes only apply during deserialization, not to `Default`.
impl Default for ReviewResponse {
    fn default() -> Self {
        Self {
            needs_correction: false,
            accuracy_score: default_score(),
            completeness_score: default_score(),
            quality_score: default_score(),
            issues: Vec::new(),
            improvements: Vec::new(),
            confidence: default_score(),
        }
    }
}

fn default_score() -> f32 {
    0.5
}

/// Parse `text` as a [`DecompositionResponse`], returning `None` on
/// malformed JSON so the caller can fall back to a single general
/// subtask, as `manager.py::decompose_goal`'s `except Exception` does.
pub fn parse_decomposition(text: &str) -> Option<DecompositionResponse> {
    extract_json_object(text).and_then(|json| serde_json::from_str(json).ok())
}

/// Parse `text` as a [`CompilationResponse`].
pub fn parse_compilation(text: &str) -> Option<CompilationResponse> {
    extract_json_object(text).and_then(|json| serde_json::from_str(json).ok())
}

/// Parse `text` as a [`ReviewResponse`], defaulting to a non-correcting
/// verdict on failure, matching `worker.py::review_subtask`'s fallback
/// `{"needs_correction": False, "confidence": 0.5}`.
pub fn parse_review(text: &str) -> ReviewResponse {
    extract_json_object(text)
        .and_then(|json| serde_json::from_str(json).ok())
        .unwrap_or_default()
}

/// LLMs routinely wrap JSON in prose or fenced code blocks; this slices
/// out the outermost `{...}` span so a reasonably well-formed response
/// still parses even when it isn't byte-for-byte pure JSON.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}
