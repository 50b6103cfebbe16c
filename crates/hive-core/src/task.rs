//! [`Task`], [`Subtask`], [`WorkerRole`], and [`Review`] -- the data model
//! for a decomposed goal, grounded in `orchestrator.py`'s `Task`/`SubTask`
//! dataclasses and `TaskStatus`/`WorkerRole` enums, implemented with the
//! Display/FromStr/ParseError enum pattern used throughout `gator-db`'s
//! data model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::manager::schema::CompilationResponse;

/// A role a [`crate::worker::Worker`] can specialize in. Drives which
/// tools a worker may use and which role-specific prompt it is built
/// with; see `worker.py::_initialize_tools` / `_build_role_prompt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    Researcher,
    Executor,
    Auditor,
    Creative,
    Analyst,
    Coder,
    General,
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Researcher => "researcher",
            Self::Executor => "executor",
            Self::Auditor => "auditor",
            Self::Creative => "creative",
            Self::Analyst => "analyst",
            Self::Coder => "coder",
            Self::General => "general",
        };
        f.write_str(s)
    }
}

impl FromStr for WorkerRole {
    type Err = WorkerRoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "researcher" => Ok(Self::Researcher),
            "executor" => Ok(Self::Executor),
            "auditor" => Ok(Self::Auditor),
            "creative" => Ok(Self::Creative),
            "analyst" => Ok(Self::Analyst),
            "coder" => Ok(Self::Coder),
            "general" => Ok(Self::General),
            other => Err(WorkerRoleParseError(other.to_owned())),
        }
    }
}

impl WorkerRole {
    /// All specialized roles, in the round-robin order
    /// `orchestrator.py::_initialize_hive` assigns them to workers.
    pub const SPECIALIZED: [WorkerRole; 6] = [
        WorkerRole::Researcher,
        WorkerRole::Executor,
        WorkerRole::Auditor,
        WorkerRole::Creative,
        WorkerRole::Analyst,
        WorkerRole::Coder,
    ];
}

/// Error returned when parsing an unrecognized worker role string.
#[derive(Debug, Clone)]
pub struct WorkerRoleParseError(pub String);

impl fmt::Display for WorkerRoleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid worker role: {:?}", self.0)
    }
}

impl std::error::Error for WorkerRoleParseError {}

/// Lifecycle status of a [`Subtask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Pending,
    Assigned,
    InProgress,
    PeerReview,
    Completed,
    Failed,
    Corrected,
}

impl fmt::Display for SubtaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::PeerReview => "peer_review",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Corrected => "corrected",
        };
        f.write_str(s)
    }
}

impl FromStr for SubtaskStatus {
    type Err = SubtaskStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "assigned" => Ok(Self::Assigned),
            "in_progress" => Ok(Self::InProgress),
            "peer_review" => Ok(Self::PeerReview),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "corrected" => Ok(Self::Corrected),
            other => Err(SubtaskStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an unrecognized subtask status string.
#[derive(Debug, Clone)]
pub struct SubtaskStatusParseError(pub String);

impl fmt::Display for SubtaskStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid subtask status: {:?}", self.0)
    }
}

impl std::error::Error for SubtaskStatusParseError {}

/// A single peer review of a completed subtask, grounded in the dict
/// `orchestrator.py::_conduct_peer_review` appends to `peer_reviews` and
/// the review response schema (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub reviewer_id: Uuid,
    pub needs_correction: bool,
    pub accuracy_score: f32,
    pub completeness_score: f32,
    pub quality_score: f32,
    pub issues: Vec<String>,
    pub improvements: Vec<String>,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

/// Whether `reviews` constitute a strict majority voting for correction,
/// per spec §4.4: a single reviewer alone can never trigger correction,
/// matching `orchestrator.py::_needs_correction`'s `> len(reviews) / 2`.
pub fn needs_correction(reviews: &[Review]) -> bool {
    if reviews.is_empty() {
        return false;
    }
    let votes = reviews.iter().filter(|r| r.needs_correction).count();
    votes as f64 > reviews.len() as f64 / 2.0
}

/// One unit of work dispatched to a single worker, grounded in
/// `orchestrator.py::SubTask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub description: String,
    pub role: WorkerRole,
    pub status: SubtaskStatus,
    pub assigned_worker: Option<Uuid>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub peer_reviews: Vec<Review>,
    pub dependencies: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub iteration_count: u32,
    pub max_iterations: u32,
}

impl Subtask {
    pub fn new(id: impl Into<String>, description: impl Into<String>, role: WorkerRole) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            role,
            status: SubtaskStatus::Pending,
            assigned_worker: None,
            result: None,
            error: None,
            peer_reviews: Vec::new(),
            dependencies: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
            iteration_count: 0,
            max_iterations: 3,
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Whether every id in `dependencies` is present in `completed`, the
    /// readiness test spec §4.4's wave scheduler applies each round.
    pub fn is_ready(&self, completed: &std::collections::HashSet<String>) -> bool {
        self.dependencies.iter().all(|d| completed.contains(d))
    }
}

/// A decomposed goal and its subtasks, grounded in `orchestrator.py::Task`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub goal: String,
    pub subtasks: Vec<Subtask>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set by `Orchestrator::execute_goal` from `Manager::compile_results`
    /// once every subtask has reached a terminal status.
    pub final_result: Option<CompilationResponse>,
}

impl Task {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            goal: goal.into(),
            subtasks: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
            final_result: None,
        }
    }

    pub fn subtask(&self, id: &str) -> Option<&Subtask> {
        self.subtasks.iter().find(|s| s.id == id)
    }

    pub fn subtask_mut(&mut self, id: &str) -> Option<&mut Subtask> {
        self.subtasks.iter_mut().find(|s| s.id == id)
    }
}
