//! Read-only accessors over [`super::OrchestratorState`], mirroring the
//! teacher crate's `gator-db/src/queries/*.rs` split between
//! mutation-driving `dispatch` and plain list/get queries.

use uuid::Uuid;

use crate::task::Task;
use crate::worker::WorkerStatus;

use super::{OrchestratorState, WorkerInfo};

/// Snapshot the registered workers and their current load, per spec §4.4's
/// `Workers() -> list<WorkerInfo>`.
pub fn workers(state: &OrchestratorState) -> Vec<WorkerInfo> {
    state
        .workers
        .iter()
        .map(|w| WorkerInfo {
            id: w.id,
            role: w.role,
            mode: w.mode,
            current_load: w.current_load(),
            status: if w.current_load() > 0 {
                WorkerStatus::Executing
            } else {
                WorkerStatus::Idle
            },
        })
        .collect()
}

/// Look up a task by id, per spec §4.4's `TaskStatus(taskId) -> Task?`.
pub async fn task_status(state: &OrchestratorState, task_id: Uuid) -> Option<Task> {
    state.tasks.read().await.get(&task_id).cloned()
}

/// List every task the orchestrator has run or is running.
pub async fn list_tasks(state: &OrchestratorState) -> Vec<Task> {
    state.tasks.read().await.values().cloned().collect()
}
