//! [`MemorySink`]: an optional, best-effort side channel for task
//! snapshots and decomposition reuse.
//!
//! Grounded in gator's `isolation::Isolation` trait: a narrow async trait
//! with one production-shaped implementation and a no-op test double,
//! rather than a concrete dependency on any particular vector store.
//! Spec §6 marks both operations best-effort -- failures here must never
//! affect a [`crate::task::Task`]'s outcome, so callers log and discard
//! errors rather than propagating them.

use async_trait::async_trait;

use crate::task::{Subtask, Task};

/// Best-effort persistence and recall for decompositions.
///
/// `StoreTask` / `FindSimilarDecomposition` in spec §6. Neither is on the
/// critical path: [`crate::manager::Manager::decompose_goal`] treats a
/// sink error identically to a cache miss.
#[async_trait]
pub trait MemorySink: Send + Sync {
    /// Persist a completed (or in-progress) task snapshot.
    async fn store_task(&self, task: &Task) -> anyhow::Result<()>;

    /// Look up a previously stored decomposition for a goal similar to
    /// `goal_text`, if any.
    async fn find_similar_decomposition(
        &self,
        goal_text: &str,
    ) -> anyhow::Result<Option<Vec<Subtask>>>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn MemorySink) {}
};

/// A [`MemorySink`] that stores and recalls nothing, the default when no
/// backing store is configured.
#[derive(Debug, Default)]
pub struct NoopMemorySink;

#[async_trait]
impl MemorySink for NoopMemorySink {
    async fn store_task(&self, _task: &Task) -> anyhow::Result<()> {
        Ok(())
    }

    async fn find_similar_decomposition(
        &self,
        _goal_text: &str,
    ) -> anyhow::Result<Option<Vec<Subtask>>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_sink_never_finds_a_decomposition() {
        let sink = NoopMemorySink;
        let found = sink.find_similar_decomposition("do a thing").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn noop_sink_accepts_store_without_error() {
        let sink = NoopMemorySink;
        let task = Task::new("goal");
        assert!(sink.store_task(&task).await.is_ok());
    }
}
