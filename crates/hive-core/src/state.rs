//! [`SubtaskStateMachine`]: validates and applies [`SubtaskStatus`]
//! transitions in memory.
//!
//! Grounded in `gator-core`'s `state::TaskStateMachine`: the same
//! validate-then-apply shape and a `dispatch` module of semantically
//! named wrappers, but operating on an in-memory [`Subtask`] under a
//! caller-held lock instead of a Postgres row guarded by optimistic
//! locking -- there is no database here, so the "optimistic lock
//! failure" case collapses to simply not being called concurrently on
//! the same subtask, which callers ensure by holding the subtask behind
//! a `Mutex` per spec §5.

pub mod dispatch;

use chrono::Utc;

use crate::error::StateError;
use crate::task::{Subtask, SubtaskStatus};

/// The subtask state machine.
///
/// Enforces the valid transition graph:
///
/// ```text
/// pending     -> assigned
/// assigned    -> in_progress
/// in_progress -> peer_review
/// in_progress -> completed   (peer review disabled or skipped)
/// in_progress -> failed
/// peer_review -> completed
/// peer_review -> corrected
/// corrected   -> completed   (correction is recorded, not terminal)
/// failed      -> assigned    (retry, while iteration_count < max_iterations)
/// ```
///
/// Only `Completed` and `Failed` are terminal, per spec §4.4's state
/// machine summary; `Corrected` always proceeds straight to `Completed`.
pub struct SubtaskStateMachine;

impl SubtaskStateMachine {
    /// Whether `from -> to` is a valid edge in the status graph.
    pub fn is_valid_transition(from: SubtaskStatus, to: SubtaskStatus) -> bool {
        use SubtaskStatus::*;
        matches!(
            (from, to),
            (Pending, Assigned)
                | (Assigned, InProgress)
                | (InProgress, PeerReview)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (PeerReview, Completed)
                | (PeerReview, Corrected)
                | (Corrected, Completed)
                | (Failed, Assigned)
        )
    }

    /// Apply a transition to `subtask`, validating the edge and managing
    /// `completed_at` and the retry counter the way
    /// `state::TaskStateMachine::transition` manages `started_at` /
    /// `completed_at`.
    pub fn transition(subtask: &mut Subtask, to: SubtaskStatus) -> Result<(), StateError> {
        let from = subtask.status;

        if !Self::is_valid_transition(from, to) {
            return Err(StateError::InvalidTransition {
                subtask_id: subtask.id.clone(),
                from,
                to,
            });
        }

        if from == SubtaskStatus::Failed && to == SubtaskStatus::Assigned {
            return Self::retry(subtask);
        }

        if matches!(to, SubtaskStatus::Completed | SubtaskStatus::Failed) {
            subtask.completed_at = Some(Utc::now());
        }

        subtask.status = to;
        Ok(())
    }

    /// Handle the `failed -> assigned` retry edge: reject once
    /// `iteration_count >= max_iterations`, otherwise increment the
    /// counter and reset to `assigned`.
    fn retry(subtask: &mut Subtask) -> Result<(), StateError> {
        if subtask.iteration_count >= subtask.max_iterations {
            return Err(StateError::AttemptsExhausted {
                subtask_id: subtask.id.clone(),
                max_iterations: subtask.max_iterations,
            });
        }
        subtask.iteration_count += 1;
        subtask.completed_at = None;
        subtask.status = SubtaskStatus::Assigned;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::WorkerRole;

    fn subtask() -> Subtask {
        Subtask::new("s1", "do a thing", WorkerRole::General)
    }

    #[test]
    fn valid_graph_edges_accepted() {
        use SubtaskStatus::*;
        for (from, to) in [
            (Pending, Assigned),
            (Assigned, InProgress),
            (InProgress, PeerReview),
            (InProgress, Completed),
            (InProgress, Failed),
            (PeerReview, Completed),
            (PeerReview, Corrected),
            (Corrected, Completed),
            (Failed, Assigned),
        ] {
            assert!(SubtaskStateMachine::is_valid_transition(from, to));
        }
    }

    #[test]
    fn corrected_is_not_terminal_and_does_not_stamp_completed_at() {
        let mut s = subtask();
        SubtaskStateMachine::transition(&mut s, SubtaskStatus::Assigned).unwrap();
        SubtaskStateMachine::transition(&mut s, SubtaskStatus::InProgress).unwrap();
        SubtaskStateMachine::transition(&mut s, SubtaskStatus::PeerReview).unwrap();
        SubtaskStateMachine::transition(&mut s, SubtaskStatus::Corrected).unwrap();
        assert!(s.completed_at.is_none());
        SubtaskStateMachine::transition(&mut s, SubtaskStatus::Completed).unwrap();
        assert!(s.completed_at.is_some());
    }

    #[test]
    fn rejects_non_edges() {
        assert!(!SubtaskStateMachine::is_valid_transition(
            SubtaskStatus::Pending,
            SubtaskStatus::Completed
        ));
        assert!(!SubtaskStateMachine::is_valid_transition(
            SubtaskStatus::Completed,
            SubtaskStatus::Pending
        ));
    }

    #[test]
    fn transition_applies_completed_at_on_terminal_states() {
        let mut s = subtask();
        SubtaskStateMachine::transition(&mut s, SubtaskStatus::Assigned).unwrap();
        SubtaskStateMachine::transition(&mut s, SubtaskStatus::InProgress).unwrap();
        assert!(s.completed_at.is_none());
        SubtaskStateMachine::transition(&mut s, SubtaskStatus::Completed).unwrap();
        assert!(s.completed_at.is_some());
    }

    #[test]
    fn transition_rejects_invalid_edge() {
        let mut s = subtask();
        let err = SubtaskStateMachine::transition(&mut s, SubtaskStatus::Completed).unwrap_err();
        assert!(matches!(err, StateError::InvalidTransition { .. }));
    }

    #[test]
    fn retry_increments_iteration_count() {
        let mut s = subtask();
        SubtaskStateMachine::transition(&mut s, SubtaskStatus::Assigned).unwrap();
        SubtaskStateMachine::transition(&mut s, SubtaskStatus::InProgress).unwrap();
        SubtaskStateMachine::transition(&mut s, SubtaskStatus::Failed).unwrap();
        SubtaskStateMachine::transition(&mut s, SubtaskStatus::Assigned).unwrap();
        assert_eq!(s.iteration_count, 1);
        assert_eq!(s.status, SubtaskStatus::Assigned);
    }

    #[test]
    fn retry_rejected_once_attempts_exhausted() {
        let mut s = subtask();
        s.max_iterations = 1;
        SubtaskStateMachine::transition(&mut s, SubtaskStatus::Assigned).unwrap();
        SubtaskStateMachine::transition(&mut s, SubtaskStatus::InProgress).unwrap();
        SubtaskStateMachine::transition(&mut s, SubtaskStatus::Failed).unwrap();
        SubtaskStateMachine::transition(&mut s, SubtaskStatus::Assigned).unwrap();
        SubtaskStateMachine::transition(&mut s, SubtaskStatus::InProgress).unwrap();
        SubtaskStateMachine::transition(&mut s, SubtaskStatus::Failed).unwrap();
        let err = SubtaskStateMachine::transition(&mut s, SubtaskStatus::Assigned).unwrap_err();
        assert!(matches!(err, StateError::AttemptsExhausted { .. }));
    }
}
