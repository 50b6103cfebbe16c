//! Semantically named wrappers around [`super::SubtaskStateMachine`]
//! transitions, mirroring `gator-core`'s `state::dispatch`.

use crate::error::StateError;
use crate::task::{Subtask, SubtaskStatus};

use super::SubtaskStateMachine;

/// Assign a subtask to a worker: transition `pending -> assigned`.
pub fn assign(subtask: &mut Subtask) -> Result<(), StateError> {
    SubtaskStateMachine::transition(subtask, SubtaskStatus::Assigned)
}

/// Start execution: transition `assigned -> in_progress`.
pub fn start(subtask: &mut Subtask) -> Result<(), StateError> {
    SubtaskStateMachine::transition(subtask, SubtaskStatus::InProgress)
}

/// Enter peer review: transition `in_progress -> peer_review`.
pub fn begin_peer_review(subtask: &mut Subtask) -> Result<(), StateError> {
    SubtaskStateMachine::transition(subtask, SubtaskStatus::PeerReview)
}

/// Complete without peer review: transition `in_progress -> completed`.
pub fn complete(subtask: &mut Subtask) -> Result<(), StateError> {
    SubtaskStateMachine::transition(subtask, SubtaskStatus::Completed)
}

/// Complete after peer review found no correction needed: transition
/// `peer_review -> completed`.
pub fn approve(subtask: &mut Subtask) -> Result<(), StateError> {
    SubtaskStateMachine::transition(subtask, SubtaskStatus::Completed)
}

/// Record that peer review required a correction: transition
/// `peer_review -> corrected`.
pub fn correct(subtask: &mut Subtask) -> Result<(), StateError> {
    SubtaskStateMachine::transition(subtask, SubtaskStatus::Corrected)
}

/// Complete a subtask whose correction has been recorded: transition
/// `corrected -> completed`.
pub fn finish_correction(subtask: &mut Subtask) -> Result<(), StateError> {
    SubtaskStateMachine::transition(subtask, SubtaskStatus::Completed)
}

/// Mark a subtask as failed: transition `in_progress -> failed`.
pub fn fail(subtask: &mut Subtask) -> Result<(), StateError> {
    SubtaskStateMachine::transition(subtask, SubtaskStatus::Failed)
}

/// Retry a failed subtask: transition `failed -> assigned`, incrementing
/// the iteration counter. Fails once `iteration_count >= max_iterations`.
pub fn retry(subtask: &mut Subtask) -> Result<(), StateError> {
    SubtaskStateMachine::transition(subtask, SubtaskStatus::Assigned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::WorkerRole;

    #[test]
    fn dispatch_functions_drive_subtask_through_happy_path() {
        let mut s = Subtask::new("s1", "goal", WorkerRole::General);
        assign(&mut s).unwrap();
        start(&mut s).unwrap();
        begin_peer_review(&mut s).unwrap();
        approve(&mut s).unwrap();
        assert_eq!(s.status, SubtaskStatus::Completed);
    }

    #[test]
    fn dispatch_functions_drive_subtask_through_correction_path() {
        let mut s = Subtask::new("s1", "goal", WorkerRole::General);
        assign(&mut s).unwrap();
        start(&mut s).unwrap();
        begin_peer_review(&mut s).unwrap();
        correct(&mut s).unwrap();
        assert_eq!(s.status, SubtaskStatus::Corrected);
        assert!(s.completed_at.is_none());
        finish_correction(&mut s).unwrap();
        assert_eq!(s.status, SubtaskStatus::Completed);
        assert!(s.completed_at.is_some());
    }

    #[test]
    fn dispatch_functions_drive_subtask_through_retry_path() {
        let mut s = Subtask::new("s1", "goal", WorkerRole::General);
        assign(&mut s).unwrap();
        start(&mut s).unwrap();
        fail(&mut s).unwrap();
        retry(&mut s).unwrap();
        assert_eq!(s.status, SubtaskStatus::Assigned);
        assert_eq!(s.iteration_count, 1);
    }
}
