//! Status classification
//!
//! The grid reports a set of status tokens per job (one per subjob
//! state). Combinations of those tokens, the frozen flag, and time spent
//! in the current set decide what the monitor does with the job this
//! cycle.

use std::time::Duration;

use shepherd_core::domain::job::StatusToken;

/// Token sets that mean the job has not started doing real work yet.
const PENDING_TOKENS: [StatusToken; 5] = [
    StatusToken::Defined,
    StatusToken::Assigned,
    StatusToken::Activated,
    StatusToken::Transferring,
    StatusToken::Starting,
];

/// Tokens that mean at least one subjob is actively progressing.
const ACTIVE_TOKENS: [StatusToken; 3] = [
    StatusToken::Running,
    StatusToken::Holding,
    StatusToken::Sent,
];

/// Local classification of a job's remote state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Not yet doing real work; tolerated until the stuck threshold.
    Pending,
    /// Making progress. Holding at the end of a job is tolerated
    /// indefinitely, so this is never reclassified stuck.
    Running,
    /// Pending in an unchanged status for longer than the threshold.
    Stuck,
    /// Frozen with every subjob finished.
    Finished,
    /// Frozen with at least one failed subjob.
    Failed,
    /// A combination this monitor does not understand. Logged and left
    /// alone for a cycle; either it self-heals on the next poll or the
    /// stuck detector eventually catches it.
    Unrecognized,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Classification::Pending => "pending",
            Classification::Running => "running",
            Classification::Stuck => "stuck",
            Classification::Finished => "finished",
            Classification::Failed => "failed",
            Classification::Unrecognized => "unrecognized",
        };
        write!(f, "{}", name)
    }
}

/// Classifies one job from its latest poll.
///
/// # Arguments
/// * `frozen` - Whether the remote record will transition no further
/// * `tokens` - Status tokens from the poll
/// * `in_state` - Time since the token set last changed
/// * `stuck_after` - Configured stuck threshold
pub fn classify(
    frozen: bool,
    tokens: &[StatusToken],
    in_state: Duration,
    stuck_after: Duration,
) -> Classification {
    if tokens.is_empty() {
        return Classification::Unrecognized;
    }

    if frozen {
        if tokens.contains(&StatusToken::Failed) {
            return Classification::Failed;
        }
        if tokens.iter().all(|t| *t == StatusToken::Finished) {
            return Classification::Finished;
        }
        return Classification::Unrecognized;
    }

    if tokens.iter().all(|t| PENDING_TOKENS.contains(t)) {
        if in_state > stuck_after {
            return Classification::Stuck;
        }
        return Classification::Pending;
    }

    if tokens.iter().any(|t| ACTIVE_TOKENS.contains(t)) {
        return Classification::Running;
    }

    Classification::Unrecognized
}

#[cfg(test)]
mod tests {
    use super::*;
    use StatusToken::*;

    const STUCK_AFTER: Duration = Duration::from_secs(7200);

    fn fresh(frozen: bool, tokens: &[StatusToken]) -> Classification {
        classify(frozen, tokens, Duration::ZERO, STUCK_AFTER)
    }

    #[test]
    fn test_frozen_failed_beats_everything() {
        assert_eq!(fresh(true, &[Failed]), Classification::Failed);
        assert_eq!(fresh(true, &[Finished, Failed]), Classification::Failed);
        // A failed token wins even when the set looks otherwise pending.
        assert_eq!(fresh(true, &[Activated, Failed]), Classification::Failed);
    }

    #[test]
    fn test_frozen_all_finished_is_finished() {
        assert_eq!(fresh(true, &[Finished]), Classification::Finished);
        assert_eq!(fresh(true, &[Finished, Finished]), Classification::Finished);
    }

    #[test]
    fn test_frozen_mixed_is_unrecognized() {
        assert_eq!(fresh(true, &[Finished, Running]), Classification::Unrecognized);
        assert_eq!(fresh(true, &[Holding]), Classification::Unrecognized);
    }

    #[test]
    fn test_pending_subset_is_pending_until_threshold() {
        assert_eq!(fresh(false, &[Defined]), Classification::Pending);
        assert_eq!(
            fresh(false, &[Assigned, Activated, Transferring, Starting]),
            Classification::Pending
        );

        // Exactly at the threshold is still pending; only past it is stuck.
        assert_eq!(
            classify(false, &[Activated], STUCK_AFTER, STUCK_AFTER),
            Classification::Pending
        );
        assert_eq!(
            classify(
                false,
                &[Activated],
                STUCK_AFTER + Duration::from_secs(1),
                STUCK_AFTER
            ),
            Classification::Stuck
        );
    }

    #[test]
    fn test_any_active_token_means_running() {
        assert_eq!(fresh(false, &[Running]), Classification::Running);
        assert_eq!(fresh(false, &[Sent]), Classification::Running);
        // One running subjob pulls a part-pending set out of stuck territory.
        assert_eq!(
            classify(
                false,
                &[Activated, Running],
                STUCK_AFTER * 2,
                STUCK_AFTER
            ),
            Classification::Running
        );
    }

    #[test]
    fn test_holding_never_goes_stuck() {
        assert_eq!(
            classify(false, &[Holding], STUCK_AFTER * 10, STUCK_AFTER),
            Classification::Running
        );
    }

    #[test]
    fn test_unfrozen_terminal_tokens_are_unrecognized() {
        assert_eq!(fresh(false, &[Finished]), Classification::Unrecognized);
        assert_eq!(fresh(false, &[Failed]), Classification::Unrecognized);
    }

    #[test]
    fn test_empty_token_set_is_unrecognized() {
        assert_eq!(fresh(false, &[]), Classification::Unrecognized);
        assert_eq!(fresh(true, &[]), Classification::Unrecognized);
    }
}
