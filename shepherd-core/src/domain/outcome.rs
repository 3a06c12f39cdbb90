//! Run outcome

use serde::{Deserialize, Serialize};

use crate::domain::job::JobId;

/// Final report of a monitoring run.
///
/// Every identifier ever added to the registry lands in exactly one of
/// the two lists. "Failed" covers jobs that exhausted their submission
/// retries, jobs whose output could not be downloaded intact, and
/// identifiers the grid could not describe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Outcome {
    pub succeeded: Vec<JobId>,
    pub failed: Vec<JobId>,
}

impl Outcome {
    /// True when no job ended on the failure list.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}
