//! Jobset domain type

use serde::{Deserialize, Serialize};

use crate::domain::job::JobId;

/// The group of jobs created by one submission command.
///
/// A submission writes every identifier it created to the identifier
/// store; the lowest one tracks the submission itself rather than a unit
/// of work, so it is split off as `jobset_id`. A `JobSet` is not retained
/// once its jobs are absorbed into the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSet {
    pub jobset_id: JobId,
    pub command: String,
    pub job_ids: Vec<JobId>,
}

impl JobSet {
    pub fn is_empty(&self) -> bool {
        self.job_ids.is_empty()
    }
}
