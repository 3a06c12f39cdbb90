//! Execution-grid seam

use async_trait::async_trait;

use shepherd_core::domain::job::{JobDescriptor, JobId, StatusToken};
use shepherd_core::domain::jobset::JobSet;

use crate::error::Result;

/// Snapshot of a job's remote state.
#[derive(Debug, Clone)]
pub struct StatusReport {
    /// The remote record will not transition further without intervention.
    pub frozen: bool,
    /// One token per subjob state currently present.
    pub tokens: Vec<StatusToken>,
    /// Whether the job's build stage succeeded (or it had none). A failed
    /// build forces a rebuild on retry.
    pub build_ok: bool,
}

/// How a job should be resubmitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryDirective {
    /// Redo the build stage instead of reusing the existing build.
    pub rebuild: bool,
    /// Ask the grid to place the retry at a fresh execution site.
    pub fresh_site: bool,
}

/// Client for the remote execution grid.
///
/// Implementations typically wrap vendor tooling; see the `submission`
/// module for the identifier-store contract `submit` is expected to
/// follow.
#[async_trait]
pub trait GridClient: Send + Sync {
    /// Executes a pre-formed submission command and returns the jobset it
    /// created.
    async fn submit(&self, command: &str) -> Result<JobSet>;

    /// Looks up the static description of a job.
    ///
    /// # Returns
    /// `None` when the grid has no record of the identifier.
    async fn describe(&self, id: JobId) -> Result<Option<JobDescriptor>>;

    /// Queries the current remote status of a job.
    async fn status(&self, id: JobId) -> Result<StatusReport>;

    /// Requests that a job be killed. Fire-and-forget: callers do not
    /// wait for the kill to be acknowledged before resubmitting.
    async fn kill(&self, id: JobId) -> Result<()>;

    /// Resubmits a job.
    ///
    /// # Returns
    /// The identifier of the replacement job. A zero identifier means the
    /// grid issued no new job and the old identifier stays valid.
    async fn retry(&self, id: JobId, directive: RetryDirective) -> Result<JobId>;

    /// Lists every not-yet-frozen job the grid currently knows about for
    /// this user.
    async fn active_jobs(&self) -> Result<Vec<JobId>>;

    /// Synchronizes the local view of remote records. Called once per
    /// poll cycle before any job is inspected.
    async fn refresh(&self) -> Result<()>;
}
