//! Retry controller
//!
//! Stuck and remotely failed jobs are recovered the same way: kill
//! whatever is still running, then resubmit. The grid answers with the
//! identifier of the replacement job; the monitor swaps its registry
//! entry accordingly.

use tracing::{info, warn};

use shepherd_client::{GridClient, Result, RetryDirective};
use shepherd_core::domain::job::JobId;

/// Kills and resubmits one job, returning the identifier of its
/// successor.
///
/// The kill is fire-and-forget: a kill failure is logged and resubmission
/// proceeds anyway. A job whose build stage did not succeed is resubmitted
/// with a forced rebuild; otherwise the existing build is reused. A retry
/// identifier of zero means the grid issued no new job, in which case the
/// old identifier is returned unchanged.
///
/// # Arguments
/// * `grid` - The execution grid
/// * `id` - Job to resubmit
/// * `build_ok` - Whether the job's build stage succeeded
/// * `kill_first` - Whether anything remote may still be running
/// * `fresh_site` - Ask the grid for a different execution site
pub async fn kill_and_resubmit(
    grid: &dyn GridClient,
    id: JobId,
    build_ok: bool,
    kill_first: bool,
    fresh_site: bool,
) -> Result<JobId> {
    if kill_first {
        if let Err(e) = grid.kill(id).await {
            warn!("kill request for job {} failed: {}", id, e);
        }
    }

    let directive = RetryDirective {
        rebuild: !build_ok,
        fresh_site,
    };
    if directive.rebuild {
        info!("resubmitting job {} with a rebuild", id);
    } else {
        info!("resubmitting job {} reusing its build", id);
    }

    let new_id = grid.retry(id, directive).await?;
    if new_id.is_none() {
        info!("grid issued no new identifier for job {}; keeping it", id);
        return Ok(id);
    }

    info!("job {} superseded by job {}", id, new_id);
    Ok(new_id)
}
