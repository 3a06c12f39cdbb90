//! The monitor
//!
//! Owns the live job registry and runs the polling loop: synchronize the
//! local view, poll every job, dispatch it by classification, sleep,
//! repeat until the registry is empty. Per-job faults never escape the
//! loop; the worst a broken job can do is land on the failure list.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tracing::{debug, error, info, warn};

use shepherd_client::{GridClient, ReplicaCatalog, StatusReport, TransferClient};
use shepherd_core::domain::job::{Job, JobId};
use shepherd_core::domain::outcome::Outcome;

use crate::classify::{Classification, classify};
use crate::config::MonitorConfig;
use crate::download::{self, DownloadManager, DownloadStatus};
use crate::retry;

/// The live job registry. Single source of truth for work remaining;
/// mutated only inside the polling loop.
pub type Registry = BTreeMap<JobId, Job>;

/// Babysits a batch of grid jobs until every one is terminal.
pub struct Monitor {
    config: MonitorConfig,
    grid: Arc<dyn GridClient>,
    catalog: Arc<dyn ReplicaCatalog>,
    transfers: Arc<dyn TransferClient>,
    registry: Registry,
    downloads: DownloadManager,
    succeeded: Vec<JobId>,
    failed: Vec<JobId>,
}

impl Monitor {
    /// Creates a monitor over the given collaborators.
    pub fn new(
        config: MonitorConfig,
        grid: Arc<dyn GridClient>,
        catalog: Arc<dyn ReplicaCatalog>,
        transfers: Arc<dyn TransferClient>,
    ) -> anyhow::Result<Self> {
        config.validate().context("invalid monitor configuration")?;
        Ok(Self {
            config,
            grid,
            catalog,
            transfers,
            registry: Registry::new(),
            downloads: DownloadManager::new(),
            succeeded: Vec::new(),
            failed: Vec::new(),
        })
    }

    /// Jobs still being monitored.
    pub fn remaining(&self) -> usize {
        self.registry.len()
    }

    /// Submits one jobset and registers every job it created.
    ///
    /// # Errors
    /// A submission fault (command failed, identifier store unreadable)
    /// is fatal for this jobset only; the registry keeps whatever was
    /// already in it.
    pub async fn submit(&mut self, command: &str) -> anyhow::Result<()> {
        let jobset = self
            .grid
            .submit(command)
            .await
            .with_context(|| format!("submission failed: {}", command))?;
        info!(
            "jobset {} submitted with {} job(s)",
            jobset.jobset_id,
            jobset.job_ids.len()
        );
        for id in jobset.job_ids {
            self.adopt_one(id).await;
        }
        Ok(())
    }

    /// Submits a whole batch, logging and skipping jobsets that fail.
    pub async fn submit_batch(&mut self, commands: &[String]) {
        for command in commands {
            if let Err(e) = self.submit(command).await {
                error!("skipping jobset: {:#}", e);
            }
        }
    }

    /// Registers previously submitted jobs by identifier.
    pub async fn adopt(&mut self, ids: &[JobId]) {
        for &id in ids {
            self.adopt_one(id).await;
        }
    }

    /// Registers every live job the grid reports for this user.
    pub async fn adopt_active(&mut self) -> anyhow::Result<()> {
        let ids = self
            .grid
            .active_jobs()
            .await
            .context("could not list active jobs")?;
        info!("adopting {} active job(s)", ids.len());
        for id in ids {
            self.adopt_one(id).await;
        }
        Ok(())
    }

    async fn adopt_one(&mut self, id: JobId) {
        if self.registry.contains_key(&id) {
            return;
        }
        match self.grid.describe(id).await {
            Ok(Some(descriptor)) => {
                debug!("monitoring job {} (site {})", id, descriptor.site);
                self.registry.insert(id, Job::new(id, descriptor, Instant::now()));
            }
            Ok(None) => {
                warn!("grid has no record of job {}", id);
                self.failed.push(id);
            }
            Err(e) => {
                warn!("could not describe job {}: {}", id, e);
                self.failed.push(id);
            }
        }
    }

    /// Runs the polling loop until the registry drains, then reports
    /// which jobs succeeded and which are permanently failed.
    pub async fn run(mut self) -> Outcome {
        info!("monitoring {} job(s)", self.registry.len());

        loop {
            if self.registry.is_empty() {
                break;
            }
            self.cycle().await;
            if self.registry.is_empty() {
                break;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        let outcome = Outcome {
            succeeded: self.succeeded,
            failed: self.failed,
        };
        info!(
            "all jobs complete: {} succeeded, {} failed",
            outcome.succeeded.len(),
            outcome.failed.len()
        );
        outcome
    }

    /// One registry-wide poll cycle over a sorted snapshot of
    /// identifiers. Registry mutations happen per job, never while
    /// iterating the map itself.
    async fn cycle(&mut self) {
        if let Err(e) = self.grid.refresh().await {
            warn!("grid refresh failed: {}", e);
        }

        let ids: Vec<JobId> = self.registry.keys().copied().collect();
        for id in ids {
            self.step(id).await;
        }
    }

    /// Polls and dispatches a single job.
    async fn step(&mut self, id: JobId) {
        let now = Instant::now();
        let report = match self.grid.status(id).await {
            Ok(report) => report,
            Err(e) => {
                // Transient: the job is reconsidered next cycle.
                warn!("status query for job {} failed: {}", id, e);
                return;
            }
        };

        let Some(job) = self.registry.get_mut(&id) else {
            return;
        };
        job.record_status(report.tokens.clone(), now);
        let in_state = job.time_in_state(now);
        let class = classify(report.frozen, &job.tokens, in_state, self.config.stuck_threshold);
        debug!("job {} is {} ({:?})", id, class, job.tokens);

        match class {
            Classification::Pending | Classification::Running => {}
            Classification::Unrecognized => {
                warn!(
                    "job {} reported an unrecognized status combination {:?} (frozen: {})",
                    id, job.tokens, report.frozen
                );
            }
            Classification::Stuck => self.handle_stuck(id, &report).await,
            Classification::Failed => self.handle_failed(id, &report).await,
            Classification::Finished => self.handle_finished(id).await,
        }
    }

    async fn handle_stuck(&mut self, id: JobId, report: &StatusReport) {
        if self.submissions_exhausted(id) {
            error!("job {} stuck with no submissions left; giving up", id);
            self.registry.remove(&id);
            self.failed.push(id);
            return;
        }
        warn!("job {} is stuck; killing and resubmitting", id);
        self.resubmit(id, report.build_ok, true).await;
    }

    async fn handle_failed(&mut self, id: JobId, report: &StatusReport) {
        if self.submissions_exhausted(id) {
            error!("job {} failed with no submissions left; giving up", id);
            self.registry.remove(&id);
            self.failed.push(id);
            return;
        }
        info!("job {} failed remotely; resubmitting", id);
        // Anything not yet fully stopped is killed before the retry.
        self.resubmit(id, report.build_ok, !report.frozen).await;
    }

    async fn handle_finished(&mut self, id: JobId) {
        let now = Instant::now();
        let Some(job) = self.registry.get_mut(&id) else {
            return;
        };
        let status = download::advance(
            &mut self.downloads,
            job,
            self.catalog.as_ref(),
            self.transfers.as_ref(),
            &self.config,
            now,
        )
        .await;

        match status {
            DownloadStatus::Held | DownloadStatus::InProgress => {}
            DownloadStatus::Complete => {
                info!("job {} complete", id);
                self.registry.remove(&id);
                self.succeeded.push(id);
            }
            DownloadStatus::Failed => {
                self.registry.remove(&id);
                self.failed.push(id);
            }
        }
    }

    fn submissions_exhausted(&self, id: JobId) -> bool {
        let Some(job) = self.registry.get(&id) else {
            return true;
        };
        // submit_attempts counts retries; the initial submission makes
        // one more.
        job.submit_attempts + 1 >= self.config.submission_retry_limit
    }

    async fn resubmit(&mut self, id: JobId, build_ok: bool, kill_first: bool) {
        let new_id = match retry::kill_and_resubmit(
            self.grid.as_ref(),
            id,
            build_ok,
            kill_first,
            self.config.use_fresh_site,
        )
        .await
        {
            Ok(new_id) => new_id,
            Err(e) => {
                warn!(
                    "resubmission of job {} failed: {}; will reconsider next cycle",
                    id, e
                );
                return;
            }
        };

        let Some(old) = self.registry.remove(&id) else {
            return;
        };
        let attempts = old.submit_attempts + 1;

        match self.grid.describe(new_id).await {
            Ok(Some(descriptor)) => {
                let mut job = Job::new(new_id, descriptor, Instant::now());
                job.submit_attempts = attempts;
                job.fetch_attempts = old.fetch_attempts;
                info!("job {} re-registered as job {} (retry {})", id, new_id, attempts);
                self.registry.insert(new_id, job);
            }
            Ok(None) => {
                warn!("grid has no record of replacement job {}", new_id);
                self.failed.push(new_id);
            }
            Err(e) => {
                warn!("could not describe replacement job {}: {}", new_id, e);
                self.failed.push(new_id);
            }
        }
    }
}
