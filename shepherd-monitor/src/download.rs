//! Download manager
//!
//! Finished jobs have their output fetched from the replica service by an
//! external transfer tool, at most `max_concurrent_downloads` at a time.
//! Each landed dataset is validated against the catalog's manifest by
//! file presence and byte size; corrupted members are deleted and the
//! whole fetch is retried up to a ceiling.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use shepherd_client::{ReplicaCatalog, TransferClient, TransferHandle};
use shepherd_core::domain::job::{Job, JobId};
use shepherd_core::domain::manifest::{CorruptFile, Manifest};

use crate::config::MonitorConfig;

/// One in-flight transfer subprocess.
struct ActiveTransfer {
    handle: Box<dyn TransferHandle>,
    started: Instant,
    /// Staleness kills survived by this attempt.
    relaunches: u32,
}

/// Tracks the transfer subprocess of every currently downloading job.
///
/// Owns the concurrency accounting: a job occupies a slot from the moment
/// its transfer starts until it is validated or given up on.
#[derive(Default)]
pub struct DownloadManager {
    transfers: HashMap<JobId, ActiveTransfer>,
}

impl DownloadManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transfers currently occupying a slot.
    pub fn in_flight(&self) -> usize {
        self.transfers.len()
    }

    fn begin(
        &mut self,
        id: JobId,
        container: &str,
        transfers: &dyn TransferClient,
        dest: &Path,
        now: Instant,
        relaunches: u32,
    ) -> shepherd_client::Result<()> {
        let handle = transfers.begin_fetch(container, dest)?;
        self.transfers.insert(
            id,
            ActiveTransfer {
                handle,
                started: now,
                relaunches,
            },
        );
        Ok(())
    }

    fn has_exited(&mut self, id: JobId) -> bool {
        match self.transfers.get_mut(&id) {
            Some(transfer) => transfer.handle.has_exited(),
            None => true,
        }
    }

    fn elapsed(&self, id: JobId, now: Instant) -> Duration {
        self.transfers
            .get(&id)
            .map(|t| now.saturating_duration_since(t.started))
            .unwrap_or_default()
    }

    fn relaunches(&self, id: JobId) -> u32 {
        self.transfers.get(&id).map(|t| t.relaunches).unwrap_or(0)
    }

    fn kill(&mut self, id: JobId) {
        if let Some(transfer) = self.transfers.get_mut(&id) {
            if let Err(e) = transfer.handle.kill() {
                warn!("could not kill transfer for job {}: {}", id, e);
            }
        }
    }

    /// Drops a job's transfer, freeing its slot.
    fn discard(&mut self, id: JobId) {
        self.transfers.remove(&id);
    }
}

/// What the download manager decided for one finished job this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    /// No slot free (or the transfer tool would not start); the job
    /// stays finished and is reconsidered next cycle.
    Held,
    /// A transfer is running or was just (re)launched.
    InProgress,
    /// Output landed and validated; the job is terminal-success.
    Complete,
    /// Re-fetches or relaunches exhausted; terminal download-failure.
    Failed,
}

/// Advances the download of one finished job by a single cycle.
///
/// Never blocks on the transfer: liveness is a `try_wait`-style poll, and
/// validation only happens once the subprocess has exited.
pub async fn advance(
    downloads: &mut DownloadManager,
    job: &mut Job,
    catalog: &dyn ReplicaCatalog,
    transfers: &dyn TransferClient,
    config: &MonitorConfig,
    now: Instant,
) -> DownloadStatus {
    let container = match job.output_dataset.as_deref() {
        // Test jobs produce no output dataset; nothing to fetch.
        None | Some("") => return DownloadStatus::Complete,
        Some(container) => container.to_string(),
    };

    if !job.downloading {
        if downloads.in_flight() >= config.max_concurrent_downloads {
            debug!("holding job {} until a transfer slot frees", job.id);
            return DownloadStatus::Held;
        }
        match downloads.begin(job.id, &container, transfers, &config.output_dir, now, 0) {
            Ok(()) => {
                info!("started download of {} for job {}", container, job.id);
                job.downloading = true;
                return DownloadStatus::InProgress;
            }
            Err(e) => {
                warn!("could not start transfer for job {}: {}", job.id, e);
                return DownloadStatus::Held;
            }
        }
    }

    if !downloads.has_exited(job.id) {
        let elapsed = downloads.elapsed(job.id, now);
        if elapsed <= config.download_stuck_threshold {
            return DownloadStatus::InProgress;
        }

        // Transfer has gone stale.
        let relaunches = downloads.relaunches(job.id);
        downloads.kill(job.id);
        if relaunches >= config.max_transfer_relaunches {
            error!(
                "transfer for job {} wedged through {} relaunches; declaring download failed",
                job.id, relaunches
            );
            downloads.discard(job.id);
            job.downloading = false;
            job.download_failed = true;
            return DownloadStatus::Failed;
        }
        warn!(
            "transfer for job {} stale after {:?}; killing and relaunching",
            job.id, elapsed
        );
        match downloads.begin(
            job.id,
            &container,
            transfers,
            &config.output_dir,
            now,
            relaunches + 1,
        ) {
            Ok(()) => return DownloadStatus::InProgress,
            Err(e) => {
                warn!("could not relaunch transfer for job {}: {}", job.id, e);
                downloads.discard(job.id);
                job.downloading = false;
                return DownloadStatus::Held;
            }
        }
    }

    // The transfer exited; judge what landed.
    let manifest = match fetch_manifest(catalog, &container).await {
        Ok(manifest) => manifest,
        Err(e) => {
            // Transient catalog fault: keep the slot, validate next cycle.
            warn!("manifest for {} unavailable: {}", container, e);
            return DownloadStatus::InProgress;
        }
    };

    let report = compare_with_local(&manifest, &config.output_dir);
    job.corrupted = report.corrupted.clone();

    if report.valid {
        info!("job {} output complete and size-validated", job.id);
        downloads.discard(job.id);
        job.downloading = false;
        return DownloadStatus::Complete;
    }

    delete_corrupted(&config.output_dir, &report.corrupted);

    job.fetch_attempts += 1;
    if job.fetch_attempts >= config.download_retry_limit {
        error!(
            "job {} output still invalid after {} fetch(es); declaring download failed",
            job.id, job.fetch_attempts
        );
        downloads.discard(job.id);
        job.downloading = false;
        job.download_failed = true;
        return DownloadStatus::Failed;
    }

    warn!(
        "job {} output invalid ({} corrupted file(s)); re-fetching {}",
        job.id,
        report.corrupted.len(),
        container
    );
    match downloads.begin(job.id, &container, transfers, &config.output_dir, now, 0) {
        Ok(()) => DownloadStatus::InProgress,
        Err(e) => {
            warn!("could not re-fetch for job {}: {}", job.id, e);
            downloads.discard(job.id);
            job.downloading = false;
            DownloadStatus::Held
        }
    }
}

/// Builds the expected-output manifest for a container from the catalog.
pub async fn fetch_manifest(
    catalog: &dyn ReplicaCatalog,
    container: &str,
) -> shepherd_client::Result<Manifest> {
    let mut manifest = Manifest::new();
    for dataset in catalog.datasets_in_container(container).await? {
        let files = catalog.files_in_dataset(&dataset).await?;
        manifest.datasets.insert(dataset, files);
    }
    Ok(manifest)
}

/// Result of comparing a manifest against local storage.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub valid: bool,
    pub corrupted: Vec<CorruptFile>,
}

/// Compares what the manifest promises against what landed on disk.
///
/// Layout is `<output_dir>/<dataset>/<file>`. A missing dataset directory
/// or fewer files than promised make the report invalid; a file present
/// at the wrong size is additionally recorded as corrupted. Extra local
/// files are tolerated.
pub fn compare_with_local(manifest: &Manifest, output_dir: &Path) -> ValidationReport {
    let mut valid = true;
    let mut corrupted = Vec::new();

    for (dataset, expected) in &manifest.datasets {
        let dir = output_dir.join(dataset);
        if !dir.is_dir() {
            warn!("dataset {} missing under {}", dataset, output_dir.display());
            valid = false;
            continue;
        }

        let actual = local_files(&dir);
        if actual.len() < expected.len() {
            warn!(
                "dataset {} holds {} of {} expected file(s)",
                dataset,
                actual.len(),
                expected.len()
            );
            valid = false;
        }

        for (file, want) in expected {
            match actual.get(file) {
                Some(got) if got == want => {}
                Some(got) => {
                    warn!(
                        "file {}/{} is {} byte(s), manifest says {}",
                        dataset, file, got, want
                    );
                    corrupted.push(CorruptFile {
                        dataset: dataset.clone(),
                        file: file.clone(),
                    });
                    valid = false;
                }
                None => {
                    valid = false;
                }
            }
        }
    }

    ValidationReport { valid, corrupted }
}

/// Lists the plain files of a directory with their sizes.
fn local_files(dir: &Path) -> BTreeMap<String, u64> {
    let mut files = BTreeMap::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("could not read {}: {}", dir.display(), e);
            return files;
        }
    };
    for entry in entries.flatten() {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if metadata.is_file() {
            files.insert(entry.file_name().to_string_lossy().into_owned(), metadata.len());
        }
    }
    files
}

/// Removes exactly the corrupted members so the re-fetch replaces them.
pub fn delete_corrupted(output_dir: &Path, corrupted: &[CorruptFile]) {
    for corrupt in corrupted {
        let path = output_dir.join(&corrupt.dataset).join(&corrupt.file);
        info!("deleting corrupted file {}", path.display());
        if let Err(e) = std::fs::remove_file(&path) {
            warn!("could not delete {}: {}", path.display(), e);
        }
    }
}
