//! Submission and the identifier-store contract
//!
//! A submission command is opaque to the shepherd: it is handed to the
//! shell as-is. The identifiers of the jobs it created come back through
//! a side channel, a text file the submission tool writes with one
//! integer per line. Sorted ascending, the single lowest identifier
//! tracks the jobset itself rather than a unit of work; everything above
//! it is a job to monitor.
//!
//! `GridClient::submit` implementations are expected to route through
//! [`run_submission`] so the store contract stays in one place.

use std::path::Path;

use tracing::{debug, info};

use shepherd_core::domain::job::JobId;
use shepherd_core::domain::jobset::JobSet;

use crate::error::{ClientError, Result};

/// Runs a pre-formed submission command and reads the identifier store it
/// writes.
///
/// # Arguments
/// * `command` - The submission command, executed via `sh -c`
/// * `id_store` - Path the submission tool writes created identifiers to
///
/// # Errors
/// Fails when the command exits unsuccessfully or the store is missing or
/// unparsable. A failed submission is fatal for this jobset only; callers
/// keep monitoring everything else.
pub async fn run_submission(command: &str, id_store: &Path) -> Result<JobSet> {
    info!("submitting: {}", command);

    let status = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .status()
        .await?;

    if !status.success() {
        return Err(ClientError::Submission(format!(
            "command exited with {}: {}",
            status, command
        )));
    }

    let ids = read_id_store(id_store)?;
    let jobset = split_jobset(command, ids, id_store)?;
    info!(
        "jobset {} created {} job(s)",
        jobset.jobset_id,
        jobset.job_ids.len()
    );
    Ok(jobset)
}

/// Reads every identifier in the store, sorted ascending.
pub fn read_id_store(path: &Path) -> Result<Vec<JobId>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ClientError::id_store(path, e.to_string()))?;

    let mut ids = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let id = line
            .parse::<JobId>()
            .map_err(|e| ClientError::id_store(path, format!("bad line {:?}: {}", line, e)))?;
        ids.push(id);
    }

    ids.sort_unstable();
    debug!("identifier store {} holds {} id(s)", path.display(), ids.len());
    Ok(ids)
}

/// Splits the lowest identifier off as the jobset tracker.
fn split_jobset(command: &str, mut ids: Vec<JobId>, path: &Path) -> Result<JobSet> {
    if ids.is_empty() {
        return Err(ClientError::id_store(path, "store is empty"));
    }
    let jobset_id = ids.remove(0);
    Ok(JobSet {
        jobset_id,
        command: command.to_string(),
        job_ids: ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_store(dir: &TempDir, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join("jobids.dat");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_read_store_sorts_ascending() {
        let dir = TempDir::new().unwrap();
        let path = write_store(&dir, "303\n301\n302\n");
        let ids = read_id_store(&path).unwrap();
        assert_eq!(ids, vec![JobId(301), JobId(302), JobId(303)]);
    }

    #[test]
    fn test_read_store_tolerates_blank_lines_and_whitespace() {
        let dir = TempDir::new().unwrap();
        let path = write_store(&dir, " 42 \n\n7\n");
        let ids = read_id_store(&path).unwrap();
        assert_eq!(ids, vec![JobId(7), JobId(42)]);
    }

    #[test]
    fn test_read_store_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = read_id_store(&dir.path().join("absent.dat")).unwrap_err();
        assert!(matches!(err, ClientError::IdStore { .. }));
    }

    #[test]
    fn test_read_store_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = write_store(&dir, "1\ntwo\n3\n");
        let err = read_id_store(&path).unwrap_err();
        assert!(err.to_string().contains("two"));
    }

    #[test]
    fn test_split_drops_single_lowest_as_jobset() {
        let dir = TempDir::new().unwrap();
        let path = write_store(&dir, "");
        let ids = vec![JobId(100), JobId(101), JobId(102)];
        let jobset = split_jobset("prun ...", ids, &path).unwrap();
        assert_eq!(jobset.jobset_id, JobId(100));
        assert_eq!(jobset.job_ids, vec![JobId(101), JobId(102)]);
        assert_eq!(jobset.command, "prun ...");
    }

    #[test]
    fn test_split_single_id_means_no_jobs() {
        let dir = TempDir::new().unwrap();
        let path = write_store(&dir, "");
        let jobset = split_jobset("cmd", vec![JobId(9)], &path).unwrap();
        assert_eq!(jobset.jobset_id, JobId(9));
        assert!(jobset.is_empty());
    }

    #[tokio::test]
    async fn test_run_submission_reads_back_store() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("jobids.dat");
        let command = format!("printf '205\\n204\\n206\\n' > {}", store.display());

        let jobset = run_submission(&command, &store).await.unwrap();
        assert_eq!(jobset.jobset_id, JobId(204));
        assert_eq!(jobset.job_ids, vec![JobId(205), JobId(206)]);
    }

    #[tokio::test]
    async fn test_run_submission_fails_on_command_error() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("jobids.dat");
        let err = run_submission("exit 3", &store).await.unwrap_err();
        assert!(matches!(err, ClientError::Submission(_)));
    }

    #[tokio::test]
    async fn test_run_submission_fails_on_missing_store() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("never-written.dat");
        let err = run_submission("true", &store).await.unwrap_err();
        assert!(matches!(err, ClientError::IdStore { .. }));
    }
}
