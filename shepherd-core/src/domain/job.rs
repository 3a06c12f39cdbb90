//! Job domain types

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::manifest::CorruptFile;

/// Identifier assigned to a job by the grid.
///
/// The grid hands these out as plain integers (one per line in the
/// identifier store a submission writes). A retried job receives a fresh
/// identifier; the old one is never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    /// The grid reports a retry identifier of zero when no new job was
    /// actually issued.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(JobId)
    }
}

/// Status token reported by the grid for one subjob.
///
/// A job's remote status is a set of these, one per subjob in whatever
/// state it currently occupies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum StatusToken {
    Defined,
    Assigned,
    Activated,
    Running,
    Holding,
    Transferring,
    Sent,
    Starting,
    Finished,
    Failed,
}

impl std::fmt::Display for StatusToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StatusToken::Defined => "defined",
            StatusToken::Assigned => "assigned",
            StatusToken::Activated => "activated",
            StatusToken::Running => "running",
            StatusToken::Holding => "holding",
            StatusToken::Transferring => "transferring",
            StatusToken::Sent => "sent",
            StatusToken::Starting => "starting",
            StatusToken::Finished => "finished",
            StatusToken::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for StatusToken {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "defined" => Ok(StatusToken::Defined),
            "assigned" => Ok(StatusToken::Assigned),
            "activated" => Ok(StatusToken::Activated),
            "running" => Ok(StatusToken::Running),
            "holding" => Ok(StatusToken::Holding),
            "transferring" => Ok(StatusToken::Transferring),
            "sent" => Ok(StatusToken::Sent),
            "starting" => Ok(StatusToken::Starting),
            "finished" => Ok(StatusToken::Finished),
            "failed" => Ok(StatusToken::Failed),
            other => Err(UnknownToken(other.to_string())),
        }
    }
}

/// Error returned when the grid reports a status string outside the known
/// vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownToken(pub String);

impl std::fmt::Display for UnknownToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown status token: {}", self.0)
    }
}

impl std::error::Error for UnknownToken {}

/// Static description of a job as the grid knows it.
///
/// The dataset references and site are informational; only the output
/// dataset drives behavior (a job without one has nothing to download).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub input_dataset: String,
    pub output_dataset: Option<String>,
    pub site: String,
}

/// One remotely executing unit of work, as tracked locally.
///
/// Created when its identifier is first observed, mutated by the monitor
/// on every poll cycle, and removed from the registry exactly once it
/// reaches a terminal state. A retried job is superseded by a new `Job`
/// under the new identifier, never mutated in place.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub input_dataset: String,
    pub output_dataset: Option<String>,
    pub site: String,
    pub created_at: DateTime<Utc>,

    /// Status tokens from the last poll, kept sorted.
    pub tokens: Vec<StatusToken>,
    /// When `tokens` last changed. "Stuck" is measured from here, not
    /// from submission.
    pub status_since: Instant,

    /// Submission retries consumed across this job's whole lineage.
    pub submit_attempts: u32,
    /// Download re-fetches consumed after invalid validations.
    pub fetch_attempts: u32,

    pub downloading: bool,
    pub download_failed: bool,
    pub corrupted: Vec<CorruptFile>,
}

impl Job {
    pub fn new(id: JobId, descriptor: JobDescriptor, now: Instant) -> Self {
        Self {
            id,
            input_dataset: descriptor.input_dataset,
            output_dataset: descriptor.output_dataset,
            site: descriptor.site,
            created_at: Utc::now(),
            tokens: Vec::new(),
            status_since: now,
            submit_attempts: 0,
            fetch_attempts: 0,
            downloading: false,
            download_failed: false,
            corrupted: Vec::new(),
        }
    }

    /// Records the token set from a fresh poll. If it differs from the
    /// stored set the state-change timestamp resets to `now`.
    ///
    /// Returns true when the set changed.
    pub fn record_status(&mut self, mut tokens: Vec<StatusToken>, now: Instant) -> bool {
        tokens.sort_unstable();
        if tokens == self.tokens {
            return false;
        }
        self.tokens = tokens;
        self.status_since = now;
        true
    }

    /// Time spent in the current token set.
    pub fn time_in_state(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.status_since)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> JobDescriptor {
        JobDescriptor {
            input_dataset: "data.in".to_string(),
            output_dataset: Some("user.out".to_string()),
            site: "SITE_A".to_string(),
        }
    }

    #[test]
    fn test_token_parse_roundtrip() {
        for name in [
            "defined",
            "assigned",
            "activated",
            "running",
            "holding",
            "transferring",
            "sent",
            "starting",
            "finished",
            "failed",
        ] {
            let token: StatusToken = name.parse().unwrap();
            assert_eq!(token.to_string(), name);
        }
    }

    #[test]
    fn test_token_parse_rejects_unknown() {
        let err = "exploded".parse::<StatusToken>().unwrap_err();
        assert_eq!(err, UnknownToken("exploded".to_string()));
    }

    #[test]
    fn test_token_serializes_lowercase() {
        let json = serde_json::to_string(&StatusToken::Transferring).unwrap();
        assert_eq!(json, "\"transferring\"");
    }

    #[test]
    fn test_job_id_parses_from_store_line() {
        let id: JobId = " 12345\n".parse().unwrap();
        assert_eq!(id, JobId(12345));
        assert!(JobId(0).is_none());
        assert!(!id.is_none());
    }

    #[test]
    fn test_record_status_resets_timestamp_only_on_change() {
        let start = Instant::now();
        let mut job = Job::new(JobId(1), descriptor(), start);

        let changed = job.record_status(vec![StatusToken::Activated], start);
        assert!(changed);

        // Same set again, later: timestamp must not move.
        let later = start + Duration::from_secs(60);
        let changed = job.record_status(vec![StatusToken::Activated], later);
        assert!(!changed);
        assert_eq!(job.time_in_state(later), Duration::from_secs(60));

        // A different set resets the clock.
        let changed = job.record_status(vec![StatusToken::Running], later);
        assert!(changed);
        assert_eq!(job.time_in_state(later), Duration::ZERO);
    }

    #[test]
    fn test_record_status_ignores_token_order() {
        let start = Instant::now();
        let mut job = Job::new(JobId(1), descriptor(), start);

        job.record_status(vec![StatusToken::Running, StatusToken::Holding], start);
        let later = start + Duration::from_secs(10);
        let changed =
            job.record_status(vec![StatusToken::Holding, StatusToken::Running], later);
        assert!(!changed);
        assert_eq!(job.time_in_state(later), Duration::from_secs(10));
    }
}
