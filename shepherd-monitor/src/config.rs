//! Monitor configuration
//!
//! Defines all configurable parameters for a monitoring run: the polling
//! cadence, the thresholds that declare jobs and transfers stuck, the
//! retry ceilings, and where downloaded output lands.

use std::path::PathBuf;
use std::time::Duration;

/// Monitor configuration
///
/// All timeouts and ceilings are configurable to allow tuning for
/// different grids (a heavily loaded site legitimately pends for hours;
/// a local test grid should give up in seconds).
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Directory downloaded datasets land in, one subdirectory per
    /// dataset. Validation reads this exact layout back.
    pub output_dir: PathBuf,

    /// Pause between poll cycles. The only backoff in the system.
    pub poll_interval: Duration,

    /// Time a job may sit in an unchanged pending status before it is
    /// declared stuck and resubmitted.
    pub stuck_threshold: Duration,

    /// Time a transfer subprocess may run before it is killed and
    /// relaunched from scratch.
    pub download_stuck_threshold: Duration,

    /// Total submissions a job lineage may consume, the initial one
    /// included, before it is declared permanently failed.
    pub submission_retry_limit: u32,

    /// Invalid validations a job may accumulate before its download is
    /// declared failed.
    pub download_retry_limit: u32,

    /// Transfers allowed in flight across the whole registry.
    pub max_concurrent_downloads: usize,

    /// Staleness kills one download attempt may survive before the job
    /// is declared download-failed outright.
    pub max_transfer_relaunches: u32,

    /// Ask the grid to place retries at a fresh execution site. Leave
    /// off when the input is replicated at only a few sites.
    pub use_fresh_site: bool,
}

impl MonitorConfig {
    /// Creates a configuration with defaults tuned for a production grid.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            poll_interval: Duration::from_secs(30),
            stuck_threshold: Duration::from_secs(7200), // two hours
            download_stuck_threshold: Duration::from_secs(3600), // one hour
            submission_retry_limit: 3,
            download_retry_limit: 3,
            max_concurrent_downloads: 3,
            max_transfer_relaunches: 5,
            use_fresh_site: false,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - SHEPHERD_OUTPUT_DIR (required)
    /// - SHEPHERD_POLL_INTERVAL (optional, seconds, default: 30)
    /// - SHEPHERD_STUCK_THRESHOLD (optional, seconds, default: 7200)
    /// - SHEPHERD_DOWNLOAD_STUCK_THRESHOLD (optional, seconds, default: 3600)
    /// - SHEPHERD_SUBMISSION_RETRY_LIMIT (optional, default: 3)
    /// - SHEPHERD_DOWNLOAD_RETRY_LIMIT (optional, default: 3)
    /// - SHEPHERD_MAX_CONCURRENT_DOWNLOADS (optional, default: 3)
    /// - SHEPHERD_MAX_TRANSFER_RELAUNCHES (optional, default: 5)
    /// - SHEPHERD_USE_FRESH_SITE (optional, "1" to enable)
    pub fn from_env() -> anyhow::Result<Self> {
        let output_dir = std::env::var("SHEPHERD_OUTPUT_DIR")
            .map_err(|_| anyhow::anyhow!("SHEPHERD_OUTPUT_DIR environment variable not set"))?;

        let mut config = Self::new(output_dir);

        if let Some(secs) = env_u64("SHEPHERD_POLL_INTERVAL") {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("SHEPHERD_STUCK_THRESHOLD") {
            config.stuck_threshold = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("SHEPHERD_DOWNLOAD_STUCK_THRESHOLD") {
            config.download_stuck_threshold = Duration::from_secs(secs);
        }
        if let Some(n) = env_u64("SHEPHERD_SUBMISSION_RETRY_LIMIT") {
            config.submission_retry_limit = n as u32;
        }
        if let Some(n) = env_u64("SHEPHERD_DOWNLOAD_RETRY_LIMIT") {
            config.download_retry_limit = n as u32;
        }
        if let Some(n) = env_u64("SHEPHERD_MAX_CONCURRENT_DOWNLOADS") {
            config.max_concurrent_downloads = n as usize;
        }
        if let Some(n) = env_u64("SHEPHERD_MAX_TRANSFER_RELAUNCHES") {
            config.max_transfer_relaunches = n as u32;
        }
        config.use_fresh_site =
            std::env::var("SHEPHERD_USE_FRESH_SITE").is_ok_and(|v| v == "1");

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            anyhow::bail!("output_dir cannot be empty");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.submission_retry_limit == 0 {
            anyhow::bail!("submission_retry_limit must be greater than 0");
        }

        if self.download_retry_limit == 0 {
            anyhow::bail!("download_retry_limit must be greater than 0");
        }

        if self.max_concurrent_downloads == 0 {
            anyhow::bail!("max_concurrent_downloads must be greater than 0");
        }

        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new("shepherd-output")
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.stuck_threshold, Duration::from_secs(7200));
        assert_eq!(config.download_stuck_threshold, Duration::from_secs(3600));
        assert_eq!(config.max_concurrent_downloads, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = MonitorConfig::default();
        assert!(config.validate().is_ok());

        config.output_dir = PathBuf::new();
        assert!(config.validate().is_err());

        config = MonitorConfig::default();
        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        config = MonitorConfig::default();
        config.max_concurrent_downloads = 0;
        assert!(config.validate().is_err());

        config = MonitorConfig::default();
        config.submission_retry_limit = 0;
        assert!(config.validate().is_err());
    }
}
