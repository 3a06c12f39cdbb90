//! Shepherd Monitor
//!
//! A failure-tolerant control loop that babysits a batch of jobs on a
//! remote execution grid: submits them, polls their status, unsticks or
//! resubmits the ones that wedge or fail remotely, and downloads and
//! size-validates the output of the ones that finish.
//!
//! Architecture:
//! - Configuration: timeouts, retry ceilings, transfer cap, output directory
//! - Classification: remote status tokens -> local job state
//! - Retry controller: kill-and-resubmit for stuck and failed jobs
//! - Download manager: capped concurrent transfers plus manifest validation
//! - Monitor: the registry-owning polling loop that ties it together
//!
//! The loop is single-threaded and cooperative; the only true concurrency
//! is the transfer subprocesses, which are polled for liveness and never
//! awaited.

pub mod classify;
pub mod config;
pub mod download;
pub mod monitor;
pub mod retry;

pub use config::MonitorConfig;
pub use monitor::Monitor;
