//! File-transfer tool management
//!
//! Output datasets are fetched by an external transfer tool spawned once
//! per job. The monitor never waits on the process; it polls the handle
//! for liveness each cycle and kills it when a transfer goes stale.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use tracing::{debug, info, warn};

use crate::error::Result;

/// A running transfer subprocess.
///
/// Deliberately narrow: liveness and termination are the only two things
/// the monitor is allowed to do with a transfer. Success or failure of
/// the fetch itself is judged afterwards by validating what landed on
/// disk, not by the process result.
pub trait TransferHandle: Send {
    /// Non-blocking check whether the process has exited.
    fn has_exited(&mut self) -> bool;

    /// Terminates the process. Used when a transfer exceeds its stuck
    /// threshold and will be relaunched from scratch.
    fn kill(&mut self) -> Result<()>;
}

/// Spawns transfer subprocesses.
pub trait TransferClient: Send + Sync {
    /// Starts fetching `container` into `dest`. Files land under
    /// `dest/<dataset>/<file>`; that layout is what validation reads.
    fn begin_fetch(&self, container: &str, dest: &Path) -> Result<Box<dyn TransferHandle>>;
}

/// Transfer client that shells out to an external fetch tool.
///
/// The tool is invoked as `<tool> <container>` with the destination
/// directory as working directory, optionally behind an environment setup
/// script that is sourced first (grid transfer tools tend to need one).
pub struct ProcessTransferClient {
    tool: String,
    setup_script: Option<PathBuf>,
}

impl ProcessTransferClient {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            setup_script: None,
        }
    }

    /// Sources `script` before running the tool.
    pub fn with_setup_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.setup_script = Some(script.into());
        self
    }

    fn command_line(&self, container: &str) -> String {
        match &self.setup_script {
            Some(script) => format!(". {}; {} {}", script.display(), self.tool, container),
            None => format!("{} {}", self.tool, container),
        }
    }
}

impl TransferClient for ProcessTransferClient {
    fn begin_fetch(&self, container: &str, dest: &Path) -> Result<Box<dyn TransferHandle>> {
        std::fs::create_dir_all(dest)?;

        let line = self.command_line(container);
        info!("starting transfer: {}", line);

        let child = Command::new("sh")
            .arg("-c")
            .arg(&line)
            .current_dir(dest)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        debug!("transfer pid {} for {}", child.id(), container);
        Ok(Box::new(ProcessTransferHandle { child }))
    }
}

struct ProcessTransferHandle {
    child: Child,
}

impl TransferHandle for ProcessTransferHandle {
    fn has_exited(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!("transfer pid {} exited with {}", self.child.id(), status);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("could not poll transfer pid {}: {}", self.child.id(), e);
                false
            }
        }
    }

    fn kill(&mut self) -> Result<()> {
        self.child.kill()?;
        // Reap so the pid does not linger as a zombie.
        let _ = self.child.wait();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    /// Polls a handle until it reports exit or the deadline passes.
    fn wait_for_exit(handle: &mut Box<dyn TransferHandle>, deadline: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if handle.has_exited() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_command_line_without_setup() {
        let client = ProcessTransferClient::new("dget");
        assert_eq!(client.command_line("user.out/"), "dget user.out/");
    }

    #[test]
    fn test_command_line_sources_setup_script() {
        let client = ProcessTransferClient::new("dget").with_setup_script("/opt/grid/setup.sh");
        assert_eq!(
            client.command_line("user.out/"),
            ". /opt/grid/setup.sh; dget user.out/"
        );
    }

    #[test]
    fn test_fetch_process_exits() {
        let dir = TempDir::new().unwrap();
        let client = ProcessTransferClient::new("echo");
        let mut handle = client.begin_fetch("anything", dir.path()).unwrap();
        assert!(wait_for_exit(&mut handle, Duration::from_secs(5)));
        // Exited handles keep reporting exited.
        assert!(handle.has_exited());
    }

    #[test]
    fn test_fetch_creates_destination() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("downloads");
        let client = ProcessTransferClient::new("true");
        let mut handle = client.begin_fetch("x", &dest).unwrap();
        assert!(dest.is_dir());
        assert!(wait_for_exit(&mut handle, Duration::from_secs(5)));
    }

    #[test]
    fn test_kill_stops_running_transfer() {
        let dir = TempDir::new().unwrap();
        // "sleep 30" outlives the test unless the kill works.
        let client = ProcessTransferClient::new("sleep");
        let mut handle = client.begin_fetch("30", dir.path()).unwrap();
        assert!(!handle.has_exited());
        handle.kill().unwrap();
        assert!(wait_for_exit(&mut handle, Duration::from_secs(5)));
    }
}
