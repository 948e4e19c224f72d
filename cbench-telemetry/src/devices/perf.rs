//! perf stat profiling device.

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::fs::{File, OpenOptions};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use cbench_common::{BenchConfig, Node};

use crate::device::TelemetryDevice;
use crate::devices::ensure_log_dir;
use crate::error::TelemetryError;

/// Bounded wait for perf to exit after the interrupt.
const DETACH_TIMEOUT: Duration = Duration::from_secs(10);

/// Attaches `perf stat` to a node's OS process for the duration of the run.
///
/// Attach opens a per-node log file in append mode and spawns perf with
/// both output streams redirected into it. Detach interrupts perf so it
/// dumps its counters, waits a bounded time for it to exit, and releases
/// the log handle on every path. Perf is never force-killed; a perf that
/// ignores the interrupt is left behind with a warning.
pub struct PerfStat {
    config: Arc<BenchConfig>,
    process: Option<Child>,
    log: Option<File>,
}

impl PerfStat {
    pub fn new(config: Arc<BenchConfig>) -> Self {
        Self {
            config,
            process: None,
            log: None,
        }
    }
}

fn perf_stat_command(pid: u32) -> Command {
    let mut command = Command::new("perf");
    command.arg("stat").arg("-p").arg(pid.to_string());
    command
}

#[async_trait]
impl TelemetryDevice for PerfStat {
    fn internal(&self) -> bool {
        false
    }

    fn command(&self) -> &'static str {
        "perf"
    }

    fn human_name(&self) -> &'static str {
        "perf stat"
    }

    fn help(&self) -> &'static str {
        "Reads CPU PMU counters (requires Linux and perf)"
    }

    async fn attach_to_node(&mut self, node: &Node) -> Result<(), TelemetryError> {
        let Some(pid) = node.pid else {
            warn!("perf stat: Node [{}] has no process id, not attaching.", node.name);
            return Ok(());
        };

        let log_dir = ensure_log_dir(&self.config).await?;
        let log_path = log_dir.join(format!("{}.perf.log", node.name));
        let log = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&log_path)
            .map_err(|e| {
                TelemetryError::SetupFailed(format!(
                    "Could not open perf log [{}]: {}",
                    log_path.display(),
                    e
                ))
            })?;
        info!(
            "{}: Writing perf logs to [{}]",
            self.human_name(),
            log_path.display()
        );

        let stdout = log.try_clone().map_err(|e| {
            TelemetryError::SetupFailed(format!("Could not duplicate perf log handle: {}", e))
        })?;
        let stderr = log.try_clone().map_err(|e| {
            TelemetryError::SetupFailed(format!("Could not duplicate perf log handle: {}", e))
        })?;
        let process = perf_stat_command(pid)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| {
                TelemetryError::SetupFailed(format!(
                    "Could not attach perf to node [{}]: {}",
                    node.name, e
                ))
            })?;

        self.process = Some(process);
        self.log = Some(log);
        Ok(())
    }

    async fn detach_from_node(&mut self, node: &Node) -> Result<(), TelemetryError> {
        if let Some(mut process) = self.process.take() {
            info!("Dumping PMU counters for node [{}]", node.name);
            if let Some(pid) = process.id() {
                if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
                    warn!("Could not interrupt perf stat: {}", e);
                }
            }
            match tokio::time::timeout(DETACH_TIMEOUT, process.wait()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("Error while waiting for perf stat to exit: {}", e),
                Err(_) => warn!("perf stat did not terminate"),
            }
        }
        // The log handle is released even when perf never started or never
        // exited.
        self.log = None;
        Ok(())
    }
}
