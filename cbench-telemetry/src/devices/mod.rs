//! The device catalog.
//!
//! User-selectable devices instrument the candidate JVM (`jfr`, `jit`,
//! `gc`) or attach an external profiler (`perf`). Internal devices run on
//! every benchmark and collect statistics, metadata, and index footprint.

use std::path::PathBuf;

use cbench_common::BenchConfig;

use crate::error::TelemetryError;

mod cpu;
mod disk_io;
mod env_info;
mod index_size;
mod index_stats;
mod jvm_logs;
mod merge_parts;
mod node_stats;
mod perf;

pub use cpu::CpuUsage;
pub use disk_io::DiskIo;
pub use env_info::{EnvironmentInfo, ExternalEnvironmentInfo};
pub use index_size::IndexSize;
pub use index_stats::IndexStats;
pub use jvm_logs::{FlightRecorder, GcLog, JAVA_TOOL_OPTIONS, JitCompiler};
pub use merge_parts::MergeParts;
pub use node_stats::NodeStats;
pub use perf::PerfStat;

/// Resolves the telemetry log directory from configuration and creates it.
/// Failure to create it is a setup failure and aborts the run.
pub(crate) async fn ensure_log_dir(config: &BenchConfig) -> Result<PathBuf, TelemetryError> {
    let run_root = config.opts("system", "run.root.dir")?;
    let log_subdir = config.opts("benchmarks", "metrics.log.dir")?;
    let dir = PathBuf::from(run_root).join(log_subdir);
    tokio::fs::create_dir_all(&dir).await.map_err(|e| {
        TelemetryError::SetupFailed(format!(
            "Could not create telemetry log directory [{}]: {}",
            dir.display(),
            e
        ))
    })?;
    Ok(dir)
}
