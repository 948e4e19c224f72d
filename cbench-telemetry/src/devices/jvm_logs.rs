//! JVM log instrumentation devices.
//!
//! Flight recorder, JIT compiler log, and GC log devices contribute JVM
//! flags to the candidate's environment and ensure the log directory
//! exists. They keep no state across calls; several of them can be enabled
//! at once because the registry appends their flags to the same variable.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use cbench_common::{BenchConfig, Candidate};

use crate::device::TelemetryDevice;
use crate::devices::ensure_log_dir;
use crate::error::TelemetryError;

/// Environment variable the JVM reads additional startup flags from.
pub const JAVA_TOOL_OPTIONS: &str = "JAVA_TOOL_OPTIONS";

/// Enables Java Flight Recorder on the candidate JVM.
pub struct FlightRecorder {
    config: Arc<BenchConfig>,
}

impl FlightRecorder {
    pub fn new(config: Arc<BenchConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TelemetryDevice for FlightRecorder {
    fn internal(&self) -> bool {
        false
    }

    fn command(&self) -> &'static str {
        "jfr"
    }

    fn human_name(&self) -> &'static str {
        "Flight Recorder"
    }

    fn help(&self) -> &'static str {
        "Enables Java Flight Recorder (requires an Oracle JDK)"
    }

    async fn instrument_env(
        &self,
        candidate: &Candidate,
        candidate_id: &str,
    ) -> Result<BTreeMap<String, String>, TelemetryError> {
        let log_dir = ensure_log_dir(&self.config).await?;
        let log_file = log_dir.join(format!("{}-{}.jfr", candidate.name, candidate_id));
        info!(
            "{}: Writing flight recording to [{}]",
            self.human_name(),
            log_file.display()
        );
        let flags = format!(
            "-XX:+UnlockDiagnosticVMOptions -XX:+UnlockCommercialFeatures -XX:+DebugNonSafepoints \
             -XX:+FlightRecorder \
             -XX:FlightRecorderOptions=disk=true,maxage=0s,maxsize=0,dumponexit=true,dumponexitpath={} \
             -XX:StartFlightRecording=defaultrecording=true",
            log_file.display()
        );
        Ok(BTreeMap::from([(JAVA_TOOL_OPTIONS.to_string(), flags)]))
    }
}

/// Enables JIT compiler logging on the candidate JVM.
pub struct JitCompiler {
    config: Arc<BenchConfig>,
}

impl JitCompiler {
    pub fn new(config: Arc<BenchConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TelemetryDevice for JitCompiler {
    fn internal(&self) -> bool {
        false
    }

    fn command(&self) -> &'static str {
        "jit"
    }

    fn human_name(&self) -> &'static str {
        "JIT Compiler Profiler"
    }

    fn help(&self) -> &'static str {
        "Enables JIT compiler logs."
    }

    async fn instrument_env(
        &self,
        candidate: &Candidate,
        candidate_id: &str,
    ) -> Result<BTreeMap<String, String>, TelemetryError> {
        let log_dir = ensure_log_dir(&self.config).await?;
        let log_file = log_dir.join(format!("{}-{}.jit.log", candidate.name, candidate_id));
        info!(
            "{}: Writing JIT compiler log to [{}]",
            self.human_name(),
            log_file.display()
        );
        let flags = format!(
            "-XX:+UnlockDiagnosticVMOptions -XX:+TraceClassLoading -XX:+LogCompilation \
             -XX:LogFile={} -XX:+PrintAssembly",
            log_file.display()
        );
        Ok(BTreeMap::from([(JAVA_TOOL_OPTIONS.to_string(), flags)]))
    }
}

/// Enables GC logging on the candidate JVM.
pub struct GcLog {
    config: Arc<BenchConfig>,
}

impl GcLog {
    pub fn new(config: Arc<BenchConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TelemetryDevice for GcLog {
    fn internal(&self) -> bool {
        false
    }

    fn command(&self) -> &'static str {
        "gc"
    }

    fn human_name(&self) -> &'static str {
        "GC log"
    }

    fn help(&self) -> &'static str {
        "Enables GC logs."
    }

    async fn instrument_env(
        &self,
        candidate: &Candidate,
        candidate_id: &str,
    ) -> Result<BTreeMap<String, String>, TelemetryError> {
        let log_dir = ensure_log_dir(&self.config).await?;
        let log_file = log_dir.join(format!("{}-{}.gc.log", candidate.name, candidate_id));
        info!(
            "{}: Writing GC log to [{}]",
            self.human_name(),
            log_file.display()
        );
        let flags = format!(
            "-Xloggc:{} -XX:+PrintGCDetails -XX:+PrintGCDateStamps -XX:+PrintGCTimeStamps \
             -XX:+PrintGCApplicationStoppedTime -XX:+PrintGCApplicationConcurrentTime \
             -XX:+PrintTenuringDistribution",
            log_file.display()
        );
        Ok(BTreeMap::from([(JAVA_TOOL_OPTIONS.to_string(), flags)]))
    }
}
