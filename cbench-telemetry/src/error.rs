//! Telemetry failure classification.
//!
//! Setup problems abort instrumentation. Measurement problems cost a data
//! point: devices log them and continue, so most never surface as errors at
//! all. What does surface, such as a failed cluster API call, passes through
//! the lifecycle hooks unchanged and `is_fatal` tells the caller whether the
//! run must fail.

use cbench_common::ConfigError;

/// Errors that can occur while instrumenting a benchmark run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TelemetryError {
    #[error("Telemetry setup failed: {0}")]
    SetupFailed(String),

    #[error("Degraded measurement capability: {0}")]
    DegradedCapability(String),

    #[error("Missing telemetry data: {0}")]
    MissingData(String),

    #[error("External process did not exit within {timeout_secs}s")]
    ProcessTimeout { timeout_secs: u64 },

    #[error("Sampler failed: {0}")]
    SamplerFault(String),
}

impl TelemetryError {
    /// Whether the run must be failed. Setup failures are the only fatal
    /// class; everything else means a lost or less precise observation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SetupFailed(_))
    }
}

impl From<ConfigError> for TelemetryError {
    fn from(err: ConfigError) -> Self {
        Self::SetupFailed(err.to_string())
    }
}
