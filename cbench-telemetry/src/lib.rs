//! Telemetry device framework for cbench benchmark runs.
//!
//! A benchmark run owns a [`registry::Telemetry`] holding an ordered set of
//! devices. The harness instruments the candidate's environment before
//! launch, attaches the registry to the cluster and to each node as they
//! come up, brackets the measured interval with benchmark start/stop, and
//! detaches again. Devices record their observations through a
//! [`metrics::MetricsSink`] as a side effect of those lifecycle events.
//!
//! ## Modules
//!
//! - [`registry`]: Device ownership, enablement, and lifecycle dispatch
//! - [`device`]: The device trait and catalog rows
//! - [`devices`]: The device implementations
//! - [`client`]: Cluster management-API abstraction and JSON extraction
//! - [`metrics`]: Metrics sink interface and in-memory recording sink
//! - [`sysstats`]: Linux counter collection from /proc
//! - [`error`]: The telemetry error taxonomy

// Use deny instead of forbid to allow one override in sysstats, where
// reading the clock tick rate requires a libc call.
#![deny(unsafe_code)]

pub mod client;
pub mod device;
pub mod devices;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod sysstats;

pub use client::{
    ClusterClient, StaticClusterClient, extract, extract_i64, extract_meta, extract_str,
};
pub use device::{DeviceInfo, TelemetryDevice};
pub use devices::{
    CpuUsage, DiskIo, EnvironmentInfo, ExternalEnvironmentInfo, FlightRecorder, GcLog, IndexSize,
    IndexStats, JAVA_TOOL_OPTIONS, JitCompiler, MergeParts, NodeStats, PerfStat,
};
pub use error::TelemetryError;
pub use metrics::{
    MetaInfoEntry, MetaInfoScope, MetricsSink, Observation, ObservationKind, RecordingSink,
};
pub use registry::Telemetry;
pub use sysstats::IoCounters;
