//! Telemetry device trait.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

use cbench_common::{Candidate, Cluster, Node};

use crate::error::TelemetryError;

/// A single telemetry device.
///
/// The registry drives every device through the same lifecycle:
/// `instrument_env` before the candidate process is assembled, the attach
/// hooks around process startup, the benchmark hooks around the measured
/// interval, and the detach hooks around shutdown. Devices override only the
/// hooks they care about; the defaults do nothing.
#[async_trait]
pub trait TelemetryDevice: Send + Sync {
    /// Internal devices are always active and never shown in the catalog.
    fn internal(&self) -> bool;

    /// Name under which the device is enabled in the configuration.
    fn command(&self) -> &'static str;

    /// Human-readable name shown in the catalog.
    fn human_name(&self) -> &'static str {
        ""
    }

    /// One-line description shown in the catalog.
    fn help(&self) -> &'static str {
        ""
    }

    /// Environment variables this device contributes to the candidate
    /// process. Errors here abort candidate setup.
    async fn instrument_env(
        &self,
        _candidate: &Candidate,
        _candidate_id: &str,
    ) -> Result<BTreeMap<String, String>, TelemetryError> {
        Ok(BTreeMap::new())
    }

    /// Called once after the cluster topology is known, before any node hook.
    async fn attach_to_cluster(&mut self, _cluster: &Cluster) -> Result<(), TelemetryError> {
        Ok(())
    }

    /// Called once per started node.
    async fn attach_to_node(&mut self, _node: &Node) -> Result<(), TelemetryError> {
        Ok(())
    }

    /// Called once per node before it is shut down.
    async fn detach_from_node(&mut self, _node: &Node) -> Result<(), TelemetryError> {
        Ok(())
    }

    /// Called once after all node detach hooks ran.
    async fn detach_from_cluster(&mut self, _cluster: &Cluster) -> Result<(), TelemetryError> {
        Ok(())
    }

    /// Called when the measured interval begins.
    async fn on_benchmark_start(&mut self) -> Result<(), TelemetryError> {
        Ok(())
    }

    /// Called when the measured interval ends.
    async fn on_benchmark_stop(&mut self) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Catalog row describing a user-selectable device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub command: String,
    pub human_name: String,
    pub help: String,
}
