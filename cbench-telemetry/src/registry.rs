//! Device registry and lifecycle dispatch.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use cbench_common::{BenchConfig, Candidate, Cluster, Node};

use crate::device::{DeviceInfo, TelemetryDevice};
use crate::error::TelemetryError;

/// Owns the device set for one benchmark run and fans lifecycle events out
/// to the enabled subset.
///
/// Dispatch is strictly sequential in registration order. Devices never run
/// in parallel, so environment merging is deterministic and no device races
/// another's sink or log writes. Errors from a device hook propagate to the
/// caller unchanged; the registry neither swallows nor retries.
pub struct Telemetry {
    devices: Vec<Box<dyn TelemetryDevice>>,
    enabled: BTreeSet<String>,
}

impl Telemetry {
    /// Builds the registry, deriving the enabled set from the
    /// `telemetry.devices` setting (comma-separated command names).
    pub fn new(config: &BenchConfig, devices: Vec<Box<dyn TelemetryDevice>>) -> Self {
        let enabled = config
            .opts_optional("telemetry", "devices")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Self { devices, enabled }
    }

    fn is_enabled(enabled: &BTreeSet<String>, device: &dyn TelemetryDevice) -> bool {
        device.internal() || enabled.contains(device.command())
    }

    /// Catalog rows for the user-selectable devices, in registration order.
    pub fn list(&self) -> Vec<DeviceInfo> {
        self.devices
            .iter()
            .filter(|device| !device.internal())
            .map(|device| DeviceInfo {
                command: device.command().to_string(),
                human_name: device.human_name().to_string(),
                help: device.help().to_string(),
            })
            .collect()
    }

    /// Collects environment variables from every enabled device.
    ///
    /// A variable contributed by several devices keeps all contributions:
    /// later values are appended after a single space, in device order, so
    /// devices can stack flags onto one variable without clobbering each
    /// other.
    pub async fn instrument_candidate_env(
        &self,
        candidate: &Candidate,
        candidate_id: &str,
    ) -> Result<BTreeMap<String, String>, TelemetryError> {
        let mut env: BTreeMap<String, String> = BTreeMap::new();
        for device in &self.devices {
            if Self::is_enabled(&self.enabled, device.as_ref()) {
                for (key, value) in device.instrument_env(candidate, candidate_id).await? {
                    match env.entry(key) {
                        Entry::Occupied(mut slot) => {
                            let merged = format!("{} {}", slot.get(), value);
                            slot.insert(merged);
                        }
                        Entry::Vacant(slot) => {
                            slot.insert(value);
                        }
                    }
                }
            }
        }
        Ok(env)
    }

    pub async fn attach_to_cluster(&mut self, cluster: &Cluster) -> Result<(), TelemetryError> {
        for device in &mut self.devices {
            if Self::is_enabled(&self.enabled, device.as_ref()) {
                device.attach_to_cluster(cluster).await?;
            }
        }
        Ok(())
    }

    pub async fn attach_to_node(&mut self, node: &Node) -> Result<(), TelemetryError> {
        for device in &mut self.devices {
            if Self::is_enabled(&self.enabled, device.as_ref()) {
                device.attach_to_node(node).await?;
            }
        }
        Ok(())
    }

    pub async fn detach_from_node(&mut self, node: &Node) -> Result<(), TelemetryError> {
        for device in &mut self.devices {
            if Self::is_enabled(&self.enabled, device.as_ref()) {
                device.detach_from_node(node).await?;
            }
        }
        Ok(())
    }

    pub async fn detach_from_cluster(&mut self, cluster: &Cluster) -> Result<(), TelemetryError> {
        for device in &mut self.devices {
            if Self::is_enabled(&self.enabled, device.as_ref()) {
                device.detach_from_cluster(cluster).await?;
            }
        }
        Ok(())
    }

    pub async fn on_benchmark_start(&mut self) -> Result<(), TelemetryError> {
        info!("Benchmark start");
        for device in &mut self.devices {
            if Self::is_enabled(&self.enabled, device.as_ref()) {
                device.on_benchmark_start().await?;
            }
        }
        Ok(())
    }

    pub async fn on_benchmark_stop(&mut self) -> Result<(), TelemetryError> {
        info!("Benchmark stop");
        for device in &mut self.devices {
            if Self::is_enabled(&self.enabled, device.as_ref()) {
                device.on_benchmark_stop().await?;
            }
        }
        Ok(())
    }
}
