//! GC time statistics device (diff of cluster stats).

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use crate::client::{ClusterClient, extract_i64, extract_str};
use crate::device::TelemetryDevice;
use crate::error::TelemetryError;
use crate::metrics::MetricsSink;

/// Cumulative collection times in milliseconds, as reported by the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GcTimes {
    young_millis: i64,
    old_millis: i64,
}

/// Per-node GC times from a nodes-stats document, keyed by node name.
/// Nodes with incomplete GC data are skipped with a warning.
fn gc_snapshot(stats: &Value) -> BTreeMap<String, GcTimes> {
    let mut snapshot = BTreeMap::new();
    let Some(nodes) = stats.get("nodes").and_then(Value::as_object) else {
        return snapshot;
    };
    for node_doc in nodes.values() {
        let Some(name) = extract_str(node_doc, &["name"]) else {
            warn!("Skipping a node without a name in the nodes stats response.");
            continue;
        };
        let young = extract_i64(
            node_doc,
            &["jvm", "gc", "collectors", "young", "collection_time_in_millis"],
        );
        let old = extract_i64(
            node_doc,
            &["jvm", "gc", "collectors", "old", "collection_time_in_millis"],
        );
        match (young, old) {
            (Some(young_millis), Some(old_millis)) => {
                snapshot.insert(
                    name.to_string(),
                    GcTimes {
                        young_millis,
                        old_millis,
                    },
                );
            }
            _ => warn!("Cannot determine GC times for node [{}].", name),
        }
    }
    snapshot
}

/// Reports GC time spent during the benchmark, per node and cluster-wide.
///
/// The cluster only exposes cumulative collection times, so the device
/// snapshots them at benchmark start and subtracts at stop. Nodes that
/// joined mid-run have no baseline and are skipped.
pub struct NodeStats {
    client: Arc<dyn ClusterClient>,
    sink: Arc<dyn MetricsSink>,
    start: BTreeMap<String, GcTimes>,
}

impl NodeStats {
    pub fn new(client: Arc<dyn ClusterClient>, sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            client,
            sink,
            start: BTreeMap::new(),
        }
    }
}

#[async_trait]
impl TelemetryDevice for NodeStats {
    fn internal(&self) -> bool {
        true
    }

    fn command(&self) -> &'static str {
        "internal"
    }

    async fn on_benchmark_start(&mut self) -> Result<(), TelemetryError> {
        let stats = self.client.nodes_stats("_all").await?;
        self.start = gc_snapshot(&stats);
        Ok(())
    }

    async fn on_benchmark_stop(&mut self) -> Result<(), TelemetryError> {
        let stats = self.client.nodes_stats("_all").await?;
        let end = gc_snapshot(&stats);
        let start = std::mem::take(&mut self.start);

        let mut total_young = 0i64;
        let mut total_old = 0i64;
        for (name, end_times) in &end {
            let Some(start_times) = start.get(name) else {
                warn!(
                    "Cannot determine GC times for node [{}]. It was not part of the cluster at the start of the benchmark.",
                    name
                );
                continue;
            };
            let young = end_times.young_millis - start_times.young_millis;
            let old = end_times.old_millis - start_times.old_millis;
            total_young += young;
            total_old += old;
            self.sink
                .put_value_node_level(name, "node_young_gen_gc_time", young as f64, "ms");
            self.sink
                .put_value_node_level(name, "node_old_gen_gc_time", old as f64, "ms");
        }
        self.sink
            .put_value_cluster_level("node_total_young_gen_gc_time", total_young as f64, "ms");
        self.sink
            .put_value_cluster_level("node_total_old_gen_gc_time", total_old as f64, "ms");
        Ok(())
    }
}
