//! Cluster and node metadata devices.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::warn;

use cbench_common::{BenchConfig, Cluster, Node};

use crate::client::{ClusterClient, extract_meta, extract_str};
use crate::device::TelemetryDevice;
use crate::error::TelemetryError;
use crate::metrics::{MetaInfoScope, MetricsSink};
use crate::sysstats;

/// Records the cluster's version identifiers as cluster-level meta-info and
/// mirrors them into the run configuration for downstream consumers.
async fn store_cluster_info(
    client: &dyn ClusterClient,
    sink: &dyn MetricsSink,
    config: &BenchConfig,
) -> Result<(), TelemetryError> {
    let info = client.info().await?;
    let revision = extract_meta(&info, &["version", "build_hash"], "source revision", None);
    let version = extract_meta(&info, &["version", "number"], "distribution version", None);
    sink.add_meta_info(MetaInfoScope::Cluster, None, "source_revision", &revision);
    sink.add_meta_info(MetaInfoScope::Cluster, None, "distribution_version", &version);
    config.add("meta", "source.revision", revision);
    config.add("source", "distribution.version", version);
    Ok(())
}

/// The per-node documents inside a nodes-info or nodes-stats response.
fn node_documents(doc: &Value) -> Vec<&Value> {
    doc.get("nodes")
        .and_then(Value::as_object)
        .map(|nodes| nodes.values().collect())
        .unwrap_or_default()
}

fn render_attribute(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Records each node attribute at node scope, and lifts an attribute to
/// cluster scope when every node that declares it agrees on its value.
fn store_node_attributes(sink: &dyn MetricsSink, nodes: &[&Value]) {
    let mut distinct: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for node_doc in nodes {
        let Some(name) = extract_str(node_doc, &["name"]) else {
            continue;
        };
        let Some(attributes) = node_doc.get("attributes").and_then(Value::as_object) else {
            continue;
        };
        for (key, value) in attributes {
            let attribute_key = format!("attribute_{}", key);
            let rendered = render_attribute(value);
            sink.add_meta_info(MetaInfoScope::Node, Some(name), &attribute_key, &rendered);
            distinct.entry(attribute_key).or_default().insert(rendered);
        }
    }
    for (key, values) in &distinct {
        if values.len() != 1 {
            continue;
        }
        if let Some(value) = values.first() {
            sink.add_meta_info(MetaInfoScope::Cluster, None, key, value);
        }
    }
}

/// Collects descriptive metadata for locally provisioned clusters.
///
/// Cluster identity and JVM details come from the management API. Hardware
/// and OS details come from local system inspection, since the harness runs
/// on the machine that hosts the nodes it launched.
pub struct EnvironmentInfo {
    config: Arc<BenchConfig>,
    client: Arc<dyn ClusterClient>,
    sink: Arc<dyn MetricsSink>,
}

impl EnvironmentInfo {
    pub fn new(
        config: Arc<BenchConfig>,
        client: Arc<dyn ClusterClient>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            config,
            client,
            sink,
        }
    }
}

#[async_trait]
impl TelemetryDevice for EnvironmentInfo {
    fn internal(&self) -> bool {
        true
    }

    fn command(&self) -> &'static str {
        "internal"
    }

    async fn attach_to_cluster(&mut self, _cluster: &Cluster) -> Result<(), TelemetryError> {
        store_cluster_info(self.client.as_ref(), self.sink.as_ref(), &self.config).await?;

        let info = self.client.nodes_info("_all").await?;
        let nodes = node_documents(&info);
        for node_doc in &nodes {
            let Some(name) = extract_str(node_doc, &["name"]) else {
                warn!("Skipping a node without a name in the nodes info response.");
                continue;
            };
            let vendor = extract_meta(node_doc, &["jvm", "vm_vendor"], "JVM vendor", Some(name));
            let version = extract_meta(node_doc, &["jvm", "version"], "JVM version", Some(name));
            self.sink
                .add_meta_info(MetaInfoScope::Node, Some(name), "jvm_vendor", &vendor);
            self.sink
                .add_meta_info(MetaInfoScope::Node, Some(name), "jvm_version", &version);
        }
        store_node_attributes(self.sink.as_ref(), &nodes);
        Ok(())
    }

    async fn attach_to_node(&mut self, node: &Node) -> Result<(), TelemetryError> {
        let probes = [
            ("os_name", sysstats::os_name()),
            ("os_version", sysstats::os_version()),
            (
                "cpu_logical_cores",
                sysstats::logical_cpu_cores().map(|n| n.to_string()),
            ),
            (
                "cpu_physical_cores",
                sysstats::physical_cpu_cores().map(|n| n.to_string()),
            ),
            ("cpu_model", sysstats::cpu_model_name()),
        ];
        for (key, probed) in probes {
            let value = probed.unwrap_or_else(|| "unknown".to_string());
            self.sink
                .add_meta_info(MetaInfoScope::Node, Some(&node.name), key, &value);
        }
        self.sink
            .add_meta_info(MetaInfoScope::Node, Some(&node.name), "node_name", &node.name);
        self.sink
            .add_meta_info(MetaInfoScope::Node, Some(&node.name), "host_name", &node.host);
        Ok(())
    }
}

/// Node-info metadata recorded for externally provisioned clusters.
const NODE_INFO_METADATA: [(&str, [&str; 2], &str); 5] = [
    ("os_name", ["os", "name"], "OS name"),
    ("os_version", ["os", "version"], "OS version"),
    (
        "cpu_logical_cores",
        ["os", "available_processors"],
        "CPU logical cores",
    ),
    ("jvm_vendor", ["jvm", "vm_vendor"], "JVM vendor"),
    ("jvm_version", ["jvm", "version"], "JVM version"),
];

/// Collects descriptive metadata for externally provisioned clusters.
///
/// The harness has no local view of the machines involved, so everything
/// comes from the management API, with `"unknown"` standing in for fields
/// the cluster does not report.
pub struct ExternalEnvironmentInfo {
    config: Arc<BenchConfig>,
    client: Arc<dyn ClusterClient>,
    sink: Arc<dyn MetricsSink>,
}

impl ExternalEnvironmentInfo {
    pub fn new(
        config: Arc<BenchConfig>,
        client: Arc<dyn ClusterClient>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            config,
            client,
            sink,
        }
    }
}

#[async_trait]
impl TelemetryDevice for ExternalEnvironmentInfo {
    fn internal(&self) -> bool {
        true
    }

    fn command(&self) -> &'static str {
        "internal"
    }

    async fn attach_to_cluster(&mut self, _cluster: &Cluster) -> Result<(), TelemetryError> {
        store_cluster_info(self.client.as_ref(), self.sink.as_ref(), &self.config).await?;

        let stats = self.client.nodes_stats("_all").await?;
        for node_doc in node_documents(&stats) {
            let Some(name) = extract_str(node_doc, &["name"]) else {
                warn!("Skipping a node without a name in the nodes stats response.");
                continue;
            };
            let host = extract_meta(node_doc, &["host"], "host name", Some(name));
            self.sink
                .add_meta_info(MetaInfoScope::Node, Some(name), "node_name", name);
            self.sink
                .add_meta_info(MetaInfoScope::Node, Some(name), "host_name", &host);
        }

        let info = self.client.nodes_info("_all").await?;
        let nodes = node_documents(&info);
        for node_doc in &nodes {
            let Some(name) = extract_str(node_doc, &["name"]) else {
                warn!("Skipping a node without a name in the nodes info response.");
                continue;
            };
            for (key, path, what) in NODE_INFO_METADATA {
                let value = extract_meta(node_doc, &path, what, Some(name));
                self.sink
                    .add_meta_info(MetaInfoScope::Node, Some(name), key, &value);
            }
        }
        store_node_attributes(self.sink.as_ref(), &nodes);
        Ok(())
    }
}
