//! Cluster API client abstraction.
//!
//! API-backed devices talk to the benchmark candidate's HTTP API through
//! `ClusterClient`. The framework itself only needs the four read-only
//! endpoints below; embedders plug in a real transport, while
//! `StaticClusterClient` serves canned documents for tests and offline
//! post-processing.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::TelemetryError;

/// Read-only view of a running cluster.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Root endpoint: distribution version and build revision.
    async fn info(&self) -> Result<Value, TelemetryError>;

    /// Per-node static info (JVM, OS, attributes) for the nodes matching
    /// `selector`; devices pass `"_all"`.
    async fn nodes_info(&self, selector: &str) -> Result<Value, TelemetryError>;

    /// Per-node runtime stats for the given `metric` group; devices pass
    /// `"_all"`.
    async fn nodes_stats(&self, metric: &str) -> Result<Value, TelemetryError>;

    /// Index-level stats for the given `metric` group at `level`
    /// granularity; devices pass `"_all"` and `"shards"` and ask for
    /// per-extension segment file sizes.
    async fn indices_stats(
        &self,
        metric: &str,
        level: &str,
        include_segment_file_sizes: bool,
    ) -> Result<Value, TelemetryError>;
}

/// `ClusterClient` serving canned JSON documents.
///
/// The nodes-stats document can be swapped while the client is shared, so a
/// test can present different GC counters at benchmark start and stop.
#[derive(Debug, Default)]
pub struct StaticClusterClient {
    info: Value,
    nodes_info: Value,
    nodes_stats: RwLock<Value>,
    indices_stats: Value,
}

impl StaticClusterClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_info(mut self, doc: Value) -> Self {
        self.info = doc;
        self
    }

    pub fn with_nodes_info(mut self, doc: Value) -> Self {
        self.nodes_info = doc;
        self
    }

    pub fn with_nodes_stats(mut self, doc: Value) -> Self {
        self.nodes_stats = RwLock::new(doc);
        self
    }

    pub fn with_indices_stats(mut self, doc: Value) -> Self {
        self.indices_stats = doc;
        self
    }

    /// Replace the nodes-stats document served from now on.
    pub async fn set_nodes_stats(&self, doc: Value) {
        *self.nodes_stats.write().await = doc;
    }
}

#[async_trait]
impl ClusterClient for StaticClusterClient {
    async fn info(&self) -> Result<Value, TelemetryError> {
        Ok(self.info.clone())
    }

    async fn nodes_info(&self, _selector: &str) -> Result<Value, TelemetryError> {
        Ok(self.nodes_info.clone())
    }

    async fn nodes_stats(&self, _metric: &str) -> Result<Value, TelemetryError> {
        Ok(self.nodes_stats.read().await.clone())
    }

    async fn indices_stats(
        &self,
        _metric: &str,
        _level: &str,
        _include_segment_file_sizes: bool,
    ) -> Result<Value, TelemetryError> {
        Ok(self.indices_stats.clone())
    }
}

/// Walks `path` through nested JSON objects.
pub fn extract<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = doc;
    for key in path {
        current = current.get(key)?;
    }
    Some(current)
}

/// String at `path`, or `None` when absent or not a string.
pub fn extract_str<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a str> {
    extract(doc, path).and_then(Value::as_str)
}

/// Integer at `path`, or `None` when absent or not an integer.
pub fn extract_i64(doc: &Value, path: &[&str]) -> Option<i64> {
    extract(doc, path).and_then(Value::as_i64)
}

/// Descriptive string at `path`, with `"unknown"` as the fallback.
///
/// Non-string scalars are rendered as-is so numeric metadata such as core
/// counts end up without JSON quoting. A missing or null entry logs a
/// warning naming the metadata item and, when given, the node.
pub fn extract_meta(doc: &Value, path: &[&str], what: &str, node: Option<&str>) -> String {
    match extract(doc, path) {
        Some(Value::String(s)) => s.clone(),
        Some(other) if !other.is_null() => other.to_string(),
        _ => {
            match node {
                Some(node) => warn!("Could not determine [{}] for node [{}].", what, node),
                None => warn!("Could not determine [{}].", what),
            }
            "unknown".to_string()
        }
    }
}
