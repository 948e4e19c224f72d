//! Metrics sink interface.
//!
//! Devices report observations through `MetricsSink` as a side effect of
//! their lifecycle hooks. The storage backend behind the sink is not part of
//! this crate; `RecordingSink` is the in-memory implementation used by the
//! framework's own tests and by embedders that post-process a run in place.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::RwLock;

/// Scope of a meta-info entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaInfoScope {
    Cluster,
    Node,
}

/// Where devices record observations.
///
/// Called only from the dispatch task or the single CPU sampler, but
/// implementations must tolerate either, hence `Send + Sync`.
pub trait MetricsSink: Send + Sync {
    /// Record a cluster-level gauge-like value with a unit.
    fn put_value_cluster_level(&self, name: &str, value: f64, unit: &str);

    /// Record a node-level gauge-like value with a unit.
    fn put_value_node_level(&self, node: &str, name: &str, value: f64, unit: &str);

    /// Record a cluster-level count; the name carries the unit if any.
    fn put_count_cluster_level(&self, name: &str, count: i64);

    /// Record a node-level count with a unit.
    fn put_count_node_level(&self, node: &str, name: &str, count: i64, unit: &str);

    /// Record a descriptive key/value pair at cluster or node scope.
    fn add_meta_info(&self, scope: MetaInfoScope, node: Option<&str>, key: &str, value: &str);
}

/// The numeric payload of one observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    Value(f64),
    Count(i64),
}

/// One recorded numeric observation.
#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    /// `None` for cluster-level observations.
    pub node: Option<String>,
    pub name: String,
    pub kind: ObservationKind,
    pub unit: Option<String>,
}

/// One recorded meta-info entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetaInfoEntry {
    pub scope: MetaInfoScope,
    /// `None` for cluster scope.
    pub node: Option<String>,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Default)]
struct Recorded {
    observations: Vec<Observation>,
    meta: Vec<MetaInfoEntry>,
}

/// In-memory `MetricsSink` that records everything for later inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    recorded: RwLock<Recorded>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All observations in recording order.
    pub fn observations(&self) -> Vec<Observation> {
        self.recorded.read().unwrap().observations.clone()
    }

    /// All meta-info entries in recording order.
    pub fn meta_entries(&self) -> Vec<MetaInfoEntry> {
        self.recorded.read().unwrap().meta.clone()
    }

    /// True when nothing at all was recorded.
    pub fn is_empty(&self) -> bool {
        let recorded = self.recorded.read().unwrap();
        recorded.observations.is_empty() && recorded.meta.is_empty()
    }

    /// First cluster-level value observation under `name`.
    pub fn value_cluster(&self, name: &str) -> Option<f64> {
        self.recorded
            .read()
            .unwrap()
            .observations
            .iter()
            .find_map(|obs| match obs.kind {
                ObservationKind::Value(v) if obs.node.is_none() && obs.name == name => Some(v),
                _ => None,
            })
    }

    /// First node-level value observation under `name` for `node`.
    pub fn value_node(&self, node: &str, name: &str) -> Option<f64> {
        self.recorded
            .read()
            .unwrap()
            .observations
            .iter()
            .find_map(|obs| match obs.kind {
                ObservationKind::Value(v) if obs.node.as_deref() == Some(node) && obs.name == name => {
                    Some(v)
                }
                _ => None,
            })
    }

    /// All node-level value observations under `name` for `node`, in order.
    pub fn values_node(&self, node: &str, name: &str) -> Vec<f64> {
        self.recorded
            .read()
            .unwrap()
            .observations
            .iter()
            .filter_map(|obs| match obs.kind {
                ObservationKind::Value(v) if obs.node.as_deref() == Some(node) && obs.name == name => {
                    Some(v)
                }
                _ => None,
            })
            .collect()
    }

    /// First cluster-level count observation under `name`.
    pub fn count_cluster(&self, name: &str) -> Option<i64> {
        self.recorded
            .read()
            .unwrap()
            .observations
            .iter()
            .find_map(|obs| match obs.kind {
                ObservationKind::Count(c) if obs.node.is_none() && obs.name == name => Some(c),
                _ => None,
            })
    }

    /// First node-level count observation under `name` for `node`.
    pub fn count_node(&self, node: &str, name: &str) -> Option<i64> {
        self.recorded
            .read()
            .unwrap()
            .observations
            .iter()
            .find_map(|obs| match obs.kind {
                ObservationKind::Count(c) if obs.node.as_deref() == Some(node) && obs.name == name => {
                    Some(c)
                }
                _ => None,
            })
    }

    /// Cluster-scope meta-info value for `key`.
    pub fn meta_cluster(&self, key: &str) -> Option<String> {
        self.recorded
            .read()
            .unwrap()
            .meta
            .iter()
            .find(|entry| entry.scope == MetaInfoScope::Cluster && entry.key == key)
            .map(|entry| entry.value.clone())
    }

    /// Node-scope meta-info value for `key` on `node`.
    pub fn meta_node(&self, node: &str, key: &str) -> Option<String> {
        self.recorded
            .read()
            .unwrap()
            .meta
            .iter()
            .find(|entry| {
                entry.scope == MetaInfoScope::Node
                    && entry.node.as_deref() == Some(node)
                    && entry.key == key
            })
            .map(|entry| entry.value.clone())
    }

    fn record(&self, node: Option<&str>, name: &str, kind: ObservationKind, unit: Option<&str>) {
        let mut recorded = self.recorded.write().unwrap();
        recorded.observations.push(Observation {
            timestamp: Utc::now(),
            node: node.map(str::to_string),
            name: name.to_string(),
            kind,
            unit: unit.map(str::to_string),
        });
    }
}

impl MetricsSink for RecordingSink {
    fn put_value_cluster_level(&self, name: &str, value: f64, unit: &str) {
        self.record(None, name, ObservationKind::Value(value), Some(unit));
    }

    fn put_value_node_level(&self, node: &str, name: &str, value: f64, unit: &str) {
        self.record(Some(node), name, ObservationKind::Value(value), Some(unit));
    }

    fn put_count_cluster_level(&self, name: &str, count: i64) {
        self.record(None, name, ObservationKind::Count(count), None);
    }

    fn put_count_node_level(&self, node: &str, name: &str, count: i64, unit: &str) {
        self.record(Some(node), name, ObservationKind::Count(count), Some(unit));
    }

    fn add_meta_info(&self, scope: MetaInfoScope, node: Option<&str>, key: &str, value: &str) {
        let mut recorded = self.recorded.write().unwrap();
        recorded.meta.push(MetaInfoEntry {
            scope,
            node: node.map(str::to_string),
            key: key.to_string(),
            value: value.to_string(),
        });
    }
}
