//! Common types used across cbench components.

use serde::{Deserialize, Serialize};

/// The system under benchmark for one run: a specific build/configuration
/// of the data-serving candidate. Immutable for the duration of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Candidate name, used to namespace telemetry log files.
    pub name: String,
}

impl Candidate {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl std::fmt::Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// One running process of the benchmarked cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node name as reported by the cluster.
    pub name: String,
    /// Host the node runs on.
    pub host: String,
    /// OS process id, present only when the harness launched the node locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

impl Node {
    pub fn new(name: impl Into<String>, host: impl Into<String>, pid: Option<u32>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            pid,
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.host)
    }
}

/// The set of nodes a benchmark run talks to. Used only to route lifecycle
/// events; clients and sinks are injected separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub nodes: Vec<Node>,
}

impl Cluster {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }
}
