//! Index statistics device.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::client::{ClusterClient, extract, extract_i64};
use crate::device::TelemetryDevice;
use crate::error::TelemetryError;
use crate::metrics::MetricsSink;

/// Lucene file extensions whose on-disk sizes are reported.
const SEGMENT_FILE_EXTENSIONS: [&str; 14] = [
    "dii", "doc", "fdx", "dim", "fdt", "fnm", "dvd", "dvm", "tip", "tim", "si", "nvd", "nvm",
    "pos",
];

/// Integer leaf under the primaries section. A zero is treated like an
/// absent value: the stat was never exercised, so nothing is reported.
fn primaries_value(primaries: &Value, path: &[&str]) -> Option<i64> {
    let value = extract_i64(primaries, path);
    if value.is_none() {
        warn!("Could not determine the value at path [{}].", path.join(","));
    }
    value.filter(|v| *v != 0)
}

/// Reports index-level statistics once, after the benchmark.
///
/// One stats query with the segment file-size breakdown covers everything;
/// all observations are cluster-level and derived from the primaries
/// totals.
pub struct IndexStats {
    client: Arc<dyn ClusterClient>,
    sink: Arc<dyn MetricsSink>,
}

impl IndexStats {
    pub fn new(client: Arc<dyn ClusterClient>, sink: Arc<dyn MetricsSink>) -> Self {
        Self { client, sink }
    }

    fn report_count(&self, primaries: &Value, path: &[&str], name: &str) {
        if let Some(value) = primaries_value(primaries, path) {
            self.sink.put_count_cluster_level(name, value);
        }
    }

    fn report_value(&self, primaries: &Value, path: &[&str], name: &str, unit: &str) {
        if let Some(value) = primaries_value(primaries, path) {
            self.sink.put_value_cluster_level(name, value as f64, unit);
        }
    }
}

#[async_trait]
impl TelemetryDevice for IndexStats {
    fn internal(&self) -> bool {
        true
    }

    fn command(&self) -> &'static str {
        "internal"
    }

    async fn on_benchmark_stop(&mut self) -> Result<(), TelemetryError> {
        info!("Gathering indices stats");
        let stats = self.client.indices_stats("_all", "shards", true).await?;
        let Some(primaries) = extract(&stats, &["_all", "primaries"]) else {
            warn!("The indices stats response has no primaries section, skipping index statistics.");
            return Ok(());
        };

        self.report_count(primaries, &["segments", "count"], "segments_count");
        self.report_value(
            primaries,
            &["segments", "memory_in_bytes"],
            "segments_memory_in_bytes",
            "byte",
        );
        self.report_value(
            primaries,
            &["segments", "doc_values_memory_in_bytes"],
            "segments_doc_values_memory_in_bytes",
            "byte",
        );
        self.report_value(
            primaries,
            &["segments", "stored_fields_memory_in_bytes"],
            "segments_stored_fields_memory_in_bytes",
            "byte",
        );
        self.report_value(
            primaries,
            &["segments", "terms_memory_in_bytes"],
            "segments_terms_memory_in_bytes",
            "byte",
        );
        self.report_value(
            primaries,
            &["segments", "norms_memory_in_bytes"],
            "segments_norms_memory_in_bytes",
            "byte",
        );
        self.report_value(
            primaries,
            &["segments", "points_memory_in_bytes"],
            "segments_points_memory_in_bytes",
            "byte",
        );
        self.report_value(
            primaries,
            &["merges", "total_time_in_millis"],
            "merges_total_time",
            "ms",
        );
        self.report_value(
            primaries,
            &["merges", "total_throttled_time_in_millis"],
            "merges_total_throttled_time",
            "ms",
        );
        self.report_value(
            primaries,
            &["indexing", "index_time_in_millis"],
            "indexing_total_time",
            "ms",
        );
        self.report_value(
            primaries,
            &["refresh", "total_time_in_millis"],
            "refresh_total_time",
            "ms",
        );
        self.report_value(
            primaries,
            &["flush", "total_time_in_millis"],
            "flush_total_time",
            "ms",
        );

        for extension in SEGMENT_FILE_EXTENSIONS {
            self.report_value(
                primaries,
                &["segments", "file_sizes", extension, "size_in_bytes"],
                &format!("{}_size_in_bytes", extension),
                "byte",
            );
        }
        Ok(())
    }
}
