//! Merge activity log aggregation device.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use cbench_common::BenchConfig;

use crate::device::TelemetryDevice;
use crate::error::TelemetryError;
use crate::metrics::MetricsSink;

lazy_static! {
    /// `: <millis> msec to merge <part> [<docs> docs]`
    static ref MERGE_TIME_PATTERN: Regex =
        Regex::new(r": (\d+) msec to merge ([a-z ]+) \[(\d+) docs\]")
            .expect("merge time pattern is valid");
}

/// Per merge part: summed elapsed milliseconds and summed document counts.
type MergeTotals = BTreeMap<String, (u64, u64)>;

fn scan_content(content: &str, totals: &mut MergeTotals) {
    for line in content.lines() {
        if let Some(captures) = MERGE_TIME_PATTERN.captures(line) {
            let millis: u64 = captures[1].parse().unwrap_or(0);
            let docs: u64 = captures[3].parse().unwrap_or(0);
            let entry = totals.entry(captures[2].to_string()).or_insert((0, 0));
            entry.0 += millis;
            entry.1 += docs;
        }
    }
}

async fn scan_directory(dir: &Path) -> MergeTotals {
    let mut totals = MergeTotals::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                "Cannot read candidate log directory [{}]: {}",
                dir.display(),
                e
            );
            return totals;
        }
    };
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(
                    "Stopping scan of candidate log directory [{}] early: {}",
                    dir.display(),
                    e
                );
                break;
            }
        };
        let path = entry.path();
        let is_file = entry
            .file_type()
            .await
            .map(|file_type| file_type.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }
        debug!("Analyzing merge parts in [{}]", path.display());
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => scan_content(&content, &mut totals),
            Err(e) => warn!("Skipping unreadable log file [{}]: {}", path.display(), e),
        }
    }
    totals
}

/// Aggregates merge times and document counts from the candidate's logs.
///
/// Runs entirely after the benchmark: every file in the candidate log
/// directory is scanned and matching lines are summed per merge part. A
/// part that never appears produces no observation, so "no data" stays
/// distinguishable from "zero".
pub struct MergeParts {
    config: Arc<BenchConfig>,
    sink: Arc<dyn MetricsSink>,
}

impl MergeParts {
    pub fn new(config: Arc<BenchConfig>, sink: Arc<dyn MetricsSink>) -> Self {
        Self { config, sink }
    }
}

#[async_trait]
impl TelemetryDevice for MergeParts {
    fn internal(&self) -> bool {
        true
    }

    fn command(&self) -> &'static str {
        "internal"
    }

    async fn on_benchmark_stop(&mut self) -> Result<(), TelemetryError> {
        let log_dir = self.config.opts("launcher", "candidate.log.dir")?;
        let totals = scan_directory(Path::new(&log_dir)).await;
        for (part, (millis, docs)) in &totals {
            let metric_part = part.replace(' ', "_");
            self.sink.put_value_cluster_level(
                &format!("merge_parts_total_time_{}", metric_part),
                *millis as f64,
                "ms",
            );
            self.sink.put_count_cluster_level(
                &format!("merge_parts_total_docs_{}", metric_part),
                *docs as i64,
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RecordingSink;
    use std::io::Write;
    use tracing::{Level, info};
    use tracing_subscriber::fmt;

    fn init_test_logging() {
        let _ = fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .try_init();
    }

    const SAMPLE_LOG: &str = "\
[2017-01-17T10:21:11,001][INFO ][index.merge] [bench0] [geonames][2] merge segment [_w]: 100 msec to merge doc values [500 docs]
[2017-01-17T10:21:11,930][INFO ][index.shard] [bench0] [geonames][2] refresh took 12 ms
[2017-01-17T10:21:12,014][INFO ][index.merge] [bench0] [geonames][2] merge segment [_x]: 250 msec to merge doc values [1350 docs]
[2017-01-17T10:21:12,507][INFO ][index.merge] [bench0] [geonames][2] merge segment [_x]: 40 msec to merge stored fields [1350 docs]
";

    #[test]
    fn test_pattern_extracts_time_part_and_docs() {
        init_test_logging();
        info!("TEST START: Merge pattern extraction");

        let captures = MERGE_TIME_PATTERN
            .captures("[index.merge] [bench0]: 250 msec to merge doc values [1350 docs]")
            .unwrap();
        assert_eq!(&captures[1], "250");
        assert_eq!(&captures[2], "doc values");
        assert_eq!(&captures[3], "1350");

        assert!(MERGE_TIME_PATTERN.captures("refresh took 12 ms").is_none());
        assert!(MERGE_TIME_PATTERN
            .captures(": 250 msec to merge Doc Values [1350 docs]")
            .is_none());

        info!("TEST PASS: Merge pattern extraction");
    }

    #[test]
    fn test_scan_content_sums_per_part() {
        init_test_logging();
        info!("TEST START: Merge scan sums per part");

        let mut totals = MergeTotals::new();
        scan_content(SAMPLE_LOG, &mut totals);

        assert_eq!(totals.get("doc values"), Some(&(350, 1850)));
        assert_eq!(totals.get("stored fields"), Some(&(40, 1350)));
        assert_eq!(totals.len(), 2);

        info!("TEST PASS: Merge scan sums per part");
    }

    fn merge_config(log_dir: &Path) -> Arc<BenchConfig> {
        let config = BenchConfig::new();
        config.add("launcher", "candidate.log.dir", log_dir.to_str().unwrap());
        Arc::new(config)
    }

    #[tokio::test]
    async fn test_reports_summed_observations_per_part() {
        init_test_logging();
        info!("TEST START: Merge parts end to end");

        let dir = tempfile::tempdir().unwrap();
        let mut log = std::fs::File::create(dir.path().join("candidate.log")).unwrap();
        log.write_all(SAMPLE_LOG.as_bytes()).unwrap();

        let sink = Arc::new(RecordingSink::new());
        let mut device = MergeParts::new(merge_config(dir.path()), sink.clone());
        device.on_benchmark_stop().await.unwrap();

        assert_eq!(
            sink.value_cluster("merge_parts_total_time_doc_values"),
            Some(350.0)
        );
        assert_eq!(
            sink.count_cluster("merge_parts_total_docs_doc_values"),
            Some(1850)
        );
        assert_eq!(
            sink.value_cluster("merge_parts_total_time_stored_fields"),
            Some(40.0)
        );
        assert_eq!(
            sink.count_cluster("merge_parts_total_docs_stored_fields"),
            Some(1350)
        );
        assert_eq!(sink.observations().len(), 4);

        info!("TEST PASS: Merge parts end to end");
    }

    #[tokio::test]
    async fn test_accumulates_across_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("candidate-0.log"),
            ": 100 msec to merge points [10 docs]\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("candidate-1.log"),
            ": 50 msec to merge points [5 docs]\n",
        )
        .unwrap();

        let sink = Arc::new(RecordingSink::new());
        let mut device = MergeParts::new(merge_config(dir.path()), sink.clone());
        device.on_benchmark_stop().await.unwrap();

        assert_eq!(sink.value_cluster("merge_parts_total_time_points"), Some(150.0));
        assert_eq!(sink.count_cluster("merge_parts_total_docs_points"), Some(15));
    }

    #[tokio::test]
    async fn test_scan_continues_past_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("archive")).unwrap();
        std::fs::write(
            dir.path().join("candidate-0.log"),
            ": 100 msec to merge points [10 docs]\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("candidate-1.log"),
            ": 50 msec to merge points [5 docs]\n",
        )
        .unwrap();

        let sink = Arc::new(RecordingSink::new());
        let mut device = MergeParts::new(merge_config(dir.path()), sink.clone());
        device.on_benchmark_stop().await.unwrap();

        assert_eq!(sink.value_cluster("merge_parts_total_time_points"), Some(150.0));
        assert_eq!(sink.count_cluster("merge_parts_total_docs_points"), Some(15));
    }

    #[tokio::test]
    async fn test_no_matches_no_observations() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("candidate.log"), "nothing to see here\n").unwrap();

        let sink = Arc::new(RecordingSink::new());
        let mut device = MergeParts::new(merge_config(dir.path()), sink.clone());
        device.on_benchmark_stop().await.unwrap();

        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_missing_log_directory_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");

        let sink = Arc::new(RecordingSink::new());
        let mut device = MergeParts::new(merge_config(&missing), sink.clone());
        device.on_benchmark_stop().await.unwrap();

        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_log_directory_is_fatal() {
        let sink = Arc::new(RecordingSink::new());
        let mut device = MergeParts::new(Arc::new(BenchConfig::new()), sink.clone());

        let err = device.on_benchmark_stop().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(sink.is_empty());
    }
}
