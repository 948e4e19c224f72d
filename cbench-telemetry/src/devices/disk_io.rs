//! Disk I/O device (diff).

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use cbench_common::Node;

use crate::device::TelemetryDevice;
use crate::error::TelemetryError;
use crate::metrics::MetricsSink;
use crate::sysstats::{self, IoCounters};

/// Measures bytes read and written by the benchmark.
///
/// Prefers the tracked process's own I/O counters. When those are not
/// readable it falls back to whole-disk counters, which also include
/// unrelated system activity. The choice is announced once at benchmark
/// start and the less accurate numbers are still reported.
pub struct DiskIo {
    sink: Arc<dyn MetricsSink>,
    node: Option<(String, Option<u32>)>,
    process_start: Option<IoCounters>,
    disk_start: Option<IoCounters>,
}

impl DiskIo {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            sink,
            node: None,
            process_start: None,
            disk_start: None,
        }
    }
}

#[async_trait]
impl TelemetryDevice for DiskIo {
    fn internal(&self) -> bool {
        true
    }

    fn command(&self) -> &'static str {
        "internal"
    }

    async fn attach_to_node(&mut self, node: &Node) -> Result<(), TelemetryError> {
        self.node = Some((node.name.clone(), node.pid));
        Ok(())
    }

    async fn on_benchmark_start(&mut self) -> Result<(), TelemetryError> {
        let Some((_, pid)) = self.node.clone() else {
            return Ok(());
        };
        self.process_start = pid.and_then(sysstats::process_io_counters);
        self.disk_start = sysstats::disk_io_counters();
        if self.process_start.is_some() {
            info!("Using more accurate process-based I/O counters.");
        } else {
            warn!(
                "Process I/O counters are unsupported on this platform. \
                 Falling back to less accurate disk I/O counters."
            );
        }
        Ok(())
    }

    async fn on_benchmark_stop(&mut self) -> Result<(), TelemetryError> {
        let Some((name, pid)) = self.node.clone() else {
            return Ok(());
        };
        let process_start = self.process_start.take();
        let disk_start = self.disk_start.take();
        if process_start.is_none() && disk_start.is_none() {
            return Ok(());
        }

        let process_end = pid.and_then(sysstats::process_io_counters);
        let disk_end = sysstats::disk_io_counters();

        let (start, end) = match (process_start, process_end) {
            (Some(start), Some(end)) => (start, end),
            _ => match (disk_start, disk_end) {
                (Some(start), Some(end)) => (start, end),
                _ => {
                    warn!(
                        "Cannot determine I/O counters for node [{}], skipping the disk I/O measurement.",
                        name
                    );
                    return Ok(());
                }
            },
        };

        self.sink.put_count_node_level(
            &name,
            "disk_io_write_bytes",
            end.write_bytes as i64 - start.write_bytes as i64,
            "byte",
        );
        self.sink.put_count_node_level(
            &name,
            "disk_io_read_bytes",
            end.read_bytes as i64 - start.read_bytes as i64,
            "byte",
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RecordingSink;
    use std::sync::Mutex;

    /// Collects formatted log output so tests can assert on it.
    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl CapturedLog {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLog {
        type Writer = CapturedLog;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_stop_without_attach_records_nothing() {
        let sink = Arc::new(RecordingSink::new());
        let mut device = DiskIo::new(sink.clone());

        device.on_benchmark_stop().await.unwrap();

        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_stop_without_start_records_nothing() {
        let sink = Arc::new(RecordingSink::new());
        let mut device = DiskIo::new(sink.clone());
        device
            .attach_to_node(&Node::new("bench0", "127.0.0.1", None))
            .await
            .unwrap();

        device.on_benchmark_stop().await.unwrap();

        assert!(sink.is_empty());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_measures_own_process_io() {
        let sink = Arc::new(RecordingSink::new());
        let mut device = DiskIo::new(sink.clone());
        device
            .attach_to_node(&Node::new("bench0", "127.0.0.1", Some(std::process::id())))
            .await
            .unwrap();

        device.on_benchmark_start().await.unwrap();
        // Generate some write traffic between the snapshots.
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ballast"), vec![0u8; 64 * 1024]).unwrap();
        device.on_benchmark_stop().await.unwrap();

        let written = sink.count_node("bench0", "disk_io_write_bytes");
        let read = sink.count_node("bench0", "disk_io_read_bytes");
        assert!(written.is_some());
        assert!(read.is_some());
        assert!(written.unwrap() >= 0);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_falls_back_to_disk_counters_without_pid() {
        let sink = Arc::new(RecordingSink::new());
        let mut device = DiskIo::new(sink.clone());
        // No pid, so process counters are unavailable from the start.
        device
            .attach_to_node(&Node::new("bench0", "127.0.0.1", None))
            .await
            .unwrap();

        device.on_benchmark_start().await.unwrap();
        device.on_benchmark_stop().await.unwrap();

        assert!(sink.count_node("bench0", "disk_io_write_bytes").is_some());
        assert!(sink.count_node("bench0", "disk_io_read_bytes").is_some());
    }

    #[tokio::test]
    async fn test_fallback_warning_logged_once() {
        let logs = CapturedLog::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let sink = Arc::new(RecordingSink::new());
        let mut device = DiskIo::new(sink.clone());
        device
            .attach_to_node(&Node::new("bench0", "127.0.0.1", None))
            .await
            .unwrap();
        device.on_benchmark_start().await.unwrap();
        device.on_benchmark_stop().await.unwrap();

        let output = logs.contents();
        assert_eq!(
            output
                .matches("Falling back to less accurate disk I/O counters")
                .count(),
            1
        );
        assert!(!output.contains("Using more accurate process-based I/O counters"));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_snapshots_cleared_after_stop() {
        let sink = Arc::new(RecordingSink::new());
        let mut device = DiskIo::new(sink.clone());
        device
            .attach_to_node(&Node::new("bench0", "127.0.0.1", Some(std::process::id())))
            .await
            .unwrap();

        device.on_benchmark_start().await.unwrap();
        device.on_benchmark_stop().await.unwrap();
        let after_first = sink.observations().len();

        // Without a fresh start there is no baseline, so a second stop must
        // not report again.
        device.on_benchmark_stop().await.unwrap();
        assert_eq!(sink.observations().len(), after_first);
    }
}
