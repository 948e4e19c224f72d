//! CPU utilization sampler device.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::warn;

use cbench_common::Node;

use crate::device::TelemetryDevice;
use crate::error::TelemetryError;
use crate::metrics::MetricsSink;
use crate::sysstats;

/// Nominal measurement latency; there is no additional inter-sample delay.
const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Samples CPU utilization of the node's process while the benchmark runs.
///
/// The sampler is the only concurrent part of the framework. It is stopped
/// cooperatively: `on_benchmark_stop` raises the stop flag and then awaits
/// the task, so once stop returns no further observation arrives. The
/// sampler is never force-cancelled, so stop can block for up to one
/// in-flight sample interval.
pub struct CpuUsage {
    sink: Arc<dyn MetricsSink>,
    node: Option<(String, Option<u32>)>,
    stop_flag: Arc<RwLock<bool>>,
    sampler: Option<JoinHandle<()>>,
}

impl CpuUsage {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            sink,
            node: None,
            stop_flag: Arc::new(RwLock::new(false)),
            sampler: None,
        }
    }
}

/// Each iteration reads the process tick counter, sleeps for the sample
/// interval, reads again, and reports the utilization over the measured
/// wall-clock window. Any sampling failure logs a warning and ends the
/// loop; it never propagates.
async fn sample_cpu_utilization(
    node: String,
    pid: u32,
    sink: Arc<dyn MetricsSink>,
    stop_flag: Arc<RwLock<bool>>,
) {
    let ticks_per_second = sysstats::clock_ticks_per_second() as f64;
    while !*stop_flag.read().await {
        let Some(start_ticks) = sysstats::process_cpu_ticks(pid) else {
            warn!(
                "Cannot read CPU ticks of process [{}], stopping the CPU utilization sampler.",
                pid
            );
            break;
        };
        let started = Instant::now();
        tokio::time::sleep(SAMPLE_INTERVAL).await;
        let Some(end_ticks) = sysstats::process_cpu_ticks(pid) else {
            warn!(
                "Cannot read CPU ticks of process [{}], stopping the CPU utilization sampler.",
                pid
            );
            break;
        };
        let busy_seconds = end_ticks.saturating_sub(start_ticks) as f64 / ticks_per_second;
        let utilization = busy_seconds / started.elapsed().as_secs_f64() * 100.0;
        sink.put_value_node_level(&node, "cpu_utilization_1s", utilization, "%");
    }
}

#[async_trait]
impl TelemetryDevice for CpuUsage {
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
        let Some((name, Some(pid))) = self.node.clone() else {
            return Ok(());
        };
        *self.stop_flag.write().await = false;
        self.sampler = Some(tokio::spawn(sample_cpu_utilization(
            name,
            pid,
            self.sink.clone(),
            self.stop_flag.clone(),
        )));
        Ok(())
    }

    async fn on_benchmark_stop(&mut self) -> Result<(), TelemetryError> {
        *self.stop_flag.write().await = true;
        if let Some(sampler) = self.sampler.take() {
            if let Err(e) = sampler.await {
                warn!("The CPU utilization sampler failed: {}", e);
            }
        }
        Ok(())
    }
}
