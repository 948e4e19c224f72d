//! Final index size device.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

use cbench_common::{BenchConfig, Cluster};

use crate::device::TelemetryDevice;
use crate::error::TelemetryError;
use crate::metrics::MetricsSink;

/// Total size in bytes of all regular files under `root`. Symbolic links
/// are not followed.
async fn dir_size_bytes(root: &Path) -> u64 {
    let mut total = 0u64;
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
            continue;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                if let Ok(metadata) = entry.metadata().await {
                    total += metadata.len();
                }
            }
        }
    }
    total
}

/// Operator-facing listing of the index files; purely diagnostic.
async fn log_index_files(data_path: &str) {
    match Command::new("find").arg(data_path).arg("-ls").output().await {
        Ok(output) => {
            info!("index files:");
            for line in String::from_utf8_lossy(&output.stdout).lines() {
                info!("{}", line);
            }
        }
        Err(e) => debug!("Could not list the index files: {}", e),
    }
}

/// Reports the on-disk size of the final index.
///
/// Measures at cluster detach, after the nodes have shut down and flushed.
/// Without a configured data path the device does nothing at all: no
/// measurement, no sink call, no filesystem access.
pub struct IndexSize {
    config: Arc<BenchConfig>,
    sink: Arc<dyn MetricsSink>,
}

impl IndexSize {
    pub fn new(config: Arc<BenchConfig>, sink: Arc<dyn MetricsSink>) -> Self {
        Self { config, sink }
    }
}

#[async_trait]
impl TelemetryDevice for IndexSize {
    fn internal(&self) -> bool {
        true
    }

    fn command(&self) -> &'static str {
        "internal"
    }

    async fn detach_from_cluster(&mut self, _cluster: &Cluster) -> Result<(), TelemetryError> {
        let Some(data_paths) = self.config.opts_optional("provisioning", "local.data.paths")
        else {
            return Ok(());
        };
        let Some(data_path) = data_paths.split(',').map(str::trim).find(|p| !p.is_empty())
        else {
            return Ok(());
        };

        let index_size = dir_size_bytes(Path::new(data_path)).await;
        self.sink
            .put_count_cluster_level("final_index_size_bytes", index_size as i64);
        log_index_files(data_path).await;
        Ok(())
    }
}
