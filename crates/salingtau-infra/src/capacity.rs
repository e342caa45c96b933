//! Disk headroom checks before large local writes.
//!
//! Video jobs copy the whole source to local disk and then write a full
//! resolution's worth of segments next to it. The checker refuses (or warns,
//! depending on configuration) when that would leave less than the configured
//! free-space floor.

use salingtau_core::{Config, DiskCheckBehavior};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sysinfo::Disks;
use tracing::{error, warn};

/// Space needed while transcoding, as a multiple of the source size.
pub const VIDEO_TRANSCODE_SPACE_MULTIPLIER: f64 = 4.0;

#[derive(Debug, thiserror::Error)]
pub enum CapacityError {
    #[error("Insufficient disk space: {available} bytes available, {required} bytes required")]
    InsufficientDiskSpace { available: u64, required: u64 },

    #[error("Could not determine disk space for {path}: {reason}")]
    Probe { path: PathBuf, reason: String },
}

/// Source of free-space figures.
pub trait DiskSpaceProbe: Send + Sync {
    fn available_bytes(&self, path: &Path) -> Result<u64, CapacityError>;
}

/// Reads free space from the mounted disk that holds the path.
pub struct SysinfoDiskProbe;

impl DiskSpaceProbe for SysinfoDiskProbe {
    fn available_bytes(&self, path: &Path) -> Result<u64, CapacityError> {
        let canonical = path.canonicalize().map_err(|e| CapacityError::Probe {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let disks = Disks::new_with_refreshed_list();

        // Deepest mount point containing the path
        disks
            .iter()
            .filter(|disk| canonical.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().components().count())
            .map(|disk| disk.available_space())
            .ok_or_else(|| CapacityError::Probe {
                path: path.to_path_buf(),
                reason: "no mounted disk contains this path".to_string(),
            })
    }
}

#[derive(Clone)]
pub struct CapacityChecker {
    min_free_bytes: u64,
    behavior: DiskCheckBehavior,
    probe: Arc<dyn DiskSpaceProbe>,
}

impl CapacityChecker {
    pub fn new(config: &Config) -> Self {
        Self::with_probe(
            config.min_disk_free_gb() * 1024 * 1024 * 1024,
            config.disk_check_behavior(),
            Arc::new(SysinfoDiskProbe),
        )
    }

    pub fn with_probe(
        min_free_bytes: u64,
        behavior: DiskCheckBehavior,
        probe: Arc<dyn DiskSpaceProbe>,
    ) -> Self {
        Self {
            min_free_bytes,
            behavior,
            probe,
        }
    }

    /// Check there is room for `required_bytes` at `path` on top of the floor.
    pub fn check_disk_space(&self, path: &Path, required_bytes: u64) -> Result<(), CapacityError> {
        let total_required = required_bytes.saturating_add(self.min_free_bytes);

        let available_bytes = match self.probe.available_bytes(path) {
            Ok(bytes) => bytes,
            Err(e) if self.behavior == DiskCheckBehavior::Warn => {
                warn!(error = %e, path = %path.display(), "Disk space check skipped");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if available_bytes >= total_required {
            return Ok(());
        }

        match self.behavior {
            DiskCheckBehavior::Fail => {
                error!(
                    available_bytes = available_bytes,
                    required_bytes = total_required,
                    path = %path.display(),
                    "Insufficient disk space"
                );
                Err(CapacityError::InsufficientDiskSpace {
                    available: available_bytes,
                    required: total_required,
                })
            }
            DiskCheckBehavior::Warn => {
                warn!(
                    available_bytes = available_bytes,
                    required_bytes = total_required,
                    path = %path.display(),
                    "Insufficient disk space (warning only)"
                );
                Ok(())
            }
        }
    }

    /// Runs the check on the blocking pool; disk enumeration does syscalls.
    pub async fn check_disk_space_async(
        &self,
        path: &Path,
        required_bytes: u64,
    ) -> anyhow::Result<()> {
        let path = path.to_path_buf();
        let checker = self.clone();
        tokio::task::spawn_blocking(move || checker.check_disk_space(&path, required_bytes))
            .await
            .map_err(|e| anyhow::anyhow!("spawn_blocking for disk space check: {}", e))?
            .map_err(anyhow::Error::from)
    }

    pub fn estimate_video_transcode_space(&self, input_size: u64) -> u64 {
        (input_size as f64 * VIDEO_TRANSCODE_SPACE_MULTIPLIER) as u64
    }
}
