//! Disk-usage based retention.
//!
//! When enabled, the service measures the filesystem holding the database
//! every interval and deletes the oldest events in batches until usage drops
//! back under the threshold.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::CleanupConfig;
use crate::db::{LogRepository, RepositoryError};

/// Upper bound on delete rounds per check.
pub const MAX_ROUNDS_PER_CHECK: u32 = 100;

/// Errors from a cleanup pass.
#[derive(Debug, Error)]
pub enum CleanupError {
    /// Disk usage could not be measured.
    #[error("failed to measure {}: {source}", path.display())]
    Probe {
        /// The measured path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// Deleting rows failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Reports how full a filesystem is.
pub trait DiskProbe: Send + Sync {
    /// Used space as a percentage of total, in `0.0..=100.0`.
    fn usage_percent(&self, path: &Path) -> io::Result<f64>;
}

/// [`DiskProbe`] backed by `statvfs` via `fs2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fs2Probe;

impl DiskProbe for Fs2Probe {
    fn usage_percent(&self, path: &Path) -> io::Result<f64> {
        let total = fs2::total_space(path)?;
        if total == 0 {
            return Ok(0.0);
        }
        let available = fs2::available_space(path)?;
        Ok(total.saturating_sub(available) as f64 / total as f64 * 100.0)
    }
}

/// Background retention loop.
pub struct CleanupService {
    repo: Arc<dyn LogRepository>,
    probe: Arc<dyn DiskProbe>,
    config: Mutex<CleanupConfig>,
    running: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
    restart: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for CleanupService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupService")
            .field("config", &*self.config.lock())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl CleanupService {
    /// Creates a service measuring disk usage with [`Fs2Probe`].
    pub fn new(repo: Arc<dyn LogRepository>, config: CleanupConfig) -> Self {
        Self::with_probe(repo, config, Arc::new(Fs2Probe))
    }

    /// Creates a service with a custom probe.
    pub fn with_probe(
        repo: Arc<dyn LogRepository>,
        config: CleanupConfig,
        probe: Arc<dyn DiskProbe>,
    ) -> Self {
        Self {
            repo,
            probe,
            config: Mutex::new(config),
            running: Mutex::new(None),
            restart: tokio::sync::Mutex::new(()),
        }
    }

    /// The settings the next check will use.
    pub fn config(&self) -> CleanupConfig {
        self.config.lock().clone()
    }

    /// Runs one check, deleting batches while usage exceeds the threshold.
    ///
    /// Returns the number of rows deleted. Stops early when a round deletes
    /// nothing.
    pub async fn run_once(&self) -> Result<u64, CleanupError> {
        let config = self.config();
        let path = &config.disk_path;
        let mut deleted = 0u64;

        for _ in 0..MAX_ROUNDS_PER_CHECK {
            let usage = self
                .probe
                .usage_percent(path)
                .map_err(|source| CleanupError::Probe {
                    path: path.clone(),
                    source,
                })?;
            if usage <= config.threshold_percent {
                debug!(usage, threshold = config.threshold_percent, "disk usage below threshold");
                break;
            }

            let removed = self.repo.delete_oldest(config.batch_size).await?;
            if removed == 0 {
                warn!(usage, "disk over threshold but no rows left to delete");
                break;
            }
            deleted += removed;
            debug!(removed, usage, "deleted oldest events");
        }

        if deleted > 0 {
            info!(deleted, path = %path.display(), "retention cleanup finished");
        }
        Ok(deleted)
    }

    /// Starts the loop. A disabled config or an already running loop makes
    /// this a no-op; returns whether a loop was started.
    pub fn start(self: &Arc<Self>) -> bool {
        let config = self.config();
        if !config.enabled {
            info!("retention cleanup disabled");
            return false;
        }

        let mut running = self.running.lock();
        if running.is_some() {
            return false;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let service = Arc::clone(self);
        let interval = config.interval();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = service.run_once().await {
                            error!(error = %err, "retention cleanup failed");
                        }
                    }
                }
            }
            debug!("retention cleanup stopped");
        });

        info!(
            path = %config.disk_path.display(),
            threshold = config.threshold_percent,
            interval_secs = config.interval_secs,
            "retention cleanup started"
        );
        *running = Some((cancel, task));
        true
    }

    /// Stops the loop and waits for it to exit.
    pub async fn stop(&self) {
        let running = self.running.lock().take();
        if let Some((cancel, task)) = running {
            cancel.cancel();
            let _ = task.await;
        }
    }

    /// Stops the loop, swaps in `config` and starts again.
    ///
    /// Returns whether a loop is running afterwards. Concurrent calls are
    /// applied one at a time.
    pub async fn reconfigure(self: &Arc<Self>, config: CleanupConfig) -> bool {
        let _guard = self.restart.lock().await;
        self.stop().await;
        *self.config.lock() = config;
        self.start()
    }

    /// Returns true while the loop is running.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|(_, task)| !task.is_finished())
    }
}
