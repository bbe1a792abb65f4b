//! Desired-state file watcher
//!
//! Polls the document's modification time and reloads it whenever the
//! time moves forward. A document that cannot be read or parsed is logged
//! and skipped; the previously loaded desired state stays in force.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use poligent_core::DesiredState;

/// Shortest interval between two polls
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Watches one desired-state document
pub struct DesiredStateWatcher {
    path: PathBuf,
    poll_interval: Duration,
    last_modified: Option<SystemTime>,
}

impl DesiredStateWatcher {
    /// Create a watcher; nothing is read until `run` or `check`
    ///
    /// `poll_interval` is raised to `MIN_POLL_INTERVAL` if shorter.
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            last_modified: None,
        }
    }

    /// Whether the document's mtime moved forward since the last check
    pub async fn check(&mut self) -> bool {
        let modified = tokio::fs::metadata(&self.path)
            .await
            .and_then(|m| m.modified())
            .ok();

        let advanced = modified > self.last_modified;
        self.last_modified = modified;
        advanced
    }

    /// Load the document, logging failures
    pub async fn load(&self) -> Option<DesiredState> {
        match DesiredState::load(&self.path).await {
            Ok(desired) => Some(desired),
            Err(e) if e.is_unavailable() => {
                tracing::warn!("Could not read desired state: {}", e);
                None
            }
            Err(e) => {
                tracing::warn!(
                    "Could not parse desired state from {:?}, keeping current policy: {}",
                    self.path,
                    e
                );
                None
            }
        }
    }

    /// Load once, then reload on every mtime change until cancelled.
    ///
    /// Each successfully loaded document is sent on `tx`.
    pub async fn run(mut self, tx: mpsc::Sender<DesiredState>, cancel: CancellationToken) {
        tracing::info!(
            "Watching desired state at {:?} (poll interval: {:?})",
            self.path,
            self.poll_interval
        );

        self.check().await;
        if let Some(desired) = self.load().await {
            if tx.send(desired).await.is_err() {
                return;
            }
        }

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if !self.check().await {
                        continue;
                    }
                    tracing::debug!("Desired state at {:?} changed", self.path);
                    if let Some(desired) = self.load().await {
                        if tx.send(desired).await.is_err() {
                            break;
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    tracing::info!("Desired state watcher shutting down");
                    break;
                }
            }
        }
    }
}
