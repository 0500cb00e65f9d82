//! Ingestion controller: backlog reconciliation at startup, then live intake
//! from a recursive filesystem watch.
//!
//! The watch is subscribed before the backlog scan and its events are
//! buffered until the scan finishes, so files that land mid-scan are still
//! seen. Re-delivered images are filtered by the result store and the
//! in-flight set.

use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use walkdir::WalkDir;

use crate::app_state::AppState;
use crate::models::candidate::ImageCandidate;
use crate::services::processor::{process_image, ProcessOutcome};

/// Counts from one backlog reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BacklogReport {
    pub discovered: usize,
    pub skipped: usize,
    pub completed: usize,
    pub failed: usize,
}

impl BacklogReport {
    fn tally(&mut self, outcome: &ProcessOutcome) {
        match outcome {
            ProcessOutcome::AlreadyProcessed | ProcessOutcome::InFlight => self.skipped += 1,
            ProcessOutcome::Completed { .. } => self.completed += 1,
            ProcessOutcome::Failed => self.failed += 1,
        }
    }
}

/// An active watch subscription and its buffered events.
pub struct LiveEvents {
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

pub struct IngestionController {
    state: AppState,
    roots: Vec<PathBuf>,
    tasks: TaskTracker,
}

impl IngestionController {
    pub fn new(state: AppState) -> Self {
        let configured = state.config.watch_root.clone();
        let mut roots = vec![configured.clone()];
        // Some watch backends report canonical paths (e.g. /private/var on macOS).
        if let Ok(canonical) = std::fs::canonicalize(&configured) {
            if canonical != configured {
                roots.push(canonical);
            }
        }

        Self {
            state,
            roots,
            tasks: TaskTracker::new(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Derive a candidate from any path; `None` for paths outside the
    /// `<date>/<serial>/<file>.<ext>` layout.
    pub fn candidate_for(&self, path: &Path) -> Option<ImageCandidate> {
        let extension = self.state.config.extension();
        self.roots
            .iter()
            .find_map(|root| ImageCandidate::from_watched_path(root, path, extension))
    }

    /// Every image currently in the watch tree, ordered by path.
    pub fn scan_backlog(&self) -> Vec<ImageCandidate> {
        let root = &self.state.config.watch_root;

        WalkDir::new(root)
            .min_depth(3)
            .max_depth(3)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable backlog entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                ImageCandidate::from_watched_path(root, entry.path(), self.state.config.extension())
            })
            .collect()
    }

    /// Process every unprocessed image already on disk, one at a time.
    pub async fn reconcile_backlog(&self) -> BacklogReport {
        self.reconcile_until(&CancellationToken::new()).await
    }

    async fn reconcile_until(&self, shutdown: &CancellationToken) -> BacklogReport {
        let candidates = self.scan_backlog();
        let mut report = BacklogReport {
            discovered: candidates.len(),
            ..Default::default()
        };

        tracing::info!(
            root = %self.state.config.watch_root.display(),
            images = candidates.len(),
            "Reconciling backlog"
        );
        metrics::counter!("aoi_images_discovered_total", "source" => "backlog")
            .increment(candidates.len() as u64);

        for candidate in &candidates {
            if shutdown.is_cancelled() {
                tracing::warn!("Shutdown requested, backlog reconciliation stopped early");
                break;
            }
            let outcome = process_image(&self.state, candidate).await;
            report.tally(&outcome);
        }

        tracing::info!(
            discovered = report.discovered,
            skipped = report.skipped,
            completed = report.completed,
            failed = report.failed,
            "Backlog reconciled"
        );
        report
    }

    /// Start the recursive watch. Events queue up until consumed by
    /// [`IngestionController::run_subscribed`].
    pub fn subscribe(&self) -> Result<LiveEvents, IngestError> {
        let root = &self.state.config.watch_root;
        if !root.is_dir() {
            return Err(IngestError::MissingRoot(root.clone()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Receiver gone means the controller stopped; nothing left to notify.
            let _ = tx.send(res);
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        tracing::info!(
            root = %root.display(),
            extension = %self.state.config.extension(),
            "Watching for new images"
        );

        Ok(LiveEvents {
            _watcher: watcher,
            rx,
        })
    }

    /// Subscribe, reconcile the backlog, then serve live events until
    /// `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<BacklogReport, IngestError> {
        let events = self.subscribe()?;
        Ok(self.run_subscribed(events, shutdown).await)
    }

    pub async fn run_subscribed(
        &self,
        events: LiveEvents,
        shutdown: CancellationToken,
    ) -> BacklogReport {
        let report = self.reconcile_until(&shutdown).await;
        if !shutdown.is_cancelled() {
            self.live_intake(events, &shutdown).await;
        }
        self.drain(self.state.config.shutdown_grace()).await;
        report
    }

    async fn live_intake(&self, mut events: LiveEvents, shutdown: &CancellationToken) {
        tracing::info!("Live intake started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, live intake stopped");
                    break;
                }
                event = events.rx.recv() => match event {
                    Some(Ok(event)) => self.handle_event(&event),
                    Some(Err(e)) => tracing::warn!(error = %e, "Filesystem watch error"),
                    None => {
                        tracing::error!("Filesystem watch channel closed");
                        break;
                    }
                },
            }
        }
    }

    fn handle_event(&self, event: &Event) {
        for path in qualifying_paths(event) {
            if let Some(candidate) = self.candidate_for(path) {
                metrics::counter!("aoi_images_discovered_total", "source" => "watch").increment(1);
                self.dispatch(candidate);
            }
        }
    }

    /// Fire-and-forget: the unit runs on its own task.
    fn dispatch(&self, candidate: ImageCandidate) {
        let state = self.state.clone();
        self.tasks.spawn(async move {
            process_image(&state, &candidate).await;
        });
    }

    /// Stop accepting units and wait up to `grace` for running ones.
    pub async fn drain(&self, grace: Duration) {
        self.tasks.close();
        if self.tasks.is_empty() {
            return;
        }

        tracing::info!(units = self.tasks.len(), "Waiting for in-flight images");
        if tokio::time::timeout(grace, self.tasks.wait()).await.is_err() {
            tracing::warn!(
                units = self.tasks.len(),
                "Shutdown grace period elapsed with images still in flight"
            );
        }
    }
}

/// inotify reports close-after-write, so on Linux a file is announced once
/// its writer closes it; creation and in-progress writes are not arrivals.
/// Other backends have no close event and announce on create or write.
const WRITES_ANNOUNCE_ARRIVAL: bool = !cfg!(target_os = "linux");

/// Paths of an event that may announce a finished image file.
pub fn qualifying_paths(event: &Event) -> Vec<&Path> {
    match event.kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write))
        | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.iter().map(PathBuf::as_path).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().map(PathBuf::as_path).into_iter().collect()
        }
        // FSEvents reports both ends of a rename this way; only the end that
        // still exists has arrived.
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event
            .paths
            .iter()
            .map(PathBuf::as_path)
            .filter(|path| path.is_file())
            .collect(),
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_)
        | EventKind::Modify(ModifyKind::Any)
        | EventKind::Modify(ModifyKind::Data(_))
            if WRITES_ANNOUNCE_ARRIVAL =>
        {
            event.paths.iter().map(PathBuf::as_path).collect()
        }
        _ => Vec::new(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Watch root does not exist or is not a directory: {0}")]
    MissingRoot(PathBuf),

    #[error("Failed to watch filesystem: {0}")]
    Watch(#[from] notify::Error),
}
