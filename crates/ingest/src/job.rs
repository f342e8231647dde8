//! Ingestion job: one background walk of the maildir per epoch.
//!
//! [`IngestionJob::start`] resets the counts, flips the state to `Running`,
//! and hands the walk to the tokio blocking pool. It returns before any file
//! is read. Readers may query the counts at any point after the first start;
//! while `Running` they see partial, walk-order-dependent results.
//!
//! The lifecycle state lives in a `watch` channel: the check-and-set in
//! `start` happens under the channel's lock, and [`IngestionJob::wait_finished`]
//! subscribes to it instead of polling.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use enron_core::TOP_SENDERS_LIMIT;

use crate::counts::{SenderCount, SenderCounts};
use crate::error::{IngestError, WalkError};
use crate::extract::{extract_sender, normalize_sender};

/// Lifecycle of the job. `Finished` means "no longer running", not "succeeded".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionState {
    NotStarted,
    Running,
    Finished,
}

impl IngestionState {
    pub fn has_started(self) -> bool {
        self != Self::NotStarted
    }
}

/// What happened during one epoch. Counters are live while the walk runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpochReport {
    pub epoch: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Regular files visited by the walk.
    pub files_seen: u64,
    /// Files whose sender was recorded.
    pub files_counted: u64,
    /// Files with no `From:` header, or a blank one.
    pub files_without_sender: u64,
    /// Files that could not be opened or read.
    pub files_skipped: u64,
    /// Set when the maildir itself could not be enumerated.
    pub walk_error: Option<String>,
}

/// Everything a status caller wants, gathered in one call. The parts are
/// read one after another, not atomically.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionSnapshot {
    pub state: IngestionState,
    pub finished: bool,
    pub total_messages: u64,
    pub distinct_senders: usize,
    pub top_senders: Vec<SenderCount>,
    pub report: EpochReport,
}

#[derive(Debug, Default)]
struct Progress {
    files_seen: AtomicU64,
    files_counted: AtomicU64,
    files_without_sender: AtomicU64,
    files_skipped: AtomicU64,
}

impl Progress {
    fn reset(&self) {
        self.files_seen.store(0, Ordering::Relaxed);
        self.files_counted.store(0, Ordering::Relaxed);
        self.files_without_sender.store(0, Ordering::Relaxed);
        self.files_skipped.store(0, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
struct EpochMeta {
    epoch: u64,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    walk_error: Option<String>,
}

#[derive(Debug)]
struct Inner {
    root: PathBuf,
    counts: SenderCounts,
    state: watch::Sender<IngestionState>,
    progress: Progress,
    meta: RwLock<EpochMeta>,
}

/// Handle to the ingestion job. Cheap to clone; clones share one job.
#[derive(Debug, Clone)]
pub struct IngestionJob {
    inner: Arc<Inner>,
}

impl IngestionJob {
    /// Create a job that walks `root`. The root is fixed for the job's lifetime.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let (state, _) = watch::channel(IngestionState::NotStarted);
        Self {
            inner: Arc::new(Inner {
                root: root.into(),
                counts: SenderCounts::new(),
                state,
                progress: Progress::default(),
                meta: RwLock::new(EpochMeta::default()),
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Begin a new epoch and return its number (the first epoch is 1).
    ///
    /// Fails with [`IngestError::ConflictingOperation`] without touching any
    /// state if an epoch is already running.
    ///
    /// Inside a tokio runtime the walk runs on its blocking pool; otherwise it
    /// gets a dedicated thread.
    pub fn start(&self) -> Result<u64, IngestError> {
        let runtime = tokio::runtime::Handle::try_current().ok();
        let inner = &self.inner;
        let mut epoch = None;

        inner.state.send_if_modified(|state| {
            if *state == IngestionState::Running {
                return false;
            }
            inner.counts.reset();
            inner.progress.reset();
            let mut meta = inner.meta.write().unwrap_or_else(PoisonError::into_inner);
            let next = meta.epoch + 1;
            *meta = EpochMeta {
                epoch: next,
                started_at: Some(Utc::now()),
                ..EpochMeta::default()
            };
            *state = IngestionState::Running;
            epoch = Some(next);
            true
        });

        let Some(epoch) = epoch else {
            warn!(root = %self.root().display(), "ingestion start rejected: already running");
            return Err(IngestError::ConflictingOperation);
        };

        info!(epoch, root = %self.root().display(), "ingestion started");

        let walker = Arc::clone(&self.inner);
        match runtime {
            Some(handle) => {
                handle.spawn_blocking(move || walker.run_epoch(epoch));
            }
            None => {
                let spawned = std::thread::Builder::new()
                    .name(format!("maildir-walk-{epoch}"))
                    .spawn(move || walker.run_epoch(epoch));
                if let Err(e) = spawned {
                    error!(epoch, error = %e, "failed to spawn ingestion thread");
                    self.inner.meta_mut().walk_error = Some(format!("failed to spawn walk: {e}"));
                    self.inner.finish();
                }
            }
        }

        Ok(epoch)
    }

    /// Current lifecycle state. Never fails.
    pub fn state(&self) -> IngestionState {
        *self.inner.state.borrow()
    }

    /// Whether the current epoch has finished.
    pub fn is_finished(&self) -> Result<bool, IngestError> {
        Ok(self.ensure_started()? == IngestionState::Finished)
    }

    /// Messages counted so far in the current epoch.
    pub fn total_messages(&self) -> Result<u64, IngestError> {
        self.ensure_started()?;
        Ok(self.inner.counts.total())
    }

    /// The most frequent senders so far, at most [`TOP_SENDERS_LIMIT`].
    pub fn top_senders(&self) -> Result<Vec<SenderCount>, IngestError> {
        self.ensure_started()?;
        Ok(self.inner.counts.top_n(TOP_SENDERS_LIMIT))
    }

    /// Progress and outcome of the current epoch.
    pub fn report(&self) -> Result<EpochReport, IngestError> {
        self.ensure_started()?;
        Ok(self.inner.report())
    }

    pub fn snapshot(&self) -> Result<IngestionSnapshot, IngestError> {
        let state = self.ensure_started()?;
        let counts = &self.inner.counts;
        Ok(IngestionSnapshot {
            state,
            finished: state == IngestionState::Finished,
            total_messages: counts.total(),
            distinct_senders: counts.distinct(),
            top_senders: counts.top_n(TOP_SENDERS_LIMIT),
            report: self.inner.report(),
        })
    }

    /// Resolve once no epoch is running. Returns immediately if the job has
    /// never started or has already finished.
    pub async fn wait_finished(&self) -> IngestionState {
        let mut rx = self.inner.state.subscribe();
        let state = match rx.wait_for(|state| *state != IngestionState::Running).await {
            Ok(state) => *state,
            // The sender lives as long as `self`, so the channel cannot close here.
            Err(_) => self.state(),
        };
        state
    }

    fn ensure_started(&self) -> Result<IngestionState, IngestError> {
        let state = self.state();
        if state.has_started() {
            Ok(state)
        } else {
            Err(IngestError::NotYetStarted)
        }
    }
}

impl Inner {
    fn run_epoch(&self, epoch: u64) {
        // Finishes the epoch on every exit path, including a panic mid-walk.
        let _finish = FinishOnDrop { inner: self };
        let started = Instant::now();

        if let Err(e) = self.walk() {
            error!(epoch, error = %e, "ingestion walk aborted");
            self.meta_mut().walk_error = Some(e.to_string());
        }

        info!(
            epoch,
            files_seen = self.progress.files_seen.load(Ordering::Relaxed),
            files_counted = self.progress.files_counted.load(Ordering::Relaxed),
            files_skipped = self.progress.files_skipped.load(Ordering::Relaxed),
            distinct_senders = self.counts.distinct(),
            duration_ms = started.elapsed().as_millis() as u64,
            "ingestion finished"
        );
    }

    fn walk(&self) -> Result<(), WalkError> {
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|source| WalkError::Aborted {
                root: self.root.clone(),
                source,
            })?;
            // Links to files are read; links to directories are not descended.
            if entry.path().is_file() {
                self.process_file(entry.path());
            }
        }
        Ok(())
    }

    fn process_file(&self, path: &Path) {
        let progress = &self.progress;
        progress.files_seen.fetch_add(1, Ordering::Relaxed);

        match read_sender(path) {
            Ok(Some(sender)) => {
                self.counts.record(&sender);
                progress.files_counted.fetch_add(1, Ordering::Relaxed);
            }
            Ok(None) => {
                progress.files_without_sender.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable message");
                progress.files_skipped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn report(&self) -> EpochReport {
        let meta = self.meta.read().unwrap_or_else(PoisonError::into_inner);
        EpochReport {
            epoch: meta.epoch,
            started_at: meta.started_at,
            finished_at: meta.finished_at,
            files_seen: self.progress.files_seen.load(Ordering::Relaxed),
            files_counted: self.progress.files_counted.load(Ordering::Relaxed),
            files_without_sender: self.progress.files_without_sender.load(Ordering::Relaxed),
            files_skipped: self.progress.files_skipped.load(Ordering::Relaxed),
            walk_error: meta.walk_error.clone(),
        }
    }

    fn finish(&self) {
        self.meta_mut().finished_at = Some(Utc::now());
        // Last write of the epoch: once readers see `Finished`, the walk
        // touches nothing else.
        self.state.send_replace(IngestionState::Finished);
    }

    fn meta_mut(&self) -> std::sync::RwLockWriteGuard<'_, EpochMeta> {
        self.meta.write().unwrap_or_else(PoisonError::into_inner)
    }
}

struct FinishOnDrop<'a> {
    inner: &'a Inner,
}

impl Drop for FinishOnDrop<'_> {
    fn drop(&mut self) {
        self.inner.finish();
    }
}

/// Open `path` and return its normalized sender, if any.
fn read_sender(path: &Path) -> io::Result<Option<String>> {
    let file = File::open(path)?;
    let raw = extract_sender(BufReader::new(file))?;
    Ok(raw.as_deref().and_then(normalize_sender))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn force_state(job: &IngestionJob, state: IngestionState) {
        job.inner.state.send_replace(state);
    }

    #[test]
    fn queries_fail_before_first_start() {
        let job = IngestionJob::new("/nonexistent");
        assert_eq!(job.state(), IngestionState::NotStarted);
        assert_eq!(job.is_finished(), Err(IngestError::NotYetStarted));
        assert_eq!(job.total_messages(), Err(IngestError::NotYetStarted));
        assert_eq!(job.top_senders(), Err(IngestError::NotYetStarted));
        assert_eq!(job.report(), Err(IngestError::NotYetStarted));
        assert!(job.snapshot().is_err());
    }

    #[test]
    fn start_while_running_is_rejected_without_side_effects() {
        let job = IngestionJob::new("/nonexistent");
        force_state(&job, IngestionState::Running);
        job.inner.counts.record("alice@example.com");
        job.inner.counts.record("alice@example.com");

        assert_eq!(job.start(), Err(IngestError::ConflictingOperation));
        assert_eq!(job.state(), IngestionState::Running);
        assert_eq!(job.total_messages(), Ok(2));
        assert_eq!(job.report().unwrap().epoch, 0);
    }

    #[test]
    fn partial_results_are_visible_while_running() {
        let job = IngestionJob::new("/nonexistent");
        force_state(&job, IngestionState::Running);
        job.inner.counts.record("bob@example.com");

        assert_eq!(job.is_finished(), Ok(false));
        assert_eq!(job.total_messages(), Ok(1));
        assert_eq!(job.top_senders().unwrap()[0].sender, "bob@example.com");
    }

    #[test]
    fn finished_state_reports_results() {
        let job = IngestionJob::new("/nonexistent");
        force_state(&job, IngestionState::Finished);
        let senders = [
            ("alice@example.com", 5),
            ("bob@example.com", 10),
            ("carol@example.com", 7),
        ];
        for (sender, n) in senders {
            for _ in 0..n {
                job.inner.counts.record(sender);
            }
        }

        assert_eq!(job.is_finished(), Ok(true));
        assert_eq!(job.total_messages(), Ok(22));
        let top = job.top_senders().unwrap();
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].sender, "bob@example.com");
        assert_eq!(top[0].count, 10);
        assert_eq!(top[2].sender, "alice@example.com");

        let snapshot = job.snapshot().unwrap();
        assert!(snapshot.finished);
        assert_eq!(snapshot.distinct_senders, 3);
    }

    #[test]
    fn top_senders_is_capped() {
        let job = IngestionJob::new("/nonexistent");
        force_state(&job, IngestionState::Finished);
        for i in 0..(TOP_SENDERS_LIMIT + 5) {
            job.inner.counts.record(&format!("user{i}@example.com"));
        }
        assert_eq!(job.top_senders().unwrap().len(), TOP_SENDERS_LIMIT);
    }

    #[tokio::test]
    async fn wait_finished_returns_immediately_when_idle() {
        let job = IngestionJob::new("/nonexistent");
        assert_eq!(job.wait_finished().await, IngestionState::NotStarted);
    }

    #[tokio::test]
    async fn missing_root_still_finishes() {
        let job = IngestionJob::new("/definitely/not/a/maildir");
        assert_eq!(job.start(), Ok(1));
        assert_eq!(job.wait_finished().await, IngestionState::Finished);

        assert_eq!(job.total_messages(), Ok(0));
        let report = job.report().unwrap();
        assert!(report.walk_error.is_some());
        assert!(report.finished_at.is_some());
        assert_eq!(report.files_seen, 0);
    }

    fn wait_until_not_running(job: &IngestionJob) {
        let deadline = Instant::now() + std::time::Duration::from_secs(5);
        while job.state() == IngestionState::Running {
            assert!(Instant::now() < deadline, "ingestion did not finish in time");
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
    }

    #[test]
    fn start_outside_runtime_walks_on_its_own_thread() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1."), "From: solo@example.com\n\n").unwrap();

        let job = IngestionJob::new(dir.path());
        assert_eq!(job.root(), dir.path());
        assert_eq!(job.start(), Ok(1));
        wait_until_not_running(&job);

        assert_eq!(job.state(), IngestionState::Finished);
        assert_eq!(job.total_messages(), Ok(1));

        // The job is not wedged in `Running`: a second epoch is accepted.
        assert_eq!(job.start(), Ok(2));
        wait_until_not_running(&job);
        assert_eq!(job.total_messages(), Ok(1));
        assert_eq!(job.report().unwrap().epoch, 2);
    }
}
