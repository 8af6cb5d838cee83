//! Import orchestrator.
//!
//! One run at a time walks the four source categories round-robin: for each
//! index `i` it imports the `i`-th table, guide, manifest and data stream,
//! in that order. State machine:
//!
//! ```text
//! queued → running ⇄ paused → completed | failed | stopped
//! ```
//!
//! Pause and stop are observed by the driver at a checkpoint before every
//! file. A paused driver sleeps in `pause_poll_millis` steps; a stop wakes it
//! immediately. A file that is already in flight is allowed to finish or hit
//! its timeout.

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use ssgkb_model::{SsgError, SsgResult, Timestamp};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

use crate::fetcher::{SourceCategory, SourceFetcher};
use crate::rpc::{ImportRequest, StorageRpc};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImporterConfig {
    /// Per-file deadline for an import RPC.
    pub file_timeout_secs: u64,
    /// Sleep between state probes while paused.
    pub pause_poll_millis: u64,
    /// Run the cross-reference closure after the last file.
    pub materialize_cross_references: bool,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            file_timeout_secs: 300,
            pause_poll_millis: 1000,
            materialize_cross_references: true,
        }
    }
}

// ============================================================================
// Run record
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Queued,
    Running,
    Paused,
    Completed,
    Failed,
    Stopped,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Queued => "queued",
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
            RunState::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed | RunState::Stopped)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the driver is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pending,
    Fetching,
    Listing,
    Importing(SourceCategory),
    CrossReferences,
    Done,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryProgress {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRun {
    pub run_id: String,
    pub state: RunState,
    pub phase: Phase,
    pub current_file: Option<String>,
    pub tables: CategoryProgress,
    pub guides: CategoryProgress,
    pub manifests: CategoryProgress,
    pub datastreams: CategoryProgress,
    /// First loop index not yet fully visited.
    pub next_index: usize,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    /// Terminating failure or panic message.
    pub error: Option<String>,
    /// Closure failure; logged, does not fail the run.
    pub cross_reference_error: Option<String>,
}

impl ImportRun {
    fn new(run_id: String) -> Self {
        Self {
            run_id,
            state: RunState::Queued,
            phase: Phase::Pending,
            current_file: None,
            tables: CategoryProgress::default(),
            guides: CategoryProgress::default(),
            manifests: CategoryProgress::default(),
            datastreams: CategoryProgress::default(),
            next_index: 0,
            started_at: None,
            finished_at: None,
            error: None,
            cross_reference_error: None,
        }
    }

    pub fn progress(&self, category: SourceCategory) -> &CategoryProgress {
        match category {
            SourceCategory::Tables => &self.tables,
            SourceCategory::Guides => &self.guides,
            SourceCategory::Manifests => &self.manifests,
            SourceCategory::Datastreams => &self.datastreams,
        }
    }

    fn progress_mut(&mut self, category: SourceCategory) -> &mut CategoryProgress {
        match category {
            SourceCategory::Tables => &mut self.tables,
            SourceCategory::Guides => &mut self.guides,
            SourceCategory::Manifests => &mut self.manifests,
            SourceCategory::Datastreams => &mut self.datastreams,
        }
    }

    pub fn processed(&self) -> usize {
        SourceCategory::ORDER.iter().map(|c| self.progress(*c).processed).sum()
    }

    pub fn failed(&self) -> usize {
        SourceCategory::ORDER.iter().map(|c| self.progress(*c).failed).sum()
    }

    /// Moves to a terminal state unless the run already ended.
    fn finish(&mut self, state: RunState, error: Option<String>) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = state;
        self.phase = Phase::Done;
        self.current_file = None;
        self.finished_at = Some(Utc::now());
        self.error = error;
        true
    }
}

// ============================================================================
// Manager
// ============================================================================

#[derive(Default)]
struct Slot {
    run: Option<ImportRun>,
    stop: Option<watch::Sender<bool>>,
}

type Shared = Arc<Mutex<Slot>>;

/// Owns the single import run and its driver task.
pub struct ImportManager {
    fetcher: Arc<dyn SourceFetcher>,
    storage: Arc<dyn StorageRpc>,
    config: ImporterConfig,
    slot: Shared,
}

impl ImportManager {
    pub fn new(
        fetcher: Arc<dyn SourceFetcher>,
        storage: Arc<dyn StorageRpc>,
        config: ImporterConfig,
    ) -> Self {
        Self {
            fetcher,
            storage,
            config,
            slot: Arc::default(),
        }
    }

    pub fn config(&self) -> &ImporterConfig {
        &self.config
    }

    /// Queues a run and spawns its driver on the current tokio runtime.
    /// Refused while another run has not reached a terminal state.
    pub fn start_import(&self, run_id: Option<String>) -> SsgResult<String> {
        let run_id = run_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let (stop_tx, stop_rx) = watch::channel(false);
        {
            let mut slot = self.slot.lock();
            if let Some(current) = &slot.run {
                if !current.state.is_terminal() {
                    return Err(SsgError::StateConflict(format!(
                        "import run {} is {}",
                        current.run_id, current.state
                    )));
                }
            }
            slot.run = Some(ImportRun::new(run_id.clone()));
            slot.stop = Some(stop_tx);
        }

        let driver = Driver {
            run_id: run_id.clone(),
            fetcher: Arc::clone(&self.fetcher),
            storage: Arc::clone(&self.storage),
            config: self.config.clone(),
            slot: Arc::clone(&self.slot),
            stop: stop_rx,
        };
        let slot = Arc::clone(&self.slot);
        let supervised_id = run_id.clone();
        let handle = tokio::spawn(driver.run());
        tokio::spawn(async move {
            let Err(join) = handle.await else {
                return;
            };
            let message = if join.is_panic() {
                panic_message(join.into_panic())
            } else {
                "driver task was cancelled".to_string()
            };
            tracing::error!(run = %supervised_id, error = %message, "import driver died");
            update(&slot, &supervised_id, |run| {
                run.finish(RunState::Failed, Some(SsgError::Panic(message).to_string()));
            });
        });

        tracing::info!(run = %run_id, "import run queued");
        Ok(run_id)
    }

    pub fn pause(&self) -> SsgResult<ImportRun> {
        self.transition("pause", |state| {
            (state == RunState::Running).then_some(RunState::Paused)
        })
    }

    pub fn resume(&self) -> SsgResult<ImportRun> {
        self.transition("resume", |state| {
            (state == RunState::Paused).then_some(RunState::Running)
        })
    }

    /// Ends the run immediately; the driver notices at its next checkpoint.
    pub fn stop(&self) -> SsgResult<ImportRun> {
        let run = self.transition("stop", |state| {
            (!state.is_terminal()).then_some(RunState::Stopped)
        })?;
        if let Some(stop) = &self.slot.lock().stop {
            let _ = stop.send(true);
        }
        Ok(run)
    }

    /// Snapshot of the current (or last) run.
    pub fn status(&self) -> Option<ImportRun> {
        self.slot.lock().run.clone()
    }

    /// Polls until the current run is terminal.
    pub async fn wait(&self) -> Option<ImportRun> {
        loop {
            match self.status() {
                Some(run) if !run.state.is_terminal() => {}
                other => return other,
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    fn transition(
        &self,
        action: &str,
        next: impl FnOnce(RunState) -> Option<RunState>,
    ) -> SsgResult<ImportRun> {
        let mut slot = self.slot.lock();
        let Some(run) = slot.run.as_mut() else {
            return Err(SsgError::StateConflict(format!("cannot {action}: no import run")));
        };
        let Some(state) = next(run.state) else {
            return Err(SsgError::StateConflict(format!(
                "cannot {action} run {} while {}",
                run.run_id, run.state
            )));
        };
        if state == RunState::Stopped {
            run.finish(RunState::Stopped, None);
        } else {
            run.state = state;
        }
        tracing::info!(run = %run.run_id, state = %run.state, "import run {action}");
        Ok(run.clone())
    }
}

fn update<T>(slot: &Shared, run_id: &str, f: impl FnOnce(&mut ImportRun) -> T) -> Option<T> {
    let mut slot = slot.lock();
    slot.run.as_mut().filter(|run| run.run_id == run_id).map(f)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ============================================================================
// Driver
// ============================================================================

enum Checkpoint {
    Proceed,
    Halt,
}

struct Driver {
    run_id: String,
    fetcher: Arc<dyn SourceFetcher>,
    storage: Arc<dyn StorageRpc>,
    config: ImporterConfig,
    slot: Shared,
    stop: watch::Receiver<bool>,
}

impl Driver {
    fn update<T>(&self, f: impl FnOnce(&mut ImportRun) -> T) -> Option<T> {
        update(&self.slot, &self.run_id, f)
    }

    fn fail(&self, err: SsgError) {
        tracing::error!(run = %self.run_id, error = %err, "import run failed");
        self.update(|run| run.finish(RunState::Failed, Some(err.to_string())));
    }

    async fn run(mut self) {
        let started = self.update(|run| {
            if run.state != RunState::Queued {
                return false;
            }
            run.state = RunState::Running;
            run.started_at = Some(Utc::now());
            true
        });
        if started != Some(true) {
            return;
        }
        tracing::info!(run = %self.run_id, "import run started");

        self.update(|run| run.phase = Phase::Fetching);
        if let Err(err) = self.fetcher.pull().await {
            let err = match err {
                SsgError::FetchFailed(_) => err,
                other => SsgError::FetchFailed(other.to_string()),
            };
            return self.fail(err);
        }

        self.update(|run| run.phase = Phase::Listing);
        let mut lists: Vec<(SourceCategory, Vec<String>)> = Vec::with_capacity(4);
        for category in SourceCategory::ORDER {
            match self.fetcher.list(category).await {
                Ok(list) => lists.push((category, list.files)),
                Err(err) => {
                    let err = match err {
                        SsgError::ListFailed { .. } => err,
                        other => SsgError::ListFailed {
                            category: category.to_string(),
                            message: other.to_string(),
                        },
                    };
                    return self.fail(err);
                }
            }
        }
        let max_len = lists.iter().map(|(_, files)| files.len()).max().unwrap_or(0);
        let start = self
            .update(|run| {
                for (category, files) in &lists {
                    run.progress_mut(*category).total = files.len();
                }
                run.next_index
            })
            .unwrap_or(0);
        tracing::info!(
            run = %self.run_id,
            tables = lists[0].1.len(),
            guides = lists[1].1.len(),
            manifests = lists[2].1.len(),
            datastreams = lists[3].1.len(),
            "sources listed"
        );

        for i in start..max_len {
            for (category, files) in &lists {
                if let Checkpoint::Halt = self.checkpoint().await {
                    return;
                }
                if let Some(file) = files.get(i) {
                    self.import_one(*category, file).await;
                }
            }
            self.update(|run| run.next_index = i + 1);
        }

        if self.config.materialize_cross_references {
            if let Checkpoint::Halt = self.checkpoint().await {
                return;
            }
            self.materialize().await;
        }

        let completed = self.update(|run| run.finish(RunState::Completed, None));
        if completed == Some(true) {
            let run = self.update(|run| (run.processed(), run.failed()));
            let (processed, failed) = run.unwrap_or_default();
            tracing::info!(run = %self.run_id, processed, failed, "import run completed");
        }
    }

    /// Blocks while paused; `Halt` once the run is no longer live.
    async fn checkpoint(&mut self) -> Checkpoint {
        loop {
            let state = self.update(|run| run.state);
            match state {
                Some(RunState::Running) | Some(RunState::Queued) => return Checkpoint::Proceed,
                Some(RunState::Paused) => {
                    let poll = Duration::from_millis(self.config.pause_poll_millis.max(1));
                    tokio::select! {
                        _ = tokio::time::sleep(poll) => {}
                        _ = self.stop.changed() => {}
                    }
                }
                _ => {
                    tracing::info!(run = %self.run_id, "import driver halting");
                    return Checkpoint::Halt;
                }
            }
        }
    }

    async fn import_one(&self, category: SourceCategory, file: &str) {
        self.update(|run| {
            run.phase = Phase::Importing(category);
            run.current_file = Some(file.to_string());
        });

        let outcome = match self.fetcher.file_path(file).await {
            Ok(path) => {
                let request = ImportRequest::new(path.display().to_string());
                let seconds = self.config.file_timeout_secs;
                match tokio::time::timeout(
                    Duration::from_secs(seconds),
                    self.storage.import(category, request),
                )
                .await
                {
                    Ok(reply) => reply.into_result(),
                    Err(_) => Err(SsgError::Timeout {
                        what: file.to_string(),
                        seconds,
                    }
                    .to_string()),
                }
            }
            Err(err) => Err(err.to_string()),
        };

        match outcome {
            Ok(_) => {
                tracing::debug!(run = %self.run_id, %category, file, "imported");
                self.update(|run| run.progress_mut(category).processed += 1);
            }
            Err(error) => {
                tracing::warn!(run = %self.run_id, %category, file, %error, "import failed");
                self.update(|run| run.progress_mut(category).failed += 1);
            }
        }
    }

    async fn materialize(&self) {
        self.update(|run| {
            run.phase = Phase::CrossReferences;
            run.current_file = None;
        });
        let seconds = self.config.file_timeout_secs;
        let outcome = match tokio::time::timeout(
            Duration::from_secs(seconds),
            self.storage.materialize_cross_references(),
        )
        .await
        {
            Ok(reply) => reply.into_result(),
            Err(_) => Err(SsgError::Timeout {
                what: "cross-reference closure".into(),
                seconds,
            }
            .to_string()),
        };
        if let Err(error) = outcome {
            tracing::warn!(run = %self.run_id, %error, "cross-reference closure failed");
            self.update(|run| run.cross_reference_error = Some(error));
        }
    }
}
