//! The sync pipeline: submit a job, poll it to completion, fetch and map the
//! result, persist it, and keep a display snapshot for the UI.

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::time::sleep;

use civic_ledger_core::sync::{
    display_progress, map_job_result, mark_failed, result_fetch_backoff, BlockRange, DbStats,
    LegacyEstimate, MappedSyncReport, PersistedSyncState, PersistedSyncStatus, PollPolicy,
    ResultConfidence, SyncResult, SyncRetryClass, SyncStateStore, CHAIN_SYNC_RESULT_FETCH_ATTEMPTS,
    FULL_SYNC_BLOCKS, PARTIAL_SYNC_BLOCKS, PROGRESS_FLOOR,
};

use crate::client::SyncJobApi;
use crate::config::SyncClientConfig;
use crate::error::{ChainSyncError, Result};
use crate::events::{SyncEvent, SyncEventSink};
use crate::identity::IdentityProvider;
use crate::poller::JobPoller;
use crate::types::{CreateSyncJobRequest, JobResultResponse};

const SUBMITTING_PROGRESS: u8 = 10;
const PROCESSING_PROGRESS: u8 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Idle,
    Submitting,
    Polling,
    Completed,
    Failed,
}

impl SyncPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, SyncPhase::Submitting | SyncPhase::Polling)
    }
}

/// What to do when a sync is requested while another one is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Refuse the new request with [`ChainSyncError::SyncInProgress`].
    #[default]
    Reject,
    /// Stop polling the running job locally, then start the new one.
    CancelPrevious,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub poll_policy: PollPolicy,
    pub result_fetch_attempts: u32,
    pub legacy: LegacyEstimate,
    pub overlap: OverlapPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            poll_policy: PollPolicy::default(),
            result_fetch_attempts: CHAIN_SYNC_RESULT_FETCH_ATTEMPTS,
            legacy: LegacyEstimate::default(),
            overlap: OverlapPolicy::default(),
        }
    }
}

impl From<&SyncClientConfig> for PipelineOptions {
    fn from(config: &SyncClientConfig) -> Self {
        Self {
            poll_policy: config.poll_policy.clone(),
            result_fetch_attempts: config.result_fetch_attempts,
            ..Self::default()
        }
    }
}

/// Display snapshot of the pipeline.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineState {
    pub phase: SyncPhase,
    pub job_id: Option<String>,
    pub progress: u8,
    pub message: String,
    pub results: Vec<SyncResult>,
    pub block_range: Option<BlockRange>,
    pub error: Option<String>,
    pub confidence: Option<ResultConfidence>,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub db_stats: DbStats,
}

impl PipelineState {
    fn restored(persisted: PersistedSyncState, last_sync_time: Option<DateTime<Utc>>) -> Self {
        let phase = match persisted.status {
            PersistedSyncStatus::Completed => SyncPhase::Completed,
            PersistedSyncStatus::Error => SyncPhase::Failed,
            // A run that was interrupted mid-flight has no poll loop to resume.
            PersistedSyncStatus::Idle | PersistedSyncStatus::Running => SyncPhase::Idle,
        };
        Self {
            phase,
            results: persisted.results,
            block_range: persisted.block_range,
            error: persisted.error,
            last_sync_time,
            ..Self::default()
        }
    }

    fn persisted(&self) -> PersistedSyncState {
        let status = match self.phase {
            SyncPhase::Idle => PersistedSyncStatus::Idle,
            SyncPhase::Submitting | SyncPhase::Polling => PersistedSyncStatus::Running,
            SyncPhase::Completed => PersistedSyncStatus::Completed,
            SyncPhase::Failed => PersistedSyncStatus::Error,
        };
        PersistedSyncState {
            results: self.results.clone(),
            status,
            block_range: self.block_range.clone(),
            error: self.error.clone(),
        }
    }
}

struct ActiveRun {
    id: u64,
    cancel: Arc<AtomicBool>,
}

/// Display state plus the run that currently owns it. Kept under one lock so
/// checking ownership and writing state happen atomically.
#[derive(Default)]
struct Shared {
    state: PipelineState,
    active: Option<ActiveRun>,
}

impl Shared {
    fn is_owned_by(&self, run_id: u64) -> bool {
        self.active.as_ref().is_some_and(|run| run.id == run_id)
    }
}

/// Owns one sync flow at a time and the state it reports.
pub struct SyncPipeline {
    api: Arc<dyn SyncJobApi>,
    store: Arc<dyn SyncStateStore>,
    identity: Arc<dyn IdentityProvider>,
    events: Arc<dyn SyncEventSink>,
    options: PipelineOptions,
    shared: RwLock<Shared>,
    next_run_id: AtomicU64,
}

impl SyncPipeline {
    /// Builds the pipeline and restores whatever the store holds.
    pub fn new(
        api: Arc<dyn SyncJobApi>,
        store: Arc<dyn SyncStateStore>,
        identity: Arc<dyn IdentityProvider>,
        events: Arc<dyn SyncEventSink>,
        options: PipelineOptions,
    ) -> Self {
        let state = PipelineState::restored(store.load(), store.last_sync_time());
        debug!(
            "Restored sync state: {:?} with {} results",
            state.phase,
            state.results.len()
        );
        Self {
            api,
            store,
            identity,
            events,
            options,
            shared: RwLock::new(Shared {
                state,
                active: None,
            }),
            next_run_id: AtomicU64::new(1),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.read_shared().state.clone()
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn is_running(&self) -> bool {
        self.read_shared().active.is_some()
    }

    /// "Partial Sync (last 1000 blocks)".
    pub async fn partial_sync(&self) -> Result<MappedSyncReport> {
        self.start_sync(PARTIAL_SYNC_BLOCKS, false).await
    }

    /// "Full Sync (all blocks)".
    pub async fn full_sync(&self) -> Result<MappedSyncReport> {
        self.start_sync(PARTIAL_SYNC_BLOCKS, true).await
    }

    /// Runs one sync to completion. A full sync always scans
    /// [`FULL_SYNC_BLOCKS`], whatever `blocks_back` says.
    pub async fn start_sync(&self, blocks_back: u64, is_full_sync: bool) -> Result<MappedSyncReport> {
        if !self.identity.is_connected() {
            let err = ChainSyncError::AuthenticationRequired;
            self.events.emit(SyncEvent::Failed {
                message: err.to_string(),
            });
            return Err(err);
        }

        let (run_id, cancel) = self.begin_run()?;
        let outcome = match self.run(run_id, &cancel, blocks_back, is_full_sync).await {
            Err(ChainSyncError::Cancelled) => Err(ChainSyncError::Cancelled),
            Err(err) => Err(self.fail(run_id, err)),
            Ok(report) => Ok(report),
        };
        self.end_run(run_id);
        outcome
    }

    /// Stops local polling of the running job. The backend job is untouched.
    pub fn cancel(&self) -> bool {
        let mut shared = self.write_shared();
        let Some(run) = shared.active.take() else {
            return false;
        };
        run.cancel.store(true, Ordering::SeqCst);
        info!("Cancelled local polling for sync run {}", run.id);

        shared.state.phase = SyncPhase::Idle;
        shared.state.job_id = None;
        shared.state.progress = 0;
        shared.state.message = "Sync cancelled".to_string();
        true
    }

    /// Drops every result, local and persisted, back to the idle state.
    /// The last sync time and entity counts are display-only and survive.
    pub fn clear_sync_data(&self) {
        {
            let mut shared = self.write_shared();
            if let Some(run) = shared.active.take() {
                run.cancel.store(true, Ordering::SeqCst);
                info!("Cancelled local polling for sync run {}", run.id);
            }
            let cleared = PipelineState {
                last_sync_time: shared.state.last_sync_time,
                db_stats: shared.state.db_stats.clone(),
                ..PipelineState::default()
            };
            shared.state = cleared;
            if let Err(err) = self.store.clear() {
                warn!("Failed to clear persisted sync state: {}", err);
            }
        }
        self.events.emit(SyncEvent::Cleared);
    }

    /// Re-reads the per-entity record counts.
    pub async fn refresh_db_stats(&self) -> DbStats {
        let stats = self.api.fetch_db_stats().await;
        debug!("Database holds {} records", stats.total());
        self.write_shared().state.db_stats = stats.clone();
        stats
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Flow
    // ─────────────────────────────────────────────────────────────────────────

    async fn run(
        &self,
        run_id: u64,
        cancel: &Arc<AtomicBool>,
        blocks_back: u64,
        is_full_sync: bool,
    ) -> Result<MappedSyncReport> {
        let request = CreateSyncJobRequest {
            blocks_back: if is_full_sync {
                FULL_SYNC_BLOCKS
            } else {
                blocks_back
            },
            is_full_sync,
        };

        let owned = self.commit_if_current(
            run_id,
            |state| {
                state.phase = SyncPhase::Submitting;
                state.job_id = None;
                state.progress = SUBMITTING_PROGRESS;
                state.message = "Creating blockchain sync job...".to_string();
                state.error = None;
                state.confidence = None;
            },
            None,
        );
        if !owned {
            return Err(ChainSyncError::Cancelled);
        }

        info!(
            "Submitting sync job: {} blocks (full sync: {})",
            request.blocks_back, request.is_full_sync
        );
        let created = self
            .api
            .create_sync_job(&request)
            .await
            .map_err(ChainSyncError::submission)?;
        let job_id = created.job_id;

        let owned = self.update_if_current(run_id, |state| {
            state.phase = SyncPhase::Polling;
            state.job_id = Some(job_id.clone());
            state.progress = display_progress(state.progress, PROGRESS_FLOOR);
            state.message = format!("Job started with ID: {}", job_id);
        });
        if !owned {
            return Err(ChainSyncError::Cancelled);
        }
        self.events.emit(SyncEvent::Started {
            job_id: job_id.clone(),
        });

        JobPoller::new(self.api.as_ref(), &self.options.poll_policy)
            .with_cancel_flag(Arc::clone(cancel))
            .wait_for_completion(&job_id, |job| {
                let mut progress = None;
                self.update_if_current(run_id, |state| {
                    state.progress = display_progress(state.progress, job.progress_percent());
                    state.message = job.display_message();
                    progress = Some((state.progress, state.message.clone()));
                });
                if let Some((progress, message)) = progress {
                    self.events.emit(SyncEvent::Progress {
                        job_id: job_id.clone(),
                        progress,
                        message,
                    });
                }
            })
            .await?;

        self.update_if_current(run_id, |state| {
            state.progress = display_progress(state.progress, PROCESSING_PROGRESS);
            state.message = "Job completed! Processing results...".to_string();
        });

        let raw = self.fetch_result(&job_id, cancel).await?;
        let report = map_job_result(&raw.result, &self.options.legacy)?;
        if report.confidence == ResultConfidence::Estimated {
            warn!(
                "Job {} returned a legacy payload; counts are estimates",
                job_id
            );
        }

        let now = Utc::now();
        let owned = self.commit_if_current(
            run_id,
            |state| {
                state.phase = SyncPhase::Completed;
                state.progress = 100;
                state.message = "Blockchain sync completed successfully!".to_string();
                state.results = report.results.clone();
                state.block_range = report.block_range.clone();
                state.error = None;
                state.confidence = Some(report.confidence);
                state.last_sync_time = Some(now);
            },
            Some(now),
        );
        if !owned {
            return Err(ChainSyncError::Cancelled);
        }

        let totals = report.totals();
        info!(
            "Sync job {} completed: {} new, {} updated, {} removed",
            job_id, totals.new_items, totals.updated_items, totals.removed_items
        );
        self.events.emit(SyncEvent::Completed {
            job_id,
            totals,
            confidence: report.confidence,
        });

        self.refresh_db_stats().await;
        Ok(report)
    }

    async fn fetch_result(&self, job_id: &str, cancel: &AtomicBool) -> Result<JobResultResponse> {
        let max_attempts = self.options.result_fetch_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.api.get_job_result(job_id).await {
                Ok(result) => return Ok(result),
                Err(err)
                    if attempt < max_attempts
                        && err.retry_class() == SyncRetryClass::Retryable
                        && !cancel.load(Ordering::SeqCst) =>
                {
                    let delay = result_fetch_backoff(attempt);
                    warn!(
                        "Fetching result of job {} failed (attempt {}/{}), retrying in {:?}: {}",
                        job_id, attempt, max_attempts, delay, err
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(ChainSyncError::result_fetch(err)),
            }
        }
    }

    /// Records a failed run: prior results stay visible but are marked as
    /// errored, and the failure is persisted. A run that no longer owns the
    /// pipeline fails silently.
    fn fail(&self, run_id: u64, err: ChainSyncError) -> ChainSyncError {
        let message = err.to_string();

        let owned = self.commit_if_current(
            run_id,
            |state| {
                state.phase = SyncPhase::Failed;
                state.progress = 0;
                state.message = String::new();
                state.results = mark_failed(&state.results);
                state.error = Some(message.clone());
                state.confidence = None;
            },
            None,
        );
        if owned {
            error!("Blockchain sync failed: {}", message);
            self.events.emit(SyncEvent::Failed { message });
        } else {
            debug!("Superseded sync run {} ended with: {}", run_id, message);
        }
        err
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Run bookkeeping
    // ─────────────────────────────────────────────────────────────────────────

    fn begin_run(&self) -> Result<(u64, Arc<AtomicBool>)> {
        let mut shared = self.write_shared();
        if let Some(previous) = shared.active.as_ref() {
            match self.options.overlap {
                OverlapPolicy::Reject => {
                    let job_id = shared
                        .state
                        .job_id
                        .clone()
                        .unwrap_or_else(|| "pending submission".to_string());
                    return Err(ChainSyncError::SyncInProgress { job_id });
                }
                OverlapPolicy::CancelPrevious => {
                    info!("Cancelling sync run {} in favour of a new one", previous.id);
                    previous.cancel.store(true, Ordering::SeqCst);
                }
            }
        }

        let id = self.next_run_id.fetch_add(1, Ordering::SeqCst);
        let cancel = Arc::new(AtomicBool::new(false));
        shared.active = Some(ActiveRun {
            id,
            cancel: Arc::clone(&cancel),
        });
        Ok((id, cancel))
    }

    fn end_run(&self, run_id: u64) {
        let mut shared = self.write_shared();
        if shared.is_owned_by(run_id) {
            shared.active = None;
        }
    }

    /// Applies `update` only while `run_id` still owns the pipeline. The
    /// ownership check and the write share one lock.
    fn update_if_current<F>(&self, run_id: u64, update: F) -> bool
    where
        F: FnOnce(&mut PipelineState),
    {
        let mut shared = self.write_shared();
        if !shared.is_owned_by(run_id) {
            return false;
        }
        update(&mut shared.state);
        true
    }

    /// Like [`Self::update_if_current`], then persists the new state (and the
    /// last sync time, when given) before the lock is released, so a
    /// concurrent clear can never be followed by a stale write.
    fn commit_if_current<F>(
        &self,
        run_id: u64,
        update: F,
        completed_at: Option<DateTime<Utc>>,
    ) -> bool
    where
        F: FnOnce(&mut PipelineState),
    {
        let mut shared = self.write_shared();
        if !shared.is_owned_by(run_id) {
            return false;
        }
        update(&mut shared.state);

        if let Err(err) = self.store.save(&shared.state.persisted()) {
            warn!("Failed to persist sync state: {}", err);
        }
        if let Some(at) = completed_at {
            if let Err(err) = self.store.record_last_sync(at) {
                warn!("Failed to record last sync time: {}", err);
            }
        }
        true
    }

    fn read_shared(&self) -> RwLockReadGuard<'_, Shared> {
        self.shared.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_shared(&self) -> RwLockWriteGuard<'_, Shared> {
        self.shared.write().unwrap_or_else(PoisonError::into_inner)
    }
}
