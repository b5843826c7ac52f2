//! InMemoryJobStore - 開発・テスト用の StatusStore + JobSubmitter
//!
//! # 実装詳細
//! - `HashMap<JobId, JobRecord>` がジョブ状態の正本
//! - `VecDeque<JobId>` が ready キュー（FIFO）
//! - tokio Mutex で排他制御、Notify で worker を起こす
//!
//! リトライ・永続化・スケジューリング方針は持たない。

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};

use crate::domain::{JobId, JobRequest, JobState, Payload, Status};
use crate::error::StoreError;
use crate::ports::{Clock, IdGenerator, JobSubmitter, StatusStore, SystemClock, UlidGenerator};

/// Notify の取りこぼし対策で lease を再確認する間隔
const LEASE_RECHECK: Duration = Duration::from_millis(50);

/// Message recorded on jobs cancelled through `kill`.
pub const KILLED_MESSAGE: &str = "killed";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub queued: usize,
    pub working: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
struct JobRecord {
    request: JobRequest,
    status: Status,
}

impl JobRecord {
    /// Moves a non-terminal job to `state`. Terminal jobs are left untouched.
    fn transition(&mut self, state: JobState, at: chrono::DateTime<chrono::Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status.state = state;
        self.status.updated_at = at;
        true
    }
}

#[derive(Default)]
struct StoreState {
    jobs: HashMap<JobId, JobRecord>,
    ready: VecDeque<JobId>,
}

impl StoreState {
    fn record_mut(&mut self, job_id: JobId) -> Result<&mut JobRecord, StoreError> {
        self.jobs.get_mut(&job_id).ok_or(StoreError::NotFound(job_id))
    }

    fn unqueue(&mut self, job_id: JobId) {
        self.ready.retain(|id| *id != job_id);
    }

    fn counts(&self) -> StoreCounts {
        let mut counts = StoreCounts::default();
        for record in self.jobs.values() {
            match record.status.state {
                JobState::Queued => counts.queued += 1,
                JobState::Working => counts.working += 1,
                JobState::Completed => counts.completed += 1,
                JobState::Failed => counts.failed += 1,
            }
        }
        counts
    }
}

/// Single-process job backend.
pub struct InMemoryJobStore {
    state: Mutex<StoreState>,
    notify: Notify,
    ids: Box<dyn IdGenerator>,
    clock: Box<dyn Clock>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock<C: Clock + Clone + 'static>(clock: C) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            notify: Notify::new(),
            ids: Box::new(UlidGenerator::new(clock.clone())),
            clock: Box::new(clock),
        }
    }

    /// Takes the oldest ready job whose type is in `served`, if any, and
    /// marks it `Working`.
    pub async fn try_lease(&self, served: &HashSet<String>) -> Option<(JobId, JobRequest)> {
        let mut state = self.state.lock().await;
        let pos = state.ready.iter().position(|id| {
            state
                .jobs
                .get(id)
                .is_some_and(|r| served.contains(&r.request.job_type))
        })?;
        let job_id = state.ready.remove(pos)?;
        let now = self.clock.now();
        let record = state.jobs.get_mut(&job_id)?;
        record.transition(JobState::Working, now);
        info!("{job_id} ({}) -> working", record.request.job_type);
        Some((job_id, record.request.clone()))
    }

    /// Waits until a job of a served type is ready, then leases it.
    pub async fn lease(&self, served: &HashSet<String>) -> (JobId, JobRequest) {
        loop {
            if let Some(leased) = self.try_lease(served).await {
                return leased;
            }
            tokio::select! {
                _ = self.notify.notified() => {},
                _ = tokio::time::sleep(LEASE_RECHECK) => {},
            }
        }
    }

    /// Marks a queued job as `Working` without handing it to a worker.
    pub async fn start(&self, job_id: JobId) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.unqueue(job_id);
        let record = state.record_mut(job_id)?;
        if record.status.state == JobState::Queued {
            record.transition(JobState::Working, now);
        }
        Ok(())
    }

    /// Records the result of a job. Ignored if the job already reached a
    /// terminal state (e.g. it was killed while running).
    pub async fn complete(&self, job_id: JobId, payload: Payload) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.unqueue(job_id);
        let record = state.record_mut(job_id)?;
        if record.transition(JobState::Completed, now) {
            record.status.payload = payload;
            info!("{job_id} -> completed");
        }
        Ok(())
    }

    pub async fn fail(&self, job_id: JobId, message: String) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.unqueue(job_id);
        let record = state.record_mut(job_id)?;
        if record.transition(JobState::Failed, now) {
            info!("{job_id} -> failed: {message}");
            record.status.message = Some(message);
        }
        Ok(())
    }

    pub async fn counts(&self) -> StoreCounts {
        self.state.lock().await.counts()
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobSubmitter for InMemoryJobStore {
    async fn create(&self, request: JobRequest) -> Result<JobId, StoreError> {
        let job_id = self.ids.generate_job_id();
        let status = Status::queued(job_id, self.clock.now());
        {
            let mut state = self.state.lock().await;
            info!("{job_id} ({}) queued", request.job_type);
            state.jobs.insert(job_id, JobRecord { request, status });
            state.ready.push_back(job_id);
        }
        self.notify.notify_one();
        Ok(job_id)
    }
}

#[async_trait]
impl StatusStore for InMemoryJobStore {
    async fn get(&self, job_id: JobId) -> Result<Option<Status>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.jobs.get(&job_id).map(|r| r.status.clone()))
    }

    async fn kill(&self, job_id: JobId) -> Result<(), StoreError> {
        self.fail(job_id, KILLED_MESSAGE.to_string()).await
    }
}
