// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The job queue facade over a durable [`JobStore`].

use std::sync::Arc;
use std::time::Duration;

use parley_core::error::GENERIC_USER_MESSAGE;
use parley_core::{
    JobCounts, JobId, JobPayload, JobRecord, JobState, JobStore, ParleyError, RetentionPolicy,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::retry::RetryPolicy;

/// Durable FIFO of chat jobs with a queryable lifecycle.
///
/// Cloning is cheap; clones share the same store.
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    retention: RetentionPolicy,
    stall_timeout: Duration,
}

/// How long a job may stay active before the sweeper takes it back.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(300);

impl JobQueue {
    pub fn new(store: Arc<dyn JobStore>, retention: RetentionPolicy) -> Self {
        Self {
            store,
            retention,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        }
    }

    /// Sets the lease after which an active job counts as stalled.
    pub fn with_stall_timeout(mut self, stall_timeout: Duration) -> Self {
        self.stall_timeout = stall_timeout;
        self
    }

    /// Enqueues `payload` as a ready job carrying `policy`.
    pub async fn submit(
        &self,
        payload: JobPayload,
        policy: &RetryPolicy,
    ) -> Result<JobId, ParleyError> {
        let backoff_ms = u64::try_from(policy.base_delay.as_millis()).unwrap_or(u64::MAX);
        let id = self
            .store
            .insert(&payload, policy.max_attempts, backoff_ms)
            .await?;
        debug!(job_id = %id, max_attempts = policy.max_attempts, "job submitted");
        Ok(id)
    }

    /// Current coarse state, or `None` if the job is unknown or evicted.
    pub async fn state(&self, id: &JobId) -> Result<Option<JobState>, ParleyError> {
        Ok(self.store.get(id).await?.map(|job| job.state))
    }

    pub async fn get(&self, id: &JobId) -> Result<Option<JobRecord>, ParleyError> {
        self.store.get(id).await
    }

    /// The outcome of a finished job.
    ///
    /// Completed jobs yield their reply, failed ones [`ParleyError::JobFailed`]
    /// with the recorded reason. Asking before the job is terminal is an error.
    pub async fn result(&self, id: &JobId) -> Result<String, ParleyError> {
        let job = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| ParleyError::JobNotFound { id: id.to_string() })?;
        outcome(job)
    }

    pub(crate) async fn claim(&self) -> Result<Option<JobRecord>, ParleyError> {
        self.store.claim_next().await
    }

    pub(crate) async fn complete(&self, id: &JobId, reply: &str) -> Result<(), ParleyError> {
        self.store.complete(id, reply).await
    }

    pub(crate) async fn retry(
        &self,
        id: &JobId,
        reason: &str,
        delay: Duration,
    ) -> Result<(), ParleyError> {
        self.store.retry(id, reason, delay).await
    }

    pub(crate) async fn fail(&self, id: &JobId, reason: &str) -> Result<(), ParleyError> {
        self.store.fail(id, reason).await
    }

    /// Applies the retention policy once.
    pub async fn evict(&self) -> Result<usize, ParleyError> {
        self.store.evict(&self.retention).await
    }

    /// Returns jobs orphaned by a previous process to the waiting state.
    pub async fn recover(&self) -> Result<usize, ParleyError> {
        let moved = self.store.requeue_active().await?;
        if moved > 0 {
            warn!(count = moved, "requeued jobs left active by a previous run");
        }
        Ok(moved)
    }

    /// Returns jobs active for longer than the stall timeout to the waiting
    /// state, so an attempt whose outcome was never written runs again.
    pub async fn requeue_stalled(&self) -> Result<usize, ParleyError> {
        let moved = self.store.requeue_stalled(self.stall_timeout).await?;
        if moved > 0 {
            warn!(
                count = moved,
                stall_timeout_secs = self.stall_timeout.as_secs(),
                "requeued stalled jobs"
            );
        }
        Ok(moved)
    }

    pub async fn counts(&self) -> Result<JobCounts, ParleyError> {
        self.store.counts().await
    }

    /// Runs [`JobQueue::requeue_stalled`] and [`JobQueue::evict`] every
    /// `interval` until `cancel` fires.
    pub fn spawn_retention_sweeper(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let queue = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = queue.requeue_stalled().await {
                            warn!(error = %e, "stalled job check failed");
                        }
                        match queue.evict().await {
                            Ok(0) => {}
                            Ok(n) => info!(evicted = n, "evicted finished jobs"),
                            Err(e) => warn!(error = %e, "job eviction failed"),
                        }
                    }
                }
            }
            debug!("retention sweeper stopped");
        })
    }
}

/// Maps a job record to the caller-facing outcome.
pub(crate) fn outcome(job: JobRecord) -> Result<String, ParleyError> {
    match job.state {
        JobState::Completed => Ok(job.result.unwrap_or_default()),
        JobState::Failed => Err(ParleyError::JobFailed {
            reason: job
                .error
                .unwrap_or_else(|| GENERIC_USER_MESSAGE.to_string()),
        }),
        state => Err(ParleyError::Internal(format!(
            "job {} has no result yet, state is {state}",
            job.id
        ))),
    }
}
