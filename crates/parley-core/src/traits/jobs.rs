// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable backing store for the job queue.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::types::{JobCounts, JobId, JobPayload, JobRecord, RetentionPolicy};

/// Persistence primitives for jobs.
///
/// Each method is a single atomic transition; the queue and worker pool
/// coordinate only through these.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts a new `waiting` job that is ready immediately.
    async fn insert(
        &self,
        payload: &JobPayload,
        max_attempts: u32,
        backoff_base_ms: u64,
    ) -> Result<JobId, ParleyError>;

    /// Fetches a job by id.
    async fn get(&self, id: &JobId) -> Result<Option<JobRecord>, ParleyError>;

    /// Claims the oldest ready `waiting` job: marks it `active`, increments
    /// its attempt count and stamps the attempt start.
    async fn claim_next(&self) -> Result<Option<JobRecord>, ParleyError>;

    /// Marks an active job `completed` with its result.
    async fn complete(&self, id: &JobId, result: &str) -> Result<(), ParleyError>;

    /// Returns an active job to `waiting`, ready again after `delay`.
    async fn retry(&self, id: &JobId, error: &str, delay: Duration) -> Result<(), ParleyError>;

    /// Marks a job `failed` with the given reason.
    async fn fail(&self, id: &JobId, error: &str) -> Result<(), ParleyError>;

    /// Moves every `active` job back to `waiting`. Returns how many moved.
    async fn requeue_active(&self) -> Result<usize, ParleyError>;

    /// Moves `active` jobs whose current attempt started more than
    /// `older_than` ago back to `waiting`. Returns how many moved.
    async fn requeue_stalled(&self, older_than: Duration) -> Result<usize, ParleyError>;

    /// Deletes finished jobs outside the retention policy. Returns how many.
    async fn evict(&self, policy: &RetentionPolicy) -> Result<usize, ParleyError>;

    /// Counts jobs per state.
    async fn counts(&self) -> Result<JobCounts, ParleyError>;
}
