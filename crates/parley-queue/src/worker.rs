// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded pool of consumers draining the job queue.
//!
//! A single dispatcher claims jobs and hands each to its own task. A claim
//! needs both a concurrency permit and a slot in the start throttle, so the
//! two caps hold simultaneously.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use parley_config::model::WorkerConfig;
use parley_core::{JobRecord, ParleyError};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::queue::JobQueue;
use crate::retry::RetryPolicy;
use crate::throttle::StartThrottle;

/// Work performed for one attempt of a job.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    /// Returns the reply to store on the job, or an error whose
    /// [`is_transient`](ParleyError::is_transient) decides whether to retry.
    async fn handle(&self, job: &JobRecord) -> Result<String, ParleyError>;
}

/// Worker pool sizing and pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Jobs active at once.
    pub concurrency: usize,
    /// Job starts allowed per `throughput_window`.
    pub max_starts: u32,
    pub throughput_window: Duration,
    /// Pause between claims when the queue is empty.
    pub poll_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self::from(&WorkerConfig::default())
    }
}

impl From<&WorkerConfig> for WorkerPoolConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            max_starts: config.max_starts,
            throughput_window: Duration::from_millis(config.throughput_window_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

pub struct WorkerPool {
    queue: JobQueue,
    handler: Arc<dyn JobHandler>,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    pub fn new(queue: JobQueue, handler: Arc<dyn JobHandler>, config: WorkerPoolConfig) -> Self {
        Self {
            queue,
            handler,
            config,
        }
    }

    /// Runs the pool on a background task until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Dispatches jobs until `cancel` fires, then waits for in-flight jobs.
    pub async fn run(self, cancel: CancellationToken) {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut throttle =
            StartThrottle::new(self.config.max_starts, self.config.throughput_window);
        let mut tasks = JoinSet::new();

        info!(
            concurrency = self.config.concurrency,
            max_starts = self.config.max_starts,
            window_ms = self.config.throughput_window.as_millis() as u64,
            "worker pool started"
        );

        loop {
            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    error!(error = %e, "worker task aborted");
                }
            }

            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = throttle.ready() => {}
            }

            let job = match self.queue.claim().await {
                Ok(Some(job)) => job,
                Ok(None) => {
                    drop(permit);
                    if idle(&cancel, self.config.poll_interval).await {
                        break;
                    }
                    continue;
                }
                Err(e) => {
                    drop(permit);
                    warn!(error = %e, "failed to claim job");
                    if idle(&cancel, self.config.poll_interval).await {
                        break;
                    }
                    continue;
                }
            };

            throttle.record();
            let queue = self.queue.clone();
            let handler = self.handler.clone();
            tasks.spawn(async move {
                let _permit = permit;
                process(&queue, handler.as_ref(), job).await;
            });
        }

        if !tasks.is_empty() {
            info!(in_flight = tasks.len(), "worker pool stopping, waiting for in-flight jobs");
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "worker task aborted");
            }
        }
        info!("worker pool stopped");
    }
}

/// Sleeps for `period`; returns true if cancelled meanwhile.
async fn idle(cancel: &CancellationToken, period: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(period) => false,
    }
}

/// Attempts at writing a job's outcome before leaving it to the stall sweeper.
const OUTCOME_WRITE_ATTEMPTS: u32 = 3;
const OUTCOME_WRITE_BACKOFF: Duration = Duration::from_millis(100);

/// The state transition an attempt ends in.
enum Outcome {
    Complete(String),
    Retry { reason: String, delay: Duration },
    Fail(String),
}

/// Runs one attempt and records its outcome on the queue.
async fn process(queue: &JobQueue, handler: &dyn JobHandler, job: JobRecord) {
    let policy = RetryPolicy::from_job(&job);
    debug!(job_id = %job.id, attempt = job.attempts, "job attempt started");

    let result = AssertUnwindSafe(handler.handle(&job))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| Err(ParleyError::Internal("job handler panicked".to_string())));

    let outcome = match result {
        Ok(reply) => {
            info!(job_id = %job.id, attempt = job.attempts, "job completed");
            Outcome::Complete(reply)
        }
        Err(err) if err.is_transient() && policy.should_retry(job.attempts) => {
            let delay = policy.delay_for_attempt(job.attempts);
            warn!(
                job_id = %job.id,
                attempt = job.attempts,
                max_attempts = policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "job attempt failed, retry scheduled"
            );
            Outcome::Retry {
                reason: err.user_message(),
                delay,
            }
        }
        Err(err) => {
            error!(
                job_id = %job.id,
                attempts = job.attempts,
                error = %err,
                "job failed"
            );
            Outcome::Fail(err.user_message())
        }
    };

    record(queue, &job, &outcome).await;
}

/// Writes `outcome`, retrying transient store errors with a doubling pause.
///
/// If every write fails the job stays active until the retention sweeper
/// finds it past its lease and requeues it.
async fn record(queue: &JobQueue, job: &JobRecord, outcome: &Outcome) {
    let mut pause = OUTCOME_WRITE_BACKOFF;
    for write in 1..=OUTCOME_WRITE_ATTEMPTS {
        let written = match outcome {
            Outcome::Complete(reply) => queue.complete(&job.id, reply).await,
            Outcome::Retry { reason, delay } => queue.retry(&job.id, reason, *delay).await,
            Outcome::Fail(reason) => queue.fail(&job.id, reason).await,
        };
        match written {
            Ok(()) => return,
            Err(e) if write < OUTCOME_WRITE_ATTEMPTS => {
                warn!(job_id = %job.id, write, error = %e, "job outcome write failed, retrying");
                tokio::time::sleep(pause).await;
                pause *= 2;
            }
            Err(e) => {
                error!(
                    job_id = %job.id,
                    error = %e,
                    "failed to record job outcome, leaving it for the stall check"
                );
            }
        }
    }
}
