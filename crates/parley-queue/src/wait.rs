// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronous wait over an asynchronous job.
//!
//! [`wait_for`] polls the job at a fixed interval until it is terminal or the
//! timeout elapses. Timing out only ends the caller's wait; the job keeps
//! running and its outcome is still recorded.

use std::time::Duration;

use parley_config::model::AgentConfig;
use parley_core::{JobId, ParleyError};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::queue::{JobQueue, outcome};

/// Poll cadence and hard deadline for [`wait_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            timeout: Duration::from_secs(60),
        }
    }
}

impl From<&AgentConfig> for WaitOptions {
    fn from(config: &AgentConfig) -> Self {
        Self {
            poll_interval: config.wait_poll_interval(),
            timeout: config.wait_timeout(),
        }
    }
}

/// Blocks until job `id` is terminal, returning its reply.
///
/// Fails with [`ParleyError::JobFailed`] if the job failed and with
/// [`ParleyError::Timeout`] once `options.timeout` has elapsed. Errors while
/// reading the job, and a job that cannot be found, count as still pending.
pub async fn wait_for(
    queue: &JobQueue,
    id: &JobId,
    options: WaitOptions,
) -> Result<String, ParleyError> {
    let deadline = Instant::now() + options.timeout;
    let timed_out = || ParleyError::Timeout {
        duration: options.timeout,
    };

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, queue.get(id)).await {
            Err(_) => return Err(timed_out()),
            Ok(Ok(Some(job))) if job.state.is_terminal() => return outcome(job),
            Ok(Ok(Some(job))) => {
                debug!(job_id = %id, state = %job.state, attempts = job.attempts, "job pending");
            }
            Ok(Ok(None)) => debug!(job_id = %id, "job not visible, treating as pending"),
            Ok(Err(e)) => {
                warn!(job_id = %id, error = %e, "job state query failed, treating as pending");
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(timed_out());
        }
        tokio::time::sleep(options.poll_interval.min(remaining)).await;
    }
}
