// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory job store driven by the tokio clock, for paused-time tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parley_core::{
    JobCounts, JobId, JobPayload, JobRecord, JobState, JobStore, ParleyError, RetentionPolicy,
};
use tokio::sync::Mutex;
use tokio::time::Instant;

struct Entry {
    record: JobRecord,
    run_at: Instant,
    started: Option<Instant>,
}

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<Vec<Entry>>,
    /// Number of upcoming `get` calls that fail as if the store were down.
    failing_gets: AtomicUsize,
    /// Number of upcoming `complete` calls that fail without writing.
    failing_completes: AtomicUsize,
}

impl MemoryJobStore {
    pub fn fail_next_gets(&self, n: usize) {
        self.failing_gets.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_completes(&self, n: usize) {
        self.failing_completes.store(n, Ordering::SeqCst);
    }

    pub async fn state_of(&self, id: &JobId) -> Option<JobState> {
        let jobs = self.jobs.lock().await;
        jobs.iter().find(|e| &e.record.id == id).map(|e| e.record.state)
    }
}

/// Decrements `counter` if positive; true when this call should fail.
fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn unavailable() -> ParleyError {
    ParleyError::Storage {
        source: "job store unavailable".into(),
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(
        &self,
        payload: &JobPayload,
        max_attempts: u32,
        backoff_base_ms: u64,
    ) -> Result<JobId, ParleyError> {
        let id = JobId::generate();
        self.jobs.lock().await.push(Entry {
            record: JobRecord {
                id: id.clone(),
                payload: payload.clone(),
                state: JobState::Waiting,
                attempts: 0,
                max_attempts,
                backoff_base_ms,
                result: None,
                error: None,
                created_at: String::new(),
                updated_at: String::new(),
                started_at: None,
                finished_at: None,
            },
            run_at: Instant::now(),
            started: None,
        });
        Ok(id)
    }

    async fn get(&self, id: &JobId) -> Result<Option<JobRecord>, ParleyError> {
        if take_failure(&self.failing_gets) {
            return Err(unavailable());
        }
        let jobs = self.jobs.lock().await;
        Ok(jobs.iter().find(|e| &e.record.id == id).map(|e| e.record.clone()))
    }

    async fn claim_next(&self) -> Result<Option<JobRecord>, ParleyError> {
        let now = Instant::now();
        let mut jobs = self.jobs.lock().await;
        let Some(entry) = jobs
            .iter_mut()
            .find(|e| e.record.state == JobState::Waiting && e.run_at <= now)
        else {
            return Ok(None);
        };
        entry.record.state = JobState::Active;
        entry.record.attempts += 1;
        entry.record.started_at = Some("now".into());
        entry.started = Some(now);
        Ok(Some(entry.record.clone()))
    }

    async fn complete(&self, id: &JobId, result: &str) -> Result<(), ParleyError> {
        if take_failure(&self.failing_completes) {
            return Err(ParleyError::Storage {
                source: "database is locked".into(),
            });
        }
        let mut jobs = self.jobs.lock().await;
        if let Some(e) = jobs
            .iter_mut()
            .find(|e| &e.record.id == id && e.record.state == JobState::Active)
        {
            e.record.state = JobState::Completed;
            e.record.result = Some(result.to_string());
            e.record.error = None;
        }
        Ok(())
    }

    async fn retry(&self, id: &JobId, error: &str, delay: Duration) -> Result<(), ParleyError> {
        let mut jobs = self.jobs.lock().await;
        if let Some(e) = jobs
            .iter_mut()
            .find(|e| &e.record.id == id && e.record.state == JobState::Active)
        {
            e.record.state = JobState::Waiting;
            e.record.error = Some(error.to_string());
            e.run_at = Instant::now() + delay;
        }
        Ok(())
    }

    async fn fail(&self, id: &JobId, error: &str) -> Result<(), ParleyError> {
        let mut jobs = self.jobs.lock().await;
        if let Some(e) = jobs
            .iter_mut()
            .find(|e| &e.record.id == id && !e.record.state.is_terminal())
        {
            e.record.state = JobState::Failed;
            e.record.error = Some(error.to_string());
        }
        Ok(())
    }

    async fn requeue_active(&self) -> Result<usize, ParleyError> {
        let mut jobs = self.jobs.lock().await;
        let mut moved = 0;
        for e in jobs.iter_mut().filter(|e| e.record.state == JobState::Active) {
            e.record.state = JobState::Waiting;
            e.run_at = Instant::now();
            moved += 1;
        }
        Ok(moved)
    }

    async fn requeue_stalled(&self, older_than: Duration) -> Result<usize, ParleyError> {
        let now = Instant::now();
        let mut jobs = self.jobs.lock().await;
        let mut moved = 0;
        for e in jobs.iter_mut().filter(|e| {
            e.record.state == JobState::Active
                && e.started.is_some_and(|at| now.duration_since(at) > older_than)
        }) {
            e.record.state = JobState::Waiting;
            e.run_at = now;
            moved += 1;
        }
        Ok(moved)
    }

    async fn evict(&self, _policy: &RetentionPolicy) -> Result<usize, ParleyError> {
        let mut jobs = self.jobs.lock().await;
        let before = jobs.len();
        jobs.retain(|e| !e.record.state.is_terminal());
        Ok(before - jobs.len())
    }

    async fn counts(&self) -> Result<JobCounts, ParleyError> {
        let jobs = self.jobs.lock().await;
        let mut counts = JobCounts::default();
        for e in jobs.iter() {
            match e.record.state {
                JobState::Waiting => counts.waiting += 1,
                JobState::Active => counts.active += 1,
                JobState::Completed => counts.completed += 1,
                JobState::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }
}

pub fn payload(message: &str) -> JobPayload {
    JobPayload {
        conversation_id: "conv-test".into(),
        message: message.into(),
        session_id: Some("session-test".into()),
        persist_reply: false,
    }
}
