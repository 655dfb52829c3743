// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable job queue operations.
//!
//! A job moves `waiting -> active -> completed | failed`, or back from
//! `active` to `waiting` when an attempt fails and a retry is scheduled.
//! Every transition is a single statement, so concurrent claimers never
//! receive the same job.

use std::str::FromStr;
use std::time::Duration;

use parley_core::ParleyError;
use parley_core::types::{JobCounts, JobId, JobPayload, JobRecord, JobState, RetentionPolicy};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params};

use crate::database::Database;
use crate::queries::seconds_modifier;

const JOB_COLUMNS: &str = "id, payload, state, attempts, max_attempts, backoff_base_ms,
     result, error, created_at, updated_at, started_at, finished_at";

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
    let payload: String = row.get(1)?;
    let payload: JobPayload = serde_json::from_str(&payload)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
    let state: String = row.get(2)?;
    let state = JobState::from_str(&state)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    let backoff_base_ms: i64 = row.get(5)?;

    Ok(JobRecord {
        id: JobId(row.get(0)?),
        payload,
        state,
        attempts: row.get(3)?,
        max_attempts: row.get(4)?,
        backoff_base_ms: u64::try_from(backoff_base_ms).unwrap_or_default(),
        result: row.get(6)?,
        error: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        started_at: row.get(10)?,
        finished_at: row.get(11)?,
    })
}

fn to_sql_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Inserts a ready `waiting` job and returns its new id.
pub async fn insert_job(
    db: &Database,
    payload: &JobPayload,
    max_attempts: u32,
    backoff_base_ms: u64,
) -> Result<JobId, ParleyError> {
    let id = JobId::generate();
    let payload = serde_json::to_string(payload).map_err(|e| ParleyError::Storage {
        source: Box::new(e),
    })?;
    let row_id = id.0.clone();
    let backoff = to_sql_i64(backoff_base_ms);
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO jobs (id, payload, max_attempts, backoff_base_ms)
                 VALUES (?1, ?2, ?3, ?4)",
                params![row_id, payload, max_attempts, backoff],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(id)
}

/// Fetches a job by id.
pub async fn get_job(db: &Database, id: &JobId) -> Result<Option<JobRecord>, ParleyError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| -> Result<Option<JobRecord>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                params![id],
                job_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Claims the oldest ready `waiting` job, marking it `active`.
///
/// The attempt counter is incremented and `started_at` stamped as part of
/// the same statement. Returns `None` when nothing is ready.
pub async fn claim_next_job(db: &Database) -> Result<Option<JobRecord>, ParleyError> {
    db.connection()
        .call(move |conn| -> Result<Option<JobRecord>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "UPDATE jobs SET state = 'active',
                         attempts = attempts + 1,
                         started_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE seq = (
                         SELECT seq FROM jobs
                         WHERE state = 'waiting'
                           AND run_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         ORDER BY seq ASC
                         LIMIT 1
                     )
                     RETURNING {JOB_COLUMNS}"
                ),
                [],
                job_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Marks an active job `completed`. Returns whether a row changed.
pub async fn complete_job(db: &Database, id: &JobId, result: &str) -> Result<bool, ParleyError> {
    let id = id.0.clone();
    let result = result.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE jobs SET state = 'completed', result = ?2, error = NULL,
                     finished_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND state = 'active'",
                params![id, result],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Returns an active job to `waiting`, runnable again once `delay` elapses.
pub async fn retry_job(
    db: &Database,
    id: &JobId,
    error: &str,
    delay: Duration,
) -> Result<bool, ParleyError> {
    let id = id.0.clone();
    let error = error.to_string();
    let run_at = seconds_modifier('+', delay);
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE jobs SET state = 'waiting', error = ?2,
                     run_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?3),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND state = 'active'",
                params![id, error, run_at],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Marks a non-terminal job `failed`. Returns whether a row changed.
pub async fn fail_job(db: &Database, id: &JobId, error: &str) -> Result<bool, ParleyError> {
    let id = id.0.clone();
    let error = error.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE jobs SET state = 'failed', error = ?2,
                     finished_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND state IN ('waiting', 'active')",
                params![id, error],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Moves every `active` job back to `waiting`, ready immediately.
///
/// Used at startup: any job still active belonged to a process that died.
pub async fn requeue_active_jobs(db: &Database) -> Result<usize, ParleyError> {
    db.connection()
        .call(|conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE jobs SET state = 'waiting',
                     run_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE state = 'active'",
                [],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Moves `active` jobs whose attempt started more than `older_than` ago
/// back to `waiting`, ready immediately.
///
/// Catches jobs whose outcome was never recorded while the process kept
/// running.
pub async fn requeue_stalled_jobs(db: &Database, older_than: Duration) -> Result<usize, ParleyError> {
    let cutoff = seconds_modifier('-', older_than);
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE jobs SET state = 'waiting',
                     run_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE state = 'active'
                   AND started_at < strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1)",
                params![cutoff],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Deletes finished jobs that fall outside `policy`. Returns how many went.
pub async fn evict_jobs(db: &Database, policy: &RetentionPolicy) -> Result<usize, ParleyError> {
    let completed_cutoff = seconds_modifier('-', policy.completed_max_age);
    let failed_cutoff = seconds_modifier('-', policy.failed_max_age);
    let keep = to_sql_i64(policy.completed_max_count);
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            let tx = conn.transaction()?;
            let mut removed = tx.execute(
                "DELETE FROM jobs WHERE state = 'completed'
                 AND finished_at < strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1)",
                params![completed_cutoff],
            )?;
            removed += tx.execute(
                "DELETE FROM jobs WHERE state = 'completed' AND seq NOT IN (
                     SELECT seq FROM jobs WHERE state = 'completed'
                     ORDER BY finished_at DESC, seq DESC
                     LIMIT ?1
                 )",
                params![keep],
            )?;
            removed += tx.execute(
                "DELETE FROM jobs WHERE state = 'failed'
                 AND finished_at < strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1)",
                params![failed_cutoff],
            )?;
            tx.commit()?;
            Ok(removed)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Counts jobs per state.
pub async fn count_jobs(db: &Database) -> Result<JobCounts, ParleyError> {
    db.connection()
        .call(|conn| -> Result<JobCounts, rusqlite::Error> {
            let mut stmt = conn.prepare("SELECT state, COUNT(*) FROM jobs GROUP BY state")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;

            let mut counts = JobCounts::default();
            for row in rows {
                let (state, n) = row?;
                let n = u64::try_from(n).unwrap_or_default();
                match state.as_str() {
                    "waiting" => counts.waiting = n,
                    "active" => counts.active = n,
                    "completed" => counts.completed = n,
                    "failed" => counts.failed = n,
                    _ => {}
                }
            }
            Ok(counts)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
