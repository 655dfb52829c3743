// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage, message, and job store traits.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use parley_config::model::StorageConfig;
use parley_core::{
    AdapterType, HealthStatus, JobCounts, JobId, JobPayload, JobRecord, JobStore, MessageStore,
    ParleyError, PluginAdapter, RetentionPolicy, Role, StorageAdapter, StoredMessage,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
/// The database is opened on [`StorageAdapter::initialize`]; every store
/// method fails with [`ParleyError::Storage`] before that.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Creates the adapter. No connection is opened yet.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns the open database, or an error if not initialized.
    pub fn database(&self) -> Result<&Database, ParleyError> {
        self.db.get().ok_or_else(|| ParleyError::Storage {
            source: "storage not initialized, call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        let db = self.database()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.query_row("SELECT 1", [], |_| Ok(()))
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        if self.db.initialized() {
            self.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), ParleyError> {
        let path = self.config.database_path.clone();
        let db = Database::open_with(&path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| ParleyError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ParleyError> {
        let db = self.database()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl MessageStore for SqliteStorage {
    async fn resolve_or_create(&self, session_id: &str) -> Result<String, ParleyError> {
        queries::conversations::resolve_or_create(self.database()?, session_id).await
    }

    async fn find_conversation(&self, session_id: &str) -> Result<Option<String>, ParleyError> {
        let found = queries::conversations::find_by_session(self.database()?, session_id).await?;
        Ok(found.map(|c| c.id))
    }

    async fn append(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<String, ParleyError> {
        if role == Role::System {
            return Err(ParleyError::InvalidInput(
                "system messages are not stored".to_string(),
            ));
        }
        queries::messages::insert_message(self.database()?, conversation_id, role, content).await
    }

    async fn list(
        &self,
        conversation_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<StoredMessage>, ParleyError> {
        queries::messages::list_messages(self.database()?, conversation_id, limit).await
    }
}

#[async_trait]
impl JobStore for SqliteStorage {
    async fn insert(
        &self,
        payload: &JobPayload,
        max_attempts: u32,
        backoff_base_ms: u64,
    ) -> Result<JobId, ParleyError> {
        queries::jobs::insert_job(self.database()?, payload, max_attempts, backoff_base_ms).await
    }

    async fn get(&self, id: &JobId) -> Result<Option<JobRecord>, ParleyError> {
        queries::jobs::get_job(self.database()?, id).await
    }

    async fn claim_next(&self) -> Result<Option<JobRecord>, ParleyError> {
        queries::jobs::claim_next_job(self.database()?).await
    }

    async fn complete(&self, id: &JobId, result: &str) -> Result<(), ParleyError> {
        if !queries::jobs::complete_job(self.database()?, id, result).await? {
            debug!(job_id = %id, "complete ignored, job no longer active");
        }
        Ok(())
    }

    async fn retry(&self, id: &JobId, error: &str, delay: Duration) -> Result<(), ParleyError> {
        if !queries::jobs::retry_job(self.database()?, id, error, delay).await? {
            debug!(job_id = %id, "retry ignored, job no longer active");
        }
        Ok(())
    }

    async fn fail(&self, id: &JobId, error: &str) -> Result<(), ParleyError> {
        if !queries::jobs::fail_job(self.database()?, id, error).await? {
            debug!(job_id = %id, "fail ignored, job already finished");
        }
        Ok(())
    }

    async fn requeue_active(&self) -> Result<usize, ParleyError> {
        queries::jobs::requeue_active_jobs(self.database()?).await
    }

    async fn requeue_stalled(&self, older_than: Duration) -> Result<usize, ParleyError> {
        queries::jobs::requeue_stalled_jobs(self.database()?, older_than).await
    }

    async fn evict(&self, policy: &RetentionPolicy) -> Result<usize, ParleyError> {
        queries::jobs::evict_jobs(self.database()?, policy).await
    }

    async fn counts(&self) -> Result<JobCounts, ParleyError> {
        queries::jobs::count_jobs(self.database()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::JobState;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn sqlite_storage_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
        assert!(storage.initialize().await.is_err(), "second initialize should fail");
    }

    #[tokio::test]
    async fn uninitialized_store_reports_storage_errors() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("no_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert!(storage.health_check().await.is_err());
        assert!(matches!(
            storage.resolve_or_create("s").await,
            Err(ParleyError::Storage { .. })
        ));
        assert!(matches!(storage.counts().await, Err(ParleyError::Storage { .. })));
        storage.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn health_check_returns_healthy_when_initialized() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("health.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
        storage.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn conversation_flow_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("flow.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        let conv = storage.resolve_or_create("abc").await.unwrap();
        assert_eq!(storage.find_conversation("abc").await.unwrap(), Some(conv.clone()));
        storage.append(&conv, Role::User, "Hello").await.unwrap();
        storage.append(&conv, Role::Assistant, "Hi there!").await.unwrap();
        assert!(storage.append(&conv, Role::System, "nope").await.is_err());

        let history = storage.list(&conv, Some(20)).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].content, "Hi there!");
    }

    #[tokio::test]
    async fn job_lifecycle_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("jobs.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        let payload = JobPayload {
            conversation_id: "conv".into(),
            message: "hi".into(),
            session_id: None,
            persist_reply: true,
        };
        let id = storage.insert(&payload, 2, 0).await.unwrap();
        let claimed = storage.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.id, id);

        storage.retry(&id, "transient", Duration::ZERO).await.unwrap();
        storage.claim_next().await.unwrap().unwrap();
        storage.complete(&id, "done").await.unwrap();
        // Late transitions on a finished job are ignored.
        storage.fail(&id, "too late").await.unwrap();

        let job = storage.get(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.attempts, 2);
        assert_eq!(job.result.as_deref(), Some("done"));
        assert_eq!(storage.counts().await.unwrap().completed, 1);
    }
}
