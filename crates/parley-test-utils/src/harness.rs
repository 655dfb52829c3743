// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the full chat pipeline (temp SQLite store, job
//! queue, worker pool, orchestrator) around a [`MockProvider`], with timings
//! short enough for tests.

use std::sync::Arc;
use std::time::Duration;

use parley_agent::{ChatJobHandler, ChatOrchestrator, ChatOutcome, PromptBuilder};
use parley_config::ParleyConfig;
use parley_config::model::StorageConfig;
use parley_core::{
    MessageStore, NoopRetriever, ParleyError, ProviderErrorKind, StorageAdapter,
};
use parley_queue::{JobQueue, RetryPolicy, WaitOptions, WorkerPool, WorkerPoolConfig};
use parley_storage::SqliteStorage;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::mock_provider::MockProvider;
use crate::unavailable_store::UnavailableStore;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    script: Vec<Result<String, ProviderErrorKind>>,
    provider_delay: Option<Duration>,
    store_down: bool,
    max_attempts: u32,
    wait_timeout: Duration,
    start_workers: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            script: Vec::new(),
            provider_delay: None,
            store_down: false,
            max_attempts: 3,
            wait_timeout: Duration::from_secs(5),
            start_workers: true,
        }
    }

    /// Queue provider replies, answered in order.
    pub fn with_replies<I, S>(mut self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script.extend(replies.into_iter().map(|r| Ok(r.into())));
        self
    }

    /// Queue a provider failure after any replies queued so far.
    pub fn with_failure(mut self, kind: ProviderErrorKind) -> Self {
        self.script.push(Err(kind));
        self
    }

    pub fn with_provider_delay(mut self, delay: Duration) -> Self {
        self.provider_delay = Some(delay);
        self
    }

    /// Route conversation traffic to a store that always fails.
    pub fn with_unavailable_store(mut self) -> Self {
        self.store_down = true;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Leave the queue undrained; submitted jobs stay waiting.
    pub fn without_workers(mut self) -> Self {
        self.start_workers = false;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, ParleyError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| ParleyError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let storage = Arc::new(SqliteStorage::new(StorageConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            wal_mode: true,
        }));
        storage.initialize().await?;

        let unavailable = Arc::new(UnavailableStore::default());
        let message_store: Arc<dyn MessageStore> = if self.store_down {
            unavailable.clone()
        } else {
            storage.clone()
        };

        let mut mock = MockProvider::new();
        if let Some(delay) = self.provider_delay {
            mock = mock.with_delay(delay);
        }
        for step in self.script {
            match step {
                Ok(text) => mock.push_reply(text).await,
                Err(kind) => mock.push_failure(kind).await,
            }
        }
        let provider = Arc::new(mock);

        let mut config = ParleyConfig::default();
        config.agent.system_prompt = Some("You are a test assistant.".into());
        config.storage.database_path = db_path.to_string_lossy().into_owned();
        config.queue.max_attempts = self.max_attempts;
        config.queue.backoff_base_ms = 10;

        let queue = JobQueue::new(storage.clone(), config.queue.retention())
            .with_stall_timeout(config.queue.stall_timeout());
        let orchestrator = Arc::new(ChatOrchestrator::new(
            message_store.clone(),
            queue.clone(),
            RetryPolicy::exponential(self.max_attempts, Duration::from_millis(10)),
            WaitOptions {
                poll_interval: Duration::from_millis(10),
                timeout: self.wait_timeout,
            },
            config.agent.max_message_chars,
        ));

        let cancel = CancellationToken::new();
        let workers = if self.start_workers {
            let handler = ChatJobHandler::new(
                provider.clone(),
                message_store.clone(),
                Arc::new(NoopRetriever),
                PromptBuilder::from_config(&config.agent).await,
                config.agent.max_reply_chars,
            );
            let pool_config = WorkerPoolConfig {
                poll_interval: Duration::from_millis(5),
                ..WorkerPoolConfig::from(&config.worker)
            };
            Some(WorkerPool::new(queue.clone(), Arc::new(handler), pool_config).spawn(cancel.clone()))
        } else {
            None
        };

        Ok(TestHarness {
            provider,
            storage,
            message_store,
            unavailable,
            queue,
            orchestrator,
            config,
            cancel,
            workers,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete chat pipeline over a temp database and a mock provider.
pub struct TestHarness {
    /// The mock provider the workers call.
    pub provider: Arc<MockProvider>,
    /// SQLite storage (temp DB, removed on drop). Always backs the job queue.
    pub storage: Arc<SqliteStorage>,
    /// The message store the orchestrator and workers use.
    pub message_store: Arc<dyn MessageStore>,
    /// The failing store, used when built with `with_unavailable_store`.
    pub unavailable: Arc<UnavailableStore>,
    pub queue: JobQueue,
    pub orchestrator: Arc<ChatOrchestrator>,
    pub config: ParleyConfig,
    cancel: CancellationToken,
    workers: Option<JoinHandle<()>>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Runs one synchronous chat turn.
    pub async fn send_message(
        &self,
        text: &str,
        session_id: Option<&str>,
    ) -> Result<ChatOutcome, ParleyError> {
        self.orchestrator
            .handle_message(text, session_id.map(str::to_string))
            .await
    }

    /// A token cancelled when the harness shuts down, for extra tasks.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops the workers and closes the database.
    pub async fn shutdown(mut self) -> Result<(), ParleyError> {
        self.cancel.cancel();
        if let Some(workers) = self.workers.take() {
            workers
                .await
                .map_err(|e| ParleyError::Internal(format!("worker pool panicked: {e}")))?;
        }
        self.storage.close().await
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
