// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley serve` command implementation.
//!
//! Opens SQLite storage, requeues jobs a previous process left running,
//! starts the worker pool and the background sweepers, then serves the HTTP
//! gateway until SIGINT or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use parley_agent::{ChatJobHandler, ChatOrchestrator, PromptBuilder};
use parley_config::model::ParleyConfig;
use parley_core::{
    ContextRetriever, NoopRetriever, ParleyError, ProviderAdapter, StorageAdapter,
};
use parley_gateway::{GatewayState, MemoryCounterStore, RateLimiter, start_server};
use parley_openai::OpenAiProvider;
use parley_queue::{JobQueue, WorkerPool, WorkerPoolConfig};
use parley_storage::{KnowledgeRetriever, SqliteStorage};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::shutdown;

/// Runs the `parley serve` command.
pub async fn run_serve(config: ParleyConfig) -> Result<(), ParleyError> {
    init_tracing(&config.agent.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "starting parley serve");

    let cancel = shutdown::install_signal_handler();

    let provider = OpenAiProvider::new(&config)?;
    if config.provider.check_on_startup {
        match provider.test_connection().await {
            Ok(()) => info!(model = %config.provider.model, "provider connection ok"),
            Err(e) => warn!(error = %e, "provider connection test failed, serving anyway"),
        }
    }

    let services = Services::start(&config, Arc::new(provider), cancel.clone()).await?;

    let served = start_server(&config.gateway, services.state.clone(), cancel.clone()).await;
    if let Err(e) = &served {
        error!(error = %e, "gateway stopped with an error");
    }

    cancel.cancel();
    services.shutdown().await?;
    info!("parley serve stopped");
    served
}

/// Everything `serve` runs besides the HTTP listener.
pub(crate) struct Services {
    pub(crate) state: GatewayState,
    storage: Arc<SqliteStorage>,
    tasks: Vec<JoinHandle<()>>,
}

impl Services {
    /// Opens storage and spawns the workers and sweepers. All tasks stop
    /// when `cancel` fires.
    pub(crate) async fn start(
        config: &ParleyConfig,
        provider: Arc<dyn ProviderAdapter>,
        cancel: CancellationToken,
    ) -> Result<Self, ParleyError> {
        let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
        storage.initialize().await?;
        info!(path = %config.storage.database_path, "storage opened");

        let queue = JobQueue::new(storage.clone(), config.queue.retention())
            .with_stall_timeout(config.queue.stall_timeout());
        queue.recover().await?;

        let retriever: Arc<dyn ContextRetriever> = if config.retrieval.enabled {
            Arc::new(KnowledgeRetriever::new(
                storage.clone(),
                config.retrieval.max_snippets,
            ))
        } else {
            Arc::new(NoopRetriever)
        };

        let handler = ChatJobHandler::new(
            provider,
            storage.clone(),
            retriever,
            PromptBuilder::from_config(&config.agent).await,
            config.agent.max_reply_chars,
        );

        let mut tasks = Vec::new();
        tasks.push(
            WorkerPool::new(
                queue.clone(),
                Arc::new(handler),
                WorkerPoolConfig::from(&config.worker),
            )
            .spawn(cancel.clone()),
        );
        tasks.push(queue.spawn_retention_sweeper(
            Duration::from_secs(config.queue.sweep_interval_secs),
            cancel.clone(),
        ));

        let counters = Arc::new(MemoryCounterStore::new());
        tasks.push(spawn_counter_purge(
            counters.clone(),
            Duration::from_secs(config.rate_limit.window_secs),
            cancel,
        ));

        let limiter = RateLimiter::from_config(counters, &config.rate_limit);
        let orchestrator = ChatOrchestrator::from_config(storage.clone(), queue, config);

        Ok(Self {
            state: GatewayState::new(Arc::new(orchestrator), Arc::new(limiter)),
            storage,
            tasks,
        })
    }

    /// Waits for the background tasks to stop, then checkpoints the database.
    /// The cancellation token must already be cancelled.
    pub(crate) async fn shutdown(self) -> Result<(), ParleyError> {
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        self.storage.close().await
    }
}

fn spawn_counter_purge(
    counters: Arc<MemoryCounterStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let purged = counters.purge_expired();
                    if purged > 0 {
                        tracing::debug!(purged, "purged expired rate limit counters");
                    }
                }
            }
        }
    })
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("parley={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
