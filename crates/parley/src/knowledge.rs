// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley knowledge add`: seed the retrieval table.

use std::sync::Arc;

use parley_config::ParleyConfig;
use parley_core::{ParleyError, StorageAdapter};
use parley_storage::{KnowledgeRetriever, SqliteStorage};

pub async fn run_add(
    config: &ParleyConfig,
    text: &str,
    metadata: Option<&str>,
) -> Result<(), ParleyError> {
    if text.trim().is_empty() {
        return Err(ParleyError::InvalidInput("snippet text cannot be empty".into()));
    }
    if let Some(metadata) = metadata {
        serde_json::from_str::<serde_json::Value>(metadata)
            .map_err(|e| ParleyError::InvalidInput(format!("metadata is not valid JSON: {e}")))?;
    }

    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;

    let knowledge = KnowledgeRetriever::new(storage.clone(), config.retrieval.max_snippets);
    let id = knowledge.add(text.trim(), metadata).await?;
    println!("stored snippet {id}");

    if !config.retrieval.enabled {
        println!("note: retrieval is disabled; set retrieval.enabled = true to use it");
    }

    storage.close().await
}
