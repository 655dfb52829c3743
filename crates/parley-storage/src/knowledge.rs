// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt context retrieval backed by the `knowledge` table.

use std::sync::Arc;

use async_trait::async_trait;
use parley_core::{
    AdapterType, ContextRetriever, HealthStatus, ParleyError, PluginAdapter,
};

use crate::adapter::SqliteStorage;
use crate::queries;

/// Retrieves knowledge snippets relevant to a user message.
pub struct KnowledgeRetriever {
    storage: Arc<SqliteStorage>,
    max_snippets: usize,
}

impl KnowledgeRetriever {
    pub fn new(storage: Arc<SqliteStorage>, max_snippets: usize) -> Self {
        Self {
            storage,
            max_snippets,
        }
    }

    /// Adds a snippet to the knowledge table.
    pub async fn add(&self, text: &str, metadata: Option<&str>) -> Result<i64, ParleyError> {
        queries::knowledge::insert_snippet(self.storage.database()?, text, metadata).await
    }
}

#[async_trait]
impl ContextRetriever for KnowledgeRetriever {
    async fn retrieve(&self, query: &str) -> Result<String, ParleyError> {
        let snippets =
            queries::knowledge::search_snippets(self.storage.database()?, query, self.max_snippets)
                .await?;
        Ok(snippets.join("\n\n"))
    }
}

#[async_trait]
impl PluginAdapter for KnowledgeRetriever {
    fn name(&self) -> &str {
        "sqlite-knowledge"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Retrieval
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        self.storage.health_check().await
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_config::model::StorageConfig;
    use parley_core::StorageAdapter;
    use tempfile::tempdir;

    #[tokio::test]
    async fn retrieve_joins_snippets_with_blank_lines() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("kb.db");
        let storage = Arc::new(SqliteStorage::new(StorageConfig {
            database_path: db_path.to_str().unwrap().to_string(),
            wal_mode: true,
        }));
        storage.initialize().await.unwrap();

        let retriever = KnowledgeRetriever::new(storage.clone(), 2);
        retriever.add("Refunds are processed within 5 days.", None).await.unwrap();
        retriever.add("Refund requests need an order number.", None).await.unwrap();
        retriever.add("Refund fees never apply.", None).await.unwrap();

        let context = retriever.retrieve("what is the refund policy").await.unwrap();
        assert_eq!(
            context,
            "Refunds are processed within 5 days.\n\nRefund requests need an order number."
        );
        assert_eq!(retriever.retrieve("zzzz").await.unwrap(), "");
        assert_eq!(retriever.adapter_type(), AdapterType::Retrieval);
    }
}
