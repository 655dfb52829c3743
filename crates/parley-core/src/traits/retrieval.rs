// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Context lookup used to augment prompts.

use async_trait::async_trait;

use crate::error::ParleyError;

/// Returns supplementary text relevant to a query.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// May return an empty string. Errors are never fatal to the caller.
    async fn retrieve(&self, query: &str) -> Result<String, ParleyError>;
}

/// Retriever used when context augmentation is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRetriever;

#[async_trait]
impl ContextRetriever for NoopRetriever {
    async fn retrieve(&self, _query: &str) -> Result<String, ParleyError> {
        Ok(String::new())
    }
}
