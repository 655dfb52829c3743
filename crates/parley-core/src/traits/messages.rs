// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation and message persistence.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::types::{Role, StoredMessage};

/// Keyed, append-only log of conversation messages.
///
/// Every method may fail with [`ParleyError::Storage`] when the backing store
/// is unreachable. Callers on the chat path absorb that into degraded mode.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Returns the conversation for `session_id`, creating it on first use.
    ///
    /// Calling this twice with the same session yields the same id.
    async fn resolve_or_create(&self, session_id: &str) -> Result<String, ParleyError>;

    /// Looks up the conversation for `session_id` without creating one.
    async fn find_conversation(&self, session_id: &str) -> Result<Option<String>, ParleyError>;

    /// Appends a message and returns its id.
    async fn append(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<String, ParleyError>;

    /// Lists messages in creation order.
    ///
    /// With `limit`, only the most recent `limit` messages are returned,
    /// still oldest first.
    async fn list(
        &self,
        conversation_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<StoredMessage>, ParleyError>;
}
