// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for chat-completion backends.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::ChatMessage;

/// Adapter for language model providers.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends the full message list and returns the reply text.
    ///
    /// Failures are reported as [`ParleyError::Provider`] carrying a
    /// [`ProviderErrorKind`](crate::types::ProviderErrorKind).
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ParleyError>;
}
