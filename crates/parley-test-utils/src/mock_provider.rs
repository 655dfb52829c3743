// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock provider adapter for deterministic testing.
//!
//! `MockProvider` implements `ProviderAdapter` with a scripted sequence of
//! replies and failures, enabling fast tests without external API calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use parley_core::{
    AdapterType, ChatMessage, HealthStatus, ParleyError, PluginAdapter, ProviderAdapter,
    ProviderErrorKind,
};

/// A mock provider that answers from a FIFO script.
///
/// When the script is empty, the text "mock response" is returned.
pub struct MockProvider {
    script: Mutex<VecDeque<Result<String, ProviderErrorKind>>>,
    last_messages: Mutex<Vec<ChatMessage>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            last_messages: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Create a mock provider pre-loaded with the given replies.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::new();
        let script = replies.into_iter().map(|r| Ok(r.into())).collect();
        Self {
            script: Mutex::new(script),
            ..provider
        }
    }

    /// Sleep this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn push_reply(&self, text: impl Into<String>) {
        self.script.lock().await.push_back(Ok(text.into()));
    }

    /// Queue a failure of the given kind.
    pub async fn push_failure(&self, kind: ProviderErrorKind) {
        self.script.lock().await.push_back(Err(kind));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Messages passed to the most recent call.
    pub async fn last_messages(&self) -> Vec<ChatMessage> {
        self.last_messages.lock().await.clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ParleyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().await = messages.to_vec();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.script.lock().await.pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(kind)) => Err(ParleyError::provider(kind, format!("mock {kind} failure"))),
            None => Ok("mock response".to_string()),
        }
    }
}
