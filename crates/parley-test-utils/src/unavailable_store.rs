// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A message store that is always down.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parley_core::{MessageStore, ParleyError, Role, StoredMessage};

/// Fails every call with [`ParleyError::Storage`] and counts the attempts.
#[derive(Debug, Default)]
pub struct UnavailableStore {
    calls: AtomicUsize,
}

impl UnavailableStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn down<T>(&self) -> Result<T, ParleyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ParleyError::Storage {
            source: "message store unavailable".into(),
        })
    }
}

#[async_trait]
impl MessageStore for UnavailableStore {
    async fn resolve_or_create(&self, _session_id: &str) -> Result<String, ParleyError> {
        self.down()
    }

    async fn find_conversation(&self, _session_id: &str) -> Result<Option<String>, ParleyError> {
        self.down()
    }

    async fn append(
        &self,
        _conversation_id: &str,
        _role: Role,
        _content: &str,
    ) -> Result<String, ParleyError> {
        self.down()
    }

    async fn list(
        &self,
        _conversation_id: &str,
        _limit: Option<usize>,
    ) -> Result<Vec<StoredMessage>, ParleyError> {
        self.down()
    }
}
