// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared counter store used for fixed-window admission control.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ParleyError;

/// Atomic expiring counters keyed by caller identity.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increments the counter for `key` and returns the post-increment value.
    ///
    /// An expired counter restarts at zero before the increment. The first
    /// increment of a window sets the window to expire after `window`.
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, ParleyError>;
}
