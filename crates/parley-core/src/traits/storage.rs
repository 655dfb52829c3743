// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends (SQLite, etc.).

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;

/// Adapter for storage and persistence backends.
///
/// Storage adapters manage the lifecycle of database connections. The data
/// operations live on [`MessageStore`](crate::traits::MessageStore) and
/// [`JobStore`](crate::traits::JobStore).
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), ParleyError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), ParleyError>;
}
