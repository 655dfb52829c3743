// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter and store trait definitions.
//!
//! Adapters extend the [`PluginAdapter`] base trait. Stores are plain
//! `Send + Sync` interfaces so test doubles stay small. All traits use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod counter;
pub mod jobs;
pub mod messages;
pub mod provider;
pub mod retrieval;
pub mod storage;

pub use adapter::PluginAdapter;
pub use counter::CounterStore;
pub use jobs::JobStore;
pub use messages::MessageStore;
pub use provider::ProviderAdapter;
pub use retrieval::ContextRetriever;
pub use storage::StorageAdapter;
