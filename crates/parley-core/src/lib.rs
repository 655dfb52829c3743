// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parley chat service.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Parley workspace: the job model shared by
//! the queue and its workers, the message model shared by the orchestrator
//! and the store, and the adapter traits behind which every external
//! collaborator sits.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ParleyError;
pub use types::{
    AdapterType, ChatMessage, HealthStatus, JobCounts, JobId, JobPayload, JobRecord, JobState,
    ProviderErrorKind, RetentionPolicy, Role, StoredMessage,
};

pub use traits::{
    ContextRetriever, CounterStore, JobStore, MessageStore, PluginAdapter, ProviderAdapter,
    StorageAdapter,
};
pub use traits::retrieval::NoopRetriever;
