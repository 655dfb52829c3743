// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Parley chat service.
//!
//! Provides WAL-mode SQLite storage with embedded migrations and a
//! single-writer concurrency model via `tokio-rusqlite`. One database holds
//! conversations, their messages, the durable job queue, and the knowledge
//! snippets used for prompt augmentation.

pub mod adapter;
pub mod database;
pub mod knowledge;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
pub use knowledge::KnowledgeRetriever;
