// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the queue, storage, provider, and gateway crates.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Storage,
    Retrieval,
}

/// Opaque, immutable job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Author of a chat message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of the message list sent to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A message as persisted in the message store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
}

/// A conversation, one per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub session_id: String,
    pub created_at: String,
}

/// The unit of work carried by a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    pub conversation_id: String,
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Whether the worker appends the reply to the conversation itself.
    #[serde(default)]
    pub persist_reply: bool,
}

/// Coarse, externally observable job lifecycle state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobState {
    /// `completed` and `failed` admit no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Full job row as held by a [`JobStore`](crate::traits::JobStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub id: JobId,
    pub payload: JobPayload,
    pub state: JobState,
    /// Attempts started so far; 0 until a worker first claims the job.
    pub attempts: u32,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Start of the most recent attempt.
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

/// Number of jobs per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
}

/// How long finished jobs stay observable before eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub completed_max_age: Duration,
    pub completed_max_count: u64,
    pub failed_max_age: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            completed_max_age: Duration::from_secs(3600),
            completed_max_count: 100,
            failed_max_age: Duration::from_secs(24 * 3600),
        }
    }
}

/// Classification of provider failures.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum ProviderErrorKind {
    Auth,
    NotFound,
    RateLimited,
    Network,
    Timeout,
    Empty,
    /// Any other non-success answer or an unparseable body.
    Upstream,
}

impl ProviderErrorKind {
    /// Short user-facing explanation for this kind of failure.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::Auth => {
                "I'm having trouble connecting to the AI service. Please contact support if this persists."
            }
            Self::NotFound => {
                "The AI service is temporarily unavailable. Please try again in a moment."
            }
            Self::RateLimited => {
                "The AI service is currently busy. Please wait a moment and try again."
            }
            Self::Network => {
                "I'm having trouble connecting right now. Please check your internet connection and try again."
            }
            Self::Timeout => {
                "The request took too long to process. Please try again with a shorter message."
            }
            Self::Empty => "Received empty response from AI",
            Self::Upstream => crate::error::GENERIC_USER_MESSAGE,
        }
    }

    /// Credential and model errors will not fix themselves between attempts.
    pub fn is_transient(self) -> bool {
        !matches!(self, Self::Auth | Self::NotFound)
    }
}
