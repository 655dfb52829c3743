// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Parley chat service.

use std::time::Duration;

use thiserror::Error;

use crate::types::ProviderErrorKind;

/// Fallback text shown to callers when no more specific message applies.
pub const GENERIC_USER_MESSAGE: &str =
    "I apologize, but I'm having trouble processing your request right now. Please try again in a moment.";

/// The primary error type used across all Parley adapter traits and core operations.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors. A message, job, or counter store that cannot be
    /// reached surfaces as this variant.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// LLM provider errors, classified by [`ProviderErrorKind`].
    #[error("provider error ({kind}): {message}")]
    Provider {
        kind: ProviderErrorKind,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Client-supplied input was rejected.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The caller exceeded its admission budget.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// A job reached the failed state after exhausting its attempts.
    #[error("job failed: {reason}")]
    JobFailed { reason: String },

    /// The job does not exist (never submitted or already evicted).
    #[error("job not found: {id}")]
    JobNotFound { id: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ParleyError {
    /// Shorthand for a provider error without an underlying source.
    pub fn provider(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self::Provider {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Returns text that is safe to show to an end user.
    ///
    /// Raw provider or storage detail never appears here; it belongs in logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider { kind, .. } => kind.user_message().to_string(),
            Self::Timeout { .. } => ProviderErrorKind::Timeout.user_message().to_string(),
            Self::InvalidInput(msg) => msg.clone(),
            Self::RateLimited { .. } => {
                "Too many requests. Please wait a moment before sending another message."
                    .to_string()
            }
            Self::JobFailed { reason } => reason.clone(),
            _ => GENERIC_USER_MESSAGE.to_string(),
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Provider { kind, .. } => kind.is_transient(),
            Self::InvalidInput(_) | Self::Config(_) => false,
            _ => true,
        }
    }
}
