// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entry point for one chat turn.
//!
//! The orchestrator validates input, keeps the conversation log up to date
//! when it can, and turns the queued job into a synchronous answer. Message
//! store failures switch the request into degraded mode (no persistence)
//! instead of failing it. Only a job that cannot produce a reply yields a
//! failed outcome, and that outcome still carries the session id.

use std::sync::Arc;

use parley_config::ParleyConfig;
use parley_core::{JobId, JobPayload, MessageStore, ParleyError, Role, StoredMessage};
use parley_queue::{JobQueue, RetryPolicy, WaitOptions, wait_for};
use tracing::{debug, error, info, warn};

/// Result of a synchronous chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    Replied { reply: String, session_id: String },
    /// No reply could be produced. `message` is safe to show the user.
    Failed { session_id: String, message: String },
}

impl ChatOutcome {
    pub fn session_id(&self) -> &str {
        match self {
            Self::Replied { session_id, .. } | Self::Failed { session_id, .. } => session_id,
        }
    }
}

/// Handle returned by [`ChatOrchestrator::enqueue_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedJob {
    pub session_id: String,
    pub conversation_id: String,
    pub job_id: JobId,
}

pub struct ChatOrchestrator {
    store: Arc<dyn MessageStore>,
    queue: JobQueue,
    retry: RetryPolicy,
    wait: WaitOptions,
    max_message_chars: usize,
}

impl ChatOrchestrator {
    pub fn new(
        store: Arc<dyn MessageStore>,
        queue: JobQueue,
        retry: RetryPolicy,
        wait: WaitOptions,
        max_message_chars: usize,
    ) -> Self {
        Self {
            store,
            queue,
            retry,
            wait,
            max_message_chars,
        }
    }

    pub fn from_config(
        store: Arc<dyn MessageStore>,
        queue: JobQueue,
        config: &ParleyConfig,
    ) -> Self {
        Self::new(
            store,
            queue,
            RetryPolicy::from(&config.queue),
            WaitOptions::from(&config.agent),
            config.agent.max_message_chars,
        )
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    /// Trims `text` and checks it is non-empty and within the length cap.
    pub fn validate(&self, text: &str) -> Result<String, ParleyError> {
        let message = text.trim();
        if message.is_empty() {
            return Err(ParleyError::InvalidInput("Message cannot be empty".into()));
        }
        if message.chars().count() > self.max_message_chars {
            return Err(ParleyError::InvalidInput(format!(
                "Message is too long. Maximum length is {} characters.",
                self.max_message_chars
            )));
        }
        Ok(message.to_string())
    }

    /// Answers one message synchronously.
    ///
    /// The only error is [`ParleyError::InvalidInput`]; every other failure
    /// becomes [`ChatOutcome::Failed`].
    pub async fn handle_message(
        &self,
        text: &str,
        session_id: Option<String>,
    ) -> Result<ChatOutcome, ParleyError> {
        let message = self.validate(text)?;
        let session_id = resolve_session(session_id);

        let mut conversation = match self.store.resolve_or_create(&session_id).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "message store unavailable, continuing without persistence");
                None
            }
        };

        if let Some(conversation_id) = &conversation
            && let Err(e) = self.store.append(conversation_id, Role::User, &message).await
        {
            warn!(session_id = %session_id, error = %e, "could not store user message, continuing without persistence");
            conversation = None;
        }

        let payload = JobPayload {
            conversation_id: conversation
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            message,
            session_id: Some(session_id.clone()),
            persist_reply: false,
        };

        match self.run_job(payload).await {
            Ok(reply) => {
                if let Some(conversation_id) = &conversation {
                    self.append_best_effort(conversation_id, &reply, &session_id).await;
                }
                info!(session_id = %session_id, degraded = conversation.is_none(), "reply delivered");
                Ok(ChatOutcome::Replied { reply, session_id })
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "chat turn failed");
                let message = e.user_message();
                if let Some(conversation_id) = &conversation {
                    self.append_best_effort(conversation_id, &message, &session_id).await;
                }
                Ok(ChatOutcome::Failed {
                    session_id,
                    message,
                })
            }
        }
    }

    /// Accepts a message for background processing and returns at once.
    ///
    /// Unlike [`handle_message`](Self::handle_message) this needs the message
    /// store: the worker writes the reply into the conversation, which is the
    /// only place the caller can read it back from.
    pub async fn enqueue_message(
        &self,
        text: &str,
        session_id: Option<String>,
    ) -> Result<AcceptedJob, ParleyError> {
        let message = self.validate(text)?;
        let session_id = resolve_session(session_id);

        let conversation_id = self.store.resolve_or_create(&session_id).await?;
        self.store
            .append(&conversation_id, Role::User, &message)
            .await?;

        let job_id = self
            .queue
            .submit(
                JobPayload {
                    conversation_id: conversation_id.clone(),
                    message,
                    session_id: Some(session_id.clone()),
                    persist_reply: true,
                },
                &self.retry,
            )
            .await?;
        info!(session_id = %session_id, job_id = %job_id, "message queued");

        Ok(AcceptedJob {
            session_id,
            conversation_id,
            job_id,
        })
    }

    /// Messages of the session's conversation, oldest first.
    ///
    /// An unknown session has an empty history.
    pub async fn history(&self, session_id: &str) -> Result<Vec<StoredMessage>, ParleyError> {
        match self.store.find_conversation(session_id).await? {
            Some(conversation_id) => self.store.list(&conversation_id, None).await,
            None => Ok(Vec::new()),
        }
    }

    async fn run_job(&self, payload: JobPayload) -> Result<String, ParleyError> {
        let job_id = self.queue.submit(payload, &self.retry).await?;
        debug!(job_id = %job_id, "waiting for job");
        wait_for(&self.queue, &job_id, self.wait).await
    }

    async fn append_best_effort(&self, conversation_id: &str, content: &str, session_id: &str) {
        if let Err(e) = self
            .store
            .append(conversation_id, Role::Assistant, content)
            .await
        {
            warn!(session_id = %session_id, error = %e, "could not store assistant message");
        }
    }
}

fn resolve_session(session_id: Option<String>) -> String {
    session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}
