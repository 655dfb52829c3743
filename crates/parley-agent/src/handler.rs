// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The work a worker performs for one chat job attempt.

use std::sync::Arc;

use async_trait::async_trait;
use parley_core::{
    ContextRetriever, JobRecord, MessageStore, ParleyError, ProviderAdapter, ProviderErrorKind,
    Role,
};
use parley_queue::JobHandler;
use tracing::{debug, info, warn};

use crate::prompt::PromptBuilder;

/// Calls the provider for a chat job and post-processes the reply.
pub struct ChatJobHandler {
    provider: Arc<dyn ProviderAdapter>,
    store: Arc<dyn MessageStore>,
    retriever: Arc<dyn ContextRetriever>,
    prompt: PromptBuilder,
    max_reply_chars: usize,
}

impl ChatJobHandler {
    pub fn new(
        provider: Arc<dyn ProviderAdapter>,
        store: Arc<dyn MessageStore>,
        retriever: Arc<dyn ContextRetriever>,
        prompt: PromptBuilder,
        max_reply_chars: usize,
    ) -> Self {
        Self {
            provider,
            store,
            retriever,
            prompt,
            max_reply_chars,
        }
    }
}

#[async_trait]
impl JobHandler for ChatJobHandler {
    async fn handle(&self, job: &JobRecord) -> Result<String, ParleyError> {
        let payload = &job.payload;

        let context = match self.retriever.retrieve(&payload.message).await {
            Ok(context) => context,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "context retrieval failed, continuing without");
                String::new()
            }
        };

        // A missing history only costs the model some context.
        let history = match self
            .store
            .list(&payload.conversation_id, Some(self.prompt.history_limit()))
            .await
        {
            Ok(history) => history,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "history unavailable, prompting without it");
                Vec::new()
            }
        };

        let messages = self.prompt.build(&context, &history, &payload.message);
        debug!(
            job_id = %job.id,
            attempt = job.attempts,
            messages = messages.len(),
            "calling provider"
        );

        let reply = self.provider.complete(&messages).await?;
        if reply.trim().is_empty() {
            return Err(ParleyError::provider(
                ProviderErrorKind::Empty,
                "provider returned a blank reply",
            ));
        }
        let reply = truncate_reply(reply, self.max_reply_chars);

        if payload.persist_reply
            && let Err(e) = self
                .store
                .append(&payload.conversation_id, Role::Assistant, &reply)
                .await
        {
            warn!(job_id = %job.id, error = %e, "could not store reply, returning it anyway");
        }

        info!(job_id = %job.id, attempt = job.attempts, "chat job handled");
        Ok(reply)
    }
}

/// Cuts `reply` to `max_chars` characters and marks the cut with `...`.
pub fn truncate_reply(reply: String, max_chars: usize) -> String {
    match reply.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            let mut cut = reply[..byte_idx].to_string();
            cut.push_str("...");
            cut
        }
        None => reply,
    }
}
