// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembles the message list sent to the provider for one chat turn.

use parley_config::model::AgentConfig;
use parley_core::{ChatMessage, Role, StoredMessage};
use tracing::{info, warn};

/// Used when neither a prompt file nor an inline prompt is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful and friendly customer support agent for a small e-commerce store. \
Answer customer questions clearly and concisely. Be professional, empathetic, and solution-oriented. \
If asked about something you do not know, politely say you will need to check with the team.\n\n\
IMPORTANT: Respond ONLY with your direct answer to the customer. Do NOT include any reasoning, \
thinking process, or internal notes. Do NOT use tags like <think> or <reasoning>. \
Just provide your response directly.";

/// Builds provider prompts from a system prompt, history, and context.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_prompt: String,
    history_limit: usize,
}

impl PromptBuilder {
    pub fn new(system_prompt: impl Into<String>, history_limit: usize) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            history_limit,
        }
    }

    /// Resolves the system prompt from `config` (file > inline > default).
    pub async fn from_config(config: &AgentConfig) -> Self {
        let system_prompt =
            load_system_prompt(&config.system_prompt, &config.system_prompt_file).await;
        Self::new(system_prompt, config.history_limit)
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// How many stored messages the caller should fetch.
    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Produces `[system, ...history, user]`.
    ///
    /// The orchestrator stores the user message before the job runs, so a
    /// trailing history entry identical to `message` is dropped rather than
    /// sent twice.
    pub fn build(&self, context: &str, history: &[StoredMessage], message: &str) -> Vec<ChatMessage> {
        let mut system = self.system_prompt.clone();
        let context = context.trim();
        if !context.is_empty() {
            system.push_str("\n\nADDITIONAL CONTEXT:\n");
            system.push_str(context);
            system.push_str(
                "\n\nUse this additional context if relevant, but prioritize the instructions above.",
            );
        }

        let start = history.len().saturating_sub(self.history_limit);
        let mut turns: Vec<&StoredMessage> = history[start..]
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant))
            .collect();
        if turns
            .last()
            .is_some_and(|m| m.role == Role::User && m.content == message)
        {
            turns.pop();
        }

        let mut messages = Vec::with_capacity(turns.len() + 2);
        messages.push(ChatMessage::new(Role::System, system));
        messages.extend(turns.into_iter().map(|m| ChatMessage::new(m.role, m.content.clone())));
        messages.push(ChatMessage::new(Role::User, message));
        messages
    }
}

/// Loads the system prompt following priority: file > inline > default.
pub async fn load_system_prompt(
    inline_prompt: &Option<String>,
    prompt_file: &Option<String>,
) -> String {
    if let Some(file_path) = prompt_file {
        match tokio::fs::read_to_string(file_path).await {
            Ok(content) => {
                let trimmed = content.trim();
                if !trimmed.is_empty() {
                    info!(path = file_path, "loaded system prompt from file");
                    return trimmed.to_string();
                }
            }
            Err(e) => {
                warn!(
                    path = file_path,
                    error = %e,
                    "failed to read system prompt file, falling back"
                );
            }
        }
    }

    if let Some(prompt) = inline_prompt
        && !prompt.trim().is_empty()
    {
        return prompt.clone();
    }

    DEFAULT_SYSTEM_PROMPT.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(role: Role, content: &str) -> StoredMessage {
        StoredMessage {
            id: format!("m-{content}"),
            conversation_id: "c-1".into(),
            role,
            content: content.into(),
            created_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn empty_history_yields_system_and_user() {
        let builder = PromptBuilder::new("Be brief.", 20);
        let messages = builder.build("", &[], "Hello");
        assert_eq!(
            messages,
            vec![
                ChatMessage::new(Role::System, "Be brief."),
                ChatMessage::new(Role::User, "Hello"),
            ]
        );
    }

    #[test]
    fn context_is_appended_to_system_message() {
        let builder = PromptBuilder::new("Be brief.", 20);
        let messages = builder.build("Refunds take 5-7 days.", &[], "refund?");
        let system = &messages[0].content;
        assert!(system.starts_with("Be brief.\n\nADDITIONAL CONTEXT:\nRefunds take 5-7 days."));
        assert!(system.ends_with("prioritize the instructions above."));
    }

    #[test]
    fn blank_context_is_ignored() {
        let builder = PromptBuilder::new("Be brief.", 20);
        assert_eq!(builder.build("  \n", &[], "hi")[0].content, "Be brief.");
    }

    #[test]
    fn trailing_copy_of_current_message_is_dropped() {
        let builder = PromptBuilder::new("sys", 20);
        let history = vec![
            stored(Role::User, "Do you ship to Canada?"),
            stored(Role::Assistant, "Yes, we do."),
            stored(Role::User, "How long?"),
        ];
        let messages = builder.build("", &history, "How long?");
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(messages.last().unwrap().content, "How long?");
    }

    #[test]
    fn repeated_question_with_reply_in_between_is_kept() {
        let builder = PromptBuilder::new("sys", 20);
        let history = vec![stored(Role::User, "hi"), stored(Role::Assistant, "hello")];
        let messages = builder.build("", &history, "hi");
        assert_eq!(messages.len(), 4);
    }

    #[test]
    fn only_the_most_recent_history_is_used() {
        let builder = PromptBuilder::new("sys", 2);
        let history = vec![
            stored(Role::User, "one"),
            stored(Role::Assistant, "two"),
            stored(Role::User, "three"),
            stored(Role::Assistant, "four"),
        ];
        let messages = builder.build("", &history, "five");
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["sys", "three", "four", "five"]);
    }

    #[tokio::test]
    async fn system_prompt_default() {
        let prompt = load_system_prompt(&None, &None).await;
        assert_eq!(prompt, DEFAULT_SYSTEM_PROMPT);
        assert!(prompt.contains("Do NOT include any reasoning"));
    }

    #[tokio::test]
    async fn system_prompt_inline_overrides_default() {
        let prompt = load_system_prompt(&Some("Custom prompt.".into()), &None).await;
        assert_eq!(prompt, "Custom prompt.");
    }

    #[tokio::test]
    async fn system_prompt_file_overrides_inline() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("prompt.md");
        std::fs::write(&file_path, "  File-based prompt.\n").unwrap();

        let prompt = load_system_prompt(
            &Some("Inline prompt.".into()),
            &Some(file_path.to_string_lossy().into_owned()),
        )
        .await;
        assert_eq!(prompt, "File-based prompt.");
    }

    #[tokio::test]
    async fn system_prompt_missing_file_falls_back_to_inline() {
        let prompt = load_system_prompt(
            &Some("Fallback prompt.".into()),
            &Some("/nonexistent/path/prompt.md".into()),
        )
        .await;
        assert_eq!(prompt, "Fallback prompt.");
    }

    #[tokio::test]
    async fn from_config_carries_history_limit() {
        let config = AgentConfig {
            system_prompt: Some("Hi.".into()),
            history_limit: 7,
            ..AgentConfig::default()
        };
        let builder = PromptBuilder::from_config(&config).await;
        assert_eq!(builder.system_prompt(), "Hi.");
        assert_eq!(builder.history_limit(), 7);
    }
}
