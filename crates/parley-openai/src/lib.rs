// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible provider adapter for Parley.
//!
//! Talks to any `/chat/completions` endpoint (Cerebras by default) and
//! strips reasoning blocks and stray markup from the reply before it reaches
//! the user.

pub mod clean;
pub mod client;
pub mod types;

use async_trait::async_trait;
use parley_config::ParleyConfig;
use parley_core::{
    AdapterType, ChatMessage, HealthStatus, ParleyError, PluginAdapter, ProviderAdapter,
};
use tracing::{debug, info};

use crate::clean::clean_response;
use crate::client::OpenAiClient;

/// Environment variable consulted when `provider.api_key` is unset.
pub const API_KEY_ENV: &str = "CEREBRAS_API_KEY";

/// Chat-completions provider implementing [`ProviderAdapter`].
///
/// API key resolution order: config -> `CEREBRAS_API_KEY` env var -> error.
pub struct OpenAiProvider {
    client: OpenAiClient,
}

impl OpenAiProvider {
    pub fn new(config: &ParleyConfig) -> Result<Self, ParleyError> {
        let api_key = resolve_api_key(&config.provider.api_key, std::env::var(API_KEY_ENV).ok())?;
        let client = OpenAiClient::new(&api_key, &config.provider)?;
        info!(
            model = %config.provider.model,
            base_url = %config.provider.base_url,
            "provider initialized"
        );
        Ok(Self { client })
    }

    pub fn with_client(client: OpenAiClient) -> Self {
        Self { client }
    }

    /// Verifies credentials and model with a minimal request.
    pub async fn test_connection(&self) -> Result<(), ParleyError> {
        self.client.ping().await?;
        info!(model = %self.client.model(), "provider connection verified");
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        // No API call here; health checks should not spend tokens.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        debug!("provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ParleyError> {
        let raw = self.client.chat(messages).await?;
        Ok(clean_response(&raw))
    }
}

/// Picks the configured key, falling back to `env_key`.
fn resolve_api_key(
    config_key: &Option<String>,
    env_key: Option<String>,
) -> Result<String, ParleyError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.clone());
    }

    env_key.filter(|k| !k.is_empty()).ok_or_else(|| {
        ParleyError::Config(format!(
            "provider API key not found. Set provider.api_key in config or the {API_KEY_ENV} environment variable."
        ))
    })
}
