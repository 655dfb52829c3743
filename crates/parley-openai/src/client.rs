// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for OpenAI-compatible chat-completions APIs.
//!
//! Every failure is classified into a [`ProviderErrorKind`] so the worker
//! pool can decide whether to retry and what to tell the user. Retrying is
//! the queue's job; this client makes exactly one request per call.

use std::time::Duration;

use parley_config::model::ProviderConfig;
use parley_core::{ChatMessage, ParleyError, ProviderErrorKind};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::debug;

use crate::types::{ApiErrorResponse, ApiMessage, ChatCompletionRequest, ChatCompletionResponse};

/// Client bound to one endpoint, model, and set of sampling parameters.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

impl OpenAiClient {
    pub fn new(api_key: &str, config: &ProviderConfig) -> Result<Self, ParleyError> {
        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| ParleyError::Config(format!("invalid API key header value: {e}")))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ParleyError::Provider {
                kind: ProviderErrorKind::Upstream,
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            top_p: config.top_p,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends `messages` with the configured sampling parameters.
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ParleyError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages.iter().map(ApiMessage::from).collect(),
            temperature: Some(self.temperature),
            max_tokens: self.max_tokens,
            top_p: Some(self.top_p),
        };
        self.send(&request).await
    }

    /// Sends a tiny "Hello" request to verify credentials and model.
    pub async fn ping(&self) -> Result<String, ParleyError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: "Hello".into(),
            }],
            temperature: None,
            max_tokens: 10,
            top_p: None,
        };
        self.send(&request).await
    }

    async fn send(&self, request: &ChatCompletionRequest) -> Result<String, ParleyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        debug!(status = %status, model = %self.model, "completion response received");

        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(ParleyError::provider(
                classify_status(status),
                format!("API returned {status}: {detail}"),
            ));
        }

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&body).map_err(|e| ParleyError::Provider {
                kind: ProviderErrorKind::Upstream,
                message: format!("failed to parse API response: {e}"),
                source: Some(Box::new(e)),
            })?;

        match parsed.first_content() {
            Some(content) if !content.trim().is_empty() => Ok(content.to_string()),
            _ => Err(ParleyError::provider(
                ProviderErrorKind::Empty,
                "response contained no message content",
            )),
        }
    }
}

/// Maps a non-success HTTP status to a failure kind.
pub fn classify_status(status: StatusCode) -> ProviderErrorKind {
    match status.as_u16() {
        401 | 403 => ProviderErrorKind::Auth,
        404 => ProviderErrorKind::NotFound,
        429 => ProviderErrorKind::RateLimited,
        _ => ProviderErrorKind::Upstream,
    }
}

fn transport_error(e: reqwest::Error) -> ParleyError {
    let kind = if e.is_timeout() {
        ProviderErrorKind::Timeout
    } else if e.is_connect() || e.is_request() {
        ProviderErrorKind::Network
    } else {
        ProviderErrorKind::Upstream
    };
    ParleyError::Provider {
        kind,
        message: format!("HTTP request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::Role;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> ProviderConfig {
        ProviderConfig {
            base_url: base_url.to_string(),
            request_timeout_secs: 2,
            ..ProviderConfig::default()
        }
    }

    fn test_client(base_url: &str) -> OpenAiClient {
        OpenAiClient::new("test-key", &config(base_url)).unwrap()
    }

    fn reply_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        })
    }

    fn hello() -> Vec<ChatMessage> {
        vec![
            ChatMessage::new(Role::System, "be brief"),
            ChatMessage::new(Role::User, "Hello"),
        ]
    }

    fn kind_of(err: ParleyError) -> ProviderErrorKind {
        match err {
            ParleyError::Provider { kind, .. } => kind,
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn chat_sends_model_messages_and_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama-3.3-70b",
                "max_tokens": 2000,
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "Hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("Hi there!")))
            .expect(1)
            .mount(&server)
            .await;

        let reply = test_client(&server.uri()).chat(&hello()).await.unwrap();
        assert_eq!(reply, "Hi there!");
    }

    #[tokio::test]
    async fn status_codes_are_classified() {
        for (status, expected) in [
            (401, ProviderErrorKind::Auth),
            (403, ProviderErrorKind::Auth),
            (404, ProviderErrorKind::NotFound),
            (429, ProviderErrorKind::RateLimited),
            (500, ProviderErrorKind::Upstream),
            (503, ProviderErrorKind::Upstream),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/chat/completions"))
                .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
                    "error": {"message": "nope", "type": "invalid_request_error"}
                })))
                .mount(&server)
                .await;

            let err = test_client(&server.uri()).chat(&hello()).await.unwrap_err();
            assert_eq!(kind_of(err), expected, "status {status}");
        }
    }

    #[tokio::test]
    async fn api_error_detail_is_kept_for_logs_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Invalid API key provided"}
            })))
            .mount(&server)
            .await;

        let err = test_client(&server.uri()).chat(&hello()).await.unwrap_err();
        assert!(err.to_string().contains("Invalid API key provided"));
        assert!(!err.user_message().contains("Invalid API key"));
    }

    #[tokio::test]
    async fn blank_or_missing_content_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("   ")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert_eq!(kind_of(client.chat(&hello()).await.unwrap_err()), ProviderErrorKind::Empty);
        assert_eq!(kind_of(client.chat(&hello()).await.unwrap_err()), ProviderErrorKind::Empty);
    }

    #[tokio::test]
    async fn malformed_body_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = test_client(&server.uri()).chat(&hello()).await.unwrap_err();
        assert_eq!(kind_of(err), ProviderErrorKind::Upstream);
    }

    #[tokio::test]
    async fn slow_upstream_is_a_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(reply_body("late"))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let err = test_client(&server.uri()).chat(&hello()).await.unwrap_err();
        assert_eq!(kind_of(err), ProviderErrorKind::Timeout);
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let err = test_client("http://127.0.0.1:9").chat(&hello()).await.unwrap_err();
        assert_eq!(kind_of(err), ProviderErrorKind::Network);
    }

    #[tokio::test]
    async fn ping_sends_a_ten_token_hello() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "max_tokens": 10,
                "messages": [{"role": "user", "content": "Hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("Hi")))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(test_client(&server.uri()).ping().await.unwrap(), "Hi");
    }

    #[test]
    fn trailing_slash_in_base_url_is_ignored() {
        let client = test_client("https://api.example.com/v1/");
        assert_eq!(client.endpoint, "https://api.example.com/v1/chat/completions");
    }
}
