// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the chat API.
//!
//! Every response body is JSON with camelCase field names. Error bodies carry
//! only user-safe text; details go to the log.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use parley_agent::ChatOutcome;
use parley_core::{JobCounts, JobId, JobState, ParleyError, Role, StoredMessage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, warn};

use crate::server::GatewayState;

const MESSAGE_REQUIRED: &str = "Message is required and must be a non-empty string";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub reply: String,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatFailure {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedReply {
    pub session_id: String,
    pub conversation_id: String,
    pub job_id: String,
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub session_id: String,
    pub messages: Vec<HistoryMessage>,
}

#[derive(Debug, Serialize)]
pub struct HistoryMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

impl From<StoredMessage> for HistoryMessage {
    fn from(message: StoredMessage) -> Self {
        Self {
            id: message.id,
            role: message.role,
            content: message.content,
            timestamp: message.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job_id: String,
    pub state: JobState,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<JobCounts>,
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Pulls `message` and `sessionId` out of a raw JSON body.
///
/// A missing, non-string or empty `message` is rejected here; trimming and
/// length checks are left to the orchestrator.
fn parse_chat_body(body: &[u8]) -> Result<(String, Option<String>), Response> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|_| error_body(StatusCode::BAD_REQUEST, MESSAGE_REQUIRED))?;
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| error_body(StatusCode::BAD_REQUEST, MESSAGE_REQUIRED))?;
    let session_id = value
        .get("sessionId")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok((message.to_string(), session_id))
}

/// POST /chat/message
pub async fn post_message(State(state): State<GatewayState>, body: Bytes) -> Response {
    let (message, session_id) = match parse_chat_body(&body) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };

    match state.orchestrator.handle_message(&message, session_id).await {
        Ok(ChatOutcome::Replied { reply, session_id }) => {
            (StatusCode::OK, Json(ChatReply { reply, session_id })).into_response()
        }
        Ok(ChatOutcome::Failed {
            session_id,
            message,
        }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ChatFailure {
                error: "Failed to get response from AI agent".into(),
                message,
                session_id: Some(session_id),
            }),
        )
            .into_response(),
        Err(ParleyError::InvalidInput(reason)) => error_body(StatusCode::BAD_REQUEST, &reason),
        Err(e) => {
            error!(error = %e, "unexpected chat failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ChatFailure {
                    error: "An unexpected error occurred. Please try again.".into(),
                    message: e.user_message(),
                    session_id: None,
                }),
            )
                .into_response()
        }
    }
}

/// POST /chat/message/async
pub async fn post_message_async(State(state): State<GatewayState>, body: Bytes) -> Response {
    let (message, session_id) = match parse_chat_body(&body) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };

    match state.orchestrator.enqueue_message(&message, session_id).await {
        Ok(accepted) => (
            StatusCode::ACCEPTED,
            Json(QueuedReply {
                session_id: accepted.session_id,
                conversation_id: accepted.conversation_id,
                job_id: accepted.job_id.to_string(),
                status: "processing",
                message: "Your message has been queued for processing",
            }),
        )
            .into_response(),
        Err(ParleyError::InvalidInput(reason)) => error_body(StatusCode::BAD_REQUEST, &reason),
        Err(e) => {
            error!(error = %e, "could not queue message");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// GET /chat/history?sessionId=...
pub async fn get_history(
    State(state): State<GatewayState>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let Some(session_id) = query.session_id.filter(|s| !s.is_empty()) else {
        return error_body(
            StatusCode::BAD_REQUEST,
            "sessionId query parameter is required",
        );
    };

    match state.orchestrator.history(&session_id).await {
        Ok(messages) => Json(HistoryResponse {
            session_id,
            messages: messages.into_iter().map(HistoryMessage::from).collect(),
        })
        .into_response(),
        Err(e) => {
            error!(session_id = %session_id, error = %e, "history lookup failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// GET /chat/jobs/{id}
pub async fn get_job(State(state): State<GatewayState>, Path(id): Path<String>) -> Response {
    match state.orchestrator.queue().get(&JobId::from(id.as_str())).await {
        Ok(Some(job)) => Json(JobStatus {
            job_id: job.id.to_string(),
            state: job.state,
            attempts: job.attempts,
            reply: job.result,
            error: job.error,
        })
        .into_response(),
        Ok(None) => error_body(StatusCode::NOT_FOUND, "Job not found"),
        Err(e) => {
            error!(job_id = %id, error = %e, "job lookup failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let jobs = match state.orchestrator.queue().counts().await {
        Ok(counts) => Some(counts),
        Err(e) => {
            warn!(error = %e, "job counts unavailable");
            None
        }
    };
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started.elapsed().as_secs(),
        jobs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_body_requires_a_string_message() {
        for body in [
            &b"{}"[..],
            br#"{"message": 42}"#,
            br#"{"message": ""}"#,
            br#"{"message": null}"#,
            b"not json",
        ] {
            let response = parse_chat_body(body).unwrap_err();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn chat_body_ignores_non_string_session() {
        let Ok((message, session)) = parse_chat_body(br#"{"message":" hi ","sessionId":7}"#) else {
            panic!("body should parse");
        };
        assert_eq!(message, " hi ");
        assert!(session.is_none());
    }

    #[test]
    fn reply_uses_camel_case() {
        let json = serde_json::to_value(ChatReply {
            reply: "Hi".into(),
            session_id: "s".into(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"reply": "Hi", "sessionId": "s"}));
    }
}
