// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router-level tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use parley_core::ProviderErrorKind;
use parley_gateway::{GatewayState, MemoryCounterStore, RateLimiter, build_router};
use parley_test_utils::TestHarness;
use serde_json::{Value, json};
use tower::ServiceExt;

fn router_for(harness: &TestHarness, limit: u64) -> Router {
    let limiter = RateLimiter::new(
        Arc::new(MemoryCounterStore::new()),
        limit,
        Duration::from_secs(60),
    );
    build_router(GatewayState::new(
        harness.orchestrator.clone(),
        Arc::new(limiter),
    ))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn chat_message_returns_reply_and_session() {
    let harness = TestHarness::builder()
        .with_replies(["Hi there!"])
        .build()
        .await
        .unwrap();
    let app = router_for(&harness, 30);

    let (status, body) = send(
        &app,
        post_json("/chat/message", json!({"message": "Hello", "sessionId": "s-1"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"reply": "Hi there!", "sessionId": "s-1"}));
}

#[tokio::test]
async fn chat_message_generates_a_session_when_absent() {
    let harness = TestHarness::builder()
        .with_replies(["Hi"])
        .build()
        .await
        .unwrap();
    let app = router_for(&harness, 30);

    let (status, body) = send(&app, post_json("/chat/message", json!({"message": "Hello"}))).await;

    assert_eq!(status, StatusCode::OK);
    let session = body["sessionId"].as_str().unwrap();
    assert!(!session.is_empty());
}

#[tokio::test]
async fn invalid_messages_are_rejected() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = router_for(&harness, 30);

    let (status, body) = send(&app, post_json("/chat/message", json!({"sessionId": "s"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Message is required and must be a non-empty string"
    );

    let (status, body) = send(&app, post_json("/chat/message", json!({"message": "   "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Message cannot be empty");

    let long = "a".repeat(5001);
    let (status, body) = send(&app, post_json("/chat/message", json!({"message": long}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Message is too long. Maximum length is 5000 characters."
    );

    assert_eq!(harness.provider.call_count(), 0);
}

#[tokio::test]
async fn provider_failure_maps_to_500_with_user_message() {
    let harness = TestHarness::builder()
        .with_failure(ProviderErrorKind::Auth)
        .build()
        .await
        .unwrap();
    let app = router_for(&harness, 30);

    let (status, body) = send(
        &app,
        post_json("/chat/message", json!({"message": "Hello", "sessionId": "s-9"})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to get response from AI agent");
    assert_eq!(body["sessionId"], "s-9");
    assert_eq!(
        body["message"],
        ProviderErrorKind::Auth.user_message()
    );
}

#[tokio::test]
async fn history_lists_the_conversation() {
    let harness = TestHarness::builder()
        .with_replies(["Hi there!"])
        .build()
        .await
        .unwrap();
    let app = router_for(&harness, 30);

    let (status, body) = send(&app, get("/chat/history")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "sessionId query parameter is required");

    let (status, body) = send(&app, get("/chat/history?sessionId=nobody")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"], json!([]));

    send(
        &app,
        post_json("/chat/message", json!({"message": "Hello", "sessionId": "s-1"})),
    )
    .await;
    let (status, body) = send(&app, get("/chat/history?sessionId=s-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessionId"], "s-1");
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "Hello");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], "Hi there!");
    assert!(messages[1]["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn async_message_is_accepted_and_completes() {
    let harness = TestHarness::builder()
        .with_replies(["Queued answer"])
        .build()
        .await
        .unwrap();
    let app = router_for(&harness, 100);

    let (status, body) = send(
        &app,
        post_json("/chat/message/async", json!({"message": "Hello", "sessionId": "s-a"})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "processing");
    assert_eq!(body["sessionId"], "s-a");
    assert_eq!(body["message"], "Your message has been queued for processing");
    let job_id = body["jobId"].as_str().unwrap().to_string();
    assert!(body["conversationId"].as_str().is_some());

    let mut job = Value::Null;
    for _ in 0..200 {
        let (status, body) = send(&app, get(&format!("/chat/jobs/{job_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        if body["state"] == "completed" {
            job = body;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(job["reply"], "Queued answer");
    assert_eq!(job["attempts"], 1);

    let (_, history) = send(&app, get("/chat/history?sessionId=s-a")).await;
    assert_eq!(history["messages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_job_is_404() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = router_for(&harness, 30);

    let (status, body) = send(&app, get("/chat/jobs/does-not-exist")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Job not found");
}

#[tokio::test]
async fn thirty_first_request_in_a_window_is_limited() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = router_for(&harness, 30);

    let request = || {
        Request::get("/chat/history?sessionId=s-1")
            .header("x-forwarded-for", "198.51.100.7")
            .body(Body::empty())
            .unwrap()
    };

    for n in 1..=30u64 {
        let response = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "request {n}");
        assert_eq!(response.headers()["x-ratelimit-limit"], "30");
        assert_eq!(
            response.headers()["x-ratelimit-remaining"],
            (30 - n).to_string().as_str()
        );
    }

    let response = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "60");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["retryAfter"], 60);
    assert_eq!(
        body["error"],
        "Too many requests. Please wait a moment before sending another message."
    );

    // A different caller is unaffected.
    let other = Request::get("/chat/history?sessionId=s-1")
        .header("x-forwarded-for", "198.51.100.8")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.clone().oneshot(other).await.unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn health_is_not_rate_limited() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = router_for(&harness, 1);

    for _ in 0..3 {
        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["uptimeSecs"].is_u64());
        assert!(body["jobs"].is_object());
    }
}
