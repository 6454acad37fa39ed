// ABOUTME: End-to-end walkthrough of a visitor trying the assistant and then signing up
// ABOUTME: Anonymous chat and stream, rejected listing, registration and the empty owned history
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use std::sync::Arc;

use devgpt_server::{
    llm::LlmProvider,
    models::Owner,
    quota::TrialUsage,
    routes::build_router,
};
use helpers::axum_test::AxumTestRequest;
use helpers::scripted_provider::ScriptedProvider;
use serde_json::{json, Value};

#[tokio::test]
async fn test_visitor_tries_assistant_then_registers() {
    let provider: Arc<dyn LlmProvider> =
        Arc::new(ScriptedProvider::fragments(&["Hi", " there!"]).with_title("Greeting"));
    let resources = common::create_test_server_resources(provider).await.unwrap();
    let app = build_router(Arc::clone(&resources));

    // The client keeps its own trial counter for anonymous sends
    let mut trial = TrialUsage::default();
    assert!(trial.can_use(Owner::Anonymous));

    let created: Value = AxumTestRequest::post("/api/chat")
        .send(app.clone())
        .await
        .json();
    let chat_id = created["data"]["id"].as_str().unwrap().to_owned();

    let streamed = AxumTestRequest::post(&format!("/api/chat/{chat_id}/message"))
        .json(&json!({ "content": "hello" }))
        .send_sse(app.clone())
        .await;
    assert_eq!(streamed.status(), 200);
    assert_eq!(
        streamed.sse_events(),
        vec![
            json!({ "content": "Hi" }),
            json!({ "content": " there!" }),
            json!({ "done": true }),
        ]
    );
    assert!(trial.increment(Owner::Anonymous));
    assert_eq!(trial.remaining(), 4);

    // The anonymous thread is reachable by id but never listable
    let fetched: Value = AxumTestRequest::get(&format!("/api/chat/{chat_id}"))
        .send(app.clone())
        .await
        .json();
    assert_eq!(fetched["data"]["messages"][1]["content"], "Hi there!");

    let listed = AxumTestRequest::get("/api/chat").send(app.clone()).await;
    assert_eq!(listed.status(), 401);

    let registered = AxumTestRequest::post("/api/auth/register")
        .json(&json!({
            "name": "Visitor",
            "email": "visitor@example.com",
            "password": "hunter22",
        }))
        .send(app.clone())
        .await;
    assert_eq!(registered.status(), 201);
    let body: Value = registered.json();
    let token = format!("Bearer {}", body["data"]["token"].as_str().unwrap());

    // Signing up does not adopt the anonymous thread
    let owned: Value = AxumTestRequest::get("/api/chat")
        .header("authorization", &token)
        .send(app.clone())
        .await
        .json();
    assert_eq!(owned["count"], 0);
    assert_eq!(owned["data"], json!([]));

    // Signed-in users are not metered
    trial.reset();
    for _ in 0..10 {
        assert!(trial.increment(Owner::Authenticated(uuid::Uuid::new_v4())));
    }
    assert_eq!(trial.used, 0);

    let hidden = AxumTestRequest::get(&format!("/api/chat/{chat_id}"))
        .header("authorization", &token)
        .send(app.clone())
        .await;
    assert_eq!(hidden.status(), 404);

    // The anonymous thread itself is untouched
    let still_there = resources
        .chats()
        .get(chat_id.parse().unwrap(), Owner::Anonymous)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(still_there.message_count, 2);
}
