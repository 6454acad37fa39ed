// ABOUTME: Integration tests for the streaming completion relay
// ABOUTME: Drives sends against a scripted provider and checks events, persistence and titles
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use std::sync::Arc;
use std::time::Duration;

use devgpt_server::{
    context::RequestContext,
    llm::{LlmCapabilities, LlmProvider, MessageRole, DEFAULT_MODEL},
    models::{ClientInfo, Owner, TokenCounts},
    resources::ServerResources,
    services::{chat_relay::FailureReason, RelayConfig, RelayEvent, RelayOutcome, SendMessage},
};
use futures_util::StreamExt;
use helpers::scripted_provider::ScriptedProvider;
use uuid::Uuid;

struct Fixture {
    resources: Arc<ServerResources>,
    provider: Arc<ScriptedProvider>,
}

async fn fixture(provider: ScriptedProvider) -> Fixture {
    fixture_with(provider, common::fast_relay_config()).await
}

async fn fixture_with(provider: ScriptedProvider, relay: RelayConfig) -> Fixture {
    let provider = Arc::new(provider);
    let dyn_provider: Arc<dyn LlmProvider> = provider.clone();
    let resources = common::create_test_server_resources_with(dyn_provider, relay)
        .await
        .unwrap();
    Fixture {
        resources,
        provider,
    }
}

fn anonymous() -> RequestContext {
    RequestContext::anonymous("relay-test", ClientInfo::default())
}

fn message(content: &str) -> SendMessage {
    SendMessage {
        content: content.to_owned(),
        model: None,
    }
}

async fn new_conversation(resources: &ServerResources) -> Uuid {
    resources
        .chats()
        .create(Owner::Anonymous, DEFAULT_MODEL)
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_fragments_stream_in_order_then_reply_is_persisted() {
    let fx = fixture(ScriptedProvider::fragments(&["Hel", "lo"])).await;
    let conversation_id = new_conversation(&fx.resources).await;

    let session = fx
        .resources
        .relay
        .send(&anonymous(), conversation_id, message("hi"))
        .await
        .unwrap();
    let events: Vec<RelayEvent> = session.events.collect().await;

    assert_eq!(
        events,
        vec![
            RelayEvent::Content("Hel".to_owned()),
            RelayEvent::Content("lo".to_owned()),
            RelayEvent::Done,
        ]
    );

    let RelayOutcome::Completed { message, title_task } = session.outcome.await.unwrap() else {
        panic!("relay should complete");
    };
    assert_eq!(message.content, "Hello");
    assert_eq!(message.role, MessageRole::Assistant);
    assert_eq!(message.model.as_deref(), Some(DEFAULT_MODEL));
    title_task.expect("first exchange spawns a title task").await.unwrap();

    let chats = fx.resources.chats();
    let history = chats.get_messages(conversation_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, MessageRole::User);
    assert_eq!(history[0].content, "hi");
    assert_eq!(history[1].content, "Hello");

    let conversation = chats
        .get(conversation_id, Owner::Anonymous)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conversation.message_count, 2);
    assert_eq!(conversation.title, "Scripted Title");
}

#[tokio::test]
async fn test_upstream_request_carries_system_prompt_and_history() {
    let fx = fixture(ScriptedProvider::fragments(&["ok"])).await;
    let conversation_id = new_conversation(&fx.resources).await;

    let session = fx
        .resources
        .relay
        .send(&anonymous(), conversation_id, message("explain borrowing"))
        .await
        .unwrap();
    let _: Vec<RelayEvent> = session.events.collect().await;
    session.outcome.await.unwrap();

    let requests = fx.provider.stream_requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.model.as_deref(), Some(DEFAULT_MODEL));
    assert_eq!(request.messages.len(), 2);
    assert_eq!(request.messages[0].role, MessageRole::System);
    assert_eq!(request.messages[1].role, MessageRole::User);
    assert_eq!(request.messages[1].content, "explain borrowing");
}

#[tokio::test]
async fn test_upstream_failure_sends_one_error_and_persists_nothing() {
    let fx = fixture(ScriptedProvider::failing_after(&["Hel"], "boom")).await;
    let conversation_id = new_conversation(&fx.resources).await;

    let session = fx
        .resources
        .relay
        .send(&anonymous(), conversation_id, message("hi"))
        .await
        .unwrap();
    let events: Vec<RelayEvent> = session.events.collect().await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0], RelayEvent::Content("Hel".to_owned()));
    let RelayEvent::Error(reason) = &events[1] else {
        panic!("expected a terminal error, got {:?}", events[1]);
    };
    assert!(reason.contains("boom"));

    assert!(matches!(
        session.outcome.await.unwrap(),
        RelayOutcome::Failed(FailureReason::Upstream(_))
    ));

    // Only the user message survives
    let history = fx.resources.chats().get_messages(conversation_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, MessageRole::User);
}

#[tokio::test]
async fn test_refused_stream_is_reported_in_band() {
    let fx = fixture(ScriptedProvider::refusing("rate limited")).await;
    let conversation_id = new_conversation(&fx.resources).await;

    let session = fx
        .resources
        .relay
        .send(&anonymous(), conversation_id, message("hi"))
        .await
        .unwrap();
    let events: Vec<RelayEvent> = session.events.collect().await;

    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], RelayEvent::Error(m) if m.contains("rate limited")));
    assert_eq!(
        fx.resources.chats().count_messages(conversation_id).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_dropping_the_stream_cancels_the_relay() {
    let fx = fixture(ScriptedProvider::hanging_after(&["Hel"])).await;
    let conversation_id = new_conversation(&fx.resources).await;

    let mut session = fx
        .resources
        .relay
        .send(&anonymous(), conversation_id, message("hi"))
        .await
        .unwrap();

    assert_eq!(
        session.events.next().await,
        Some(RelayEvent::Content("Hel".to_owned()))
    );
    drop(session.events);

    let outcome = tokio::time::timeout(Duration::from_secs(2), session.outcome)
        .await
        .expect("producer should stop once the caller leaves")
        .unwrap();
    assert!(matches!(
        outcome,
        RelayOutcome::Failed(FailureReason::Disconnected)
    ));
    assert_eq!(
        fx.resources.chats().count_messages(conversation_id).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_request_cancellation_stops_the_relay() {
    let fx = fixture(ScriptedProvider::hanging_after(&[])).await;
    let conversation_id = new_conversation(&fx.resources).await;
    let ctx = anonymous();

    let session = fx
        .resources
        .relay
        .send(&ctx, conversation_id, message("hi"))
        .await
        .unwrap();
    ctx.cancellation.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(2), session.outcome)
        .await
        .expect("producer should observe cancellation")
        .unwrap();
    assert!(matches!(
        outcome,
        RelayOutcome::Failed(FailureReason::Disconnected)
    ));
}

#[tokio::test]
async fn test_stalled_stream_times_out() {
    let relay = RelayConfig {
        stream_timeout: Duration::from_millis(200),
        ..common::fast_relay_config()
    };
    let fx = fixture_with(ScriptedProvider::hanging_after(&["Hel"]), relay).await;
    let conversation_id = new_conversation(&fx.resources).await;

    let session = fx
        .resources
        .relay
        .send(&anonymous(), conversation_id, message("hi"))
        .await
        .unwrap();
    let events: Vec<RelayEvent> = tokio::time::timeout(Duration::from_secs(5), session.events.collect())
        .await
        .expect("timeout should end the stream");

    assert_eq!(
        events,
        vec![
            RelayEvent::Content("Hel".to_owned()),
            RelayEvent::Error("Response timed out".to_owned()),
        ]
    );
    assert!(matches!(
        session.outcome.await.unwrap(),
        RelayOutcome::Failed(FailureReason::TimedOut)
    ));
    assert_eq!(
        fx.resources.chats().count_messages(conversation_id).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_title_is_only_inferred_after_the_first_exchange() {
    let fx = fixture(ScriptedProvider::fragments(&["sure"]).with_title("Rust Help")).await;
    let conversation_id = new_conversation(&fx.resources).await;
    let relay = &fx.resources.relay;

    let first = relay
        .send(&anonymous(), conversation_id, message("one"))
        .await
        .unwrap();
    let _: Vec<RelayEvent> = first.events.collect().await;
    let RelayOutcome::Completed { title_task, .. } = first.outcome.await.unwrap() else {
        panic!("first send should complete");
    };
    title_task.unwrap().await.unwrap();

    let second = relay
        .send(&anonymous(), conversation_id, message("two"))
        .await
        .unwrap();
    let _: Vec<RelayEvent> = second.events.collect().await;
    let RelayOutcome::Completed { title_task, .. } = second.outcome.await.unwrap() else {
        panic!("second send should complete");
    };
    assert!(title_task.is_none());

    let conversation = fx
        .resources
        .chats()
        .get(conversation_id, Owner::Anonymous)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conversation.title, "Rust Help");
    assert_eq!(conversation.message_count, 4);
}

#[tokio::test]
async fn test_failed_title_inference_keeps_placeholder() {
    let fx = fixture(ScriptedProvider::fragments(&["sure"]).with_failing_title()).await;
    let conversation_id = new_conversation(&fx.resources).await;

    let session = fx
        .resources
        .relay
        .send(&anonymous(), conversation_id, message("hi"))
        .await
        .unwrap();
    let events: Vec<RelayEvent> = session.events.collect().await;
    assert_eq!(events.last(), Some(&RelayEvent::Done));

    let RelayOutcome::Completed { title_task, .. } = session.outcome.await.unwrap() else {
        panic!("relay should complete");
    };
    title_task.unwrap().await.unwrap();

    let conversation = fx
        .resources
        .chats()
        .get(conversation_id, Owner::Anonymous)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conversation.title, "New Chat");
}

#[tokio::test]
async fn test_blank_content_is_rejected_before_saving() {
    let fx = fixture(ScriptedProvider::fragments(&["unused"])).await;
    let conversation_id = new_conversation(&fx.resources).await;

    let Err(err) = fx
        .resources
        .relay
        .send(&anonymous(), conversation_id, message("   \n"))
        .await
    else {
        panic!("blank content should be rejected");
    };
    assert_eq!(err.http_status(), 400);
    assert_eq!(
        fx.resources.chats().count_messages(conversation_id).await.unwrap(),
        0
    );
    assert!(fx.provider.requests().is_empty());
}

#[tokio::test]
async fn test_foreign_conversation_is_not_found() {
    let fx = fixture(ScriptedProvider::fragments(&["unused"])).await;
    let owner = common::create_test_user(&fx.resources.database, "owner@example.com")
        .await
        .unwrap();
    let owned = fx
        .resources
        .chats()
        .create(Owner::Authenticated(owner.id), DEFAULT_MODEL)
        .await
        .unwrap();

    let Err(err) = fx
        .resources
        .relay
        .send(&anonymous(), owned.id, message("hi"))
        .await
    else {
        panic!("anonymous caller must not reach an owned conversation");
    };
    assert_eq!(err.http_status(), 404);
    assert_eq!(fx.resources.chats().count_messages(owned.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unknown_model_is_rejected_before_saving() {
    let fx = fixture(ScriptedProvider::fragments(&["unused"])).await;
    let conversation_id = new_conversation(&fx.resources).await;

    let Err(err) = fx
        .resources
        .relay
        .send(
            &anonymous(),
            conversation_id,
            SendMessage {
                content: "hi".to_owned(),
                model: Some("gpt-imaginary".to_owned()),
            },
        )
        .await
    else {
        panic!("unknown model should be rejected");
    };
    assert_eq!(err.http_status(), 400);
    assert_eq!(
        fx.resources.chats().count_messages(conversation_id).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_stream_ending_without_completion_is_a_failure() {
    let fx = fixture(ScriptedProvider::ending_after(&["Half an ans"])).await;
    let conversation_id = new_conversation(&fx.resources).await;

    let session = fx
        .resources
        .relay
        .send(&anonymous(), conversation_id, message("hi"))
        .await
        .unwrap();
    let events: Vec<RelayEvent> = session.events.collect().await;

    assert_eq!(
        events,
        vec![
            RelayEvent::Content("Half an ans".to_owned()),
            RelayEvent::Error("Stream ended unexpectedly".to_owned()),
        ]
    );
    assert!(matches!(
        session.outcome.await.unwrap(),
        RelayOutcome::Failed(FailureReason::Upstream(_))
    ));

    let history = fx.resources.chats().get_messages(conversation_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content, "hi");
}

#[tokio::test]
async fn test_retry_after_failure_is_a_fresh_attempt() {
    let provider =
        ScriptedProvider::failing_after(&["Hel"], "boom").then_fragments(&["Fresh", " reply"]);
    let fx = fixture(provider).await;
    let conversation_id = new_conversation(&fx.resources).await;
    let relay = &fx.resources.relay;

    let failed = relay
        .send(&anonymous(), conversation_id, message("hi"))
        .await
        .unwrap();
    let events: Vec<RelayEvent> = failed.events.collect().await;
    assert!(matches!(events.last(), Some(RelayEvent::Error(_))));
    failed.outcome.await.unwrap();

    let retried = relay
        .send(&anonymous(), conversation_id, message("hi"))
        .await
        .unwrap();
    let events: Vec<RelayEvent> = retried.events.collect().await;
    assert_eq!(
        events,
        vec![
            RelayEvent::Content("Fresh".to_owned()),
            RelayEvent::Content(" reply".to_owned()),
            RelayEvent::Done,
        ]
    );
    retried.outcome.await.unwrap();

    let chats = fx.resources.chats();
    let history = chats.get_messages(conversation_id).await.unwrap();
    let turns: Vec<(MessageRole, &str)> = history
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(
        turns,
        vec![
            (MessageRole::User, "hi"),
            (MessageRole::User, "hi"),
            (MessageRole::Assistant, "Fresh reply"),
        ]
    );
    let conversation = chats
        .get(conversation_id, Owner::Anonymous)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conversation.message_count, 3);

    // The second upstream call sees both user turns and no partial reply
    let requests = fx.provider.stream_requests();
    assert_eq!(requests.len(), 2);
    let roles: Vec<MessageRole> = requests[1].messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![MessageRole::System, MessageRole::User, MessageRole::User]
    );
}

#[tokio::test]
async fn test_long_history_keeps_the_newest_message_in_the_prompt() {
    let fx = fixture(ScriptedProvider::fragments(&["ok"])).await;
    let conversation_id = new_conversation(&fx.resources).await;
    let chats = fx.resources.chats();

    for i in 0..1000 {
        chats
            .append_message(
                conversation_id,
                MessageRole::User,
                &format!("m{i}"),
                None,
                TokenCounts::default(),
            )
            .await
            .unwrap();
    }

    let session = fx
        .resources
        .relay
        .send(&anonymous(), conversation_id, message("latest"))
        .await
        .unwrap();
    let _: Vec<RelayEvent> = session.events.collect().await;
    session.outcome.await.unwrap();

    let requests = fx.provider.stream_requests();
    let prompt = &requests[0].messages;
    assert_eq!(prompt.len(), 1001);
    assert_eq!(prompt[1].content, "m1");
    assert_eq!(prompt.last().unwrap().content, "latest");
}

#[tokio::test]
async fn test_provider_without_streaming_is_rejected_before_saving() {
    let provider = ScriptedProvider::fragments(&["unused"])
        .with_capabilities(LlmCapabilities::SYSTEM_MESSAGES);
    let fx = fixture(provider).await;
    let conversation_id = new_conversation(&fx.resources).await;

    let Err(err) = fx
        .resources
        .relay
        .send(&anonymous(), conversation_id, message("hi"))
        .await
    else {
        panic!("a provider that cannot stream should be refused");
    };
    assert_eq!(err.http_status(), 503);
    assert_eq!(
        fx.resources.chats().count_messages(conversation_id).await.unwrap(),
        0
    );
    assert!(fx.provider.requests().is_empty());
}

#[tokio::test]
async fn test_system_prompt_is_omitted_when_unsupported() {
    let provider =
        ScriptedProvider::fragments(&["ok"]).with_capabilities(LlmCapabilities::STREAMING);
    let fx = fixture(provider).await;
    let conversation_id = new_conversation(&fx.resources).await;

    let session = fx
        .resources
        .relay
        .send(&anonymous(), conversation_id, message("hi"))
        .await
        .unwrap();
    let _: Vec<RelayEvent> = session.events.collect().await;
    session.outcome.await.unwrap();

    let requests = fx.provider.stream_requests();
    let roles: Vec<MessageRole> = requests[0].messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![MessageRole::User]);
}
