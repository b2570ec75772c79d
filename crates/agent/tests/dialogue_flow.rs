//! Integration tests for the dialogue flow (gateway event -> turn -> directives)
//!
//! These tests drive the orchestrator end-to-end and check the learning and
//! error aggregates it feeds.

use std::sync::Arc;
use std::time::Duration;

use mall_voice_agent::{
    AutoLearningEngine, ContextManager, DialogueEvent, DialogueOrchestrator, ErrorLearningSystem,
    InMemoryConversationLog, IntentDetector, OrchestratorConfig, ResponseGenerator,
};
use mall_voice_config::{DialogueConfig, ResponseTemplates, StoreCatalog};
use mall_voice_core::{DialogueState, Directive, GatewayEvent, Intent};

struct Harness {
    orchestrator: DialogueOrchestrator,
    contexts: Arc<ContextManager>,
    learning: Arc<AutoLearningEngine>,
    errors: Arc<ErrorLearningSystem>,
}

fn harness_with_idle(idle_timeout: Duration) -> Harness {
    let catalog = Arc::new(StoreCatalog::default());
    let templates = Arc::new(ResponseTemplates::default());
    let learning = Arc::new(AutoLearningEngine::default());
    let errors = Arc::new(ErrorLearningSystem::default());
    let contexts = Arc::new(ContextManager::new(
        idle_timeout,
        Duration::from_millis(20),
        Arc::clone(&learning),
        Arc::clone(&errors),
    ));

    let orchestrator = DialogueOrchestrator::new(
        OrchestratorConfig::from(&DialogueConfig::default()),
        IntentDetector::new(Arc::clone(&catalog)),
        ResponseGenerator::new(catalog, templates),
        Arc::clone(&contexts),
        Arc::clone(&errors),
        Arc::new(InMemoryConversationLog::new()),
    );

    Harness {
        orchestrator,
        contexts,
        learning,
        errors,
    }
}

fn harness() -> Harness {
    harness_with_idle(Duration::from_secs(600))
}

async fn say(h: &Harness, call_id: &str, text: &str) -> mall_voice_agent::TurnResponse {
    h.orchestrator
        .handle_incoming(GatewayEvent::utterance(call_id, text))
        .await
        .unwrap()
}

fn spoken(directive: &Directive) -> &str {
    match directive {
        Directive::Say { text } | Directive::SayThenGather { text } => text,
        Directive::Transfer { message, .. } => message,
        Directive::Hangup => "",
    }
}

/// "busco Nike" resolves the store and answers with its floor and zone
#[tokio::test]
async fn test_store_search_reply() {
    let h = harness();
    let response = say(&h, "call-1", "busco Nike").await;

    assert_eq!(response.intent, Some(Intent::SearchStore));
    assert_eq!(response.state, DialogueState::AwaitInput);
    let text = spoken(&response.directives[0]);
    assert!(text.contains("piso 2"));
    assert!(text.contains("zona B"));

    let ctx = h.contexts.get("call-1").unwrap();
    assert_eq!(ctx.last_entities.store_name.as_deref(), Some("Nike"));
    assert_eq!(ctx.stores_mentioned, vec!["nike"]);
}

/// Farewell sets the goodbye flag; the next turn closes whatever is said
#[tokio::test]
async fn test_farewell_then_next_turn_closes() {
    let h = harness();
    say(&h, "call-1", "busco Nike").await;

    let response = say(&h, "call-1", "adiós, gracias").await;
    assert_eq!(response.intent, Some(Intent::Farewell));
    assert_eq!(response.state, DialogueState::Closing);
    assert!(h.contexts.has_goodbye("call-1"));

    let mut rx = h.orchestrator.subscribe();
    let response = say(&h, "call-1", "¿a qué hora abre Zara?").await;
    assert_eq!(response.state, DialogueState::Terminated);
    assert!(response.hangs_up());
    assert!(!h.contexts.contains("call-1"));

    let mut end_reason = None;
    while let Ok(event) = rx.try_recv() {
        if let DialogueEvent::CallEnded { reason, .. } = event {
            end_reason = Some(reason);
        }
    }
    assert_eq!(end_reason.as_deref(), Some("farewell"));

    // Both classified turns were flushed on close
    assert_eq!(h.learning.total_outcomes(), 2);
}

/// After a farewell, an event without speech still closes the call
#[tokio::test]
async fn test_farewell_then_empty_event_closes() {
    let h = harness();
    say(&h, "call-1", "adiós, gracias").await;

    let response = h
        .orchestrator
        .handle_incoming(GatewayEvent {
            call_id: "call-1".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(response.state, DialogueState::Terminated);
    assert!(response.hangs_up());
    assert!(!h.contexts.contains("call-1"));
}

/// After a farewell, a silence timeout closes instead of re-prompting
#[tokio::test]
async fn test_farewell_then_silence_closes() {
    let h = harness();
    say(&h, "call-1", "adiós, gracias").await;

    let response = h.orchestrator.handle_silence_timeout("call-1").await.unwrap();
    assert_eq!(response.state, DialogueState::Terminated);
    assert!(matches!(response.directives.last(), Some(Directive::Hangup)));
    assert_eq!(h.errors.counts().timeout_errors, 0);
    assert!(!h.contexts.contains("call-1"));
}

/// Three silence timeouts record a timeout error with the last intent
#[tokio::test]
async fn test_repeated_silence_closes_call() {
    let h = harness();
    say(&h, "call-1", "¿a qué hora cierra Falabella?").await;

    let first = h.orchestrator.handle_silence_timeout("call-1").await.unwrap();
    assert_eq!(first.state, DialogueState::AwaitInput);
    let second = h.orchestrator.handle_silence_timeout("call-1").await.unwrap();
    assert_eq!(second.state, DialogueState::AwaitInput);
    assert_eq!(h.errors.counts().timeout_errors, 0);

    let third = h.orchestrator.handle_silence_timeout("call-1").await.unwrap();
    assert_eq!(third.state, DialogueState::Terminated);
    assert!(third.hangs_up());

    let report = h.errors.report();
    assert_eq!(report.counts.timeout_errors, 1);
    let record = &report.recent.timeout_errors[0];
    assert_eq!(record.last_intent.as_deref(), Some("hours"));
    assert_eq!(record.silence_count, 3);
    assert_eq!(report.top_timeout_intents[0].key, "hours");
}

/// A real utterance resets the silence counter
#[tokio::test]
async fn test_utterance_resets_silence() {
    let h = harness();
    h.orchestrator.handle_silence_timeout("call-1").await.unwrap();
    h.orchestrator.handle_silence_timeout("call-1").await.unwrap();
    say(&h, "call-1", "¿tienen wifi?").await;

    let response = h.orchestrator.handle_silence_timeout("call-1").await.unwrap();
    assert_eq!(response.state, DialogueState::AwaitInput);
    assert_eq!(h.contexts.get("call-1").unwrap().silence_count, 1);
}

/// Transfer to a store with a line, then a failed status returns to input
#[tokio::test]
async fn test_transfer_failure_apologizes() {
    let h = harness();
    let response = say(&h, "call-1", "quiero hablar con Zara").await;
    assert_eq!(response.state, DialogueState::Transferring);
    match &response.directives[..] {
        [Directive::Transfer { target, .. }] => assert_eq!(target, "+56 2 2345 1002"),
        other => panic!("expected transfer, got {:?}", other),
    }

    let response = h
        .orchestrator
        .handle_transfer_status("call-1", "busy")
        .await
        .unwrap();
    assert_eq!(response.state, DialogueState::AwaitInput);
    assert!(matches!(response.directives[0], Directive::SayThenGather { .. }));
    assert!(spoken(&response.directives[0]).starts_with("Lo siento"));

    let report = h.errors.report();
    assert_eq!(report.counts.transfer_errors, 1);
    assert_eq!(report.recent.transfer_errors[0].store_name.as_deref(), Some("Zara"));
    assert_eq!(report.top_transfer_failures[0].key, "+56 2 2345 1002");
}

/// A completed transfer ends the call and flushes the context
#[tokio::test]
async fn test_transfer_completed_terminates() {
    let h = harness();
    say(&h, "call-1", "comuníqueme con Nike").await;

    let response = h
        .orchestrator
        .handle_transfer_status("call-1", "completed")
        .await
        .unwrap();
    assert_eq!(response.state, DialogueState::Terminated);
    assert!(!h.contexts.contains("call-1"));
    assert_eq!(h.learning.total_outcomes(), 1);
    assert_eq!(h.errors.counts().transfer_errors, 0);
}

/// Decline closes politely and ends the call
#[tokio::test]
async fn test_decline_closes() {
    let h = harness();
    say(&h, "call-1", "busco Zara").await;
    let response = say(&h, "call-1", "no gracias, eso es todo").await;

    assert_eq!(response.intent, Some(Intent::Decline));
    assert_eq!(response.state, DialogueState::Terminated);
    assert!(matches!(response.directives.last(), Some(Directive::Hangup)));
    assert!(!h.contexts.contains("call-1"));
}

/// Unknown utterances record intent errors and surface as missing intents
#[tokio::test]
async fn test_unknown_utterances_feed_learning() {
    let h = harness();
    for call in ["call-1", "call-2"] {
        let response = say(&h, call, "¿dónde está la juguetería?").await;
        assert_eq!(response.intent, Some(Intent::Unknown));
        h.orchestrator.handle_hangup(call).await;
    }

    assert_eq!(h.errors.counts().intent_errors, 2);

    let suggestions = h.learning.suggested_intents(2);
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].pattern_signature, "where_is");
    assert_eq!(suggestions[0].frequency, 2);
}

/// Negative feedback prefixes an apology and marks the call's turns failed
#[tokio::test]
async fn test_negative_feedback() {
    let h = harness();
    say(&h, "call-1", "busco Nike").await;
    let response = say(&h, "call-1", "no me sirve, busco la farmacia").await;

    assert!(spoken(&response.directives[0]).starts_with("Lamento las molestias."));
    assert_eq!(h.errors.counts().negative_feedback, 1);

    h.orchestrator.handle_hangup("call-1").await;
    let report = h.learning.report();
    assert_eq!(report.total_outcomes, 2);
    assert_eq!(report.success_rate, 0.0);
}

/// Follow-up questions reuse the store from earlier in the call
#[tokio::test]
async fn test_follow_up_uses_context_store() {
    let h = harness();
    say(&h, "call-1", "busco Zara").await;
    let response = say(&h, "call-1", "¿y a qué hora cierran?").await;

    assert_eq!(response.intent, Some(Intent::Hours));
    assert!(spoken(&response.directives[0]).contains("Zara"));
}

/// An idle call is replaced by a fresh context and its turns are flushed
#[tokio::test]
async fn test_idle_call_restarts_fresh() {
    let h = harness_with_idle(Duration::from_millis(40));
    say(&h, "call-1", "busco Nike").await;
    tokio::time::sleep(Duration::from_millis(80)).await;

    let ctx = h.contexts.get_or_create("call-1");
    assert_eq!(ctx.turn_count, 0);
    assert_eq!(h.learning.total_outcomes(), 1);
}

/// Shutdown flushes every live call
#[tokio::test]
async fn test_shutdown_flushes_all() {
    let h = harness();
    say(&h, "a", "busco Nike").await;
    say(&h, "b", "¿tienen cine?").await;

    assert_eq!(h.orchestrator.shutdown().await, 2);
    assert_eq!(h.contexts.count(), 0);
    assert_eq!(h.learning.total_outcomes(), 2);
}
