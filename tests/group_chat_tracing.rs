//! Group chat and span recording integration tests
//!
//! Uses scripted reply handlers to check round limits, speaker order, and that
//! each reply produces exactly one span.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tabletalk::agent::{ChatOutcome, GroupChat, Participant, ReplyHandler, Role, SpeakerPolicy};
use tabletalk::core::{ChatMessage, Result, TabletalkError};
use tabletalk::telemetry::{MemoryTracer, SpanStatus, TraceId, TracingBackend};

/// Replies "turn N" forever
struct Chatty {
    count: AtomicUsize,
}

#[async_trait]
impl ReplyHandler for Chatty {
    async fn generate_reply(
        &self,
        _messages: &[ChatMessage],
        _sender: Option<&str>,
    ) -> Result<Option<String>> {
        let n = self.count.fetch_add(1, Ordering::SeqCst);
        Ok(Some(format!("turn {}", n)))
    }
}

/// Succeeds `ok_replies` times, then fails
struct FailsAfter {
    ok_replies: usize,
    count: AtomicUsize,
}

#[async_trait]
impl ReplyHandler for FailsAfter {
    async fn generate_reply(
        &self,
        _messages: &[ChatMessage],
        _sender: Option<&str>,
    ) -> Result<Option<String>> {
        if self.count.fetch_add(1, Ordering::SeqCst) < self.ok_replies {
            Ok(Some("fine".to_string()))
        } else {
            Err(TabletalkError::inference("connection reset"))
        }
    }
}

fn chatty(name: &str) -> Participant {
    Participant::builder(name, Role::Assistant)
        .handler(Arc::new(Chatty {
            count: AtomicUsize::new(0),
        }))
        .build()
        .unwrap()
}

fn traced_chat(participants: Vec<Participant>, max_round: usize) -> (GroupChat, Arc<MemoryTracer>) {
    let tracer = Arc::new(MemoryTracer::new());
    let trace = tracer
        .open_trace("DataQuery", Default::default())
        .unwrap();

    let mut chat = GroupChat::new(participants, max_round, SpeakerPolicy::RoundRobin).unwrap();
    chat.instrument(tracer.clone(), &trace);
    (chat, tracer)
}

#[tokio::test]
async fn test_never_exceeds_max_round() {
    for max_round in [1, 2, 3, 20] {
        let (mut chat, tracer) = traced_chat(vec![chatty("Relay"), chatty("Assistant")], max_round);

        let outcome = chat.run(ChatMessage::new("Relay", "go")).await.unwrap();
        assert_eq!(outcome, ChatOutcome::RoundLimit);
        assert_eq!(chat.messages().len(), max_round);

        // the opening message is not a reply, so it has no span
        let spans = tracer.spans();
        assert_eq!(spans.len(), max_round - 1);
        assert!(spans.iter().all(|s| s.is_closed()));
    }
}

#[tokio::test]
async fn test_speakers_alternate() {
    let (mut chat, tracer) = traced_chat(vec![chatty("Relay"), chatty("Assistant")], 6);
    chat.run(ChatMessage::new("Relay", "go")).await.unwrap();

    let senders: Vec<&str> = chat.messages().iter().map(|m| m.sender.as_str()).collect();
    assert_eq!(
        senders,
        vec!["Relay", "Assistant", "Relay", "Assistant", "Relay", "Assistant"]
    );

    let span_names: Vec<String> = tracer.spans().into_iter().map(|s| s.name).collect();
    assert_eq!(
        span_names,
        vec![
            "Assistant_Execution",
            "Relay_Execution",
            "Assistant_Execution",
            "Relay_Execution",
            "Assistant_Execution",
        ]
    );
}

#[tokio::test]
async fn test_failure_aborts_and_keeps_partial_transcript() {
    let flaky = Participant::builder("Assistant", Role::Assistant)
        .handler(Arc::new(FailsAfter {
            ok_replies: 1,
            count: AtomicUsize::new(0),
        }))
        .build()
        .unwrap();
    let (mut chat, tracer) = traced_chat(vec![chatty("Relay"), flaky], 20);

    let err = chat.run(ChatMessage::new("Relay", "go")).await.unwrap_err();
    assert_eq!(err.to_string(), "Inference backend error: connection reset");

    // go, fine, turn 0, then the failing call
    assert_eq!(chat.messages().len(), 3);

    let spans = tracer.spans();
    assert_eq!(spans.len(), 3);
    assert!(spans.iter().all(|s| s.is_closed()));
    assert_eq!(spans[2].status, Some(SpanStatus::Error));
    assert_eq!(
        spans.iter().filter(|s| s.status == Some(SpanStatus::Ok)).count(),
        2
    );
}

#[tokio::test]
async fn test_instrumenting_twice_keeps_one_span_per_reply() {
    let tracer = Arc::new(MemoryTracer::new());
    let trace = TraceId::new("manual");

    let mut chat = GroupChat::new(
        vec![chatty("Relay"), chatty("Assistant")],
        4,
        SpeakerPolicy::RoundRobin,
    )
    .unwrap();
    chat.instrument(tracer.clone(), &trace);
    chat.instrument(tracer.clone(), &trace);
    assert!(chat.participants().iter().all(|p| p.is_instrumented()));

    chat.run(ChatMessage::new("Relay", "go")).await.unwrap();
    assert_eq!(tracer.spans().len(), 3);
}
