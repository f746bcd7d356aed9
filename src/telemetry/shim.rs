//! Span recording around reply handlers
//!
//! [`TracedReply`] decorates a participant's reply handler: every invocation opens a
//! span named `{participant}_Execution`, runs the original handler with the original
//! arguments, and closes the span with the outcome. The handler's result passes
//! through untouched. Tracing failures are logged and never reach the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agent::participant::{Participant, ReplyHandler};
use crate::core::{truncate_chars, ChatMessage, Result, TabletalkError};
use crate::telemetry::{Metadata, SpanEnd, SpanHandle, TraceId, TracingBackend};

/// Length of input and output snippets attached to spans
pub const SNIPPET_CHARS: usize = 200;

/// An open span that is closed exactly once, even if the owner is dropped early
pub struct SpanGuard {
    backend: Arc<dyn TracingBackend>,
    handle: Option<SpanHandle>,
}

impl SpanGuard {
    /// Open a span; a backend failure yields a guard with nothing to close
    pub fn open(
        backend: Arc<dyn TracingBackend>,
        name: &str,
        trace_id: &TraceId,
        metadata: Metadata,
    ) -> Self {
        let handle = match backend.open_span(name, trace_id, metadata) {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(span = name, error = %e, "Failed to open span");
                None
            }
        };

        Self { backend, handle }
    }

    /// Whether the span is still waiting to be closed
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Close with status ok
    pub fn finish_ok(mut self, elapsed: Duration, output: Option<&str>) {
        let mut metadata = Metadata::new();
        metadata.insert(
            "duration_ms".to_string(),
            json!(elapsed.as_secs_f64() * 1000.0),
        );
        metadata.insert(
            "output".to_string(),
            output
                .map(|o| Value::String(truncate_chars(o, SNIPPET_CHARS).to_string()))
                .unwrap_or(Value::Null),
        );
        self.close(SpanEnd::ok(metadata));
    }

    /// Close with status error, carrying the error's display string
    pub fn finish_err(mut self, error: &TabletalkError) {
        let mut metadata = Metadata::new();
        metadata.insert("error".to_string(), json!(error.to_string()));
        self.close(SpanEnd::error("Failed", metadata));
    }

    fn close(&mut self, end: SpanEnd) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.backend.close_span(&handle, end) {
                tracing::warn!(span = %handle.name, error = %e, "Failed to close span");
            }
        }
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let mut metadata = Metadata::new();
            metadata.insert(
                "error".to_string(),
                json!("reply dropped before completion"),
            );
            self.close(SpanEnd::error("Failed", metadata));
        }
    }
}

/// A reply handler that records each call as a span
pub struct TracedReply {
    inner: Arc<dyn ReplyHandler>,
    backend: Arc<dyn TracingBackend>,
    trace_id: TraceId,
    span_name: String,
}

impl TracedReply {
    pub fn new(
        participant_name: &str,
        inner: Arc<dyn ReplyHandler>,
        backend: Arc<dyn TracingBackend>,
        trace_id: TraceId,
    ) -> Self {
        Self {
            inner,
            backend,
            trace_id,
            span_name: format!("{}_Execution", participant_name),
        }
    }

    pub fn span_name(&self) -> &str {
        &self.span_name
    }
}

#[async_trait]
impl ReplyHandler for TracedReply {
    async fn generate_reply(
        &self,
        messages: &[ChatMessage],
        sender: Option<&str>,
    ) -> Result<Option<String>> {
        let start = Instant::now();

        let mut metadata = Metadata::new();
        metadata.insert(
            "input_messages".to_string(),
            messages
                .last()
                .map(|m| Value::String(truncate_chars(&m.content, SNIPPET_CHARS).to_string()))
                .unwrap_or(Value::Null),
        );

        let guard = SpanGuard::open(
            Arc::clone(&self.backend),
            &self.span_name,
            &self.trace_id,
            metadata,
        );

        match self.inner.generate_reply(messages, sender).await {
            Ok(reply) => {
                guard.finish_ok(start.elapsed(), reply.as_deref());
                Ok(reply)
            }
            Err(e) => {
                guard.finish_err(&e);
                Err(e)
            }
        }
    }

    fn is_traced(&self) -> bool {
        true
    }
}

/// Wrap a participant's reply handler in a [`TracedReply`], once
pub fn instrument(
    participant: Participant,
    backend: Arc<dyn TracingBackend>,
    trace_id: &TraceId,
) -> Participant {
    if participant.is_instrumented() {
        tracing::debug!(participant = participant.name(), "Already instrumented");
        return participant;
    }

    let traced = TracedReply::new(
        participant.name(),
        participant.handler(),
        backend,
        trace_id.clone(),
    );
    participant.with_handler(Arc::new(traced))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::participant::Role;
    use crate::telemetry::{MemoryTracer, SpanStatus};

    struct Echo;

    #[async_trait]
    impl ReplyHandler for Echo {
        async fn generate_reply(
            &self,
            messages: &[ChatMessage],
            _sender: Option<&str>,
        ) -> Result<Option<String>> {
            Ok(messages.last().map(|m| m.content.clone()))
        }
    }

    struct Broken;

    #[async_trait]
    impl ReplyHandler for Broken {
        async fn generate_reply(
            &self,
            _messages: &[ChatMessage],
            _sender: Option<&str>,
        ) -> Result<Option<String>> {
            Err(TabletalkError::inference("API error (429): rate limited"))
        }
    }

    fn participant(handler: Arc<dyn ReplyHandler>) -> Participant {
        Participant::builder("Data_Query_Agent", Role::Assistant)
            .handler(handler)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_ok_reply_records_one_closed_span() {
        let tracer = Arc::new(MemoryTracer::new());
        let trace = TraceId::new("trace-1");
        let agent = instrument(participant(Arc::new(Echo)), tracer.clone(), &trace);

        let long = "x".repeat(500);
        let reply = agent
            .generate_reply(&[ChatMessage::new("User_Proxy", long.clone())], Some("User_Proxy"))
            .await
            .unwrap();
        assert_eq!(reply, Some(long));

        let spans = tracer.spans();
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(span.name, "Data_Query_Agent_Execution");
        assert_eq!(span.trace_id, trace);
        assert_eq!(span.status, Some(SpanStatus::Ok));
        assert_eq!(span.input["input_messages"].as_str().unwrap().len(), SNIPPET_CHARS);
        assert_eq!(span.output["output"].as_str().unwrap().len(), SNIPPET_CHARS);
        assert!(span.output["duration_ms"].as_f64().unwrap() >= 0.0);
        assert!(span.start_time <= span.end_time.unwrap());
    }

    #[tokio::test]
    async fn test_no_history_gives_null_input() {
        let tracer = Arc::new(MemoryTracer::new());
        let agent = instrument(participant(Arc::new(Echo)), tracer.clone(), &TraceId::new("t"));

        let reply = agent.generate_reply(&[], None).await.unwrap();
        assert_eq!(reply, None);

        let span = &tracer.spans()[0];
        assert!(span.input["input_messages"].is_null());
        assert!(span.output["output"].is_null());
    }

    #[tokio::test]
    async fn test_error_is_recorded_and_passed_through() {
        let tracer = Arc::new(MemoryTracer::new());
        let agent = instrument(participant(Arc::new(Broken)), tracer.clone(), &TraceId::new("t"));

        let err = agent.generate_reply(&[], None).await.unwrap_err();
        assert!(matches!(err, TabletalkError::Inference(_)));
        assert_eq!(err.to_string(), "Inference backend error: API error (429): rate limited");

        let span = &tracer.spans()[0];
        assert_eq!(span.status, Some(SpanStatus::Error));
        assert_eq!(span.status_message.as_deref(), Some("Failed"));
        assert_eq!(span.output["error"], err.to_string());
    }

    #[tokio::test]
    async fn test_instrument_is_idempotent() {
        let tracer = Arc::new(MemoryTracer::new());
        let trace = TraceId::new("t");
        let agent = instrument(participant(Arc::new(Echo)), tracer.clone(), &trace);
        let agent = instrument(agent, tracer.clone(), &trace);
        assert!(agent.is_instrumented());

        agent
            .generate_reply(&[ChatMessage::new("User_Proxy", "hi")], None)
            .await
            .unwrap();
        assert_eq!(tracer.spans().len(), 1);
    }

    #[tokio::test]
    async fn test_tracing_failure_does_not_mask_reply() {
        let tracer = Arc::new(MemoryTracer::new());
        tracer.fail_spans(true);
        let agent = instrument(participant(Arc::new(Echo)), tracer.clone(), &TraceId::new("t"));

        let reply = agent
            .generate_reply(&[ChatMessage::new("User_Proxy", "hi")], None)
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("hi"));

        let agent = instrument(participant(Arc::new(Broken)), tracer.clone(), &TraceId::new("t"));
        let err = agent.generate_reply(&[], None).await.unwrap_err();
        assert!(matches!(err, TabletalkError::Inference(_)));
    }

    #[test]
    fn test_dropped_guard_closes_span() {
        let tracer = Arc::new(MemoryTracer::new());
        let guard = SpanGuard::open(tracer.clone(), "s", &TraceId::new("t"), Metadata::new());
        assert!(guard.is_open());
        drop(guard);

        let span = &tracer.spans()[0];
        assert!(span.is_closed());
        assert_eq!(span.status, Some(SpanStatus::Error));
    }
}
