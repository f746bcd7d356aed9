//! In-memory tracing backend
//!
//! Keeps every trace and span in process. Used when no Langfuse credentials are
//! configured and as the substitute backend in tests, where the failure switches
//! simulate an unreachable tracing service.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::{Result, TabletalkError};
use crate::telemetry::{Metadata, SpanEnd, SpanHandle, SpanStatus, TraceId, TracingBackend};

/// A recorded trace
#[derive(Debug, Clone)]
pub struct TraceRecord {
    pub id: TraceId,
    pub name: String,
    pub metadata: Metadata,
}

/// A recorded span, open or closed
#[derive(Debug, Clone)]
pub struct SpanRecord {
    pub id: String,
    pub name: String,
    pub trace_id: TraceId,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: Option<SpanStatus>,
    pub status_message: Option<String>,
    /// Metadata given at open
    pub input: Metadata,
    /// Metadata given at close
    pub output: Metadata,
}

impl SpanRecord {
    pub fn is_closed(&self) -> bool {
        self.end_time.is_some()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    traces: Vec<TraceRecord>,
    spans: Vec<SpanRecord>,
}

/// Tracing backend that records into memory
#[derive(Debug, Default)]
pub struct MemoryTracer {
    state: Mutex<MemoryState>,
    flushes: AtomicUsize,
    fail_spans: AtomicBool,
    fail_flush: AtomicBool,
}

impl MemoryTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every open/close call fail
    pub fn fail_spans(&self, fail: bool) {
        self.fail_spans.store(fail, Ordering::SeqCst);
    }

    /// Make `flush` fail
    pub fn fail_flush(&self, fail: bool) {
        self.fail_flush.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of recorded traces
    pub fn traces(&self) -> Vec<TraceRecord> {
        self.lock().map(|s| s.traces.clone()).unwrap_or_default()
    }

    /// Snapshot of recorded spans, in open order
    pub fn spans(&self) -> Vec<SpanRecord> {
        self.lock().map(|s| s.spans.clone()).unwrap_or_default()
    }

    /// Spans with the given name
    pub fn spans_named(&self, name: &str) -> Vec<SpanRecord> {
        self.spans().into_iter().filter(|s| s.name == name).collect()
    }

    /// Number of completed `flush` calls
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| TabletalkError::tracing("memory tracer state poisoned"))
    }

    fn check_spans(&self) -> Result<()> {
        if self.fail_spans.load(Ordering::SeqCst) {
            return Err(TabletalkError::tracing("span recording disabled"));
        }
        Ok(())
    }
}

#[async_trait]
impl TracingBackend for MemoryTracer {
    fn open_trace(&self, name: &str, metadata: Metadata) -> Result<TraceId> {
        let id = TraceId::generate();
        self.lock()?.traces.push(TraceRecord {
            id: id.clone(),
            name: name.to_string(),
            metadata,
        });
        Ok(id)
    }

    fn open_span(&self, name: &str, trace_id: &TraceId, metadata: Metadata) -> Result<SpanHandle> {
        self.check_spans()?;

        let handle = SpanHandle {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            trace_id: trace_id.clone(),
        };

        self.lock()?.spans.push(SpanRecord {
            id: handle.id.clone(),
            name: handle.name.clone(),
            trace_id: trace_id.clone(),
            start_time: Utc::now(),
            end_time: None,
            status: None,
            status_message: None,
            input: metadata,
            output: Metadata::new(),
        });

        Ok(handle)
    }

    fn close_span(&self, span: &SpanHandle, end: SpanEnd) -> Result<()> {
        self.check_spans()?;

        let mut state = self.lock()?;
        let record = state
            .spans
            .iter_mut()
            .find(|s| s.id == span.id)
            .ok_or_else(|| TabletalkError::tracing(format!("unknown span {}", span.id)))?;

        if record.is_closed() {
            return Err(TabletalkError::tracing(format!(
                "span {} already closed",
                span.id
            )));
        }

        record.end_time = Some(Utc::now());
        record.status = Some(end.status);
        record.status_message = end.status_message;
        record.output = end.metadata;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        if self.fail_flush.load(Ordering::SeqCst) {
            return Err(TabletalkError::tracing("flush failed"));
        }
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
