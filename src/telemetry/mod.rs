//! Telemetry module - traces and spans for conversation runs
//!
//! The tracing backend is an explicit handle passed to whoever records spans.
//! Opening and closing are synchronous and only buffer events; `flush` is the one
//! call that talks to the network, and the session calls it exactly once at the end.

pub mod langfuse;
pub mod memory;
pub mod shim;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::config::TelemetryConfig;
use crate::core::Result;

pub use langfuse::LangfuseClient;
pub use memory::{MemoryTracer, SpanRecord, TraceRecord};
pub use shim::{instrument, SpanGuard, TracedReply, SNIPPET_CHARS};

/// Free-form span and trace metadata
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Identifier of one trace (one conversation run)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceId(String);

impl TraceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to an open span, returned by `open_span`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanHandle {
    pub id: String,
    pub name: String,
    pub trace_id: TraceId,
}

/// Final status of a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    Ok,
    Error,
}

impl fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpanStatus::Ok => write!(f, "ok"),
            SpanStatus::Error => write!(f, "error"),
        }
    }
}

/// Everything recorded when a span closes
#[derive(Debug, Clone, PartialEq)]
pub struct SpanEnd {
    pub status: SpanStatus,
    pub status_message: Option<String>,
    pub metadata: Metadata,
}

impl SpanEnd {
    pub fn ok(metadata: Metadata) -> Self {
        Self {
            status: SpanStatus::Ok,
            status_message: None,
            metadata,
        }
    }

    pub fn error(status_message: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            status: SpanStatus::Error,
            status_message: Some(status_message.into()),
            metadata,
        }
    }
}

/// A tracing service that groups spans under traces
#[async_trait]
pub trait TracingBackend: Send + Sync {
    /// Start a trace for one conversation run
    fn open_trace(&self, name: &str, metadata: Metadata) -> Result<TraceId>;

    /// Open a span under `trace_id`
    fn open_span(&self, name: &str, trace_id: &TraceId, metadata: Metadata) -> Result<SpanHandle>;

    /// Close a span; closing twice or closing an unknown span is an error
    fn close_span(&self, span: &SpanHandle, end: SpanEnd) -> Result<()>;

    /// Deliver everything buffered so far
    async fn flush(&self) -> Result<()>;

    /// Get the backend name
    fn name(&self) -> &str;
}

/// Pick the backend for a run: Langfuse when credentials are configured, memory otherwise
pub fn backend_from_config(config: &TelemetryConfig) -> Result<Arc<dyn TracingBackend>> {
    if config.is_active() {
        let client = LangfuseClient::from_config(config)?;
        tracing::info!(host = %config.host, "Sending spans to Langfuse");
        Ok(Arc::new(client))
    } else {
        tracing::info!("Langfuse credentials not configured; spans are kept in memory");
        Ok(Arc::new(MemoryTracer::new()))
    }
}
