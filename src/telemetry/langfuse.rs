//! Langfuse tracing backend
//!
//! Buffers trace and span events and ships them in a single batch to the
//! public ingestion endpoint when flushed.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::config::TelemetryConfig;
use crate::core::{Result, TabletalkError};
use crate::telemetry::{Metadata, SpanEnd, SpanHandle, SpanStatus, TraceId, TracingBackend};

/// One event in an ingestion batch
#[derive(Debug, Clone, Serialize)]
struct IngestionEvent {
    id: String,
    timestamp: String,
    #[serde(rename = "type")]
    kind: &'static str,
    body: Value,
}

#[derive(Debug, Serialize)]
struct IngestionBatch<'a> {
    batch: &'a [IngestionEvent],
}

/// Multi-status reply from the ingestion endpoint
#[derive(Debug, Default, Deserialize)]
struct IngestionResponse {
    #[serde(default)]
    errors: Vec<IngestionError>,
}

#[derive(Debug, Deserialize)]
struct IngestionError {
    id: String,
    status: u16,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default)]
struct Buffer {
    events: Vec<IngestionEvent>,
    open_spans: HashSet<String>,
}

/// Langfuse API client
pub struct LangfuseClient {
    client: Client,
    host: String,
    public_key: String,
    secret_key: String,
    buffer: Mutex<Buffer>,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl LangfuseClient {
    /// Create a client; fails when credentials are missing
    pub fn from_config(config: &TelemetryConfig) -> Result<Self> {
        let (public_key, secret_key) = config
            .credentials()
            .ok_or_else(|| TabletalkError::config("Langfuse public and secret keys are required"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TabletalkError::tracing(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            public_key: public_key.to_string(),
            secret_key: secret_key.to_string(),
            buffer: Mutex::new(Buffer::default()),
        })
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.lock().map(|b| b.events.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Buffer>> {
        self.buffer
            .lock()
            .map_err(|_| TabletalkError::tracing("Langfuse buffer poisoned"))
    }

    fn push(buffer: &mut Buffer, kind: &'static str, body: Value) {
        buffer.events.push(IngestionEvent {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now(),
            kind,
            body,
        });
    }

    fn span_update_body(span: &SpanHandle, end: SpanEnd) -> Value {
        let mut body = json!({
            "id": span.id,
            "traceId": span.trace_id.as_str(),
            "endTime": now(),
            "metadata": Value::Object(end.metadata),
        });

        if end.status == SpanStatus::Error {
            body["level"] = json!("ERROR");
        }
        if let Some(message) = end.status_message {
            body["statusMessage"] = json!(message);
        }

        body
    }

    /// Per-event rejections from a successful ingestion reply; any other status fails
    fn read_ingestion_response(status: StatusCode, body: &str) -> Result<Vec<IngestionError>> {
        if !status.is_success() {
            return Err(TabletalkError::tracing(format!(
                "Langfuse ingestion failed ({}): {}",
                status, body
            )));
        }

        let report: IngestionResponse = serde_json::from_str(body).unwrap_or_default();
        Ok(report.errors)
    }
}

#[async_trait]
impl TracingBackend for LangfuseClient {
    fn open_trace(&self, name: &str, metadata: Metadata) -> Result<TraceId> {
        let id = TraceId::generate();
        let mut buffer = self.lock()?;
        Self::push(
            &mut buffer,
            "trace-create",
            json!({
                "id": id.as_str(),
                "name": name,
                "timestamp": now(),
                "metadata": Value::Object(metadata),
            }),
        );
        Ok(id)
    }

    fn open_span(&self, name: &str, trace_id: &TraceId, metadata: Metadata) -> Result<SpanHandle> {
        let handle = SpanHandle {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            trace_id: trace_id.clone(),
        };

        let mut buffer = self.lock()?;
        buffer.open_spans.insert(handle.id.clone());
        Self::push(
            &mut buffer,
            "span-create",
            json!({
                "id": handle.id,
                "traceId": trace_id.as_str(),
                "name": name,
                "startTime": now(),
                "metadata": Value::Object(metadata),
            }),
        );

        Ok(handle)
    }

    fn close_span(&self, span: &SpanHandle, end: SpanEnd) -> Result<()> {
        let mut buffer = self.lock()?;
        if !buffer.open_spans.remove(&span.id) {
            return Err(TabletalkError::tracing(format!(
                "span {} is not open",
                span.id
            )));
        }

        Self::push(&mut buffer, "span-update", Self::span_update_body(span, end));
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let events = std::mem::take(&mut self.lock()?.events);
        if events.is_empty() {
            return Ok(());
        }

        tracing::debug!(events = events.len(), "Flushing spans to Langfuse");

        let response = self
            .client
            .post(format!("{}/api/public/ingestion", self.host))
            .basic_auth(&self.public_key, Some(&self.secret_key))
            .json(&IngestionBatch { batch: &events })
            .send()
            .await
            .map_err(|e| TabletalkError::tracing(format!("Langfuse unreachable: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        for error in Self::read_ingestion_response(status, &body)? {
            tracing::warn!(
                event = %error.id,
                status = error.status,
                message = error.message.as_deref().unwrap_or(""),
                "Langfuse rejected event"
            );
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "langfuse"
    }
}
