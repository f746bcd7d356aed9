//! One traced question-answering run over a dataset
//!
//! The steps run in a fixed order: load the table, build participants, set up the
//! group chat, open the trace, instrument participants, run the chat. Telemetry
//! is flushed exactly once at the end, whether the run succeeded or not.

use std::sync::Arc;

use serde_json::json;

use crate::agent::{
    build_participants, ChatOutcome, GroupChat, SpeakerPolicy, ASSISTANT_NAME, RELAY_NAME,
};
use crate::core::{ChatMessage, Config, Result};
use crate::data::Table;
use crate::llm::{LLMProvider, OpenAiClient};
use crate::telemetry::{self, Metadata, TraceId, TracingBackend};

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub trace_id: TraceId,
    pub transcript: Vec<ChatMessage>,
    pub outcome: ChatOutcome,
}

impl SessionReport {
    /// Last message from the data assistant
    pub fn final_answer(&self) -> Option<&ChatMessage> {
        self.transcript.iter().rev().find(|m| m.sender == ASSISTANT_NAME)
    }
}

/// Driver for a single conversation run
pub struct Session {
    config: Config,
    llm: Arc<dyn LLMProvider>,
    tracer: Arc<dyn TracingBackend>,
    transcript: Vec<ChatMessage>,
}

impl Session {
    /// Create a session with explicit backends
    pub fn new(config: Config, llm: Arc<dyn LLMProvider>, tracer: Arc<dyn TracingBackend>) -> Self {
        Self {
            config,
            llm,
            tracer,
            transcript: Vec::new(),
        }
    }

    /// Create a session against the configured hosted backends
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let llm: Arc<dyn LLMProvider> = Arc::new(OpenAiClient::from_config(&config)?);
        let tracer = telemetry::backend_from_config(&config.telemetry)?;
        Ok(Self::new(config, llm, tracer))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Messages exchanged by the last run, including a run that aborted
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Run the conversation, then flush telemetry
    pub async fn run(&mut self) -> Result<SessionReport> {
        let result = self.run_conversation().await;

        if let Err(e) = self.tracer.flush().await {
            tracing::warn!(backend = self.tracer.name(), error = %e, "Failed to flush telemetry");
        }

        result
    }

    async fn run_conversation(&mut self) -> Result<SessionReport> {
        self.transcript.clear();

        let table = Table::load(&self.config.dataset.path)?;
        tracing::info!(
            path = %self.config.dataset.path.display(),
            rows = table.len(),
            "Dataset loaded"
        );

        let participants = build_participants(&table, &self.config, Arc::clone(&self.llm))?;

        let mut chat = GroupChat::new(
            participants,
            self.config.chat.max_round,
            SpeakerPolicy::RoundRobin,
        )?;

        let trace_id = self.open_trace();
        chat.instrument(Arc::clone(&self.tracer), &trace_id);

        let opening = ChatMessage::new(RELAY_NAME, self.config.chat.opening_message.clone());
        let result = chat.run(opening).await;
        self.transcript = chat.messages().to_vec();

        Ok(SessionReport {
            trace_id,
            transcript: self.transcript.clone(),
            outcome: result?,
        })
    }

    /// Open the run's trace; a backend failure falls back to a local id
    fn open_trace(&self) -> TraceId {
        let mut metadata = Metadata::new();
        metadata.insert("task".to_string(), json!(self.config.chat.task));

        match self.tracer.open_trace(&self.config.chat.trace_name, metadata) {
            Ok(id) => {
                tracing::debug!(trace_id = %id, "Trace opened");
                id
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to open trace; spans use a local id");
                TraceId::generate()
            }
        }
    }
}
