//! Conversation participants
//!
//! A participant pairs a fixed identity and reply policy with a reply handler.
//! The policy is read-only once built; the handler is the only part that
//! instrumentation may swap, and only through [`Participant::instrument`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{ChatMessage, Result, TabletalkError};
use crate::telemetry::{self, TraceId, TracingBackend};

/// Produces a participant's next message
///
/// `Ok(None)` means the participant has nothing more to say.
#[async_trait]
pub trait ReplyHandler: Send + Sync {
    async fn generate_reply(
        &self,
        messages: &[ChatMessage],
        sender: Option<&str>,
    ) -> Result<Option<String>>;

    /// Whether this handler already records spans
    fn is_traced(&self) -> bool {
        false
    }
}

/// What part a participant plays in the chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Forwards the human request and receives the answer
    Relay,
    /// Answers using the inference backend
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Relay => write!(f, "relay"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Reply policy, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyPolicy {
    max_auto_replies: Option<usize>,
}

impl ReplyPolicy {
    /// Bound on consecutive automatic replies, if any
    pub fn max_auto_replies(&self) -> Option<usize> {
        self.max_auto_replies
    }

    /// Code execution is never allowed
    pub fn code_execution(&self) -> bool {
        false
    }
}

/// A named conversational entity
#[derive(Clone)]
pub struct Participant {
    name: String,
    role: Role,
    policy: ReplyPolicy,
    instructions: Option<String>,
    handler: Arc<dyn ReplyHandler>,
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("policy", &self.policy)
            .field("traced", &self.handler.is_traced())
            .finish()
    }
}

/// Builder for creating Participants
pub struct ParticipantBuilder {
    name: String,
    role: Role,
    max_auto_replies: Option<usize>,
    instructions: Option<String>,
    handler: Option<Arc<dyn ReplyHandler>>,
}

impl ParticipantBuilder {
    /// Create a new builder with the given name and role
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
            max_auto_replies: None,
            instructions: None,
            handler: None,
        }
    }

    /// Bound consecutive automatic replies
    pub fn max_auto_replies(mut self, max: usize) -> Self {
        self.max_auto_replies = Some(max);
        self
    }

    /// Set the system instructions
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Set the reply handler
    pub fn handler(mut self, handler: Arc<dyn ReplyHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Build the Participant
    pub fn build(self) -> Result<Participant> {
        if self.name.trim().is_empty() {
            return Err(TabletalkError::config("participant name must not be empty"));
        }

        let handler = self.handler.ok_or_else(|| {
            TabletalkError::config(format!("participant '{}' has no reply handler", self.name))
        })?;

        Ok(Participant {
            name: self.name,
            role: self.role,
            policy: ReplyPolicy {
                max_auto_replies: self.max_auto_replies,
            },
            instructions: self.instructions,
            handler,
        })
    }
}

impl Participant {
    /// Create a builder
    pub fn builder(name: impl Into<String>, role: Role) -> ParticipantBuilder {
        ParticipantBuilder::new(name, role)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn policy(&self) -> &ReplyPolicy {
        &self.policy
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    /// Whether replies are already recorded as spans
    pub fn is_instrumented(&self) -> bool {
        self.handler.is_traced()
    }

    /// The active reply handler
    pub fn handler(&self) -> Arc<dyn ReplyHandler> {
        Arc::clone(&self.handler)
    }

    /// Produce the next message given the transcript so far
    pub async fn generate_reply(
        &self,
        messages: &[ChatMessage],
        sender: Option<&str>,
    ) -> Result<Option<String>> {
        self.handler.generate_reply(messages, sender).await
    }

    /// Record every reply as a span under `trace_id`; a no-op if already instrumented
    pub fn instrument(self, backend: Arc<dyn TracingBackend>, trace_id: &TraceId) -> Self {
        telemetry::instrument(self, backend, trace_id)
    }

    /// Swap the reply handler, keeping identity and policy
    pub(crate) fn with_handler(self, handler: Arc<dyn ReplyHandler>) -> Self {
        Self { handler, ..self }
    }
}
