//! Reply handlers for the two participant roles

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::participant::ReplyHandler;
use crate::core::config::InferenceConfig;
use crate::core::{ChatMessage, Message, Result};
use crate::llm::LLMProvider;

/// Passive reply: never generates content of its own
///
/// Answers with a fixed auto-reply (empty by default, which ends the chat) until
/// `max_auto_replies` consecutive auto replies have been sent, then declines.
#[derive(Debug)]
pub struct RelayReply {
    max_auto_replies: usize,
    auto_reply: String,
    sent: AtomicUsize,
}

impl RelayReply {
    pub fn new(max_auto_replies: usize) -> Self {
        Self {
            max_auto_replies,
            auto_reply: String::new(),
            sent: AtomicUsize::new(0),
        }
    }

    /// Set the text sent on each automatic reply
    pub fn with_auto_reply(mut self, text: impl Into<String>) -> Self {
        self.auto_reply = text.into();
        self
    }

    /// Automatic replies sent so far
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReplyHandler for RelayReply {
    async fn generate_reply(
        &self,
        _messages: &[ChatMessage],
        _sender: Option<&str>,
    ) -> Result<Option<String>> {
        let previous = self
            .sent
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_auto_replies).then_some(n + 1)
            });

        match previous {
            Ok(_) => Ok(Some(self.auto_reply.clone())),
            Err(_) => {
                tracing::debug!(max = self.max_auto_replies, "Relay auto-reply limit reached");
                Ok(None)
            }
        }
    }
}

/// Reply generated by the inference backend
pub struct LlmReply {
    llm: Arc<dyn LLMProvider>,
    inference: InferenceConfig,
    name: String,
    system_prompt: String,
}

impl LlmReply {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        inference: &InferenceConfig,
        name: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            inference: inference.clone(),
            name: name.into(),
            system_prompt: system_prompt.into(),
        }
    }

    /// System prompt followed by the transcript from this participant's point of view
    pub fn build_messages(&self, transcript: &[ChatMessage]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(Message::system(&self.system_prompt));

        for entry in transcript {
            let message = if entry.sender == self.name {
                Message::assistant(&entry.content)
            } else {
                Message::user(&entry.content).with_name(&entry.sender)
            };
            messages.push(message);
        }

        messages
    }
}

#[async_trait]
impl ReplyHandler for LlmReply {
    async fn generate_reply(
        &self,
        messages: &[ChatMessage],
        _sender: Option<&str>,
    ) -> Result<Option<String>> {
        let request = self.build_messages(messages);

        let response = self
            .llm
            .chat(&self.inference.model, &request, None)
            .await?;

        if let Some(ref usage) = response.usage {
            tracing::debug!(
                participant = %self.name,
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                cost = self.inference.estimate_cost(usage),
                "Inference usage"
            );
        }

        Ok(Some(response.content))
    }
}
