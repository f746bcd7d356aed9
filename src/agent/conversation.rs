//! Conversation transcript
//!
//! Append-only, ordered record of the messages exchanged in one group chat.

use crate::core::ChatMessage;

/// Ordered message history of one conversation
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// All messages in order
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Most recent message
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Get message count
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
