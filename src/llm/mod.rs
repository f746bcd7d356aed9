//! LLM module - Language Model integrations
//!
//! Provides the chat-completion abstraction and an OpenAI-compatible backend.

pub mod openai;
pub mod traits;

pub use openai::OpenAiClient;
pub use traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};
