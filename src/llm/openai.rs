//! OpenAI-compatible chat-completion client
//!
//! Works against any `/chat/completions` endpoint that speaks the OpenAI wire format
//! (Groq, OpenRouter, vLLM, ...). Every failure surfaces as an inference error; nothing
//! is retried here.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::{truncate_chars, Config, Message, Result, TabletalkError};
use crate::llm::traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};

/// OpenAI-compatible API client
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    stream: bool,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl OpenAiClient {
    /// Create a client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.inference.api_key.is_empty() {
            tracing::warn!("GROQ_API_KEY is not set; inference calls will be rejected");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.inference.timeout_secs))
            .build()
            .map_err(|e| TabletalkError::inference(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.inference.base_url.clone(),
            api_key: config.inference.api_key.clone(),
        })
    }

    /// Full URL of the chat completion endpoint
    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Convert the wire response into an LLMResponse
    fn to_llm_response(response: ChatResponse, requested_model: &str) -> Result<LLMResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| TabletalkError::inference("Response contained no choices"))?;

        let model = if response.model.is_empty() {
            requested_model.to_string()
        } else {
            response.model
        };

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            model,
        })
    }

    /// Map an HTTP status and raw body to a response or an inference error
    fn parse_chat_response(
        status: StatusCode,
        body: &str,
        requested_model: &str,
    ) -> Result<LLMResponse> {
        if !status.is_success() {
            return Err(TabletalkError::inference(format!(
                "API error ({}): {}",
                status,
                truncate_chars(body, 500)
            )));
        }

        tracing::debug!(response = truncate_chars(body, 500), "Chat completion received");

        let chat_response: ChatResponse = serde_json::from_str(body)
            .map_err(|e| TabletalkError::inference(format!("Failed to parse response: {}", e)))?;

        Self::to_llm_response(chat_response, requested_model)
    }
}

#[async_trait]
impl LLMProvider for OpenAiClient {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let options = options.unwrap_or_default();

        let request = ChatRequest {
            model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stop: options.stop,
            stream: false,
        };

        tracing::debug!(model, messages = messages.len(), "Sending chat completion");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    TabletalkError::inference(format!("Cannot connect to {}: {}", self.base_url, e))
                } else if e.is_timeout() {
                    TabletalkError::inference(format!("Request to {} timed out", self.base_url))
                } else {
                    TabletalkError::inference(e.to_string())
                }
            })?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| TabletalkError::inference(format!("Failed to read response: {}", e)))?;

        Self::parse_chat_response(status, &response_text, model)
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_support::{closed_port, respond_once};

    fn client_for(base_url: &str) -> OpenAiClient {
        let mut config = Config::default();
        config.inference.base_url = base_url.to_string();
        config.inference.api_key = "test-key".to_string();
        config.inference.timeout_secs = 5;
        OpenAiClient::from_config(&config).unwrap()
    }

    fn client() -> OpenAiClient {
        client_for("https://api.groq.com/openai/v1/")
    }

    const COMPLETION: &str = r#"{
        "model": "llama3-70b-8192",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": "Jeans at 50"}}],
        "usage": {"prompt_tokens": 120, "completion_tokens": 8, "total_tokens": 128}
    }"#;

    #[test]
    fn test_endpoint() {
        assert_eq!(
            client().endpoint(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![
            Message::system("You are a data analyst."),
            Message::user("Highest price?").with_name("User_Proxy"),
        ];
        let request = ChatRequest {
            model: "llama3-70b-8192",
            messages: &messages,
            temperature: None,
            max_tokens: None,
            stop: None,
            stream: false,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llama3-70b-8192");
        assert_eq!(json["messages"][1]["name"], "User_Proxy");
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_response_conversion() {
        let parsed: ChatResponse = serde_json::from_str(COMPLETION).unwrap();
        let response = OpenAiClient::to_llm_response(parsed, "fallback").unwrap();

        assert_eq!(response.content, "Jeans at 50");
        assert_eq!(response.model, "llama3-70b-8192");
        assert_eq!(response.usage.unwrap().total_tokens, 128);
    }

    #[test]
    fn test_empty_choices_is_inference_error() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let err = OpenAiClient::to_llm_response(parsed, "m").unwrap_err();
        assert!(matches!(err, TabletalkError::Inference(_)));
    }

    #[test]
    fn test_error_status_is_inference_error() {
        let err = OpenAiClient::parse_chat_response(
            StatusCode::UNAUTHORIZED,
            r#"{"error": {"message": "Invalid API Key"}}"#,
            "m",
        )
        .unwrap_err();

        assert!(matches!(err, TabletalkError::Inference(_)));
        assert!(err.to_string().contains("API error (401 Unauthorized)"));
        assert!(err.to_string().contains("Invalid API Key"));
    }

    #[test]
    fn test_unparsable_body_is_inference_error() {
        let err = OpenAiClient::parse_chat_response(StatusCode::OK, "<html>gateway</html>", "m")
            .unwrap_err();
        assert!(matches!(err, TabletalkError::Inference(_)));
        assert!(err.to_string().contains("Failed to parse response"));
    }

    #[tokio::test]
    async fn test_chat_round_trip_over_http() {
        let (base_url, server) = respond_once(200, COMPLETION).await;
        let client = client_for(&format!("{}/openai/v1", base_url));

        let messages = vec![Message::system("You are a data analyst."), Message::user("Highest?")];
        let response = client
            .chat("llama3-70b-8192", &messages, None)
            .await
            .unwrap();
        assert_eq!(response.content, "Jeans at 50");

        let request = server.await.unwrap();
        assert_eq!(request.request_line, "POST /openai/v1/chat/completions HTTP/1.1");
        assert_eq!(request.header("authorization"), Some("Bearer test-key"));

        let body = request.json();
        assert_eq!(body["model"], "llama3-70b-8192");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Highest?");
    }

    #[tokio::test]
    async fn test_rate_limit_over_http_is_inference_error() {
        let (base_url, server) = respond_once(429, r#"{"error": "rate limited"}"#).await;
        let client = client_for(&base_url);

        let err = client.chat("m", &[Message::user("hi")], None).await.unwrap_err();
        assert!(matches!(err, TabletalkError::Inference(_)));
        assert!(err.to_string().contains("429"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_inference_error() {
        let client = client_for(&closed_port().await);
        let err = client.chat("m", &[Message::user("hi")], None).await.unwrap_err();
        assert!(matches!(err, TabletalkError::Inference(_)));
    }
}
