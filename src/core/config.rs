//! Configuration management for Tabletalk
//!
//! Supports environment variables, a config file, and defaults.
//! Credentials are only ever read from the environment and are never written back.
//!
//! Config file location: ~/.config/tabletalk/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use url::Url;

use crate::core::error::{Result, TabletalkError};
use crate::llm::TokenUsage;

/// Main configuration for Tabletalk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Chat-completion backend
    pub inference: InferenceConfig,
    /// Tracing backend
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Dataset location and preview size
    pub dataset: DatasetConfig,
    /// Group chat settings
    pub chat: ChatConfig,
    /// Agent behavior
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Inference backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Model identifier
    /// Default: llama3-70b-8192
    pub model: String,
    /// OpenAI-compatible API root
    pub base_url: String,
    /// Bearer token (GROQ_API_KEY)
    #[serde(skip)]
    pub api_key: String,
    /// Pricing hint: [prompt, completion] cost per 1k tokens
    #[serde(default)]
    pub price: [f64; 2],
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Tracing backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Langfuse host
    pub host: String,
    /// Public key (LANGFUSE_PUBLIC_KEY)
    #[serde(skip)]
    pub public_key: Option<String>,
    /// Secret key (LANGFUSE_PRIVATE_KEY)
    #[serde(skip)]
    pub secret_key: Option<String>,
    /// Send spans to Langfuse when credentials are present
    pub enabled: bool,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Dataset configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Path to the CSV file
    pub path: PathBuf,
    /// Number of rows embedded in the assistant's instructions
    /// Default: 25
    pub preview_rows: usize,
}

/// Group chat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Maximum number of messages in one conversation, opening message included
    /// Default: 20
    pub max_round: usize,
    /// Consecutive auto replies the relay may send
    /// Default: 6
    pub max_auto_replies: usize,
    /// Question the relay opens the conversation with
    pub opening_message: String,
    /// Trace name shown in the tracing backend
    pub trace_name: String,
    /// Task description attached to the trace
    pub task: String,
}

/// Agent behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Whether to show debug output
    pub debug: bool,
}

fn env_flag(key: &str) -> Option<bool> {
    env::var(key).ok().map(|v| v == "true" || v == "1")
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inference: InferenceConfig::default(),
            telemetry: TelemetryConfig::default(),
            dataset: DatasetConfig::default(),
            chat: ChatConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            model: env::var("TABLETALK_MODEL").unwrap_or_else(|_| "llama3-70b-8192".to_string()),
            base_url: env::var("TABLETALK_BASE_URL")
                .unwrap_or_else(|_| "https://api.groq.com/openai/v1".to_string()),
            api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
            price: [0.0, 0.0],
            timeout_secs: 120,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            host: env::var("LANGFUSE_HOST")
                .unwrap_or_else(|_| "https://cloud.langfuse.com".to_string()),
            public_key: env_non_empty("LANGFUSE_PUBLIC_KEY"),
            secret_key: env_non_empty("LANGFUSE_PRIVATE_KEY")
                .or_else(|| env_non_empty("LANGFUSE_SECRET_KEY")),
            enabled: env_flag("TABLETALK_TELEMETRY").unwrap_or(true),
            timeout_secs: 30,
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: env::var("TABLETALK_DATASET")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/products.csv")),
            preview_rows: 25,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_round: 20,
            max_auto_replies: 6,
            opening_message:
                "Please provide the product name with the highest price on the data you have."
                    .to_string(),
            trace_name: "DataQuery".to_string(),
            task: "Query customer data from CSV".to_string(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            debug: env_flag("TABLETALK_DEBUG").unwrap_or(false),
        }
    }
}

impl InferenceConfig {
    /// Estimate the cost of a call from the pricing hint
    pub fn estimate_cost(&self, usage: &TokenUsage) -> f64 {
        usage.cost(self.price)
    }
}

impl TelemetryConfig {
    /// Credentials, if both halves are configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.public_key, &self.secret_key) {
            (Some(public), Some(secret)) => Some((public.as_str(), secret.as_str())),
            _ => None,
        }
    }

    /// Whether spans should be shipped to Langfuse
    pub fn is_active(&self) -> bool {
        self.enabled && self.credentials().is_some()
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tabletalk")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: env secrets > config file > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        match Self::load_from_file() {
            Ok(mut config) => {
                config.apply_env_secrets();
                config
            }
            // Defaults already read the environment
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(TabletalkError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| TabletalkError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| TabletalkError::config(format!("Failed to parse config: {}", e)))
    }

    /// Fill credentials, which are never stored in the config file
    pub fn apply_env_secrets(&mut self) {
        let defaults = TelemetryConfig::default();
        self.telemetry.public_key = defaults.public_key;
        self.telemetry.secret_key = defaults.secret_key;
        self.inference.api_key = env::var("GROQ_API_KEY").unwrap_or_default();
    }

    /// Check the settings the run cannot do without
    pub fn validate(&self) -> Result<()> {
        if self.chat.max_round == 0 {
            return Err(TabletalkError::config("chat.max_round must be at least 1"));
        }

        if self.inference.model.trim().is_empty() {
            return Err(TabletalkError::config("inference.model must not be empty"));
        }

        Url::parse(&self.inference.base_url).map_err(|e| {
            TabletalkError::config(format!(
                "Invalid inference.base_url '{}': {}",
                self.inference.base_url, e
            ))
        })?;

        Url::parse(&self.telemetry.host).map_err(|e| {
            TabletalkError::config(format!(
                "Invalid telemetry.host '{}': {}",
                self.telemetry.host, e
            ))
        })?;

        Ok(())
    }
}
