//! Participant construction
//!
//! Builds the relay that carries the human request and the assistant whose
//! instructions embed a preview of the dataset.

use std::sync::Arc;

use crate::agent::participant::{Participant, Role};
use crate::agent::reply::{LlmReply, RelayReply};
use crate::core::config::InferenceConfig;
use crate::core::{Config, Result};
use crate::data::{render_preview, Table};
use crate::llm::LLMProvider;

/// Name of the relay participant
pub const RELAY_NAME: &str = "User_Proxy";

/// Name of the data assistant
pub const ASSISTANT_NAME: &str = "Data_Query_Agent";

/// Assistant instructions around a rendered dataset preview
pub fn assistant_instructions(preview: &str) -> String {
    format!(
        r#"You are a data analyst.
You have access to the following dataset:
{}

Based on this dataset, you can calculate and return insights. If needed, simulate calculations based on the sample data shown.
"#,
        preview
    )
}

/// The passive relay: no generated content, bounded auto replies
pub fn build_relay(max_auto_replies: usize) -> Result<Participant> {
    Participant::builder(RELAY_NAME, Role::Relay)
        .max_auto_replies(max_auto_replies)
        .handler(Arc::new(RelayReply::new(max_auto_replies)))
        .build()
}

/// The data assistant, answering through `llm`
pub fn build_assistant(
    instructions: impl Into<String>,
    llm: Arc<dyn LLMProvider>,
    inference: &InferenceConfig,
) -> Result<Participant> {
    let instructions = instructions.into();
    let reply = LlmReply::new(llm, inference, ASSISTANT_NAME, instructions.clone());

    Participant::builder(ASSISTANT_NAME, Role::Assistant)
        .instructions(instructions)
        .handler(Arc::new(reply))
        .build()
}

/// Both participants for a dataset, relay first
pub fn build_participants(
    table: &Table,
    config: &Config,
    llm: Arc<dyn LLMProvider>,
) -> Result<Vec<Participant>> {
    let preview = render_preview(table, config.dataset.preview_rows);
    let relay = build_relay(config.chat.max_auto_replies)?;
    let assistant = build_assistant(assistant_instructions(&preview), llm, &config.inference)?;
    Ok(vec![relay, assistant])
}
