//! Tabletalk - Ask questions about a CSV dataset
//!
//! Two participants answer a natural-language question about a table: a relay that
//! carries the request and an assistant whose instructions embed a preview of the
//! data. Every reply is recorded as a span in a tracing backend.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **Data**: CSV loading and prompt previews
//! - **LLM**: Chat-completion abstraction with an OpenAI-compatible client
//! - **Agent**: Participants, reply handlers, and the round-robin group chat
//! - **Telemetry**: Tracing backends and the span-recording reply wrapper
//! - **Session**: The end-to-end driver
//!
//! # Usage
//!
//! ```rust,no_run
//! use tabletalk::{Config, Session};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut session = Session::from_config(Config::load()).unwrap();
//!     let report = session.run().await.unwrap();
//!
//!     if let Some(answer) = report.final_answer() {
//!         println!("{}", answer.content);
//!     }
//! }
//! ```

pub mod agent;
pub mod core;
pub mod data;
pub mod llm;
pub mod session;
pub mod telemetry;

#[cfg(test)]
mod test_support;

// Re-export commonly used items
pub use agent::{GroupChat, Participant};
pub use core::{Config, Result, TabletalkError};
pub use data::Table;
pub use session::{Session, SessionReport};
