//! Tabletalk - Ask questions about a CSV dataset
//!
//! Main entry point. Takes no arguments; everything comes from the config file
//! and environment.

use tabletalk::{Config, Session};
use tracing_subscriber::EnvFilter;

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("TABLETALK_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    init_logging(config.agent.debug);

    let mut session = Session::from_config(config)?;

    match session.run().await {
        Ok(report) => {
            match report.final_answer() {
                Some(answer) => println!("{}", answer.content),
                None => println!("(no answer from the assistant)"),
            }
            Ok(())
        }
        Err(e) => {
            if !session.transcript().is_empty() {
                eprintln!("Conversation aborted. Transcript so far:");
                for message in session.transcript() {
                    eprintln!("{}", message);
                }
            }
            Err(e.into())
        }
    }
}
