//! Group chat loop state
//!
//! Every turn reports an explicit outcome; the loop ends on the first terminal one.

use std::fmt;

/// Result of one speaker turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Another turn may follow
    Continue,
    /// A participant ended the conversation
    StopNormal,
    /// The round limit was reached
    StopLimit,
}

/// How a finished conversation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOutcome {
    /// A participant stopped replying or asked to terminate
    Completed,
    /// `max_round` messages were exchanged
    RoundLimit,
}

impl fmt::Display for ChatOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatOutcome::Completed => write!(f, "completed"),
            ChatOutcome::RoundLimit => write!(f, "round limit reached"),
        }
    }
}

/// State of the group chat loop
#[derive(Debug, Clone, Default)]
pub struct ChatLoopState {
    /// Turns taken so far, opening message excluded
    pub turn: usize,
    /// Set once a terminal outcome is recorded
    pub outcome: Option<ChatOutcome>,
}

impl ChatLoopState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the loop should continue
    pub fn should_continue(&self) -> bool {
        self.outcome.is_none()
    }

    /// Record the outcome of a turn
    pub fn record(&mut self, outcome: TurnOutcome) {
        self.turn += 1;
        self.outcome = match outcome {
            TurnOutcome::Continue => None,
            TurnOutcome::StopNormal => Some(ChatOutcome::Completed),
            TurnOutcome::StopLimit => Some(ChatOutcome::RoundLimit),
        };
    }
}
