//! Group chat orchestration
//!
//! Drives a bounded exchange between participants with a fixed speaker policy.
//! Turns run strictly one after another. A failed reply aborts the chat; the
//! transcript up to that point stays readable through [`GroupChat::messages`].

use std::sync::Arc;

use crate::agent::conversation::Transcript;
use crate::agent::loop_state::{ChatLoopState, ChatOutcome, TurnOutcome};
use crate::agent::participant::Participant;
use crate::core::{ChatMessage, Result, TabletalkError};
use crate::telemetry::{TraceId, TracingBackend};

/// Marker a participant can end its reply with to close the conversation
pub const TERMINATE_MARKER: &str = "TERMINATE";

/// How the next speaker is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeakerPolicy {
    /// The participant after the last sender, in registration order
    #[default]
    RoundRobin,
}

impl SpeakerPolicy {
    /// Index of the next speaker given the last sender's index
    pub fn next_speaker(&self, last: usize, participants: usize) -> usize {
        match self {
            SpeakerPolicy::RoundRobin => (last + 1) % participants,
        }
    }
}

/// Whether a reply asks to end the conversation
pub fn is_termination_msg(content: &str) -> bool {
    content.trim_end().ends_with(TERMINATE_MARKER)
}

/// A bounded conversation between registered participants
pub struct GroupChat {
    participants: Vec<Participant>,
    transcript: Transcript,
    max_round: usize,
    policy: SpeakerPolicy,
}

impl GroupChat {
    /// Create a chat; needs at least two participants with distinct names and `max_round >= 1`
    pub fn new(
        participants: Vec<Participant>,
        max_round: usize,
        policy: SpeakerPolicy,
    ) -> Result<Self> {
        if participants.len() < 2 {
            return Err(TabletalkError::config(
                "a group chat needs at least two participants",
            ));
        }

        for (i, p) in participants.iter().enumerate() {
            if participants[..i].iter().any(|other| other.name() == p.name()) {
                return Err(TabletalkError::config(format!(
                    "duplicate participant name '{}'",
                    p.name()
                )));
            }
        }

        if max_round == 0 {
            return Err(TabletalkError::config("max_round must be at least 1"));
        }

        Ok(Self {
            participants,
            transcript: Transcript::new(),
            max_round,
            policy,
        })
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn max_round(&self) -> usize {
        self.max_round
    }

    /// Messages exchanged so far, in order
    pub fn messages(&self) -> &[ChatMessage] {
        self.transcript.messages()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Record every participant's replies as spans under `trace_id`
    pub fn instrument(&mut self, backend: Arc<dyn TracingBackend>, trace_id: &TraceId) {
        self.participants = std::mem::take(&mut self.participants)
            .into_iter()
            .map(|p| p.instrument(Arc::clone(&backend), trace_id))
            .collect();
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.participants.iter().position(|p| p.name() == name)
    }

    /// Start a fresh conversation with `opening` and run it to a terminal outcome
    pub async fn run(&mut self, opening: ChatMessage) -> Result<ChatOutcome> {
        if self.position(&opening.sender).is_none() {
            return Err(TabletalkError::config(format!(
                "opening message sender '{}' is not a participant",
                opening.sender
            )));
        }

        self.transcript.clear();
        self.transcript.push(opening);

        let mut state = ChatLoopState::new();

        tracing::info!(max_round = self.max_round, "Starting group chat");

        while state.should_continue() {
            let outcome = self.step().await?;
            state.record(outcome);
        }

        let outcome = state.outcome.unwrap_or(ChatOutcome::Completed);

        tracing::info!(
            messages = self.transcript.len(),
            turns = state.turn,
            %outcome,
            "Group chat finished"
        );

        Ok(outcome)
    }

    /// Let the next speaker reply once
    pub async fn step(&mut self) -> Result<TurnOutcome> {
        if self.transcript.len() >= self.max_round {
            return Ok(TurnOutcome::StopLimit);
        }

        let last = self
            .transcript
            .last()
            .ok_or_else(|| TabletalkError::Other("group chat has no opening message".into()))?;

        let last_index = self
            .position(&last.sender)
            .ok_or_else(|| TabletalkError::Other(format!("unknown sender '{}'", last.sender)))?;
        let last_sender = last.sender.clone();

        let speaker = &self.participants[self
            .policy
            .next_speaker(last_index, self.participants.len())];

        tracing::debug!(
            round = self.transcript.len() + 1,
            speaker = speaker.name(),
            "Next speaker"
        );

        let reply = speaker
            .generate_reply(self.transcript.messages(), Some(&last_sender))
            .await?;

        let content = match reply {
            Some(content) if !content.trim().is_empty() => content,
            _ => {
                tracing::debug!(speaker = speaker.name(), "Empty reply, stopping");
                return Ok(TurnOutcome::StopNormal);
            }
        };

        let terminate = is_termination_msg(&content);
        let name = speaker.name().to_string();
        self.transcript.push(ChatMessage::new(name, content));

        if terminate {
            Ok(TurnOutcome::StopNormal)
        } else if self.transcript.len() >= self.max_round {
            Ok(TurnOutcome::StopLimit)
        } else {
            Ok(TurnOutcome::Continue)
        }
    }
}
