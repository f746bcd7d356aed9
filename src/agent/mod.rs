//! Agent module - participants and group chat orchestration
//!
//! Contains the participant model, reply handlers, and the loop that lets
//! participants take turns.

pub mod conversation;
pub mod factory;
pub mod group_chat;
pub mod loop_state;
pub mod participant;
pub mod reply;

pub use conversation::Transcript;
pub use factory::{
    assistant_instructions, build_assistant, build_participants, build_relay, ASSISTANT_NAME,
    RELAY_NAME,
};
pub use group_chat::{is_termination_msg, GroupChat, SpeakerPolicy};
pub use loop_state::{ChatLoopState, ChatOutcome, TurnOutcome};
pub use participant::{Participant, ParticipantBuilder, ReplyHandler, ReplyPolicy, Role};
pub use reply::{LlmReply, RelayReply};
