//! Turn bookkeeping and conversation threading.
//!
//! `ConversationState` is a plain value. Every transition returns the view
//! notifications it implies instead of posting them, so the controller decides
//! where they go and tests can inspect them directly.

use serde::{Deserialize, Serialize};

use crate::error::TutorError;
use crate::frame::Frame;
use crate::view::ViewMessage;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkingState {
    #[default]
    Idle,
    Asking,
}

/// Backend identifiers needed to continue a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRef {
    pub conversation_id: String,
    pub parent_message_id: String,
}

/// Identifier of one request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Turn(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameVerdict {
    Forward,
    Echo,
    Stale,
}

#[derive(Debug, Default)]
pub struct ConversationState {
    working: WorkingState,
    counter: u64,
    live: Option<Turn>,
    conversation: Option<ConversationRef>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn working_state(&self) -> WorkingState {
        self.working
    }

    pub fn turn_counter(&self) -> u64 {
        self.counter
    }

    pub fn conversation(&self) -> Option<&ConversationRef> {
        self.conversation.as_ref()
    }

    pub fn parent_message_id(&self) -> Option<String> {
        self.conversation.as_ref().map(|c| c.parent_message_id.clone())
    }

    pub fn is_live(&self, turn: Turn) -> bool {
        self.live == Some(turn)
    }

    /// Start a new turn. Any earlier turn still streaming is retired.
    pub fn begin_turn(&mut self) -> (Turn, Vec<ViewMessage>) {
        self.counter += 1;
        let turn = Turn(self.counter);
        if let Some(previous) = self.live.replace(turn) {
            tracing::debug!("Turn {} superseded by turn {}", previous.0, turn.0);
        }
        self.working = WorkingState::Asking;
        (turn, vec![ViewMessage::SetWorkingState(self.working)])
    }

    pub fn judge(&self, turn: Turn, frame: &Frame) -> FrameVerdict {
        if frame.is_echo() {
            FrameVerdict::Echo
        } else if !self.is_live(turn) {
            FrameVerdict::Stale
        } else {
            FrameVerdict::Forward
        }
    }

    /// Stream for `turn` ended normally. `last` is the final forwarded frame.
    pub fn complete_turn(
        &mut self,
        turn: Turn,
        last: Option<&Frame>,
        keep_conversation: bool,
    ) -> Vec<ViewMessage> {
        if !self.is_live(turn) {
            tracing::debug!("Ignoring completion of retired turn {}", turn.0);
            return Vec::new();
        }
        self.live = None;

        if keep_conversation {
            let next = last.and_then(|frame| {
                frame.conversation_id.as_ref().map(|conversation_id| ConversationRef {
                    conversation_id: conversation_id.clone(),
                    parent_message_id: frame.id.clone(),
                })
            });
            if next.is_some() {
                self.conversation = next;
            }
        } else {
            self.conversation = None;
        }

        let conversation_id = self
            .conversation
            .as_ref()
            .map(|c| c.conversation_id.clone())
            .unwrap_or_default();
        self.working = WorkingState::Idle;
        vec![
            ViewMessage::SetConversationId(conversation_id),
            ViewMessage::SetWorkingState(self.working),
        ]
    }

    /// Transport failed for `turn`; `message` is the user-facing text.
    pub fn fail_turn(&mut self, turn: Turn, message: String) -> Vec<ViewMessage> {
        if !self.is_live(turn) {
            tracing::debug!("Ignoring failure of retired turn {}: {}", turn.0, message);
            return Vec::new();
        }
        self.live = None;
        self.working = WorkingState::Idle;
        vec![
            ViewMessage::event(message),
            ViewMessage::SetWorkingState(self.working),
        ]
    }

    /// User cancel. Always lands in idle, whether or not a turn was live.
    pub fn abort(&mut self) -> Vec<ViewMessage> {
        self.live = None;
        self.working = WorkingState::Idle;
        vec![
            ViewMessage::SetWorkingState(self.working),
            ViewMessage::event("[EVENT] Aborted by user."),
        ]
    }

    /// Forget the backend thread. Refused while a request is in flight.
    pub fn reset(&mut self) -> Result<Vec<ViewMessage>, TutorError> {
        if self.working != WorkingState::Idle {
            tracing::warn!("Conversation is not idle, refusing to reset");
            return Err(TutorError::Busy);
        }
        self.conversation = None;
        Ok(vec![
            ViewMessage::SetTask(String::new()),
            ViewMessage::ClearResponses(String::new()),
            ViewMessage::SetConversationId(String::new()),
        ])
    }
}
