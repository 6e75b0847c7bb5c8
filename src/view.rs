//! Messages sent to the presentation side and the sink that receives them.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::conversation::WorkingState;
use crate::frame::Frame;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    pub text: String,
    pub parent_message_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventView {
    pub text: String,
}

/// Wire shape is `{"type": "...", "value": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ViewMessage {
    SetWorkingState(WorkingState),
    AddRequest(RequestView),
    AddResponse(Frame),
    AddEvent(EventView),
    SetConversationId(String),
    SetTask(String),
    SetTickets(Vec<String>),
    ClearResponses(String),
}

impl ViewMessage {
    pub fn event(text: impl Into<String>) -> Self {
        ViewMessage::AddEvent(EventView { text: text.into() })
    }

    pub fn request(text: impl Into<String>, parent_message_id: Option<String>) -> Self {
        ViewMessage::AddRequest(RequestView {
            text: text.into(),
            parent_message_id,
        })
    }
}

impl std::fmt::Display for ViewMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewMessage::SetWorkingState(_) => write!(f, "setWorkingState"),
            ViewMessage::AddRequest(_) => write!(f, "addRequest"),
            ViewMessage::AddResponse(_) => write!(f, "addResponse"),
            ViewMessage::AddEvent(_) => write!(f, "addEvent"),
            ViewMessage::SetConversationId(_) => write!(f, "setConversationId"),
            ViewMessage::SetTask(_) => write!(f, "setTask"),
            ViewMessage::SetTickets(_) => write!(f, "setTickets"),
            ViewMessage::ClearResponses(_) => write!(f, "clearResponses"),
        }
    }
}

/// Receiver of controller notifications.
pub trait Presenter: Send + Sync {
    fn post(&self, message: ViewMessage);

    /// Bring the view to the foreground.
    fn show(&self) {}

    /// Streamed responses are only posted while the view is visible.
    fn is_visible(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct PostedMessage {
    pub timestamp: DateTime<Local>,
    pub message: ViewMessage,
}

/// Forwards notifications over an unbounded channel to a rendering loop.
#[derive(Debug, Clone)]
pub struct ChannelPresenter {
    tx: mpsc::UnboundedSender<PostedMessage>,
}

impl ChannelPresenter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PostedMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Presenter for ChannelPresenter {
    fn post(&self, message: ViewMessage) {
        let posted = PostedMessage {
            timestamp: Local::now(),
            message,
        };
        if self.tx.send(posted).is_err() {
            tracing::debug!("View closed, dropping notification");
        }
    }

    fn is_visible(&self) -> bool {
        !self.tx.is_closed()
    }
}
