// Library exports for the Projexity tutor controller

pub mod assignment;
pub mod cancel;
pub mod config;
pub mod context;
pub mod controller;
pub mod conversation;
pub mod editor;
pub mod error;
pub mod frame;
pub mod logger;
pub mod output;
pub mod prompt;
pub mod transport;
pub mod view;

// Re-export commonly used types
pub use assignment::{Assignment, Project, ProjectCatalog, WorkItem};
pub use config::{ApiConfig, Config, Settings, SettingsPatch};
pub use context::{ContextKind, EditorHost};
pub use controller::Controller;
pub use conversation::{ConversationRef, WorkingState};
pub use editor::WorkspaceEditor;
pub use error::{TransportError, TutorError, TutorResult};
pub use frame::{Frame, FrameParsing};
pub use output::OutputHandler;
pub use transport::{ChatRequest, ChatTransport, HttpTransport};
pub use view::{ChannelPresenter, Presenter, ViewMessage};
