//! Tutor controller: turns a task into a prompt, streams the answer to the
//! view and keeps the conversation threaded across turns.
//!
//! Only one turn is live at a time. Starting a new turn never waits for the
//! previous stream; the previous stream's frames are judged stale and dropped.
//! All view notifications that depend on turn state are posted while the
//! conversation lock is held, so a retired turn can never slip a frame in
//! after its successor has started.

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::assignment::Assignment;
use crate::cancel::AbortSwitch;
use crate::config::{ApiConfig, Config, Settings, SettingsPatch};
use crate::context::{self, ContextKind, EditorHost};
use crate::conversation::{ConversationRef, ConversationState, FrameVerdict, Turn, WorkingState};
use crate::error::{TransportError, TutorResult};
use crate::frame::Frame;
use crate::prompt::{self, ComposedPrompt};
use crate::transport::{ChatRequest, ChatTransport, RequestOptions};
use crate::view::{Presenter, ViewMessage};

#[derive(Clone)]
pub struct Controller {
    shared: Arc<Shared>,
}

struct Shared {
    presenter: Arc<dyn Presenter>,
    transport: Arc<dyn ChatTransport>,
    conversation: Mutex<ConversationState>,
    assignment: RwLock<Assignment>,
    api: RwLock<ApiConfig>,
    settings: RwLock<Settings>,
    aborts: AbortSwitch,
}

impl Controller {
    pub fn new(
        config: &Config,
        assignment: Assignment,
        transport: Arc<dyn ChatTransport>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                presenter,
                transport,
                conversation: Mutex::new(ConversationState::new()),
                assignment: RwLock::new(assignment),
                api: RwLock::new(config.api.clone()),
                settings: RwLock::new(config.settings.clone()),
                aborts: AbortSwitch::new(),
            }),
        }
    }

    pub async fn working_state(&self) -> WorkingState {
        self.shared.conversation.lock().await.working_state()
    }

    pub async fn conversation(&self) -> Option<ConversationRef> {
        self.shared.conversation.lock().await.conversation().cloned()
    }

    pub async fn turn_counter(&self) -> u64 {
        self.shared.conversation.lock().await.turn_counter()
    }

    pub async fn settings(&self) -> Settings {
        self.shared.settings.read().await.clone()
    }

    pub async fn ticket_titles(&self) -> Vec<String> {
        self.shared.assignment.read().await.titles()
    }

    pub async fn current_ticket(&self) -> String {
        self.shared
            .assignment
            .read()
            .await
            .current_item()
            .title()
            .to_string()
    }

    /// Initial state for a freshly opened view.
    pub async fn on_view_loaded(&self) {
        let assignment = self.shared.assignment.read().await;
        let state = self.shared.conversation.lock().await;
        let presenter = &self.shared.presenter;

        presenter.post(ViewMessage::SetWorkingState(state.working_state()));
        presenter.post(ViewMessage::SetTickets(assignment.titles()));
        presenter.post(ViewMessage::request(
            prompt::welcome(&assignment),
            state.parent_message_id(),
        ));
    }

    pub async fn select_item(&self, title: &str) -> bool {
        let selected = self.shared.assignment.write().await.select_item(title);
        if selected {
            tracing::info!("Working on ticket '{}'", title);
        }
        selected
    }

    /// Ask about `task` with editor context of the given kind attached.
    pub async fn ask_with_context(
        &self,
        task: &str,
        kind: ContextKind,
        editor: &dyn EditorHost,
    ) -> JoinHandle<()> {
        let settings = self.settings().await;
        let context = context::extract(kind, editor, &settings).await;
        if context.is_empty() && kind == ContextKind::AllOpenFiles {
            tracing::info!("No file-backed tabs open, sending the bare task");
        }

        let composed = {
            let assignment = self.shared.assignment.read().await;
            prompt::compose_tutoring(&assignment, task, &context)
        };
        self.shared
            .presenter
            .post(ViewMessage::SetTask(task.to_string()));
        self.submit(composed).await
    }

    /// Ask the backend whether the open files satisfy the ticket named `title`.
    pub async fn check_code(&self, title: &str, editor: &dyn EditorHost) -> JoinHandle<()> {
        let code = context::merge_open_files(editor).await;
        let composed = {
            let assignment = self.shared.assignment.read().await;
            prompt::compose_review(&assignment, title, &code)
        };
        self.submit(composed).await
    }

    /// Start a new turn for `prompt`. Outcomes are delivered to the presenter;
    /// the handle resolves once the turn's stream is finished or abandoned.
    pub async fn submit(&self, prompt: ComposedPrompt) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        shared.presenter.show();

        let api = shared.api.read().await.clone();
        let settings = shared.settings.read().await.clone();
        let options = RequestOptions {
            endpoint: api.chat_endpoint.clone(),
            api_key: api.api_key.clone(),
            parsing: settings.frame_parsing,
            idle_timeout: Duration::from_secs(settings.timeout_length.max(1)),
        };

        let (turn, request, token) = {
            let mut state = shared.conversation.lock().await;
            // Taken under the lock so an abort cannot land between this and begin_turn.
            let token = shared.aborts.current();
            let conversation = state.conversation().cloned();
            shared.presenter.post(ViewMessage::request(
                prompt.display.clone(),
                state.parent_message_id(),
            ));
            let (turn, effects) = state.begin_turn();
            shared.post_all(effects);

            let request = ChatRequest {
                prompt: prompt.payload,
                conversation_id: conversation.as_ref().map(|c| c.conversation_id.clone()),
                parent_message_id: conversation.map(|c| c.parent_message_id),
                api_base_url: api.api_base_url,
                model: api.model,
            };
            (turn, request, token)
        };

        tracing::info!("Turn {} started", turn.0);
        tokio::spawn(async move {
            shared
                .run_turn(turn, request, options, settings.keep_conversation, token)
                .await
        })
    }

    /// Cancel whatever is in flight and return to idle.
    pub async fn abort(&self) {
        let mut state = self.shared.conversation.lock().await;
        self.shared.aborts.abort();
        let effects = state.abort();
        self.shared.post_all(effects);
        tracing::info!("Request aborted by user");
    }

    /// Abort any request still streaming so the view can be closed.
    pub async fn shutdown(&self) {
        if self.working_state().await == WorkingState::Asking {
            self.abort().await;
        }
    }

    /// Forget the backend thread. Returns false, changing nothing, while a request is running.
    pub async fn reset_conversation(&self) -> bool {
        let mut state = self.shared.conversation.lock().await;
        match state.reset() {
            Ok(effects) => {
                self.shared.post_all(effects);
                true
            }
            Err(_) => false,
        }
    }

    /// New backend info starts a new conversation.
    pub async fn set_api_info(&self, api: ApiConfig) {
        *self.shared.api.write().await = api;
        if !self.reset_conversation().await {
            tracing::warn!("API info changed mid-request; conversation kept until idle");
        }
    }

    pub async fn update_settings(&self, patch: SettingsPatch) {
        self.shared.settings.write().await.merge(patch);
    }

    /// Replace the editor selection with `code`, re-indented when configured.
    pub async fn insert_code(&self, code: &str, editor: &dyn EditorHost) -> TutorResult<()> {
        let indent = self.shared.settings.read().await.indent_on_inserting;
        let text = match editor.selection() {
            Some(selection) if indent && !selection.text.is_empty() => {
                context::reindent(code, &selection.end_line_text)
            }
            _ => code.to_string(),
        };
        editor.replace_selection(&text).await?;
        Ok(())
    }
}

impl Shared {
    fn post_all(&self, effects: Vec<ViewMessage>) {
        for message in effects {
            self.presenter.post(message);
        }
    }

    async fn run_turn(
        &self,
        turn: Turn,
        request: ChatRequest,
        options: RequestOptions,
        keep_conversation: bool,
        token: CancellationToken,
    ) {
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!("Turn {} aborted before the backend answered", turn.0);
                return;
            }
            opened = self.transport.open(&request, &options) => opened,
        };
        let mut frames = match opened {
            Ok(frames) => frames,
            Err(e) => return self.fail(turn, e).await,
        };

        let mut last: Option<Frame> = None;
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::debug!("Turn {} aborted mid-stream", turn.0);
                    return;
                }
                next = frames.next() => next,
            };

            match next {
                Some(Ok(frame)) => {
                    let state = self.conversation.lock().await;
                    match state.judge(turn, &frame) {
                        FrameVerdict::Forward => {
                            if self.presenter.is_visible() {
                                self.presenter.post(ViewMessage::AddResponse(frame.clone()));
                            }
                            last = Some(frame);
                        }
                        FrameVerdict::Echo => {
                            tracing::debug!("Dropping echo frame {}", frame.id);
                        }
                        FrameVerdict::Stale => {
                            tracing::debug!("Turn {} retired, closing its stream", turn.0);
                            return;
                        }
                    }
                }
                Some(Err(e)) => return self.fail(turn, e).await,
                None => break,
            }
        }

        let mut state = self.conversation.lock().await;
        let effects = state.complete_turn(turn, last.as_ref(), keep_conversation);
        if !effects.is_empty() {
            tracing::info!("Turn {} finished", turn.0);
        }
        self.post_all(effects);
    }

    async fn fail(&self, turn: Turn, error: TransportError) {
        tracing::error!("Turn {} failed: {}", turn.0, error);
        let mut state = self.conversation.lock().await;
        let effects = state.fail_turn(turn, error.user_message());
        if !effects.is_empty() {
            self.presenter.show();
        }
        self.post_all(effects);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::{Project, WorkItem};
    use crate::context::{MockEditorHost, OpenTab, Selection};
    use crate::error::RATE_LIMIT_MESSAGE;
    use crate::transport::FrameStream;
    use async_trait::async_trait;
    use futures::channel::mpsc;
    use pretty_assertions::assert_eq;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingPresenter {
        messages: std::sync::Mutex<Vec<ViewMessage>>,
        shows: AtomicUsize,
    }

    impl RecordingPresenter {
        fn messages(&self) -> Vec<ViewMessage> {
            self.messages.lock().unwrap().clone()
        }

        fn responses(&self) -> Vec<String> {
            self.messages()
                .into_iter()
                .filter_map(|m| match m {
                    ViewMessage::AddResponse(frame) => Some(frame.id),
                    _ => None,
                })
                .collect()
        }

        fn count(&self, wanted: &ViewMessage) -> usize {
            self.messages().iter().filter(|m| *m == wanted).count()
        }
    }

    impl Presenter for RecordingPresenter {
        fn post(&self, message: ViewMessage) {
            self.messages.lock().unwrap().push(message);
        }

        fn show(&self) {
            self.shows.fetch_add(1, Ordering::SeqCst);
        }
    }

    type FrameSender = mpsc::UnboundedSender<Result<Frame, TransportError>>;

    #[derive(Default)]
    struct ScriptedTransport {
        replies: std::sync::Mutex<VecDeque<Result<FrameStream, TransportError>>>,
        requests: std::sync::Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedTransport {
        fn push_stream(&self) -> FrameSender {
            let (tx, rx) = mpsc::unbounded();
            self.replies.lock().unwrap().push_back(Ok(Box::pin(rx)));
            tx
        }

        fn push_error(&self, error: TransportError) {
            self.replies.lock().unwrap().push_back(Err(error));
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn open(
            &self,
            request: &ChatRequest,
            _options: &RequestOptions,
        ) -> Result<FrameStream, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(TransportError::Timeout(0)))
        }
    }

    struct Harness {
        controller: Controller,
        presenter: Arc<RecordingPresenter>,
        transport: Arc<ScriptedTransport>,
    }

    fn harness(settings: Settings) -> Harness {
        let presenter = Arc::new(RecordingPresenter::default());
        let transport = Arc::new(ScriptedTransport::default());
        let config = Config {
            settings,
            ..Config::default()
        };
        let assignment = Assignment::new(Some(Project {
            name: "Weather App".to_string(),
            description: "Search weather by city.".to_string(),
            items: vec![
                WorkItem {
                    title: "Fetch data".to_string(),
                    requirements: "Call the API.".to_string(),
                },
                WorkItem {
                    title: "Spinner".to_string(),
                    requirements: "Show a spinner.".to_string(),
                },
            ],
        }));
        let controller = Controller::new(
            &config,
            assignment,
            transport.clone(),
            presenter.clone(),
        );
        Harness {
            controller,
            presenter,
            transport,
        }
    }

    fn frame(value: serde_json::Value) -> Frame {
        serde_json::from_value(value).unwrap()
    }

    fn send(tx: &FrameSender, value: serde_json::Value) {
        tx.unbounded_send(Ok(frame(value))).unwrap();
    }

    async fn wait_until(presenter: &RecordingPresenter, cond: impl Fn(&[ViewMessage]) -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !cond(&presenter.messages()) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    fn simple(text: &str) -> ComposedPrompt {
        ComposedPrompt {
            display: text.to_string(),
            payload: text.to_string(),
        }
    }

    #[tokio::test]
    async fn selection_context_reaches_the_backend() {
        let h = harness(Settings {
            codeblock_with_language_id: true,
            ..Settings::default()
        });
        let tx = h.transport.push_stream();
        drop(tx);

        let mut editor = MockEditorHost::new();
        editor.expect_selection().returning(|| {
            Some(Selection {
                text: "x = 1".to_string(),
                language_id: "python".to_string(),
                end_line_text: "x = 1".to_string(),
            })
        });

        h.controller
            .ask_with_context("explain this", ContextKind::Selection, &editor)
            .await
            .await
            .unwrap();

        let requests = h.transport.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0]
            .prompt
            .ends_with("User message: explain this\n```python\nx = 1\n```"));
        assert!(requests[0].prompt.contains("the task is \"Fetch data\""));

        let messages = h.presenter.messages();
        assert_eq!(messages[0], ViewMessage::SetTask("explain this".to_string()));
        assert_eq!(messages[1], ViewMessage::request("explain this", None));
        assert_eq!(messages[2], ViewMessage::SetWorkingState(WorkingState::Asking));
        assert_eq!(h.controller.working_state().await, WorkingState::Idle);
    }

    #[tokio::test]
    async fn no_open_files_sends_bare_task() {
        let h = harness(Settings::default());
        drop(h.transport.push_stream());

        let mut editor = MockEditorHost::new();
        editor.expect_open_tabs().returning(|| {
            vec![OpenTab {
                label: "Welcome".to_string(),
                path: None,
            }]
        });

        h.controller
            .ask_with_context("review my work", ContextKind::AllOpenFiles, &editor)
            .await
            .await
            .unwrap();

        let prompt = &h.transport.requests()[0].prompt;
        assert!(prompt.ends_with("User message: review my work"));
        assert!(!prompt.contains("```"));
    }

    #[tokio::test]
    async fn superseded_turn_never_reaches_the_view() {
        let h = harness(Settings::default());
        let first = h.transport.push_stream();
        let second = h.transport.push_stream();

        let h1 = h.controller.submit(simple("A")).await;
        send(&first, json!({"id": "a1", "parentMessageId": "p", "text": "A..."}));
        wait_until(&h.presenter, |m| {
            m.contains(&ViewMessage::AddResponse(frame(
                json!({"id": "a1", "parentMessageId": "p", "text": "A..."}),
            )))
        })
        .await;

        let h2 = h.controller.submit(simple("B")).await;
        send(&first, json!({"id": "a2", "conversationId": "stale", "text": "A...."}));
        drop(first);
        h1.await.unwrap();

        assert_eq!(h.presenter.responses(), vec!["a1"]);
        assert_eq!(h.controller.working_state().await, WorkingState::Asking);

        send(&second, json!({"id": "b1", "conversationId": "c2", "text": "B"}));
        drop(second);
        h2.await.unwrap();

        assert_eq!(h.presenter.responses(), vec!["a1", "b1"]);
        assert_eq!(h.controller.working_state().await, WorkingState::Idle);
        assert_eq!(h.controller.turn_counter().await, 2);
        assert_eq!(
            h.controller.conversation().await.map(|c| c.conversation_id),
            Some("c2".to_string())
        );
    }

    #[tokio::test]
    async fn echo_frames_are_suppressed() {
        let h = harness(Settings::default());
        let tx = h.transport.push_stream();

        let handle = h.controller.submit(simple("hi")).await;
        send(&tx, json!({"id": "m0", "parentMessageId": "m0", "text": "hi"}));
        send(&tx, json!({"id": "m1", "parentMessageId": "m0", "conversationId": "c1", "text": "hello"}));
        drop(tx);
        handle.await.unwrap();

        assert_eq!(h.presenter.responses(), vec!["m1"]);
        assert_eq!(
            h.controller.conversation().await,
            Some(ConversationRef {
                conversation_id: "c1".to_string(),
                parent_message_id: "m1".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn follow_up_turn_is_threaded() {
        let h = harness(Settings::default());
        let tx = h.transport.push_stream();
        let handle = h.controller.submit(simple("one")).await;
        send(&tx, json!({"id": "m1", "conversationId": "c1", "text": "first"}));
        drop(tx);
        handle.await.unwrap();

        drop(h.transport.push_stream());
        h.controller.submit(simple("two")).await.await.unwrap();

        let second = &h.transport.requests()[1];
        assert_eq!(second.conversation_id.as_deref(), Some("c1"));
        assert_eq!(second.parent_message_id.as_deref(), Some("m1"));
        assert_eq!(
            h.presenter.count(&ViewMessage::request("two", Some("m1".to_string()))),
            1
        );
        assert_eq!(
            h.presenter.count(&ViewMessage::SetConversationId("c1".to_string())),
            2
        );
    }

    #[tokio::test]
    async fn conversation_not_kept_when_disabled() {
        let h = harness(Settings {
            keep_conversation: false,
            ..Settings::default()
        });
        let tx = h.transport.push_stream();
        let handle = h.controller.submit(simple("one")).await;
        send(&tx, json!({"id": "m1", "conversationId": "c1"}));
        drop(tx);
        handle.await.unwrap();

        assert!(h.controller.conversation().await.is_none());
        drop(h.transport.push_stream());
        h.controller.submit(simple("two")).await.await.unwrap();
        assert!(h.transport.requests()[1].conversation_id.is_none());
    }

    #[tokio::test]
    async fn rate_limit_maps_to_fixed_message() {
        let h = harness(Settings::default());
        h.transport.push_error(TransportError::Status {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: "slow down".to_string(),
        });

        h.controller.submit(simple("hi")).await.await.unwrap();

        assert_eq!(h.presenter.count(&ViewMessage::event(RATE_LIMIT_MESSAGE)), 1);
        assert_eq!(h.controller.working_state().await, WorkingState::Idle);
        assert_eq!(h.presenter.shows.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn mid_stream_failure_is_reported_once() {
        let h = harness(Settings::default());
        let tx = h.transport.push_stream();

        let handle = h.controller.submit(simple("hi")).await;
        send(&tx, json!({"id": "m1", "text": "par"}));
        tx.unbounded_send(Err(TransportError::Timeout(60))).unwrap();
        handle.await.unwrap();

        assert_eq!(h.presenter.responses(), vec!["m1"]);
        assert_eq!(
            h.presenter
                .count(&ViewMessage::event("[ERROR] no data received for 60 seconds")),
            1
        );
        assert_eq!(h.controller.working_state().await, WorkingState::Idle);
        assert!(h.controller.conversation().await.is_none());
    }

    #[tokio::test]
    async fn abort_stops_delivery_and_goes_idle() {
        let h = harness(Settings::default());
        let tx = h.transport.push_stream();

        let handle = h.controller.submit(simple("long")).await;
        send(&tx, json!({"id": "m1", "text": "a"}));
        wait_until(&h.presenter, |m| {
            m.iter().any(|m| matches!(m, ViewMessage::AddResponse(_)))
        })
        .await;

        h.controller.abort().await;
        let _ = tx.unbounded_send(Ok(frame(json!({"id": "m2", "text": "ab"}))));
        handle.await.unwrap();

        assert_eq!(h.presenter.responses(), vec!["m1"]);
        assert_eq!(h.controller.working_state().await, WorkingState::Idle);
        assert_eq!(h.presenter.count(&ViewMessage::event("[EVENT] Aborted by user.")), 1);

        // A fresh handle is in place for the next request.
        let tx = h.transport.push_stream();
        let handle = h.controller.submit(simple("again")).await;
        send(&tx, json!({"id": "n1", "conversationId": "c"}));
        drop(tx);
        handle.await.unwrap();
        assert_eq!(h.presenter.responses(), vec!["m1", "n1"]);
    }

    #[tokio::test]
    async fn abort_racing_a_new_request_leaves_it_running() {
        let h = harness(Settings::default());
        let tx = h.transport.push_stream();

        let mut guard = h.controller.shared.conversation.lock().await;
        let controller = h.controller.clone();
        let submitting = tokio::spawn(async move { controller.submit(simple("hi")).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // An abort that was already under way when the request arrived.
        h.controller.shared.aborts.abort();
        h.controller.shared.post_all(guard.abort());
        drop(guard);

        let handle = submitting.await.unwrap();
        send(&tx, json!({"id": "m1", "conversationId": "c1", "text": "ok"}));
        drop(tx);
        handle.await.unwrap();

        assert_eq!(h.presenter.responses(), vec!["m1"]);
        assert_eq!(h.controller.working_state().await, WorkingState::Idle);
        assert!(h.controller.reset_conversation().await);
    }

    #[tokio::test]
    async fn abort_and_submit_from_separate_tasks_settle_idle() {
        let h = harness(Settings::default());
        for _ in 0..20 {
            let tx = h.transport.push_stream();
            let controller = h.controller.clone();
            let submitting = tokio::spawn(async move { controller.submit(simple("go")).await });
            let controller = h.controller.clone();
            let aborting = tokio::spawn(async move { controller.abort().await });

            aborting.await.unwrap();
            let handle = submitting.await.unwrap();
            drop(tx);
            handle.await.unwrap();

            assert_eq!(h.controller.working_state().await, WorkingState::Idle);
        }
    }

    #[tokio::test]
    async fn shutdown_aborts_only_a_running_request() {
        let h = harness(Settings::default());
        h.controller.shutdown().await;
        assert!(h.presenter.messages().is_empty());

        let tx = h.transport.push_stream();
        let handle = h.controller.submit(simple("long")).await;
        h.controller.shutdown().await;
        handle.await.unwrap();

        assert_eq!(h.controller.working_state().await, WorkingState::Idle);
        assert_eq!(h.presenter.count(&ViewMessage::event("[EVENT] Aborted by user.")), 1);
        drop(tx);
    }

    #[tokio::test]
    async fn reset_only_applies_when_idle() {
        let h = harness(Settings::default());

        assert!(h.controller.reset_conversation().await);
        assert_eq!(h.presenter.count(&ViewMessage::SetTask(String::new())), 1);
        assert_eq!(h.presenter.count(&ViewMessage::ClearResponses(String::new())), 1);
        assert_eq!(h.presenter.count(&ViewMessage::SetConversationId(String::new())), 1);
        assert!(h.controller.conversation().await.is_none());

        let tx = h.transport.push_stream();
        let handle = h.controller.submit(simple("busy")).await;
        let posted = h.presenter.messages().len();

        assert!(!h.controller.reset_conversation().await);
        assert_eq!(h.presenter.messages().len(), posted);
        assert_eq!(h.controller.working_state().await, WorkingState::Asking);
        assert_eq!(h.controller.turn_counter().await, 1);

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn check_code_for_unknown_ticket_still_runs() {
        let h = harness(Settings::default());
        drop(h.transport.push_stream());

        let mut editor = MockEditorHost::new();
        editor.expect_open_tabs().returning(|| {
            vec![OpenTab {
                label: "App.js".to_string(),
                path: Some(PathBuf::from("/w/App.js")),
            }]
        });
        editor
            .expect_read_file()
            .returning(|_| Ok("fetch(url)".to_string()));

        h.controller
            .check_code("99. Deploy", &editor)
            .await
            .await
            .unwrap();

        let prompt = &h.transport.requests()[0].prompt;
        assert!(prompt.contains("The ticket requirements are \"\""));
        assert!(prompt.ends_with("## /w/App.js\n```\nfetch(url)\n```\n"));
        assert_eq!(
            h.presenter.count(&ViewMessage::request(
                "Checking Code | Ticket: 99. Deploy | Ticket Requirements: ",
                None
            )),
            1
        );
    }

    #[tokio::test]
    async fn view_loaded_lists_tickets_and_greets() {
        let h = harness(Settings::default());
        h.controller.on_view_loaded().await;

        let messages = h.presenter.messages();
        assert_eq!(messages[0], ViewMessage::SetWorkingState(WorkingState::Idle));
        assert_eq!(
            messages[1],
            ViewMessage::SetTickets(vec!["Fetch data".to_string(), "Spinner".to_string()])
        );
        match &messages[2] {
            ViewMessage::AddRequest(request) => {
                assert!(request.text.contains("*Weather App*"));
                assert!(request.parent_message_id.is_none());
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[tokio::test]
    async fn selecting_ticket_rebinds_prompt() {
        let h = harness(Settings::default());
        assert!(h.controller.select_item("Spinner").await);
        assert!(!h.controller.select_item("Nope").await);
        assert_eq!(h.controller.current_ticket().await, "Spinner");
    }

    #[tokio::test]
    async fn insert_code_matches_selection_indent() {
        let h = harness(Settings::default());
        let mut editor = MockEditorHost::new();
        editor.expect_selection().returning(|| {
            Some(Selection {
                text: "old()".to_string(),
                language_id: "javascript".to_string(),
                end_line_text: "    old()".to_string(),
            })
        });
        editor
            .expect_replace_selection()
            .withf(|text| text == "a();\n    b();")
            .times(1)
            .returning(|_| Ok(()));

        h.controller.insert_code("a();\nb();\n", &editor).await.unwrap();
    }

    #[tokio::test]
    async fn new_api_info_resets_conversation() {
        let h = harness(Settings::default());
        let tx = h.transport.push_stream();
        let handle = h.controller.submit(simple("one")).await;
        send(&tx, json!({"id": "m1", "conversationId": "c1"}));
        drop(tx);
        handle.await.unwrap();
        assert!(h.controller.conversation().await.is_some());

        h.controller
            .set_api_info(ApiConfig {
                model: Some("gpt-4o".to_string()),
                ..ApiConfig::default()
            })
            .await;

        assert!(h.controller.conversation().await.is_none());
        drop(h.transport.push_stream());
        h.controller.submit(simple("two")).await.await.unwrap();
        assert_eq!(h.transport.requests()[1].model.as_deref(), Some("gpt-4o"));
    }
}
