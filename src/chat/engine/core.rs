//! Chat session engine orchestration.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::chat::client::api::{ApiClient, IngestClient, ProbeClient, QueryClient};
use crate::chat::core::config::{ChatConfig, IngestMode};
use crate::chat::core::errors::{ChatError, ChatResult, ReadError};
use crate::chat::core::ids::{MessageId, SelectionId};
use crate::chat::core::message::ChatMessage;
use crate::chat::core::state::{
    Navigation, Selection, SelectionUpdate, SendRejection, SessionSnapshot, SessionState,
};
use crate::chat::encoding::{EncodedFile, FileEncoder, FileRef};
use crate::chat::session::token_store::{FileTokenStore, TokenStore};

/// Placeholder text after a failed query.
pub const QUERY_FAILURE_TEXT: &str =
    "Sorry, something went wrong while contacting the knowledge service.";

/// Diagnostic line when the liveness probe fails.
pub const BACKEND_UNREACHABLE_TEXT: &str = "Error connecting to backend";

fn uploaded_text(name: &str) -> String {
    format!("Uploaded file: {name}")
}

fn ingest_outcome_text(name: &str, ok: bool) -> String {
    if ok {
        format!("Ingested file: {name}")
    } else {
        format!("Failed to ingest file: {name}")
    }
}

/// Backend dependencies for the chat engine.
pub struct ChatBackends {
    /// Query endpoint adapter.
    pub query: Arc<dyn QueryClient>,
    /// Ingestion endpoint adapter.
    pub ingest: Arc<dyn IngestClient>,
    /// Liveness probe adapter.
    pub probe: Arc<dyn ProbeClient>,
    /// Session token storage.
    pub tokens: Arc<dyn TokenStore>,
    /// File encoder.
    pub encoder: FileEncoder,
}

impl ChatBackends {
    /// Build HTTP and filesystem backends from config.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn http(config: &ChatConfig) -> ChatResult<Self> {
        let api = Arc::new(ApiClient::new(config)?);
        Ok(Self {
            query: api.clone(),
            ingest: api.clone(),
            probe: api,
            tokens: Arc::new(FileTokenStore::new(&config.token_path)),
            encoder: FileEncoder::filesystem(),
        })
    }
}

/// Handle on the remote work started by an accepted action.
#[derive(Debug)]
pub struct Submission {
    user_message: ChatMessage,
    placeholder: Option<ChatMessage>,
    tasks: Vec<JoinHandle<()>>,
}

impl Submission {
    /// The user message appended for this action.
    #[must_use]
    pub const fn user_message(&self) -> &ChatMessage {
        &self.user_message
    }

    /// The assistant placeholder, when text was sent.
    #[must_use]
    pub const fn placeholder(&self) -> Option<&ChatMessage> {
        self.placeholder.as_ref()
    }

    /// Wait until every remote call of this action has resolved and been
    /// applied to the session.
    pub async fn wait(self) {
        for task in self.tasks {
            if let Err(err) = task.await {
                error!("Chat engine task failed: {err}");
            }
        }
    }
}

/// Result of `send` or `drop_file`.
#[derive(Debug)]
pub enum SendOutcome {
    /// Action accepted; remote work is running.
    Accepted(Submission),
    /// Action refused; nothing changed.
    Rejected(SendRejection),
}

impl SendOutcome {
    /// Whether the action was accepted.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// The submission, if accepted.
    #[must_use]
    pub fn into_submission(self) -> Option<Submission> {
        match self {
            Self::Accepted(submission) => Some(submission),
            Self::Rejected(_) => None,
        }
    }

    /// The rejection reason, if refused.
    #[must_use]
    pub const fn rejection(&self) -> Option<SendRejection> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected(reason) => Some(*reason),
        }
    }
}

/// Handle on the encode started by `select_file`.
#[derive(Debug)]
pub struct EncodeTicket {
    id: SelectionId,
    task: JoinHandle<()>,
}

impl EncodeTicket {
    /// Selection generation this encode belongs to.
    #[must_use]
    pub const fn id(&self) -> SelectionId {
        self.id
    }

    /// Wait until the encode result has been applied or discarded.
    pub async fn finished(self) {
        if let Err(err) = self.task.await {
            error!("Encode task for selection {} failed: {err}", self.id);
        }
    }
}

/// Everything `send` captured at acceptance time.
struct SendPlan {
    text: String,
    user_message: ChatMessage,
    placeholder: Option<ChatMessage>,
    selection: Option<Selection>,
    generation: u64,
}

struct EngineInner {
    config: ChatConfig,
    backends: ChatBackends,
    state: Mutex<SessionState>,
    updates: watch::Sender<SessionSnapshot>,
}

/// Chat session engine.
///
/// Cheap to clone; clones share one session. Entry points are synchronous
/// and apply their state change before returning. Remote work is spawned on
/// the current tokio runtime, so actions that start it (`send`,
/// `select_file`, `drop_file`) must be called from within one.
#[derive(Clone)]
pub struct ChatEngine {
    inner: Arc<EngineInner>,
}

impl ChatEngine {
    /// Create a new chat engine.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: ChatConfig, backends: ChatBackends) -> ChatResult<Self> {
        config.validate()?;

        let token_present = match backends.tokens.load() {
            Ok(token) => token.is_some(),
            Err(err) => {
                warn!("Failed to read session token: {err}");
                false
            }
        };

        let state = SessionState::new(token_present, config.pending_encode);
        let (updates, _) = watch::channel(state.snapshot());

        info!(
            "Chat engine ready (api: {}, ingest: {}, pending encode: {})",
            config.api_base, config.ingest_mode, config.pending_encode
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                backends,
                state: Mutex::new(state),
                updates,
            }),
        })
    }

    /// Create a new engine using HTTP and filesystem backends.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or backends cannot be initialized.
    pub fn from_config(config: ChatConfig) -> ChatResult<Self> {
        let backends = ChatBackends::http(&config)?;
        Self::new(config, backends)
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ChatConfig {
        &self.inner.config
    }

    /// Receive a snapshot after every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.updates.subscribe()
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SessionState) {
        self.inner.updates.send_replace(state.snapshot());
    }

    /// Apply a change and publish the resulting snapshot.
    fn mutate<R>(&self, change: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.lock();
        let result = change(&mut state);
        self.publish(&state);
        result
    }

    /// Apply a guarded change. A refused change must leave the state as it
    /// was, and nothing is published for it.
    fn try_mutate<T>(
        &self,
        change: impl FnOnce(&mut SessionState) -> Result<T, SendRejection>,
    ) -> Result<T, SendRejection> {
        let mut state = self.lock();
        let result = change(&mut state);
        if result.is_ok() {
            self.publish(&state);
        }
        result
    }

    /// Replace the unsent input.
    pub fn set_input(&self, text: impl Into<String>) {
        let text = text.into();
        self.mutate(|state| state.set_pending_text(text));
    }

    /// Toggle the drag-hover hint.
    pub fn set_drag_active(&self, active: bool) {
        let mut state = self.lock();
        if state.drag_active() != active {
            state.set_drag_active(active);
            self.publish(&state);
        }
    }

    /// Whether `send` would currently be accepted.
    #[must_use]
    pub fn can_send(&self) -> bool {
        self.lock().admit_send().is_ok()
    }

    /// Send the current input and/or the selected file.
    ///
    /// The user message (and a placeholder when text is present) is appended
    /// before this returns. The query and the upload then run independently.
    pub fn send(&self) -> SendOutcome {
        let plan = self.try_mutate(|state| {
            state.admit_send()?;

            let text = state.pending_text().trim().to_string();
            let selection = state.selection().cloned();
            let attachment = selection.as_ref().map(|s| s.name.clone());
            let Ok(user_message) = ChatMessage::user(text.clone(), attachment) else {
                return Err(SendRejection::Empty);
            };

            state.take_pending_text();
            state.push(user_message.clone());

            let placeholder = if text.is_empty() {
                None
            } else {
                let placeholder = ChatMessage::placeholder();
                state.push(placeholder.clone());
                state.set_query_in_flight(true);
                Some(placeholder)
            };

            if selection.is_some() {
                state.set_upload_in_flight(true);
            }

            Ok(SendPlan {
                text,
                user_message,
                placeholder,
                selection,
                generation: state.generation(),
            })
        });

        let plan = match plan {
            Ok(plan) => plan,
            Err(reason) => {
                debug!("Send rejected: {reason}");
                return SendOutcome::Rejected(reason);
            }
        };

        let mut tasks = Vec::with_capacity(2);

        if let Some(placeholder) = &plan.placeholder {
            let engine = self.clone();
            let id = placeholder.id();
            let text = plan.text;
            tasks.push(tokio::spawn(async move { engine.run_query(id, text).await }));
        }

        if let Some(selection) = plan.selection {
            let engine = self.clone();
            let generation = plan.generation;
            tasks.push(tokio::spawn(async move {
                engine.run_upload(selection, generation).await;
            }));
        }

        info!("Send accepted ({} remote call(s))", tasks.len());
        SendOutcome::Accepted(Submission {
            user_message: plan.user_message,
            placeholder: plan.placeholder,
            tasks,
        })
    }

    async fn run_query(&self, placeholder: MessageId, text: String) {
        let answer = match self.inner.backends.query.submit_query(&text).await {
            Ok(answer) => answer,
            Err(err) => {
                warn!("Query failed: {err}");
                QUERY_FAILURE_TEXT.to_string()
            }
        };

        self.mutate(|state| {
            if !state.resolve_message(placeholder, answer) {
                debug!("Placeholder {placeholder} no longer in history; answer dropped");
            }
            state.set_query_in_flight(false);
        });
    }

    async fn run_upload(&self, selection: Selection, generation: u64) {
        let payload = match selection.payload {
            Some(payload) => Ok(payload),
            None => selection.encoding.clone().await,
        };
        let outcome = self.ingest(payload).await;
        let narrate = self.inner.config.ingest_mode == IngestMode::Narrated;
        let name = selection.name;

        match &outcome {
            Ok(()) => info!("Ingested file {name}"),
            Err(err) => warn!("Failed to ingest file {name}: {err}"),
        }

        self.mutate(|state| {
            if state.generation() != generation {
                debug!("Ingest outcome for {name} dropped after reset");
            } else if narrate {
                state.push(ChatMessage::assistant(ingest_outcome_text(
                    &name,
                    outcome.is_ok(),
                )));
            }
            state.clear_selection_if(selection.id);
            state.set_upload_in_flight(false);
        });
    }

    async fn ingest(&self, payload: Result<EncodedFile, ReadError>) -> ChatResult<()> {
        let file = payload.map_err(ChatError::from)?;
        self.inner.backends.ingest.submit_file(&file).await
    }

    /// Select a file for the next `send`, replacing any previous selection.
    ///
    /// Encoding starts immediately. A result that arrives after the selection
    /// was cleared or replaced is discarded.
    pub fn select_file(&self, file: FileRef) -> EncodeTicket {
        let id = SelectionId::new();
        let name = file.display_name();
        let encoding = self.inner.backends.encoder.encode_shared(file);

        debug!("Selected file {name} (selection {id})");
        self.mutate(|state| state.begin_selection(id, name, encoding.clone()));

        let engine = self.clone();
        let task = tokio::spawn(async move {
            let result = encoding.await;
            engine.finish_selection(id, result);
        });

        EncodeTicket { id, task }
    }

    fn finish_selection(&self, id: SelectionId, result: Result<EncodedFile, ReadError>) {
        let failure = result.as_ref().err().cloned();
        let update = self.mutate(|state| state.complete_selection(id, result));

        match (update, failure) {
            (SelectionUpdate::Applied, _) => debug!("Selection {id} encoded"),
            (SelectionUpdate::Failed, Some(err)) => warn!("Selection cleared: {err}"),
            (SelectionUpdate::Failed, None) => warn!("Selection {id} cleared"),
            (SelectionUpdate::Stale, _) => debug!("Discarding stale encode for selection {id}"),
        }
    }

    /// Encode and ingest a dropped file right away.
    ///
    /// Narrates both the upload and its outcome whatever the ingest mode, and
    /// never touches the current selection.
    pub fn drop_file(&self, file: FileRef) -> SendOutcome {
        let name = file.display_name();
        let accepted = self.try_mutate(|state| {
            if state.upload_in_flight() {
                return Err(SendRejection::UploadInFlight);
            }
            let user_message = ChatMessage::user(uploaded_text(&name), Some(name.clone()))
                .map_err(|_| SendRejection::Empty)?;
            state.set_drag_active(false);
            state.push(user_message.clone());
            state.set_upload_in_flight(true);
            Ok((user_message, state.generation()))
        });

        let (user_message, generation) = match accepted {
            Ok(accepted) => accepted,
            Err(reason) => {
                debug!("Drop of {name} rejected: {reason}");
                self.set_drag_active(false);
                return SendOutcome::Rejected(reason);
            }
        };

        let engine = self.clone();
        let task = tokio::spawn(async move { engine.run_drop(file, name, generation).await });

        SendOutcome::Accepted(Submission {
            user_message,
            placeholder: None,
            tasks: vec![task],
        })
    }

    async fn run_drop(&self, file: FileRef, name: String, generation: u64) {
        let payload = self.inner.backends.encoder.encode(&file).await;
        let outcome = self.ingest(payload).await;

        match &outcome {
            Ok(()) => info!("Ingested dropped file {name}"),
            Err(err) => warn!("Failed to ingest dropped file {name}: {err}"),
        }

        self.mutate(|state| {
            if state.generation() == generation {
                state.push(ChatMessage::assistant(ingest_outcome_text(
                    &name,
                    outcome.is_ok(),
                )));
            } else {
                debug!("Ingest outcome for dropped file {name} dropped after reset");
            }
            state.set_upload_in_flight(false);
        });
    }

    /// Discard the selection and its payload, even mid-encode. Idempotent.
    pub fn clear_file(&self) {
        self.mutate(SessionState::clear_selection);
    }

    /// Persist a token received from the login collaborator.
    ///
    /// # Errors
    /// Returns an error if the token store cannot be written.
    pub fn store_token(&self, token: &str) -> ChatResult<()> {
        self.inner.backends.tokens.store(token)?;
        self.mutate(|state| state.set_token_present(true));
        Ok(())
    }

    /// Forget the session token and request navigation to the login view.
    ///
    /// History is left as is.
    pub fn logout(&self) -> Navigation {
        if let Err(err) = self.inner.backends.tokens.remove() {
            error!("Failed to remove session token: {err}");
        }
        self.mutate(|state| {
            state.set_token_present(false);
            state.set_navigation(Navigation::Register);
        });
        info!("Logged out");
        Navigation::Register
    }

    /// Ping the backend and store the outcome as the diagnostic line.
    pub async fn probe_backend(&self) -> String {
        let message = match self.inner.backends.probe.hello().await {
            Ok(message) => message,
            Err(err) => {
                warn!("Backend probe failed: {err}");
                BACKEND_UNREACHABLE_TEXT.to_string()
            }
        };
        let diagnostic = message.clone();
        self.mutate(|state| state.set_diagnostic(diagnostic));
        message
    }

    /// Start over with an empty transcript.
    ///
    /// Calls still in flight resolve into the new session. Their answers and
    /// ingest outcomes are dropped, and only their in-flight flags clear.
    pub fn reset(&self) {
        self.mutate(SessionState::reset);
        info!("Session reset");
    }
}
