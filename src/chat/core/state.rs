//! Session state owned by the chat engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chat::core::config::PendingEncodePolicy;
use crate::chat::core::errors::ReadError;
use crate::chat::core::ids::{MessageId, SelectionId};
use crate::chat::core::message::ChatMessage;
use crate::chat::encoding::{EncodedFile, SharedEncode};

/// Where the view should go next.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Navigation {
    /// Back to the login/registration view.
    Register,
}

/// Why a send or drop was refused. The session is left untouched.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum SendRejection {
    /// No text and no selected file.
    #[error("nothing to send")]
    Empty,
    /// A query is still outstanding.
    #[error("a query is already in flight")]
    QueryInFlight,
    /// An upload is still outstanding.
    #[error("an upload is already in flight")]
    UploadInFlight,
    /// The selected file has not finished encoding.
    #[error("the selected file is still being encoded")]
    EncodingPending,
}

/// The file currently awaiting confirmation by `send`.
#[derive(Clone)]
pub(crate) struct Selection {
    pub(crate) id: SelectionId,
    pub(crate) name: String,
    pub(crate) payload: Option<EncodedFile>,
    pub(crate) encoding: SharedEncode,
}

impl fmt::Debug for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("payload_ready", &self.payload.is_some())
            .finish_non_exhaustive()
    }
}

/// Outcome of delivering an encode result to the state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum SelectionUpdate {
    /// Payload stored on the live selection.
    Applied,
    /// Read failed; the selection was dropped.
    Failed,
    /// The selection was cleared or replaced meanwhile; result discarded.
    Stale,
}

/// Mutable state of one open chat view.
///
/// `payload` on the selection is set only once its encode has completed, and
/// a failed encode removes the selection entirely, so a half-populated
/// selection is never observable.
#[derive(Debug, Default)]
pub struct SessionState {
    history: Vec<ChatMessage>,
    pending_text: String,
    selection: Option<Selection>,
    query_in_flight: bool,
    upload_in_flight: bool,
    drag_active: bool,
    diagnostic: Option<String>,
    token_present: bool,
    navigation: Option<Navigation>,
    pending_encode: PendingEncodePolicy,
    generation: u64,
}

impl SessionState {
    /// Empty session.
    #[must_use]
    pub fn new(token_present: bool, pending_encode: PendingEncodePolicy) -> Self {
        Self {
            token_present,
            pending_encode,
            ..Self::default()
        }
    }

    /// Transcript generation, bumped by every reset.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a send would be accepted right now.
    ///
    /// # Errors
    /// Returns the first rule the current state breaks.
    pub fn admit_send(&self) -> Result<(), SendRejection> {
        let has_text = !self.pending_text.trim().is_empty();
        let selection = self.selection.as_ref();

        if !has_text && selection.is_none() {
            return Err(SendRejection::Empty);
        }
        if self.query_in_flight {
            return Err(SendRejection::QueryInFlight);
        }
        if self.upload_in_flight {
            return Err(SendRejection::UploadInFlight);
        }
        if self.pending_encode == PendingEncodePolicy::Reject
            && selection.is_some_and(|s| s.payload.is_none())
        {
            return Err(SendRejection::EncodingPending);
        }
        Ok(())
    }

    /// Transcript in insertion order.
    #[must_use]
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Current unsent input.
    #[must_use]
    pub fn pending_text(&self) -> &str {
        &self.pending_text
    }

    /// Name of the selected file, if any.
    #[must_use]
    pub fn selected_file(&self) -> Option<&str> {
        self.selection.as_ref().map(|s| s.name.as_str())
    }

    /// Whether the selected file has finished encoding.
    #[must_use]
    pub fn payload_ready(&self) -> bool {
        self.selection.as_ref().is_some_and(|s| s.payload.is_some())
    }

    /// Whether a query is outstanding.
    #[must_use]
    pub const fn query_in_flight(&self) -> bool {
        self.query_in_flight
    }

    /// Whether an upload is outstanding.
    #[must_use]
    pub const fn upload_in_flight(&self) -> bool {
        self.upload_in_flight
    }

    /// Whether a file is being dragged over the view.
    #[must_use]
    pub const fn drag_active(&self) -> bool {
        self.drag_active
    }

    pub(crate) fn push(&mut self, message: ChatMessage) -> MessageId {
        let id = message.id();
        self.history.push(message);
        id
    }

    /// Fill the placeholder with the given id. Returns `false` if it is gone
    /// or was already resolved.
    pub(crate) fn resolve_message(&mut self, id: MessageId, text: String) -> bool {
        self.history
            .iter_mut()
            .find(|message| message.id() == id)
            .is_some_and(|message| message.resolve(text))
    }

    pub(crate) fn set_pending_text(&mut self, text: String) {
        self.pending_text = text;
    }

    pub(crate) fn take_pending_text(&mut self) -> String {
        std::mem::take(&mut self.pending_text)
    }

    pub(crate) fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Replace any previous selection with a new, not yet encoded one.
    pub(crate) fn begin_selection(&mut self, id: SelectionId, name: String, encoding: SharedEncode) {
        self.selection = Some(Selection {
            id,
            name,
            payload: None,
            encoding,
        });
    }

    /// Deliver the result of the encode started for `id`.
    pub(crate) fn complete_selection(
        &mut self,
        id: SelectionId,
        result: Result<EncodedFile, ReadError>,
    ) -> SelectionUpdate {
        let Some(selection) = self.selection.as_mut().filter(|s| s.id == id) else {
            return SelectionUpdate::Stale;
        };
        match result {
            Ok(_) if selection.payload.is_some() => SelectionUpdate::Applied,
            Ok(payload) => {
                selection.payload = Some(payload);
                SelectionUpdate::Applied
            }
            Err(_) => {
                self.selection = None;
                SelectionUpdate::Failed
            }
        }
    }

    pub(crate) fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Clear the selection only if it is still generation `id`.
    pub(crate) fn clear_selection_if(&mut self, id: SelectionId) -> bool {
        if self.selection.as_ref().is_some_and(|s| s.id == id) {
            self.selection = None;
            return true;
        }
        false
    }

    pub(crate) const fn set_query_in_flight(&mut self, value: bool) {
        self.query_in_flight = value;
    }

    pub(crate) const fn set_upload_in_flight(&mut self, value: bool) {
        self.upload_in_flight = value;
    }

    pub(crate) const fn set_drag_active(&mut self, value: bool) {
        self.drag_active = value;
    }

    pub(crate) fn set_diagnostic(&mut self, text: String) {
        self.diagnostic = Some(text);
    }

    pub(crate) const fn set_token_present(&mut self, value: bool) {
        self.token_present = value;
    }

    pub(crate) const fn set_navigation(&mut self, navigation: Navigation) {
        self.navigation = Some(navigation);
    }

    /// Drop the transcript and everything the user was composing.
    ///
    /// In-flight flags stay set until their calls resolve. Outcomes of those
    /// calls carry the old generation and are not narrated.
    pub(crate) fn reset(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.history.clear();
        self.pending_text.clear();
        self.selection = None;
        self.drag_active = false;
        self.diagnostic = None;
    }

    /// Immutable copy for observers.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            history: self.history.clone(),
            pending_text: self.pending_text.clone(),
            selected_file: self.selected_file().map(str::to_string),
            payload_ready: self.payload_ready(),
            query_in_flight: self.query_in_flight,
            upload_in_flight: self.upload_in_flight,
            drag_active: self.drag_active,
            diagnostic: self.diagnostic.clone(),
            token_present: self.token_present,
            navigation: self.navigation,
            can_send: self.admit_send().is_ok(),
        }
    }
}

/// Read-only view of the session published after every mutation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    /// Transcript in insertion order.
    pub history: Vec<ChatMessage>,
    /// Current unsent input.
    pub pending_text: String,
    /// Name of the selected file.
    pub selected_file: Option<String>,
    /// Whether the selected file's payload is ready.
    pub payload_ready: bool,
    /// Query in flight.
    pub query_in_flight: bool,
    /// Upload in flight.
    pub upload_in_flight: bool,
    /// Drag hover hint.
    pub drag_active: bool,
    /// Last backend probe result.
    pub diagnostic: Option<String>,
    /// Whether a session token was present.
    pub token_present: bool,
    /// Pending navigation request.
    pub navigation: Option<Navigation>,
    /// Whether the send trigger should be enabled.
    pub can_send: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    fn ready_encode(name: &str) -> SharedEncode {
        let payload = EncodedFile::from_bytes(name, "text/plain", b"abc");
        async move { Ok(payload) }.boxed().shared()
    }

    fn payload(name: &str) -> EncodedFile {
        EncodedFile::from_bytes(name, "text/plain", b"abc")
    }

    #[test]
    fn test_resolve_by_id_ignores_position() {
        let mut state = SessionState::new(true, PendingEncodePolicy::Wait);
        let first = state.push(ChatMessage::placeholder());
        state.push(ChatMessage::assistant("narration"));
        let second = state.push(ChatMessage::placeholder());

        assert!(state.resolve_message(second, "two".to_string()));
        assert!(state.resolve_message(first, "one".to_string()));
        assert!(!state.resolve_message(first, "again".to_string()));

        let texts: Vec<&str> = state.history().iter().map(ChatMessage::text).collect();
        assert_eq!(texts, ["one", "narration", "two"]);
    }

    #[test]
    fn test_payload_only_after_completion() {
        let mut state = SessionState::default();
        let id = SelectionId::new();
        state.begin_selection(id, "a.txt".to_string(), ready_encode("a.txt"));
        assert_eq!(state.selected_file(), Some("a.txt"));
        assert!(!state.payload_ready());

        assert_eq!(
            state.complete_selection(id, Ok(payload("a.txt"))),
            SelectionUpdate::Applied
        );
        assert!(state.payload_ready());
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let mut state = SessionState::default();
        let old = SelectionId::new();
        state.begin_selection(old, "big.docx".to_string(), ready_encode("big.docx"));
        state.clear_selection();

        assert_eq!(
            state.complete_selection(old, Ok(payload("big.docx"))),
            SelectionUpdate::Stale
        );
        assert_eq!(state.selected_file(), None);

        let new = SelectionId::new();
        state.begin_selection(new, "b.txt".to_string(), ready_encode("b.txt"));
        assert_eq!(
            state.complete_selection(old, Ok(payload("big.docx"))),
            SelectionUpdate::Stale
        );
        assert!(!state.payload_ready());
        assert!(!state.clear_selection_if(old));
        assert!(state.clear_selection_if(new));
    }

    #[test]
    fn test_failed_read_drops_selection() {
        let mut state = SessionState::default();
        let id = SelectionId::new();
        state.begin_selection(id, "gone.pdf".to_string(), ready_encode("gone.pdf"));

        let err = ReadError::new("gone.pdf", std::io::ErrorKind::NotFound.into());
        assert_eq!(state.complete_selection(id, Err(err)), SelectionUpdate::Failed);
        assert_eq!(state.selected_file(), None);
        assert!(!state.payload_ready());
    }

    #[test]
    fn test_reset_keeps_flags_and_bumps_generation() {
        let mut state = SessionState::new(true, PendingEncodePolicy::Wait);
        state.push(ChatMessage::assistant("hi"));
        state.set_pending_text("draft".to_string());
        state.set_query_in_flight(true);
        state.set_diagnostic("Hello".to_string());
        let before = state.generation();
        state.reset();

        assert_ne!(state.generation(), before);
        let snapshot = state.snapshot();
        assert!(snapshot.history.is_empty());
        assert!(snapshot.pending_text.is_empty());
        assert!(snapshot.diagnostic.is_none());
        assert!(snapshot.query_in_flight);
        assert!(snapshot.token_present);
    }

    #[test]
    fn test_admit_send_follows_flags() {
        let mut state = SessionState::new(false, PendingEncodePolicy::Wait);
        assert_eq!(state.admit_send(), Err(SendRejection::Empty));
        assert!(!state.snapshot().can_send);

        state.set_pending_text("  hi ".to_string());
        assert!(state.snapshot().can_send);

        state.set_upload_in_flight(true);
        assert_eq!(state.admit_send(), Err(SendRejection::UploadInFlight));
        assert!(!state.snapshot().can_send);

        state.set_upload_in_flight(false);
        state.set_pending_text(String::new());
        state.begin_selection(SelectionId::new(), "a.pdf".to_string(), ready_encode("a.pdf"));
        assert!(state.snapshot().can_send);
    }

    #[test]
    fn test_reject_policy_blocks_unencoded_selection() {
        let mut state = SessionState::new(false, PendingEncodePolicy::Reject);
        let id = SelectionId::new();
        state.set_pending_text("hi".to_string());
        state.begin_selection(id, "a.pdf".to_string(), ready_encode("a.pdf"));
        assert_eq!(state.admit_send(), Err(SendRejection::EncodingPending));
        assert!(!state.snapshot().can_send);

        state.complete_selection(id, Ok(payload("a.pdf")));
        assert!(state.snapshot().can_send);
    }
}
