//! Transcript message model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::MessageId;

/// Text shown by an assistant placeholder until its query resolves.
pub const PLACEHOLDER_TEXT: &str = "Processing…";

/// Role of a transcript message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// Message typed or triggered by the user.
    User,
    /// Answer or narration from the assistant side.
    Assistant,
}

impl ChatRole {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChatRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(value.to_string()),
        }
    }
}

/// One entry of the conversation.
///
/// Role and identity are fixed at creation. Only placeholders change
/// afterwards, exactly once, through [`ChatMessage::resolve`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    id: MessageId,
    role: ChatRole,
    text: String,
    attachment_name: Option<String>,
    pending: bool,
    created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a user message.
    ///
    /// # Errors
    /// Returns an error if `text` is empty and no attachment is given.
    pub fn user(text: impl Into<String>, attachment_name: Option<String>) -> ChatResult<Self> {
        let text = text.into();
        if text.is_empty() && attachment_name.is_none() {
            return Err(ChatError::InvalidMessage(
                "user message needs text or an attachment".to_string(),
            ));
        }
        Ok(Self::build(ChatRole::User, text, attachment_name, false))
    }

    /// Build a final assistant message.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::build(ChatRole::Assistant, text.into(), None, false)
    }

    /// Build an assistant placeholder awaiting its answer.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::build(ChatRole::Assistant, PLACEHOLDER_TEXT.to_string(), None, true)
    }

    fn build(
        role: ChatRole,
        text: String,
        attachment_name: Option<String>,
        pending: bool,
    ) -> Self {
        Self {
            id: MessageId::new(),
            role,
            text,
            attachment_name,
            pending,
            created_at: Utc::now(),
        }
    }

    /// Stable identifier.
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Author role.
    #[must_use]
    pub const fn role(&self) -> ChatRole {
        self.role
    }

    /// Current text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// File name when the message records a file action.
    #[must_use]
    pub fn attachment_name(&self) -> Option<&str> {
        self.attachment_name.as_deref()
    }

    /// Whether the message is a placeholder still waiting for its answer.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending
    }

    /// Creation time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Fill a placeholder with its final text.
    ///
    /// Returns `false` (and leaves the message untouched) if it was not pending.
    pub(crate) fn resolve(&mut self, text: String) -> bool {
        if !self.pending {
            return false;
        }
        self.text = text;
        self.pending = false;
        true
    }
}
