//! Core chat types and identifiers.

pub mod config;
pub mod errors;
pub mod ids;
pub mod message;
pub mod state;

pub use config::{ChatConfig, IngestMode, PendingEncodePolicy};
pub use errors::{ChatError, ChatResult, ReadError};
pub use ids::{MessageId, SelectionId};
pub use message::{ChatMessage, ChatRole};
pub use state::{Navigation, SendRejection, SessionSnapshot, SessionState};
