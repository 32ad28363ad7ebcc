//! Chat session subsystem.
//!
//! This module is organized into:
//! - `core`: Configuration, errors, IDs, messages, and session state
//! - `encoding`: File reading and base64 payload construction
//! - `client`: HTTP adapters for the query, ingestion, and liveness endpoints
//! - `session`: Persisted session token storage
//! - `engine`: Orchestration of user actions against the remote service

pub mod client;
pub mod core;
pub mod encoding;
pub mod engine;
pub mod session;

// Re-export commonly used types for convenience
pub use client::{ApiClient, ClientFuture, IngestClient, ProbeClient, QueryClient};
pub use self::core::{
    ChatConfig, ChatError, ChatMessage, ChatResult, ChatRole, IngestMode, MessageId, Navigation,
    PendingEncodePolicy, ReadError, SelectionId, SendRejection, SessionSnapshot, SessionState,
};
pub use encoding::{EncodedFile, FileEncoder, FileReader, FileRef, FsFileReader};
pub use engine::{ChatBackends, ChatEngine, EncodeTicket, SendOutcome, Submission};
pub use session::{FileTokenStore, MemoryTokenStore, SESSION_TOKEN_KEY, TokenStore};
