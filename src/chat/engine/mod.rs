//! Chat engine orchestration module.

pub mod core;

pub use self::core::{
    BACKEND_UNREACHABLE_TEXT, ChatBackends, ChatEngine, EncodeTicket, QUERY_FAILURE_TEXT,
    SendOutcome, Submission,
};
