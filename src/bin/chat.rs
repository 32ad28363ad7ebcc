//! Terminal chat client for the knowledge service.
//! Run with: cargo run --bin knowledge-chat

use std::process::ExitCode;

use knowledge_chat::start_chat_client;

fn main() -> ExitCode {
    start_chat_client::run()
}
