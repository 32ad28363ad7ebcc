//! Startup helpers for the terminal chat client.

use std::process::ExitCode;

use crate::chat::{ChatConfig, ChatEngine};
use crate::terminal;

/// Install the global tracing subscriber (stderr, `RUST_LOG` plus an `info` default).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Run the chat client (used by the `knowledge-chat` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` when the user quits or logs out, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    init_tracing();

    tracing::info!("Starting knowledge chat v{}", env!("CARGO_PKG_VERSION"));

    let config = match ChatConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };
    tracing::info!("Knowledge service endpoint: {}", config.api_base);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let session: anyhow::Result<()> = rt.block_on(async move {
        let engine = ChatEngine::from_config(config)?;
        terminal::run_terminal(engine).await
    });

    if let Err(e) = session {
        tracing::error!("Chat session error: {e:#}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}
