//! Line-oriented terminal view over the chat engine.
//!
//! Plain lines are sent as questions. Lines starting with `/` are commands.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};

use crate::chat::{
    ChatEngine, ChatMessage, ChatRole, FileRef, MessageId, SendOutcome, SessionSnapshot,
};

const HELP: &str = "\
Commands:
  <text>          ask a question (sends the selected file too)
  /attach <path>  select a file for the next send
  /drop <path>    upload a file right away
  /clear          discard the selected file
  /hello          check that the backend is reachable
  /reset          start a new conversation
  /logout         forget the session token and exit
  /quit           exit
  /help           show this help";

/// One parsed input line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    /// Type the text and send it.
    Send(String),
    /// Select a file.
    Attach(PathBuf),
    /// Drop a file.
    Drop(PathBuf),
    /// Clear the selection.
    Clear,
    /// Probe the backend.
    Hello,
    /// Reset the conversation.
    Reset,
    /// Log out and exit.
    Logout,
    /// Exit.
    Quit,
    /// Print help.
    Help,
    /// Blank line.
    Empty,
    /// Unknown command or missing argument.
    Invalid(String),
}

/// Parse one input line.
#[must_use]
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Command::Send(line.to_string());
    };

    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, arg)| (name, arg.trim()));

    match (name, arg.is_empty()) {
        ("attach", false) => Command::Attach(PathBuf::from(arg)),
        ("drop", false) => Command::Drop(PathBuf::from(arg)),
        ("attach" | "drop", true) => Command::Invalid(format!("/{name} needs a file path")),
        ("clear", _) => Command::Clear,
        ("hello", _) => Command::Hello,
        ("reset", _) => Command::Reset,
        ("logout", _) => Command::Logout,
        ("quit" | "exit", _) => Command::Quit,
        ("help", _) => Command::Help,
        _ => Command::Invalid(format!("unknown command /{name}")),
    }
}

/// Turns successive snapshots into the lines to print.
#[derive(Debug, Default)]
pub struct Renderer {
    /// Messages already printed, with whether they were still pending.
    printed: HashMap<MessageId, bool>,
    selection: Option<(String, bool)>,
    diagnostic: Option<String>,
    logged_out: bool,
}

impl Renderer {
    /// Fresh renderer that has printed nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines describing what changed since the previous snapshot.
    pub fn render(&mut self, snapshot: &SessionSnapshot) -> Vec<String> {
        let mut lines = Vec::new();

        let cleared = self
            .printed
            .keys()
            .any(|id| !snapshot.history.iter().any(|m| m.id() == *id));
        if cleared {
            self.printed
                .retain(|id, _| snapshot.history.iter().any(|m| m.id() == *id));
            lines.push("-- conversation cleared --".to_string());
        }

        for message in &snapshot.history {
            match self.printed.insert(message.id(), message.is_pending()) {
                None => lines.push(format_message(message)),
                Some(true) if !message.is_pending() => lines.push(format_message(message)),
                Some(_) => {}
            }
        }

        let selection = snapshot
            .selected_file
            .clone()
            .map(|name| (name, snapshot.payload_ready));
        if selection != self.selection {
            lines.push(match &selection {
                Some((name, false)) => format!("[file] {name} (encoding…)"),
                Some((name, true)) => format!("[file] {name} ready, it goes out with the next send"),
                None => "[file] no file selected".to_string(),
            });
            self.selection = selection;
        }

        if snapshot.diagnostic != self.diagnostic {
            if let Some(diagnostic) = &snapshot.diagnostic {
                lines.push(format!("[backend] {diagnostic}"));
            }
            self.diagnostic.clone_from(&snapshot.diagnostic);
        }

        if snapshot.navigation.is_some() && !self.logged_out {
            self.logged_out = true;
            lines.push("[session] logged out".to_string());
        }

        lines
    }
}

/// One transcript line.
#[must_use]
pub fn format_message(message: &ChatMessage) -> String {
    let speaker = match message.role() {
        ChatRole::User => "you",
        ChatRole::Assistant => "assistant",
    };
    match (message.text(), message.attachment_name()) {
        ("", Some(name)) => format!("{speaker}: [attached {name}]"),
        (text, Some(name)) if message.role() == ChatRole::User => {
            format!("{speaker}: {text} [attached {name}]")
        }
        (text, _) => format!("{speaker}: {text}"),
    }
}

async fn write_lines(out: &mut Stdout, lines: &[String]) -> anyhow::Result<()> {
    for line in lines {
        out.write_all(line.as_bytes()).await?;
        out.write_all(b"\n").await?;
    }
    out.flush().await?;
    Ok(())
}

/// Apply one command. Returns `false` when the session should end.
async fn apply(engine: &ChatEngine, command: Command, out: &mut Stdout) -> anyhow::Result<bool> {
    match command {
        Command::Send(text) => {
            engine.set_input(text);
            if let SendOutcome::Rejected(reason) = engine.send() {
                write_lines(out, &[format!("[send] not sent: {reason}")]).await?;
            }
        }
        Command::Attach(path) => {
            let _ticket = engine.select_file(FileRef::from_path(path));
        }
        Command::Drop(path) => {
            engine.set_drag_active(true);
            if let Some(reason) = engine.drop_file(FileRef::from_path(path)).rejection() {
                write_lines(out, &[format!("[drop] not uploaded: {reason}")]).await?;
            }
        }
        Command::Clear => engine.clear_file(),
        Command::Hello => {
            engine.probe_backend().await;
        }
        Command::Reset => engine.reset(),
        Command::Logout => {
            engine.logout();
            return Ok(false);
        }
        Command::Quit => return Ok(false),
        Command::Help => write_lines(out, &[HELP.to_string()]).await?,
        Command::Empty => {}
        Command::Invalid(problem) => {
            write_lines(out, &[format!("{problem} (try /help)")]).await?;
        }
    }
    Ok(true)
}

/// Drive the engine from stdin until EOF, `/quit` or `/logout`.
///
/// # Errors
/// Returns an error if stdin or stdout fails.
pub async fn run_terminal(engine: ChatEngine) -> anyhow::Result<()> {
    let mut out = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut updates = engine.subscribe();
    let mut renderer = Renderer::new();

    write_lines(&mut out, &[HELP.to_string()]).await?;
    let initial = renderer.render(&updates.borrow_and_update());
    write_lines(&mut out, &initial).await?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if !apply(&engine, parse_command(&line), &mut out).await? {
                    break;
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                write_lines(&mut out, &renderer.render(&snapshot)).await?;
            }
        }
    }

    write_lines(&mut out, &renderer.render(&engine.snapshot())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("  "), Command::Empty);
        assert_eq!(
            parse_command(" What is X? "),
            Command::Send("What is X?".to_string())
        );
        assert_eq!(
            parse_command("/attach  docs/report final.pdf "),
            Command::Attach(PathBuf::from("docs/report final.pdf"))
        );
        assert_eq!(
            parse_command("/drop notes.txt"),
            Command::Drop(PathBuf::from("notes.txt"))
        );
        assert_eq!(parse_command("/clear"), Command::Clear);
        assert_eq!(parse_command("/exit"), Command::Quit);
        assert!(matches!(parse_command("/attach"), Command::Invalid(_)));
        assert!(matches!(parse_command("/dance"), Command::Invalid(_)));
    }

    #[test]
    fn test_renderer_prints_new_and_resolved_messages() {
        let mut renderer = Renderer::new();
        let user = ChatMessage::user("What is X?", None).unwrap();
        let mut placeholder = ChatMessage::placeholder();

        let mut snapshot = SessionSnapshot {
            history: vec![user, placeholder.clone()],
            ..SessionSnapshot::default()
        };
        assert_eq!(
            renderer.render(&snapshot),
            ["you: What is X?", "assistant: Processing…"]
        );
        assert!(renderer.render(&snapshot).is_empty());

        placeholder.resolve("X is a letter.".to_string());
        snapshot.history[1] = placeholder;
        assert_eq!(renderer.render(&snapshot), ["assistant: X is a letter."]);
    }

    #[test]
    fn test_renderer_reports_reset_and_status() {
        let mut renderer = Renderer::new();
        let attached = ChatMessage::user("", Some("report.pdf".to_string())).unwrap();
        let mut snapshot = SessionSnapshot {
            history: vec![attached],
            selected_file: Some("next.pdf".to_string()),
            ..SessionSnapshot::default()
        };
        assert_eq!(
            renderer.render(&snapshot),
            ["you: [attached report.pdf]", "[file] next.pdf (encoding…)"]
        );

        snapshot.history.clear();
        snapshot.selected_file = None;
        snapshot.diagnostic = Some("Error connecting to backend".to_string());
        assert_eq!(
            renderer.render(&snapshot),
            [
                "-- conversation cleared --",
                "[file] no file selected",
                "[backend] Error connecting to backend",
            ]
        );
    }
}
