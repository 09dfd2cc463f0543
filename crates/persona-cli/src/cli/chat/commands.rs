//! Slash command parsing for the chat loop.
//!
//! Commands start with `/` and control the conversation rather than being
//! sent to the persona.

use console::style;

use super::renderer::ChatRenderer;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// Forget the conversation and start over with the same persona.
    Reset,
    /// Show the conversation so far.
    History,
    /// Exit the chat session.
    Exit,
    /// Unknown command.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let cmd = trimmed
        .split_whitespace()
        .next()
        .unwrap_or(trimmed)
        .to_lowercase();

    match cmd.as_str() {
        "/help" | "/h" | "/?" => Some(ChatCommand::Help),
        "/reset" | "/new" => Some(ChatCommand::Reset),
        "/history" => Some(ChatCommand::History),
        "/exit" | "/quit" | "/q" => Some(ChatCommand::Exit),
        other => Some(ChatCommand::Unknown(other.to_string())),
    }
}

/// Print the help text listing all available commands.
pub fn print_help(renderer: &ChatRenderer) {
    renderer.blank();
    renderer.line(format!("  {}", style("Available commands:").bold()));
    renderer.blank();
    renderer.line(format!("  {}    Show this help message", style("/help").cyan()));
    renderer.line(format!(
        "  {}   Forget this conversation and start over",
        style("/reset").cyan()
    ));
    renderer.line(format!("  {} Show the conversation so far", style("/history").cyan()));
    renderer.line(format!("  {}    End the chat session", style("/exit").cyan()));
    renderer.blank();
    renderer.line(format!("  {}", style("Ctrl+D to exit").dim()));
    renderer.blank();
}
