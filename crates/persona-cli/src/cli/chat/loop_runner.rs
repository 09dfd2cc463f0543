//! Main chat loop orchestration.
//!
//! Resolves the persona, selects it in a fresh session manager (restoring
//! persisted history), then reads lines until Ctrl+D or `/exit`. Each line
//! is either a slash command or a message sent to the persona.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use persona_core::chat::manager::ChatSessionManager;
use persona_types::chat::SendOutcome;
use persona_types::persona::{Persona, PersonaKey};

use crate::cli::PersonaArgs;
use crate::state::AppState;

use super::banner::print_welcome_banner;
use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};
use super::renderer::ChatRenderer;

/// Pick the persona from personas.toml, or build one from the command line.
pub fn resolve_persona(
    state: &AppState,
    args: &PersonaArgs,
    story: Option<String>,
    signature: Option<String>,
) -> anyhow::Result<Persona> {
    let key = args.key();
    match (story, signature) {
        (Some(story), Some(signature)) => {
            debug!(key = %key, "using ad-hoc persona");
            let mut persona = Persona::new(key.scope, key.name.clone(), story, signature);
            if let Ok(known) = state.persona(&key) {
                persona.id = known.id;
            }
            Ok(persona)
        }
        _ => Ok(state.persona(&key)?),
    }
}

/// Run the interactive chat loop for a persona.
pub async fn run_chat_loop(
    state: &AppState,
    args: &PersonaArgs,
    story: Option<String>,
    signature: Option<String>,
) -> anyhow::Result<()> {
    let persona = resolve_persona(state, args, story, signature)?;
    let manager = state.build_manager()?;
    let key = manager.select_persona(&persona).await;

    let restored = manager.transcript(&key);
    print_welcome_banner(&persona, manager.client().model(), restored.len());

    let renderer = ChatRenderer::new(state.config.typewriter_delay_ms);
    if !restored.is_empty() {
        for message in &restored {
            renderer.message(&persona.name, message);
        }
        renderer.blank();
    }

    let prompt = format!("  {} ", style("You >").green().bold());
    let (mut chat_input, _writer) = ChatInput::new(prompt)
        .map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;

    loop {
        match chat_input.read_line().await {
            InputEvent::Eof => {
                renderer.line(format!("  {}", style("Session ended.").dim()));
                break;
            }
            InputEvent::Interrupted => {
                renderer.line(format!("  {}", style("Press Ctrl+D to exit, or keep chatting.").dim()));
                continue;
            }
            InputEvent::Message(text) => {
                if text.is_empty() {
                    continue;
                }

                if let Some(cmd) = commands::parse(&text) {
                    match cmd {
                        ChatCommand::Help => commands::print_help(&renderer),
                        ChatCommand::History => {
                            renderer.transcript(&persona.name, &manager.transcript(&key));
                        }
                        ChatCommand::Reset => {
                            manager.reset(&key).await;
                            manager.select_persona(&persona).await;
                            renderer.line(format!(
                                "  {} Conversation with {} cleared.",
                                style("✓").green().bold(),
                                style(&persona.name).cyan()
                            ));
                            renderer.blank();
                        }
                        ChatCommand::Exit => {
                            renderer.line(format!("  {}", style("Session ended.").dim()));
                            break;
                        }
                        ChatCommand::Unknown(name) => {
                            renderer.line(format!(
                                "  {} Unknown command: {}. Type /help for available commands.",
                                style("?").yellow().bold(),
                                style(name).dim()
                            ));
                        }
                    }
                    continue;
                }

                send_and_render(&manager, &key, &persona, &text, &renderer).await?;
            }
        }
    }

    chat_input.flush();
    info!(key = %key, messages = manager.transcript(&key).len(), "chat session ended");
    Ok(())
}

async fn send_and_render(
    manager: &ChatSessionManager,
    key: &PersonaKey,
    persona: &Persona,
    text: &str,
    renderer: &ChatRenderer,
) -> anyhow::Result<()> {
    let spinner = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}") {
        spinner.set_style(spinner_style);
    }
    spinner.set_message(format!("{} is typing...", persona.name));
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    let outcome = manager.send_message_to(key, text).await;
    spinner.finish_and_clear();

    match outcome? {
        SendOutcome::Replied(reply) => renderer.reply(&persona.name, &reply).await,
        SendOutcome::Failed(err) => {
            debug!(error = %err, "completion failed");
            if let Some(message) = manager.transcript(key).last() {
                renderer.blank();
                renderer.message(&persona.name, message);
                renderer.blank();
            }
        }
        SendOutcome::Ignored => {}
        SendOutcome::Cancelled => {
            renderer.line(format!("  {}", style("Request cancelled.").dim()));
        }
    }
    Ok(())
}
