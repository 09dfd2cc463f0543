//! Persona and history CLI commands: personas, history, clear.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;

use persona_core::chat::repository::ChatHistoryRepository;
use persona_types::history::ChatHistoryRecord;
use persona_types::persona::{PersonaKey, PersonaScope};

use crate::state::AppState;

use super::chat::renderer::{is_error_text, preview};

/// List personas from personas.toml, with stored message counts.
pub async fn list_personas(state: &AppState, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&state.personas)?);
        return Ok(());
    }

    if state.personas.is_empty() {
        println!();
        println!(
            "  {} No personas found. Add [[persona]] entries to {}",
            style("i").blue().bold(),
            style(state.data_dir.join("personas.toml").display()).yellow()
        );
        println!();
        return Ok(());
    }

    let history = state.history_repo();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Name").fg(Color::White),
        Cell::new("Scope").fg(Color::White),
        Cell::new("Signature").fg(Color::White),
        Cell::new("Background").fg(Color::White),
        Cell::new("Messages").fg(Color::White),
    ]);

    for persona in &state.personas {
        let scope_cell = match persona.scope {
            PersonaScope::User => Cell::new("● user").fg(Color::Green),
            PersonaScope::Other => Cell::new("○ other").fg(Color::Cyan),
        };

        let count = match &history {
            Some(repo) => match repo.count(&persona.key()).await {
                Ok(n) => n.to_string(),
                Err(e) => {
                    tracing::warn!(key = %persona.key(), error = %e, "failed to count history");
                    "?".to_string()
                }
            },
            None => "-".to_string(),
        };

        table.add_row(vec![
            Cell::new(&persona.name),
            scope_cell,
            Cell::new(preview(&persona.signature, 30)),
            Cell::new(preview(&persona.background_story, 40)),
            Cell::new(count),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

/// Print persisted history for a persona.
pub async fn show_history(
    state: &AppState,
    key: &PersonaKey,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let repo = state.require_history()?;
    let records = tail(repo.load_messages(key).await?, limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!();
        println!(
            "  {} No history for {}.",
            style("i").blue().bold(),
            style(key).cyan()
        );
        println!();
        return Ok(());
    }

    println!();
    for record in &records {
        let time = record
            .created_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M");
        let speaker = if record.sent_by_user {
            format!("{}", style("You").green().bold())
        } else {
            format!("{}", style(&record.persona_name).cyan().bold())
        };
        let text = if is_error_text(&record.text) {
            format!("{}", style(&record.text).red())
        } else {
            record.text.clone()
        };
        println!("  {} {} {}", style(time).dim(), speaker, text);
    }
    println!();
    Ok(())
}

/// Delete persisted history for a persona, with confirmation.
pub async fn clear_history(
    state: &AppState,
    key: &PersonaKey,
    force: bool,
    json: bool,
) -> Result<()> {
    let repo = state.require_history()?;

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete all stored messages for '{}'?",
                style(key).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let removed = repo.clear(key).await?;
    tracing::info!(key = %key, removed, "history cleared");

    if json {
        println!(
            "{}",
            serde_json::json!({ "persona": key.to_string(), "removed": removed })
        );
    } else {
        println!(
            "  {} Removed {} messages for {}.",
            style("✓").green().bold(),
            removed,
            style(key).cyan()
        );
    }
    Ok(())
}

/// Keep only the last `limit` records.
fn tail(mut records: Vec<ChatHistoryRecord>, limit: Option<usize>) -> Vec<ChatHistoryRecord> {
    if let Some(limit) = limit {
        if records.len() > limit {
            records.drain(..records.len() - limit);
        }
    }
    records
}
