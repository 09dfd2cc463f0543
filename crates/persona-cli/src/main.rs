//! Persona Chat CLI entry point.
//!
//! Binary name: `persona-chat`
//!
//! Parses CLI arguments, sets up tracing, loads config/personas/history
//! storage, then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use persona_observe::tracing_setup::{default_filter, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(default_filter(cli.verbose, cli.quiet), cli.otel) {
        eprintln!("Warning: failed to initialize tracing: {e}");
    }

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "persona-chat", &mut std::io::stdout());
        return Ok(());
    }

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init().await?;

    match cli.command {
        Commands::Chat {
            persona,
            story,
            signature,
        } => {
            cli::chat::loop_runner::run_chat_loop(&state, &persona, story, signature).await?;
        }

        Commands::Personas => {
            cli::persona::list_personas(&state, cli.json).await?;
        }

        Commands::History { persona, limit } => {
            cli::persona::show_history(&state, &persona.key(), limit, cli.json).await?;
        }

        Commands::Clear { persona, force } => {
            cli::persona::clear_history(&state, &persona.key(), force, cli.json).await?;
        }

        Commands::Post {
            persona,
            lang,
            expand,
        } => {
            cli::post::generate_post(&state, &persona.key(), lang, expand, cli.json).await?;
        }

        Commands::Completions { .. } => unreachable!("handled before state init"),
    }

    Ok(())
}
