//! CLI command definitions for the `persona-chat` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod chat;
pub mod persona;
pub mod post;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use persona_types::persona::{PersonaKey, PersonaScope};
use persona_types::post::PostLanguage;

/// Chat with your personas.
#[derive(Parser)]
#[command(name = "persona-chat", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Persona selector shared by several subcommands.
#[derive(clap::Args, Debug, Clone)]
pub struct PersonaArgs {
    /// Persona name.
    pub name: String,

    /// Persona scope (user or other).
    #[arg(long, default_value = "other")]
    pub scope: PersonaScope,
}

impl PersonaArgs {
    pub fn key(&self) -> PersonaKey {
        PersonaKey::new(self.scope, self.name.clone())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat with a persona.
    Chat {
        #[command(flatten)]
        persona: PersonaArgs,

        /// Background story for a persona that is not in personas.toml.
        #[arg(long, requires = "signature")]
        story: Option<String>,

        /// Signature (bio) for a persona that is not in personas.toml.
        #[arg(long, requires = "story")]
        signature: Option<String>,
    },

    /// List personas from personas.toml.
    #[command(alias = "ls")]
    Personas,

    /// Show persisted chat history for a persona.
    History {
        #[command(flatten)]
        persona: PersonaArgs,

        /// Show only the most recent N messages.
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },

    /// Delete persisted chat history for a persona.
    Clear {
        #[command(flatten)]
        persona: PersonaArgs,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        force: bool,
    },

    /// Write a social post in a persona's voice.
    Post {
        #[command(flatten)]
        persona: PersonaArgs,

        /// Language of a new post (zh or en). Defaults to the configured locale.
        #[arg(long, conflicts_with = "expand")]
        lang: Option<PostLanguage>,

        /// Expand this draft instead of writing a new post.
        #[arg(long)]
        expand: Option<String>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
