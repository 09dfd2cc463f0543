//! Infrastructure layer for Persona Chat.
//!
//! Contains implementations of the ports defined in `persona-core`: the
//! OpenAI-compatible completion client, SQLite chat history storage, plus
//! the config/persona file loaders and API key resolution.

pub mod config;
pub mod llm;
pub mod secret;
pub mod sqlite;
