//! Configuration and persona file loaders for Persona Chat.
//!
//! Reads `config.toml` and `personas.toml` from the data directory
//! (`~/.persona-chat/` in production). A missing or malformed `config.toml`
//! falls back to defaults; a malformed `personas.toml` is an error because
//! there is no sensible default persona list to substitute.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use persona_types::config::ChatConfig;
use persona_types::error::ConfigError;
use persona_types::persona::{Persona, PersonaKey};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "PERSONA_CHAT_DATA_DIR";

pub const CONFIG_FILE: &str = "config.toml";
pub const PERSONAS_FILE: &str = "personas.toml";

/// Resolve the data directory.
///
/// `PERSONA_CHAT_DATA_DIR` wins; otherwise `~/.persona-chat`, or
/// `./.persona-chat` when no home directory is known.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".persona-chat")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: returns [`ChatConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
pub async fn load_config(data_dir: &Path) -> ChatConfig {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ChatConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ChatConfig::default();
        }
    };

    match toml::from_str::<ChatConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ChatConfig::default()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PersonasFile {
    #[serde(default)]
    persona: Vec<Persona>,
}

/// Load personas from `{data_dir}/personas.toml` (`[[persona]]` tables).
///
/// A missing file yields an empty list. Personas without an explicit `id`
/// are numbered by position, starting at 1.
pub async fn load_personas(data_dir: &Path) -> Result<Vec<Persona>, ConfigError> {
    let path = data_dir.join(PERSONAS_FILE);

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No personas.toml found at {}", path.display());
            return Ok(Vec::new());
        }
        Err(err) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                message: err.to_string(),
            });
        }
    };

    let file: PersonasFile = toml::from_str(&content).map_err(|err| ConfigError::Parse {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;

    let personas = file
        .persona
        .into_iter()
        .enumerate()
        .map(|(index, mut persona)| {
            if persona.id == 0 {
                persona.id = index as i64 + 1;
            }
            persona
        })
        .collect::<Vec<_>>();

    tracing::debug!(count = personas.len(), "loaded personas");
    Ok(personas)
}

/// Find a persona by key in a loaded list.
pub fn find_persona<'a>(personas: &'a [Persona], key: &PersonaKey) -> Option<&'a Persona> {
    personas.iter().find(|p| &p.key() == key)
}
