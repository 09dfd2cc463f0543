//! Configuration types for Persona Chat.
//!
//! `ChatConfig` represents the top-level `config.toml` that selects the
//! completion endpoint, the model, the display language, and the session
//! policies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language used for synthesized prompts and in-transcript error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    Zh,
    En,
}

impl Default for Locale {
    fn default() -> Self {
        Locale::Zh
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locale::Zh => write!(f, "zh"),
            Locale::En => write!(f, "en"),
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zh" => Ok(Locale::Zh),
            "en" => Ok(Locale::En),
            other => Err(format!("invalid locale: '{other}'")),
        }
    }
}

/// What happens to an existing system turn when a persona is selected again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptPolicy {
    /// The system prompt is fixed at first use.
    Freeze,
    /// The system prompt is re-synthesized on every selection.
    Refresh,
}

impl Default for PromptPolicy {
    fn default() -> Self {
        PromptPolicy::Freeze
    }
}

/// Top-level configuration.
///
/// Loaded from `~/.persona-chat/config.toml`. All fields have defaults.
/// The API key itself is never stored here, only the name of the
/// environment variable that holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Base URL of the OpenAI-compatible API (without `/chat/completions`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the bearer token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub locale: Locale,

    #[serde(default)]
    pub prompt_policy: PromptPolicy,

    /// Store every UI message in the local history database.
    #[serde(default = "default_persist_history")]
    pub persist_history: bool,

    /// Per-character delay of the CLI typewriter effect; 0 disables it.
    #[serde(default = "default_typewriter_delay_ms")]
    pub typewriter_delay_ms: u64,

    /// Capacity of the transcript change broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_base_url() -> String {
    "https://api.moonshot.cn/v1".to_string()
}

fn default_model() -> String {
    "moonshot-v1-8k".to_string()
}

fn default_api_key_env() -> String {
    "MOONSHOT_API_KEY".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_persist_history() -> bool {
    true
}

fn default_typewriter_delay_ms() -> u64 {
    30
}

fn default_event_capacity() -> usize {
    256
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout_secs(),
            locale: Locale::default(),
            prompt_policy: PromptPolicy::default(),
            persist_history: default_persist_history(),
            typewriter_delay_ms: default_typewriter_delay_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}
