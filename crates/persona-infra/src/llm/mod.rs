//! Completion client implementations.
//!
//! Contains the concrete [`CompletionClient`](persona_core::llm::client::CompletionClient)
//! used by the CLI, plus a factory ([`create_client`]) that builds it from a
//! [`ChatConfig`] and a resolved API key.

pub mod openai_compat;

use secrecy::SecretString;

use persona_core::llm::box_client::BoxCompletionClient;
use persona_types::config::ChatConfig;
use persona_types::llm::CompletionError;

use self::openai_compat::OpenAiCompatClient;

/// Create a [`BoxCompletionClient`] from configuration.
///
/// # Errors
///
/// Returns `CompletionError::Transport` if the HTTP client cannot be built.
pub fn create_client(
    config: &ChatConfig,
    api_key: SecretString,
) -> Result<BoxCompletionClient, CompletionError> {
    let client = OpenAiCompatClient::from_config(config, api_key)?;
    tracing::debug!(
        base_url = %client.base_url(),
        model = %config.model,
        "completion client ready"
    );
    Ok(BoxCompletionClient::new(client))
}
