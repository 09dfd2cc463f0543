//! CompletionClient trait definition.
//!
//! This is the wire-protocol seam between the session manager and a remote
//! chat-completion API. Uses RPITIT for `complete` so implementations can
//! be plain `async fn`.

use persona_types::llm::{CompletionError, Turn};

/// Trait for chat-completion backends.
///
/// Implementations live in persona-infra (e.g., `OpenAiCompatClient`).
/// Exactly one attempt per call: implementations must not retry.
pub trait CompletionClient: Send + Sync {
    /// Human-readable client name (e.g., "openai_compat").
    fn name(&self) -> &str;

    /// Model identifier sent with every request.
    fn model(&self) -> &str;

    /// Send the full turn sequence and return the first choice's content.
    ///
    /// `turns` is non-empty and conventionally starts with the system turn.
    fn complete(
        &self,
        turns: &[Turn],
    ) -> impl std::future::Future<Output = Result<String, CompletionError>> + Send;
}
