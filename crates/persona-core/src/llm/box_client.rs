//! BoxCompletionClient -- object-safe dynamic dispatch wrapper for CompletionClient.
//!
//! 1. Define an object-safe `CompletionClientDyn` trait with boxed futures
//! 2. Blanket-impl `CompletionClientDyn` for all `T: CompletionClient`
//! 3. `BoxCompletionClient` wraps `Box<dyn CompletionClientDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use persona_types::llm::{CompletionError, Turn};

use super::client::CompletionClient;

/// Object-safe version of [`CompletionClient`] with boxed futures.
pub trait CompletionClientDyn: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    fn complete_boxed<'a>(
        &'a self,
        turns: &'a [Turn],
    ) -> Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>>;
}

impl<T: CompletionClient> CompletionClientDyn for T {
    fn name(&self) -> &str {
        CompletionClient::name(self)
    }

    fn model(&self) -> &str {
        CompletionClient::model(self)
    }

    fn complete_boxed<'a>(
        &'a self,
        turns: &'a [Turn],
    ) -> Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>> {
        Box::pin(self.complete(turns))
    }
}

/// Type-erased completion client for runtime backend selection.
///
/// Since `CompletionClient` uses RPITIT, it cannot be used as a trait object
/// directly. `BoxCompletionClient` provides equivalent methods that delegate
/// to the inner `CompletionClientDyn` trait object.
pub struct BoxCompletionClient {
    inner: Box<dyn CompletionClientDyn + Send + Sync>,
}

impl BoxCompletionClient {
    /// Wrap a concrete `CompletionClient` in a type-erased box.
    pub fn new<T: CompletionClient + 'static>(client: T) -> Self {
        Self {
            inner: Box::new(client),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn model(&self) -> &str {
        self.inner.model()
    }

    /// Send the turn sequence and receive the assistant reply.
    pub async fn complete(&self, turns: &[Turn]) -> Result<String, CompletionError> {
        self.inner.complete_boxed(turns).await
    }
}
