//! ChatHistoryRepository trait definition.
//!
//! Persists the UI-visible messages of each persona so a conversation can be
//! shown again after a restart. Only the UI transcript is stored; the API
//! turn list lives in memory for the lifetime of the session.

use std::future::Future;
use std::pin::Pin;

use persona_types::error::RepositoryError;
use persona_types::history::ChatHistoryRecord;
use persona_types::persona::PersonaKey;

/// Repository trait for chat history persistence.
///
/// Implementations live in persona-infra (e.g., `SqliteChatHistoryRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait ChatHistoryRepository: Send + Sync {
    /// Store one message record.
    fn save_message(
        &self,
        record: &ChatHistoryRecord,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// All records for a persona, oldest first.
    fn load_messages(
        &self,
        key: &PersonaKey,
    ) -> impl Future<Output = Result<Vec<ChatHistoryRecord>, RepositoryError>> + Send;

    /// Delete every record for a persona. Returns the number removed.
    fn clear(&self, key: &PersonaKey) -> impl Future<Output = Result<u64, RepositoryError>> + Send;

    /// Number of records stored for a persona.
    fn count(&self, key: &PersonaKey) -> impl Future<Output = Result<u64, RepositoryError>> + Send;
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`ChatHistoryRepository`] with boxed futures.
pub trait ChatHistoryRepositoryDyn: Send + Sync {
    fn save_message_boxed<'a>(
        &'a self,
        record: &'a ChatHistoryRecord,
    ) -> BoxFuture<'a, Result<(), RepositoryError>>;

    fn load_messages_boxed<'a>(
        &'a self,
        key: &'a PersonaKey,
    ) -> BoxFuture<'a, Result<Vec<ChatHistoryRecord>, RepositoryError>>;

    fn clear_boxed<'a>(&'a self, key: &'a PersonaKey) -> BoxFuture<'a, Result<u64, RepositoryError>>;

    fn count_boxed<'a>(&'a self, key: &'a PersonaKey) -> BoxFuture<'a, Result<u64, RepositoryError>>;
}

impl<T: ChatHistoryRepository> ChatHistoryRepositoryDyn for T {
    fn save_message_boxed<'a>(
        &'a self,
        record: &'a ChatHistoryRecord,
    ) -> BoxFuture<'a, Result<(), RepositoryError>> {
        Box::pin(self.save_message(record))
    }

    fn load_messages_boxed<'a>(
        &'a self,
        key: &'a PersonaKey,
    ) -> BoxFuture<'a, Result<Vec<ChatHistoryRecord>, RepositoryError>> {
        Box::pin(self.load_messages(key))
    }

    fn clear_boxed<'a>(&'a self, key: &'a PersonaKey) -> BoxFuture<'a, Result<u64, RepositoryError>> {
        Box::pin(self.clear(key))
    }

    fn count_boxed<'a>(&'a self, key: &'a PersonaKey) -> BoxFuture<'a, Result<u64, RepositoryError>> {
        Box::pin(self.count(key))
    }
}

/// Type-erased history repository, so the session manager does not carry a
/// storage type parameter.
pub struct BoxChatHistoryRepository {
    inner: Box<dyn ChatHistoryRepositoryDyn + Send + Sync>,
}

impl BoxChatHistoryRepository {
    pub fn new<T: ChatHistoryRepository + 'static>(repo: T) -> Self {
        Self {
            inner: Box::new(repo),
        }
    }

    pub async fn save_message(&self, record: &ChatHistoryRecord) -> Result<(), RepositoryError> {
        self.inner.save_message_boxed(record).await
    }

    pub async fn load_messages(
        &self,
        key: &PersonaKey,
    ) -> Result<Vec<ChatHistoryRecord>, RepositoryError> {
        self.inner.load_messages_boxed(key).await
    }

    pub async fn clear(&self, key: &PersonaKey) -> Result<u64, RepositoryError> {
        self.inner.clear_boxed(key).await
    }

    pub async fn count(&self, key: &PersonaKey) -> Result<u64, RepositoryError> {
        self.inner.count_boxed(key).await
    }
}
