use thiserror::Error;

/// Errors that escape the chat session manager.
///
/// Completion failures never appear here: they are absorbed into the
/// transcript. Only caller misuse is reported.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("no persona selected")]
    NoPersonaSelected,

    #[error("persona '{0}' not found")]
    PersonaNotFound(String),
}

/// Errors from repository operations (used by trait definitions in persona-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,
}

/// Errors from loading configuration or persona files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
}
