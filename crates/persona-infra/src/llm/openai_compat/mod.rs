//! OpenAI-compatible chat-completion provider.

pub mod client;

pub use client::OpenAiCompatClient;
