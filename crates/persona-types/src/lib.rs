//! Shared domain types for Persona Chat.
//!
//! This crate contains the core domain types used across the workspace:
//! Persona, Message, Turn, the chat-completion wire format, chat history
//! records, post generation requests, configuration, and their associated
//! error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod persona;
pub mod post;
