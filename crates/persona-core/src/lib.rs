//! Chat session logic and port trait definitions for Persona Chat.
//!
//! This crate defines the "ports" (completion client and history repository
//! traits) that the infrastructure layer implements, plus the transcript
//! store and the session manager that drive a persona conversation, and the
//! generator that writes social posts in a persona's voice. It depends only
//! on `persona-types` -- never on `persona-infra` or any HTTP/database crate.

pub mod chat;
pub mod event;
pub mod llm;
pub mod post;
