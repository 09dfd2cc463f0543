//! Persona chat: transcript storage, prompt synthesis, and the session
//! manager that ties them to a completion client.

pub mod manager;
pub mod prompt;
pub mod repository;
pub mod store;
