//! Completion client abstractions.
//!
//! - `CompletionClient`: RPITIT trait for concrete client implementations
//! - `BoxCompletionClient`: object-safe wrapper for dynamic dispatch

pub mod box_client;
pub mod client;
