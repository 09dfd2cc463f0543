//! Interactive CLI chat with a persona.
//!
//! Implements the chat loop: persona selection, restored history, slash
//! commands, a thinking spinner while the completion is in flight, and
//! typewriter-style reply rendering. Entry point: `loop_runner::run_chat_loop`.

pub mod banner;
pub mod commands;
pub mod input;
pub mod loop_runner;
pub mod renderer;
