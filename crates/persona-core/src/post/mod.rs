//! Persona post generation.

pub mod generator;
pub mod prompt;
