//! API key resolution.
//!
//! - `env`: reads the key from the environment variable named in config

pub mod env;

pub use env::resolve_api_key;
