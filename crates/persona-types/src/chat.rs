//! Chat transcript types.
//!
//! A transcript has two faces: the UI-visible `Message` list and the
//! role-tagged `Turn` list sent to the completion API (see [`crate::llm`]).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::llm::CompletionError;
use crate::persona::PersonaKey;

pub use crate::llm::{Turn, TurnRole};

/// One UI-visible chat entry. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub sent_by_user: bool,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sent_by_user: true,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sent_by_user: false,
        }
    }
}

/// Published whenever a persona's UI transcript changes.
///
/// Carries the full updated transcript so subscribers never need to
/// reconcile deltas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEvent {
    pub key: PersonaKey,
    pub messages: Vec<Message>,
}

/// Per-persona session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Ready,
    Sending,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Sending => write!(f, "sending"),
        }
    }
}

/// Result of a `send_message` call.
///
/// Failures are already recorded in the transcript by the time the caller
/// sees `Failed`; the error is returned only so callers can react (e.g. log).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The model replied; the reply was appended to the transcript.
    Replied(String),
    /// The completion failed; a synthetic error message was appended.
    Failed(CompletionError),
    /// The input was blank; nothing happened.
    Ignored,
    /// The session was reset while the completion was in flight.
    Cancelled,
}
