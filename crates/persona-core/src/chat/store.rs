//! Per-persona transcript storage.
//!
//! Each persona key owns two append-only sequences: the UI-visible
//! `Message` list and the role-tagged `Turn` list sent to the completion
//! API. All mutation of a key happens under that key's `DashMap` shard lock,
//! and the change notification is published before the lock is released, so
//! subscribers observe appends for one key in the order they happened.

use dashmap::DashMap;
use tokio::sync::broadcast;

use persona_types::chat::{Message, TranscriptEvent, Turn, TurnRole};
use persona_types::persona::PersonaKey;

use super::prompt::error_message;
use crate::event::bus::TranscriptBus;

#[derive(Debug, Default)]
struct Transcript {
    messages: Vec<Message>,
    turns: Vec<Turn>,
}

impl Transcript {
    fn is_initialized(&self) -> bool {
        !self.turns.is_empty()
    }
}

/// In-memory transcripts keyed by persona.
///
/// Unknown keys read as empty; no operation on the store can fail.
#[derive(Debug)]
pub struct TranscriptStore {
    transcripts: DashMap<PersonaKey, Transcript>,
    bus: TranscriptBus,
}

impl TranscriptStore {
    pub fn new(event_capacity: usize) -> Self {
        Self {
            transcripts: DashMap::new(),
            bus: TranscriptBus::new(event_capacity),
        }
    }

    /// Subscribe to transcript change notifications for all keys.
    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.bus.subscribe()
    }

    /// Current UI transcript for `key` (empty if none exists yet).
    pub fn get(&self, key: &PersonaKey) -> Vec<Message> {
        self.transcripts
            .get(key)
            .map(|t| t.messages.clone())
            .unwrap_or_default()
    }

    /// Current API turn sequence for `key` (empty if uninitialized).
    pub fn turns(&self, key: &PersonaKey) -> Vec<Turn> {
        self.transcripts
            .get(key)
            .map(|t| t.turns.clone())
            .unwrap_or_default()
    }

    pub fn is_initialized(&self, key: &PersonaKey) -> bool {
        self.transcripts
            .get(key)
            .is_some_and(|t| t.is_initialized())
    }

    /// Seed the API sequence with a single system turn if none exists.
    ///
    /// Returns `true` if this call created the sequence. An existing system
    /// turn is never replaced here, even when `system_prompt` differs.
    pub fn ensure_initialized(&self, key: &PersonaKey, system_prompt: &str) -> bool {
        let mut transcript = self.transcripts.entry(key.clone()).or_default();
        if transcript.is_initialized() {
            return false;
        }
        transcript.turns.push(Turn::system(system_prompt));
        true
    }

    /// Overwrite the leading system turn of an initialized key.
    ///
    /// Returns `false` (and does nothing) for uninitialized keys.
    pub fn replace_system_prompt(&self, key: &PersonaKey, system_prompt: &str) -> bool {
        let Some(mut transcript) = self.transcripts.get_mut(key) else {
            return false;
        };
        match transcript.turns.first_mut() {
            Some(turn) if turn.role == TurnRole::System => {
                turn.content = system_prompt.to_string();
                true
            }
            _ => false,
        }
    }

    /// Append a user message and the matching user turn.
    pub fn append_user_turn(&self, key: &PersonaKey, text: &str) -> Message {
        let message = Message::user(text);
        self.mutate(key, |t| {
            t.messages.push(message.clone());
            t.turns.push(Turn::user(text));
        });
        message
    }

    /// Append an assistant message and the matching assistant turn.
    pub fn append_assistant_turn(&self, key: &PersonaKey, text: &str) -> Message {
        let message = Message::assistant(text);
        self.mutate(key, |t| {
            t.messages.push(message.clone());
            t.turns.push(Turn::assistant(text));
        });
        message
    }

    /// Append a synthetic, assistant-flagged error message to the UI
    /// transcript only. The model never produced it, so no turn is recorded.
    pub fn append_error_message(&self, key: &PersonaKey, text: &str) -> Message {
        let message = Message::assistant(error_message(text));
        self.mutate(key, |t| t.messages.push(message.clone()));
        message
    }

    /// Insert previously persisted UI messages ahead of the current ones.
    pub fn restore_messages(&self, key: &PersonaKey, restored: Vec<Message>) {
        if restored.is_empty() {
            return;
        }
        self.mutate(key, |t| {
            let current = std::mem::take(&mut t.messages);
            t.messages = restored;
            t.messages.extend(current);
        });
    }

    /// Clear both sequences for `key`. The key reads as uninitialized afterwards.
    pub fn reset(&self, key: &PersonaKey) {
        self.mutate(key, |t| {
            t.messages.clear();
            t.turns.clear();
        });
    }

    /// Apply `f` to the transcript and publish the result while still
    /// holding the shard lock.
    fn mutate(&self, key: &PersonaKey, f: impl FnOnce(&mut Transcript)) {
        let mut transcript = self.transcripts.entry(key.clone()).or_default();
        f(&mut *transcript);
        self.bus.publish(TranscriptEvent {
            key: key.clone(),
            messages: transcript.messages.clone(),
        });
    }
}
