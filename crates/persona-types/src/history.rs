//! Persisted chat history records.
//!
//! Unlike the in-memory `Message`, a history record has its own identity
//! and timestamp so it can be stored and listed independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::Message;
use crate::persona::{PersonaKey, PersonaScope};

/// One stored UI message for a persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatHistoryRecord {
    pub message_id: Uuid,
    pub persona_id: i64,
    pub persona_scope: PersonaScope,
    pub persona_name: String,
    pub text: String,
    pub sent_by_user: bool,
    pub created_at: DateTime<Utc>,
}

impl ChatHistoryRecord {
    /// Build a record for a freshly appended message.
    pub fn new(persona_id: i64, key: &PersonaKey, message: &Message) -> Self {
        Self {
            message_id: Uuid::now_v7(),
            persona_id,
            persona_scope: key.scope,
            persona_name: key.name.clone(),
            text: message.text.clone(),
            sent_by_user: message.sent_by_user,
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> PersonaKey {
        PersonaKey::new(self.persona_scope, self.persona_name.clone())
    }

    pub fn to_message(&self) -> Message {
        Message {
            text: self.text.clone(),
            sent_by_user: self.sent_by_user,
        }
    }
}
