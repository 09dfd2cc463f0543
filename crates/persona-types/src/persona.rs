//! Persona types.
//!
//! A `Persona` is a named character profile used to condition the model's
//! conversational behavior. Personas are owned by whoever loads them (the
//! CLI reads them from `personas.toml`); the chat core only reads them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who a persona belongs to.
///
/// `User` personas were created by the local user, `Other` personas were
/// discovered elsewhere (followed characters). Both chat the same way; the
/// scope only namespaces transcripts and persisted history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonaScope {
    User,
    Other,
}

impl fmt::Display for PersonaScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersonaScope::User => write!(f, "user"),
            PersonaScope::Other => write!(f, "other"),
        }
    }
}

impl FromStr for PersonaScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(PersonaScope::User),
            "other" => Ok(PersonaScope::Other),
            other => Err(format!("invalid persona scope: '{other}'")),
        }
    }
}

impl Default for PersonaScope {
    fn default() -> Self {
        PersonaScope::Other
    }
}

/// Identity of a transcript: a persona name within a scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonaKey {
    pub scope: PersonaScope,
    pub name: String,
}

impl PersonaKey {
    pub fn new(scope: PersonaScope, name: impl Into<String>) -> Self {
        Self {
            scope,
            name: name.into(),
        }
    }
}

impl fmt::Display for PersonaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.name)
    }
}

/// A character profile.
///
/// `name`, `background_story` and `signature` always feed the system prompt.
/// The extended attributes are optional and only appear in the prompt when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub scope: PersonaScope,
    pub name: String,
    #[serde(default)]
    pub background_story: String,
    /// Short bio shown under the persona's name.
    #[serde(default, alias = "bio")]
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
}

impl Persona {
    /// Create a persona with only the three prompt-defining attributes.
    pub fn new(
        scope: PersonaScope,
        name: impl Into<String>,
        background_story: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            scope,
            name: name.into(),
            background_story: background_story.into(),
            signature: signature.into(),
            gender: None,
            age: None,
            personality: None,
            relationship: None,
        }
    }

    /// The transcript key for this persona.
    pub fn key(&self) -> PersonaKey {
        PersonaKey::new(self.scope, self.name.clone())
    }

    /// Whether any of the optional attributes are set.
    pub fn has_extended_attributes(&self) -> bool {
        self.gender.is_some()
            || self.age.is_some()
            || self.personality.is_some()
            || self.relationship.is_some()
    }
}
