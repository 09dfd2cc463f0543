//! Persona post generation types.
//!
//! A post is a short social-media update written in a persona's voice, either
//! from scratch or by expanding a draft. The model is asked to answer with a
//! single `{"content": "..."}` object.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::llm::CompletionError;

/// Language a post is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostLanguage {
    Zh,
    En,
}

impl PostLanguage {
    /// Chinese when more than half of the non-whitespace characters are CJK
    /// ideographs (U+4E00..=U+9FA5). Blank text counts as Chinese.
    pub fn detect(text: &str) -> Self {
        let mut total = 0usize;
        let mut chinese = 0usize;
        for ch in text.chars().filter(|c| !c.is_whitespace()) {
            total += 1;
            if ('\u{4e00}'..='\u{9fa5}').contains(&ch) {
                chinese += 1;
            }
        }

        if total == 0 || chinese * 2 > total {
            PostLanguage::Zh
        } else {
            PostLanguage::En
        }
    }
}

impl fmt::Display for PostLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostLanguage::Zh => write!(f, "zh"),
            PostLanguage::En => write!(f, "en"),
        }
    }
}

impl FromStr for PostLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zh" => Ok(PostLanguage::Zh),
            "en" => Ok(PostLanguage::En),
            other => Err(format!("invalid post language: '{other}'")),
        }
    }
}

/// What to ask the model for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostRequest {
    /// A brand-new post in the given language.
    New { language: PostLanguage },
    /// Expand an existing draft, keeping the draft's language.
    Expand { draft: String },
}

impl PostRequest {
    pub fn language(&self) -> PostLanguage {
        match self {
            PostRequest::New { language } => *language,
            PostRequest::Expand { draft } => PostLanguage::detect(draft),
        }
    }
}

/// Errors from generating a post.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PostError {
    #[error("a post request is already in progress")]
    Busy,

    #[error("provider returned no content")]
    EmptyResponse,

    #[error("malformed post reply: {0}")]
    Format(String),

    #[error("api error: {code} {message}")]
    Api { code: u16, message: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("request cancelled")]
    Cancelled,
}

impl From<CompletionError> for PostError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::EmptyResponse => PostError::EmptyResponse,
            CompletionError::Api { code, message } => PostError::Api { code, message },
            CompletionError::Transport(cause) => PostError::Transport(cause),
            CompletionError::Cancelled => PostError::Cancelled,
        }
    }
}
