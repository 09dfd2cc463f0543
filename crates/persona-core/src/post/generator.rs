//! Persona post generator.
//!
//! Sends a one-shot `[system, user]` request through the completion client
//! and extracts the post body from the JSON reply. Only one request runs at
//! a time; a second call while one is in flight fails with
//! [`PostError::Busy`] instead of queueing.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use persona_types::config::Locale;
use persona_types::persona::Persona;
use persona_types::post::{PostError, PostRequest};

use super::prompt::{parse_post_reply, post_failure_text, post_turns};
use crate::llm::box_client::BoxCompletionClient;

pub struct PostGenerator {
    client: BoxCompletionClient,
    locale: Locale,
    busy: AtomicBool,
}

impl PostGenerator {
    pub fn new(client: BoxCompletionClient, locale: Locale) -> Self {
        Self {
            client,
            locale,
            busy: AtomicBool::new(false),
        }
    }

    pub fn client(&self) -> &BoxCompletionClient {
        &self.client
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Write a post in `persona`'s voice.
    ///
    /// `nonce` becomes the prompt's request number.
    pub async fn generate(
        &self,
        persona: &Persona,
        request: &PostRequest,
        nonce: u32,
    ) -> Result<String, PostError> {
        let _busy = BusyGuard::acquire(&self.busy).ok_or(PostError::Busy)?;

        let turns = post_turns(persona, request, nonce);
        debug!(
            persona = %persona.key(),
            language = %request.language(),
            nonce,
            "requesting post"
        );

        let result = match self.client.complete(&turns).await {
            Ok(reply) => parse_post_reply(&reply),
            Err(err) => Err(PostError::from(err)),
        };

        match &result {
            Ok(content) => info!(persona = %persona.key(), chars = content.chars().count(), "post generated"),
            Err(err) => warn!(persona = %persona.key(), error = %err, "post generation failed"),
        }
        result
    }

    /// Localized description of a failure.
    pub fn failure_text(&self, error: &PostError) -> String {
        post_failure_text(self.locale, error)
    }
}

/// Clears the busy flag when dropped, including on cancellation.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
