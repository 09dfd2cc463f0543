//! Chat session manager.
//!
//! Drives one conversation per persona key through
//! `Uninitialized -> Ready -> Sending -> Ready`. A send appends the user
//! turn, forwards the whole API transcript to the completion client, and
//! records either the reply or a synthetic error message. Completion
//! failures never escape: they end up in the transcript.
//!
//! Sends, selections, and resets of the same key are serialized through a
//! FIFO `tokio::sync::Mutex`; different keys proceed independently. `reset`
//! cancels the in-flight completion for its key and suppresses the late
//! result.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use persona_types::chat::{Message, SendOutcome, SessionState, TranscriptEvent, Turn};
use persona_types::config::{ChatConfig, Locale, PromptPolicy};
use persona_types::error::ChatError;
use persona_types::history::ChatHistoryRecord;
use persona_types::llm::CompletionError;
use persona_types::persona::{Persona, PersonaKey};

use super::prompt::{failure_text, system_prompt};
use super::repository::BoxChatHistoryRepository;
use super::store::TranscriptStore;
use crate::llm::box_client::BoxCompletionClient;

/// Behavior knobs for a session manager.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub locale: Locale,
    pub prompt_policy: PromptPolicy,
    pub event_capacity: usize,
}

impl SessionSettings {
    pub fn from_config(config: &ChatConfig) -> Self {
        Self {
            locale: config.locale,
            prompt_policy: config.prompt_policy,
            event_capacity: config.event_capacity,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&ChatConfig::default())
    }
}

#[derive(Debug)]
struct SessionSlot {
    state: SessionState,
    persona_id: i64,
    cancel: CancellationToken,
}

impl SessionSlot {
    fn new(persona_id: i64) -> Self {
        Self {
            state: SessionState::Uninitialized,
            persona_id,
            cancel: CancellationToken::new(),
        }
    }
}

/// Orchestrates the transcript store, the completion client, and the
/// optional history repository for every persona of one app session.
///
/// Share it behind an `Arc`; every method takes `&self`.
pub struct ChatSessionManager {
    store: TranscriptStore,
    client: BoxCompletionClient,
    history: Option<BoxChatHistoryRepository>,
    settings: SessionSettings,
    slots: DashMap<PersonaKey, SessionSlot>,
    send_locks: DashMap<PersonaKey, Arc<Mutex<()>>>,
    current: RwLock<Option<PersonaKey>>,
}

impl ChatSessionManager {
    pub fn new(client: BoxCompletionClient, settings: SessionSettings) -> Self {
        Self {
            store: TranscriptStore::new(settings.event_capacity),
            client,
            history: None,
            settings,
            slots: DashMap::new(),
            send_locks: DashMap::new(),
            current: RwLock::new(None),
        }
    }

    /// Persist every UI message and restore transcripts on first selection.
    pub fn with_history(mut self, history: BoxChatHistoryRepository) -> Self {
        self.history = Some(history);
        self
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn client(&self) -> &BoxCompletionClient {
        &self.client
    }

    /// Subscribe to "transcript changed for key K" notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.store.subscribe()
    }

    pub fn transcript(&self, key: &PersonaKey) -> Vec<Message> {
        self.store.get(key)
    }

    pub fn turns(&self, key: &PersonaKey) -> Vec<Turn> {
        self.store.turns(key)
    }

    pub fn state(&self, key: &PersonaKey) -> SessionState {
        self.slots
            .get(key)
            .map(|slot| slot.state)
            .unwrap_or(SessionState::Uninitialized)
    }

    /// The persona `send_message` talks to.
    pub async fn current(&self) -> Option<PersonaKey> {
        self.current.read().await.clone()
    }

    /// Make `persona` current, creating its transcript on first use.
    ///
    /// Under `PromptPolicy::Freeze` an existing system turn is kept as is;
    /// under `Refresh` it is re-synthesized from the persona's attributes.
    pub async fn select_persona(&self, persona: &Persona) -> PersonaKey {
        let key = persona.key();
        let prompt = system_prompt(persona, self.settings.locale);

        // Ordered with sends and resets of the same key.
        let lock = self.send_lock(&key);
        let _guard = lock.lock().await;

        let created = self.store.ensure_initialized(&key, &prompt);
        if created {
            self.restore_history(&key).await;
        } else if self.settings.prompt_policy == PromptPolicy::Refresh
            && self.store.replace_system_prompt(&key, &prompt)
        {
            debug!(key = %key, "system prompt refreshed");
        }

        {
            let mut slot = self
                .slots
                .entry(key.clone())
                .or_insert_with(|| SessionSlot::new(persona.id));
            slot.persona_id = persona.id;
            if slot.state == SessionState::Uninitialized {
                slot.state = SessionState::Ready;
            }
        }

        *self.current.write().await = Some(key.clone());
        info!(key = %key, created, "persona selected");
        key
    }

    /// Send a user message to the current persona.
    pub async fn send_message(&self, text: &str) -> Result<SendOutcome, ChatError> {
        let key = self.current().await.ok_or(ChatError::NoPersonaSelected)?;
        self.send_message_to(&key, text).await
    }

    /// Send a user message to a specific persona.
    ///
    /// Blank input is ignored. A key that was never selected (or was reset)
    /// is reported as `NoPersonaSelected`; every other failure is recorded in
    /// the transcript and returned as `SendOutcome::Failed`.
    pub async fn send_message_to(
        &self,
        key: &PersonaKey,
        text: &str,
    ) -> Result<SendOutcome, ChatError> {
        if text.trim().is_empty() {
            debug!(key = %key, "ignoring blank message");
            return Ok(SendOutcome::Ignored);
        }
        if self.state(key) == SessionState::Uninitialized {
            return Err(ChatError::NoPersonaSelected);
        }

        let lock = self.send_lock(key);
        let _guard = lock.lock().await;

        let Some(token) = self.begin_send(key) else {
            debug!(key = %key, "session reset while send was queued");
            return Ok(SendOutcome::Cancelled);
        };

        let user_message = self.store.append_user_turn(key, text);
        self.persist(key, &user_message).await;

        let turns = self.store.turns(key);
        debug!(key = %key, turns = turns.len(), "requesting completion");

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(CompletionError::Cancelled),
            result = self.client.complete(&turns) => result,
        };

        if token.is_cancelled() {
            debug!(key = %key, "completion cancelled by reset, dropping result");
            return Ok(SendOutcome::Cancelled);
        }

        let outcome = match result {
            Ok(content) if !content.trim().is_empty() => {
                let reply = self.store.append_assistant_turn(key, &content);
                self.persist(key, &reply).await;
                SendOutcome::Replied(content)
            }
            Ok(_) => self.record_failure(key, CompletionError::EmptyResponse).await,
            Err(err) => self.record_failure(key, err).await,
        };

        self.finish_send(key);
        Ok(outcome)
    }

    /// Forget the conversation for `key`.
    ///
    /// Cancels an in-flight completion, then waits for the key's lock before
    /// clearing the transcript (and persisted history, when attached) and
    /// returning the key to `Uninitialized`. A selection queued behind the
    /// reset starts a fresh transcript.
    pub async fn reset(&self, key: &PersonaKey) {
        // Cancelled before queueing on the lock so the send holding it
        // finishes early and sends queued ahead of the reset bail out.
        if let Some(slot) = self.slots.get(key) {
            slot.cancel.cancel();
        }

        let lock = self.send_lock(key);
        let _guard = lock.lock().await;

        if let Some(mut slot) = self.slots.get_mut(key) {
            slot.state = SessionState::Uninitialized;
            slot.cancel = CancellationToken::new();
        }
        self.store.reset(key);

        if let Some(history) = &self.history {
            match history.clear(key).await {
                Ok(removed) => debug!(key = %key, removed, "chat history cleared"),
                Err(e) => warn!(key = %key, error = %e, "failed to clear chat history"),
            }
        }

        let mut current = self.current.write().await;
        if current.as_ref() == Some(key) {
            *current = None;
        }
        info!(key = %key, "session reset");
    }

    /// Move a slot to `Sending` unless a reset is pending or done.
    fn begin_send(&self, key: &PersonaKey) -> Option<CancellationToken> {
        let mut slot = self.slots.get_mut(key)?;
        if slot.state == SessionState::Uninitialized || slot.cancel.is_cancelled() {
            return None;
        }
        slot.state = SessionState::Sending;
        Some(slot.cancel.clone())
    }

    fn finish_send(&self, key: &PersonaKey) {
        if let Some(mut slot) = self.slots.get_mut(key) {
            if slot.state == SessionState::Sending {
                slot.state = SessionState::Ready;
            }
        }
    }

    async fn record_failure(&self, key: &PersonaKey, error: CompletionError) -> SendOutcome {
        warn!(key = %key, error = %error, "completion failed");
        let text = failure_text(self.settings.locale, &error);
        let message = self.store.append_error_message(key, &text);
        self.persist(key, &message).await;
        SendOutcome::Failed(error)
    }

    fn send_lock(&self, key: &PersonaKey) -> Arc<Mutex<()>> {
        self.send_locks.entry(key.clone()).or_default().clone()
    }

    async fn persist(&self, key: &PersonaKey, message: &Message) {
        let Some(history) = &self.history else {
            return;
        };
        let persona_id = self.slots.get(key).map(|s| s.persona_id).unwrap_or_default();
        let record = ChatHistoryRecord::new(persona_id, key, message);
        if let Err(e) = history.save_message(&record).await {
            warn!(key = %key, error = %e, "failed to persist chat message");
        }
    }

    async fn restore_history(&self, key: &PersonaKey) {
        let Some(history) = &self.history else {
            return;
        };
        match history.load_messages(key).await {
            Ok(records) if !records.is_empty() => {
                info!(key = %key, count = records.len(), "restoring chat history");
                let messages = records.iter().map(ChatHistoryRecord::to_message).collect();
                self.store.restore_messages(key, messages);
            }
            Ok(_) => {}
            Err(e) => warn!(key = %key, error = %e, "failed to load chat history"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::Semaphore;

    use persona_types::error::RepositoryError;
    use persona_types::persona::PersonaScope;

    use super::*;
    use crate::chat::repository::ChatHistoryRepository;
    use crate::llm::client::CompletionClient;

    // --- Test doubles ---

    #[derive(Default)]
    struct ScriptState {
        replies: VecDeque<Result<String, CompletionError>>,
        calls: Vec<Vec<Turn>>,
    }

    #[derive(Clone, Default)]
    struct Script(Arc<std::sync::Mutex<ScriptState>>);

    impl Script {
        fn reply(self, reply: Result<&str, CompletionError>) -> Self {
            self.0
                .lock()
                .unwrap()
                .replies
                .push_back(reply.map(str::to_string));
            self
        }

        fn calls(&self) -> Vec<Vec<Turn>> {
            self.0.lock().unwrap().calls.clone()
        }
    }

    struct ScriptedClient(Script);

    impl CompletionClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-1"
        }

        async fn complete(&self, turns: &[Turn]) -> Result<String, CompletionError> {
            let mut state = self.0 .0.lock().unwrap();
            state.calls.push(turns.to_vec());
            state
                .replies
                .pop_front()
                .unwrap_or(Err(CompletionError::EmptyResponse))
        }
    }

    /// Blocks every completion until the test releases a permit.
    #[derive(Clone)]
    struct Gate {
        started: Arc<Semaphore>,
        release: Arc<Semaphore>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl Default for Gate {
        fn default() -> Self {
            Self {
                started: Arc::new(Semaphore::new(0)),
                release: Arc::new(Semaphore::new(0)),
                in_flight: Arc::default(),
                max_in_flight: Arc::default(),
            }
        }
    }

    impl Gate {
        async fn wait_started(&self) {
            self.started.acquire().await.unwrap().forget();
        }
    }

    struct GatedClient(Gate);

    impl CompletionClient for GatedClient {
        fn name(&self) -> &str {
            "gated"
        }

        fn model(&self) -> &str {
            "gated-1"
        }

        async fn complete(&self, turns: &[Turn]) -> Result<String, CompletionError> {
            let gate = &self.0;
            let now = gate.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            gate.max_in_flight.fetch_max(now, Ordering::SeqCst);
            gate.started.add_permits(1);

            let permit = gate.release.acquire().await.unwrap();
            permit.forget();
            gate.in_flight.fetch_sub(1, Ordering::SeqCst);

            let last = turns.last().map(|t| t.content.clone()).unwrap_or_default();
            Ok(format!("re: {last}"))
        }
    }

    #[derive(Clone, Default)]
    struct MemoryHistory(Arc<std::sync::Mutex<Vec<ChatHistoryRecord>>>);

    impl ChatHistoryRepository for MemoryHistory {
        async fn save_message(&self, record: &ChatHistoryRecord) -> Result<(), RepositoryError> {
            self.0.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn load_messages(
            &self,
            key: &PersonaKey,
        ) -> Result<Vec<ChatHistoryRecord>, RepositoryError> {
            Ok(self
                .0
                .lock()
                .unwrap()
                .iter()
                .filter(|r| &r.key() == key)
                .cloned()
                .collect())
        }

        async fn clear(&self, key: &PersonaKey) -> Result<u64, RepositoryError> {
            let mut records = self.0.lock().unwrap();
            let before = records.len();
            records.retain(|r| &r.key() != key);
            Ok((before - records.len()) as u64)
        }

        async fn count(&self, key: &PersonaKey) -> Result<u64, RepositoryError> {
            Ok(self.0.lock().unwrap().iter().filter(|r| &r.key() == key).count() as u64)
        }
    }

    /// Parks every `save_message` until the test releases a permit.
    #[derive(Clone)]
    struct BlockingHistory {
        inner: MemoryHistory,
        saving: Arc<Semaphore>,
        release: Arc<Semaphore>,
    }

    impl Default for BlockingHistory {
        fn default() -> Self {
            Self {
                inner: MemoryHistory::default(),
                saving: Arc::new(Semaphore::new(0)),
                release: Arc::new(Semaphore::new(0)),
            }
        }
    }

    impl BlockingHistory {
        async fn wait_saving(&self) {
            self.saving.acquire().await.unwrap().forget();
        }
    }

    impl ChatHistoryRepository for BlockingHistory {
        async fn save_message(&self, record: &ChatHistoryRecord) -> Result<(), RepositoryError> {
            self.saving.add_permits(1);
            self.release.acquire().await.unwrap().forget();
            self.inner.save_message(record).await
        }

        async fn load_messages(
            &self,
            key: &PersonaKey,
        ) -> Result<Vec<ChatHistoryRecord>, RepositoryError> {
            self.inner.load_messages(key).await
        }

        async fn clear(&self, key: &PersonaKey) -> Result<u64, RepositoryError> {
            self.inner.clear(key).await
        }

        async fn count(&self, key: &PersonaKey) -> Result<u64, RepositoryError> {
            self.inner.count(key).await
        }
    }

    // --- Helpers ---

    fn poet() -> Persona {
        Persona::new(PersonaScope::Other, "K", "诗人", "代码即诗")
    }

    fn manager_with(script: &Script) -> ChatSessionManager {
        ChatSessionManager::new(
            BoxCompletionClient::new(ScriptedClient(script.clone())),
            SessionSettings::default(),
        )
    }

    fn gated_manager(gate: &Gate) -> Arc<ChatSessionManager> {
        Arc::new(ChatSessionManager::new(
            BoxCompletionClient::new(GatedClient(gate.clone())),
            SessionSettings::default(),
        ))
    }

    const POET_PROMPT: &str = "你现在扮演 K。你的背景故事是：诗人。你的简介是：代码即诗。请你严格按照这个角色设定进行对话，不要暴露你是一个 AI 模型。";

    // --- Scenarios ---

    #[tokio::test]
    async fn successful_reply_extends_both_transcripts() {
        let script = Script::default().reply(Ok("你好，旅人"));
        let manager = manager_with(&script);

        let key = manager.select_persona(&poet()).await;
        let outcome = manager.send_message("你好").await.unwrap();

        assert_eq!(outcome, SendOutcome::Replied("你好，旅人".to_string()));
        assert_eq!(
            manager.transcript(&key),
            vec![Message::user("你好"), Message::assistant("你好，旅人")]
        );
        assert_eq!(
            manager.turns(&key),
            vec![
                Turn::system(POET_PROMPT),
                Turn::user("你好"),
                Turn::assistant("你好，旅人"),
            ]
        );
        assert_eq!(manager.state(&key), SessionState::Ready);
    }

    #[tokio::test]
    async fn client_receives_full_transcript() {
        let script = Script::default().reply(Ok("你好，旅人"));
        let manager = manager_with(&script);

        manager.select_persona(&poet()).await;
        manager.send_message("你好").await.unwrap();

        let calls = script.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0],
            vec![Turn::system(POET_PROMPT), Turn::user("你好")]
        );
    }

    #[tokio::test]
    async fn api_error_becomes_error_message_without_turn() {
        let script = Script::default().reply(Err(CompletionError::Api {
            code: 401,
            message: "Unauthorized".to_string(),
        }));
        let manager = manager_with(&script);

        let key = manager.select_persona(&poet()).await;
        let outcome = manager.send_message("你好").await.unwrap();

        assert!(matches!(
            outcome,
            SendOutcome::Failed(CompletionError::Api { code: 401, .. })
        ));
        assert_eq!(
            manager.transcript(&key),
            vec![
                Message::user("你好"),
                Message::assistant("[系统错误: API 错误: 401 Unauthorized]"),
            ]
        );
        assert_eq!(
            manager.turns(&key),
            vec![Turn::system(POET_PROMPT), Turn::user("你好")]
        );
        assert_eq!(manager.state(&key), SessionState::Ready);
    }

    #[tokio::test]
    async fn transport_failure_message() {
        let script =
            Script::default().reply(Err(CompletionError::Transport("timeout".to_string())));
        let manager = manager_with(&script);

        let key = manager.select_persona(&poet()).await;
        manager.send_message("你好").await.unwrap();

        let transcript = manager.transcript(&key);
        assert_eq!(transcript.len(), 2);
        assert_eq!(
            transcript[1],
            Message::assistant("[系统错误: 网络请求失败: timeout]")
        );
        assert_eq!(manager.turns(&key).len(), 2);
    }

    #[tokio::test]
    async fn empty_content_is_reported() {
        let script = Script::default().reply(Ok("")).reply(Ok("   "));
        let manager = manager_with(&script);

        let key = manager.select_persona(&poet()).await;
        let first = manager.send_message("a").await.unwrap();
        let second = manager.send_message("b").await.unwrap();

        assert_eq!(first, SendOutcome::Failed(CompletionError::EmptyResponse));
        assert_eq!(second, SendOutcome::Failed(CompletionError::EmptyResponse));
        let transcript = manager.transcript(&key);
        assert_eq!(transcript[1].text, "[系统错误: API 返回了空内容]");
        assert_eq!(transcript[3].text, "[系统错误: API 返回了空内容]");
        // system + two user turns, no assistant turns
        assert_eq!(manager.turns(&key).len(), 3);
    }

    #[tokio::test]
    async fn english_locale_failure_text() {
        let script = Script::default().reply(Err(CompletionError::Api {
            code: 401,
            message: "Unauthorized".to_string(),
        }));
        let settings = SessionSettings {
            locale: Locale::En,
            ..SessionSettings::default()
        };
        let manager = ChatSessionManager::new(
            BoxCompletionClient::new(ScriptedClient(script.clone())),
            settings,
        );

        let key = manager.select_persona(&poet()).await;
        manager.send_message("hello").await.unwrap();

        assert_eq!(
            manager.transcript(&key)[1].text,
            "[系统错误: API error: 401 Unauthorized]"
        );
        assert!(manager.turns(&key)[0]
            .content
            .starts_with("You are now playing K."));
    }

    #[tokio::test]
    async fn n_successful_sends_alternate() {
        let n = 5;
        let mut script = Script::default();
        for i in 0..n {
            script = script.reply(Ok(&format!("reply {i}")));
        }
        let manager = manager_with(&script);
        let key = manager.select_persona(&poet()).await;

        for i in 0..n {
            manager.send_message(&format!("msg {i}")).await.unwrap();
        }

        let transcript = manager.transcript(&key);
        assert_eq!(transcript.len(), 2 * n);
        for (i, message) in transcript.iter().enumerate() {
            assert_eq!(message.sent_by_user, i % 2 == 0);
        }
        assert_eq!(manager.turns(&key).len(), 1 + 2 * n);
    }

    #[tokio::test]
    async fn send_without_persona_is_rejected() {
        let manager = manager_with(&Script::default());
        let err = manager.send_message("hi").await.unwrap_err();
        assert!(matches!(err, ChatError::NoPersonaSelected));

        let key = PersonaKey::new(PersonaScope::User, "ghost");
        let err = manager.send_message_to(&key, "hi").await.unwrap_err();
        assert!(matches!(err, ChatError::NoPersonaSelected));
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let script = Script::default();
        let manager = manager_with(&script);
        let key = manager.select_persona(&poet()).await;

        assert_eq!(manager.send_message("  \n").await.unwrap(), SendOutcome::Ignored);
        assert!(manager.transcript(&key).is_empty());
        assert!(script.calls().is_empty());
    }

    #[tokio::test]
    async fn freeze_policy_keeps_first_prompt() {
        let manager = manager_with(&Script::default());
        let key = manager.select_persona(&poet()).await;

        let mut changed = poet();
        changed.signature = "新的签名".to_string();
        manager.select_persona(&changed).await;

        let turns = manager.turns(&key);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0], Turn::system(POET_PROMPT));
    }

    #[tokio::test]
    async fn refresh_policy_rewrites_prompt() {
        let settings = SessionSettings {
            prompt_policy: PromptPolicy::Refresh,
            ..SessionSettings::default()
        };
        let manager = ChatSessionManager::new(
            BoxCompletionClient::new(ScriptedClient(Script::default())),
            settings,
        );
        let key = manager.select_persona(&poet()).await;

        let mut changed = poet();
        changed.signature = "新的签名".to_string();
        manager.select_persona(&changed).await;

        let turns = manager.turns(&key);
        assert_eq!(turns.len(), 1);
        assert!(turns[0].content.contains("新的签名"));
    }

    #[tokio::test]
    async fn reset_then_reselect_behaves_like_fresh_key() {
        let script = Script::default().reply(Ok("one")).reply(Ok("two"));
        let manager = manager_with(&script);

        let key = manager.select_persona(&poet()).await;
        manager.send_message("hi").await.unwrap();

        manager.reset(&key).await;
        assert!(manager.transcript(&key).is_empty());
        assert!(manager.turns(&key).is_empty());
        assert_eq!(manager.state(&key), SessionState::Uninitialized);
        assert_eq!(manager.current().await, None);

        manager.select_persona(&poet()).await;
        manager.send_message("hi").await.unwrap();

        assert_eq!(
            manager.transcript(&key),
            vec![Message::user("hi"), Message::assistant("two")]
        );
        assert_eq!(
            manager.turns(&key),
            vec![
                Turn::system(POET_PROMPT),
                Turn::user("hi"),
                Turn::assistant("two"),
            ]
        );
    }

    #[tokio::test]
    async fn personas_keep_separate_transcripts() {
        let script = Script::default().reply(Ok("from K")).reply(Ok("from L"));
        let manager = manager_with(&script);

        let k = manager.select_persona(&poet()).await;
        manager.send_message("to K").await.unwrap();

        let other = Persona::new(PersonaScope::User, "L", "画家", "色彩");
        let l = manager.select_persona(&other).await;
        assert_eq!(manager.current().await, Some(l.clone()));
        manager.send_message("to L").await.unwrap();

        assert_eq!(manager.transcript(&k)[1].text, "from K");
        assert_eq!(manager.transcript(&l)[1].text, "from L");
        assert_eq!(manager.turns(&k).len(), 3);
        assert_eq!(manager.turns(&l).len(), 3);
    }

    #[tokio::test]
    async fn subscribers_observe_user_then_reply() {
        let script = Script::default().reply(Ok("你好，旅人"));
        let manager = manager_with(&script);
        let mut rx = manager.subscribe();

        let key = manager.select_persona(&poet()).await;
        manager.send_message("你好").await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.key, key);
        assert_eq!(first.messages, vec![Message::user("你好")]);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.messages.len(), 2);
    }

    // --- Concurrency ---

    #[tokio::test]
    async fn state_is_sending_while_in_flight() {
        let gate = Gate::default();
        let manager = gated_manager(&gate);
        let key = manager.select_persona(&poet()).await;

        let task = {
            let manager = manager.clone();
            let key = key.clone();
            tokio::spawn(async move { manager.send_message_to(&key, "hi").await })
        };

        gate.wait_started().await;
        assert_eq!(manager.state(&key), SessionState::Sending);

        gate.release.add_permits(1);
        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, SendOutcome::Replied("re: hi".to_string()));
        assert_eq!(manager.state(&key), SessionState::Ready);
    }

    #[tokio::test]
    async fn sends_for_one_key_are_serialized() {
        let gate = Gate::default();
        let manager = gated_manager(&gate);
        let key = manager.select_persona(&poet()).await;

        let first = {
            let manager = manager.clone();
            let key = key.clone();
            tokio::spawn(async move { manager.send_message_to(&key, "one").await })
        };
        gate.wait_started().await;

        let second = {
            let manager = manager.clone();
            let key = key.clone();
            tokio::spawn(async move { manager.send_message_to(&key, "two").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The queued send must not have appended its user turn yet.
        assert_eq!(manager.transcript(&key), vec![Message::user("one")]);

        gate.release.add_permits(2);
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(gate.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(
            manager.turns(&key)[1..],
            [
                Turn::user("one"),
                Turn::assistant("re: one"),
                Turn::user("two"),
                Turn::assistant("re: two"),
            ]
        );
    }

    #[tokio::test]
    async fn different_keys_run_concurrently() {
        let gate = Gate::default();
        let manager = gated_manager(&gate);
        let k = manager.select_persona(&poet()).await;
        let l = manager
            .select_persona(&Persona::new(PersonaScope::User, "L", "画家", "色彩"))
            .await;

        let tasks: Vec<_> = [k.clone(), l.clone()]
            .into_iter()
            .map(|key| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.send_message_to(&key, "hi").await })
            })
            .collect();

        gate.wait_started().await;
        gate.wait_started().await;
        assert_eq!(gate.in_flight.load(Ordering::SeqCst), 2);

        gate.release.add_permits(2);
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(manager.transcript(&k).len(), 2);
        assert_eq!(manager.transcript(&l).len(), 2);
    }

    #[tokio::test]
    async fn reset_cancels_in_flight_send() {
        let gate = Gate::default();
        let manager = gated_manager(&gate);
        let key = manager.select_persona(&poet()).await;

        let task = {
            let manager = manager.clone();
            let key = key.clone();
            tokio::spawn(async move { manager.send_message_to(&key, "hi").await })
        };
        gate.wait_started().await;

        manager.reset(&key).await;

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, SendOutcome::Cancelled);
        assert!(manager.transcript(&key).is_empty());
        assert!(manager.turns(&key).is_empty());
        assert_eq!(manager.state(&key), SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn reselect_queued_behind_reset_starts_fresh_transcript() {
        let history = BlockingHistory::default();
        let script = Script::default().reply(Ok("ok"));
        let manager = Arc::new(
            manager_with(&script).with_history(BoxChatHistoryRepository::new(history.clone())),
        );
        let key = manager.select_persona(&poet()).await;

        // The send holds the key's lock while its user message is persisted.
        let send = {
            let manager = manager.clone();
            let key = key.clone();
            tokio::spawn(async move { manager.send_message_to(&key, "first").await })
        };
        history.wait_saving().await;

        let reset = {
            let manager = manager.clone();
            let key = key.clone();
            tokio::spawn(async move { manager.reset(&key).await })
        };
        while !manager.slots.get(&key).is_some_and(|slot| slot.cancel.is_cancelled()) {
            tokio::task::yield_now().await;
        }

        let select = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.select_persona(&poet()).await })
        };
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }

        history.release.add_permits(16);
        assert_eq!(send.await.unwrap().unwrap(), SendOutcome::Cancelled);
        reset.await.unwrap();
        select.await.unwrap();

        assert_eq!(manager.state(&key), SessionState::Ready);
        assert_eq!(manager.current().await, Some(key.clone()));
        assert_eq!(manager.turns(&key), vec![Turn::system(POET_PROMPT)]);

        let outcome = manager.send_message_to(&key, "second").await.unwrap();
        assert_eq!(outcome, SendOutcome::Replied("ok".to_string()));
        assert_eq!(
            manager.turns(&key),
            vec![
                Turn::system(POET_PROMPT),
                Turn::user("second"),
                Turn::assistant("ok"),
            ]
        );
        assert_eq!(script.calls()[0][0], Turn::system(POET_PROMPT));
    }

    // --- History ---

    #[tokio::test]
    async fn history_records_every_ui_message() {
        let history = MemoryHistory::default();
        let script = Script::default()
            .reply(Ok("你好，旅人"))
            .reply(Err(CompletionError::Transport("timeout".to_string())));
        let manager = manager_with(&script)
            .with_history(BoxChatHistoryRepository::new(history.clone()));

        let mut persona = poet();
        persona.id = 42;
        let key = manager.select_persona(&persona).await;
        manager.send_message("你好").await.unwrap();
        manager.send_message("在吗").await.unwrap();

        let records = history.load_messages(&key).await.unwrap();
        let texts: Vec<_> = records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["你好", "你好，旅人", "在吗", "[系统错误: 网络请求失败: timeout]"]
        );
        assert!(records.iter().all(|r| r.persona_id == 42));
    }

    #[tokio::test]
    async fn history_is_restored_on_first_selection() {
        let history = MemoryHistory::default();
        let script = Script::default().reply(Ok("你好，旅人"));
        let first = manager_with(&script)
            .with_history(BoxChatHistoryRepository::new(history.clone()));
        first.select_persona(&poet()).await;
        first.send_message("你好").await.unwrap();

        let second = manager_with(&Script::default())
            .with_history(BoxChatHistoryRepository::new(history.clone()));
        let key = second.select_persona(&poet()).await;

        assert_eq!(
            second.transcript(&key),
            vec![Message::user("你好"), Message::assistant("你好，旅人")]
        );
        // Only the UI transcript is persisted.
        assert_eq!(second.turns(&key), vec![Turn::system(POET_PROMPT)]);
    }

    #[tokio::test]
    async fn reset_clears_history() {
        let history = MemoryHistory::default();
        let script = Script::default().reply(Ok("reply"));
        let manager = manager_with(&script)
            .with_history(BoxChatHistoryRepository::new(history.clone()));

        let key = manager.select_persona(&poet()).await;
        manager.send_message("hi").await.unwrap();
        assert_eq!(history.count(&key).await.unwrap(), 2);

        manager.reset(&key).await;
        assert_eq!(history.count(&key).await.unwrap(), 0);
    }
}
