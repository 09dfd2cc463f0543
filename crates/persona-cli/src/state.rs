//! Application state wiring config, personas, and storage together.

use std::path::PathBuf;

use anyhow::Context;

use persona_core::chat::manager::{ChatSessionManager, SessionSettings};
use persona_core::chat::repository::BoxChatHistoryRepository;
use persona_core::llm::box_client::BoxCompletionClient;
use persona_core::post::generator::PostGenerator;
use persona_infra::config::{find_persona, load_config, load_personas, resolve_data_dir};
use persona_infra::llm::create_client;
use persona_infra::secret::resolve_api_key;
use persona_infra::sqlite::history::SqliteChatHistoryRepository;
use persona_infra::sqlite::pool::{DatabasePool, database_url};
use persona_types::config::ChatConfig;
use persona_types::error::ChatError;
use persona_types::persona::{Persona, PersonaKey};

/// Everything a CLI command needs.
pub struct AppState {
    pub data_dir: PathBuf,
    pub config: ChatConfig,
    pub personas: Vec<Persona>,
    /// `None` when `persist_history` is off.
    pub db_pool: Option<DatabasePool>,
}

impl AppState {
    /// Initialize from the resolved data directory.
    pub async fn init() -> anyhow::Result<Self> {
        Self::init_in(resolve_data_dir()).await
    }

    pub async fn init_in(data_dir: PathBuf) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let config = load_config(&data_dir).await;
        let personas = load_personas(&data_dir).await?;

        let db_pool = if config.persist_history {
            Some(DatabasePool::new(&database_url(&data_dir)).await?)
        } else {
            None
        };

        tracing::debug!(
            data_dir = %data_dir.display(),
            personas = personas.len(),
            persist_history = config.persist_history,
            "app state ready"
        );

        Ok(Self {
            data_dir,
            config,
            personas,
            db_pool,
        })
    }

    pub fn history_repo(&self) -> Option<SqliteChatHistoryRepository> {
        self.db_pool.clone().map(SqliteChatHistoryRepository::new)
    }

    /// History repository, or an error explaining how to enable it.
    pub fn require_history(&self) -> anyhow::Result<SqliteChatHistoryRepository> {
        self.history_repo().ok_or_else(|| {
            anyhow::anyhow!("chat history is disabled (persist_history = false in config.toml)")
        })
    }

    /// Look up a persona from personas.toml.
    pub fn persona(&self, key: &PersonaKey) -> Result<Persona, ChatError> {
        find_persona(&self.personas, key)
            .cloned()
            .ok_or_else(|| ChatError::PersonaNotFound(key.to_string()))
    }

    /// Completion client for the configured provider.
    pub fn build_client(&self) -> anyhow::Result<BoxCompletionClient> {
        let env = &self.config.api_key_env;
        let api_key = resolve_api_key(env)
            .ok_or_else(|| anyhow::anyhow!("{env} is not set. Export your API key: export {env}=sk-..."))?;

        Ok(create_client(&self.config, api_key)?)
    }

    /// Build a session manager talking to the configured provider.
    pub fn build_manager(&self) -> anyhow::Result<ChatSessionManager> {
        let client = self.build_client()?;
        let mut manager = ChatSessionManager::new(client, SessionSettings::from_config(&self.config));
        if let Some(repo) = self.history_repo() {
            manager = manager.with_history(BoxChatHistoryRepository::new(repo));
        }
        Ok(manager)
    }

    pub fn build_post_generator(&self) -> anyhow::Result<PostGenerator> {
        Ok(PostGenerator::new(self.build_client()?, self.config.locale))
    }
}
