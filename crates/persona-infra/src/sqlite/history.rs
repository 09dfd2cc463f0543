//! SQLite chat history repository implementation.
//!
//! Implements `ChatHistoryRepository` from `persona-core` using sqlx with
//! split read/write pools: raw queries, a private Row struct, writes on the
//! single-connection writer.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use uuid::Uuid;

use persona_core::chat::repository::ChatHistoryRepository;
use persona_types::error::RepositoryError;
use persona_types::history::ChatHistoryRecord;
use persona_types::persona::{PersonaKey, PersonaScope};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ChatHistoryRepository`.
pub struct SqliteChatHistoryRepository {
    pool: DatabasePool,
}

impl SqliteChatHistoryRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct ChatHistoryRow {
    message_id: String,
    persona_id: i64,
    persona_scope: String,
    persona_name: String,
    text: String,
    sent_by_user: bool,
    created_at: String,
}

impl ChatHistoryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            message_id: row.try_get("message_id")?,
            persona_id: row.try_get("persona_id")?,
            persona_scope: row.try_get("persona_scope")?,
            persona_name: row.try_get("persona_name")?,
            text: row.try_get("text")?,
            sent_by_user: row.try_get("sent_by_user")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_record(self) -> Result<ChatHistoryRecord, RepositoryError> {
        let message_id = Uuid::parse_str(&self.message_id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let persona_scope: PersonaScope = self
            .persona_scope
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let created_at = parse_datetime(&self.created_at)?;

        Ok(ChatHistoryRecord {
            message_id,
            persona_id: self.persona_id,
            persona_scope,
            persona_name: self.persona_name,
            text: self.text,
            sent_by_user: self.sent_by_user,
            created_at,
        })
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

// Fixed-width so that lexical order in SQLite matches chronological order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl ChatHistoryRepository for SqliteChatHistoryRepository {
    async fn save_message(&self, record: &ChatHistoryRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO chat_history (message_id, persona_id, persona_scope, persona_name, text, sent_by_user, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.message_id.to_string())
        .bind(record.persona_id)
        .bind(record.persona_scope.to_string())
        .bind(&record.persona_name)
        .bind(&record.text)
        .bind(record.sent_by_user)
        .bind(format_datetime(&record.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn load_messages(
        &self,
        key: &PersonaKey,
    ) -> Result<Vec<ChatHistoryRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM chat_history WHERE persona_scope = ? AND persona_name = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(key.scope.to_string())
        .bind(&key.name)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let history_row =
                ChatHistoryRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            records.push(history_row.into_record()?);
        }

        Ok(records)
    }

    async fn clear(&self, key: &PersonaKey) -> Result<u64, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM chat_history WHERE persona_scope = ? AND persona_name = ?")
                .bind(key.scope.to_string())
                .bind(&key.name)
                .execute(&self.pool.writer)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn count(&self, key: &PersonaKey) -> Result<u64, RepositoryError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM chat_history WHERE persona_scope = ? AND persona_name = ?",
        )
        .bind(key.scope.to_string())
        .bind(&key.name)
        .fetch_one(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let count: i64 = row
            .try_get("count")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(count as u64)
    }
}
