use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "message_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MessageRole {
    User,
    #[serde(alias = "assistant", alias = "bot")]
    #[strum(to_string = "ai", serialize = "assistant", serialize = "bot")]
    Ai,
    System,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ChatMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

const MESSAGE_COLUMNS: &str = "id, conversation_id, role, content, timestamp";

impl ChatMessage {
    pub async fn create(
        pool: &SqlitePool,
        conversation_id: i64,
        role: MessageRole,
        content: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ChatMessage>(&format!(
            r#"INSERT INTO chat_messages (conversation_id, role, content)
               VALUES ($1, $2, $3)
               RETURNING {MESSAGE_COLUMNS}"#
        ))
        .bind(conversation_id)
        .bind(role)
        .bind(content)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_conversation_id(
        pool: &SqlitePool,
        conversation_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ChatMessage>(&format!(
            r#"SELECT {MESSAGE_COLUMNS}
               FROM chat_messages
               WHERE conversation_id = $1
               ORDER BY timestamp ASC, id ASC"#
        ))
        .bind(conversation_id)
        .fetch_all(pool)
        .await
    }

    /// Messages the user typed, across every conversation they own
    pub async fn count_user_messages_for_user(
        pool: &SqlitePool,
        user_id: i64,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*)
               FROM chat_messages m
               JOIN chat_conversations c ON c.id = m.conversation_id
               WHERE c.user_id = $1 AND m.role = 'user'"#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }
}
