use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;

pub const DEFAULT_CONVERSATION_TITLE: &str = "Nouvelle conversation";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Conversation {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Conversation list entry, carrying the content of its earliest message
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ConversationWithPreview {
    #[serde(flatten)]
    #[sqlx(flatten)]
    #[ts(flatten)]
    pub conversation: Conversation,
    pub first_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateConversation {
    pub title: Option<String>,
}

const CONVERSATION_COLUMNS: &str = "id, user_id, title, started_at, updated_at";

impl Conversation {
    pub async fn create(
        pool: &SqlitePool,
        user_id: i64,
        title: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_CONVERSATION_TITLE);
        sqlx::query_as::<_, Conversation>(&format!(
            r#"INSERT INTO chat_conversations (user_id, title)
               VALUES ($1, $2)
               RETURNING {CONVERSATION_COLUMNS}"#
        ))
        .bind(user_id)
        .bind(title)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_user_id_with_preview(
        pool: &SqlitePool,
        user_id: i64,
    ) -> Result<Vec<ConversationWithPreview>, sqlx::Error> {
        sqlx::query_as::<_, ConversationWithPreview>(
            r#"SELECT
                c.id,
                c.user_id,
                c.title,
                c.started_at,
                c.updated_at,
                (SELECT m.content FROM chat_messages m
                 WHERE m.conversation_id = c.id
                 ORDER BY m.timestamp ASC, m.id ASC
                 LIMIT 1) AS first_message
            FROM chat_conversations c
            WHERE c.user_id = $1
            ORDER BY c.updated_at DESC, c.id DESC"#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Conversation>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM chat_conversations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn update_title(
        pool: &SqlitePool,
        id: i64,
        user_id: i64,
        title: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Conversation>(&format!(
            r#"UPDATE chat_conversations
               SET title = $3, updated_at = datetime('now', 'subsec')
               WHERE id = $1 AND user_id = $2
               RETURNING {CONVERSATION_COLUMNS}"#
        ))
        .bind(id)
        .bind(user_id)
        .bind(title)
        .fetch_optional(pool)
        .await
    }

    /// Messages go with it through the foreign key cascade
    pub async fn delete(pool: &SqlitePool, id: i64, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM chat_conversations WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Bump `updated_at` so the conversation sorts first
    pub async fn touch(pool: &SqlitePool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE chat_conversations SET updated_at = datetime('now', 'subsec') WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chat_conversations")
            .fetch_one(pool)
            .await
    }

    pub async fn count_for_user(pool: &SqlitePool, user_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chat_conversations WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        message::{ChatMessage, MessageRole},
        test_support::{db, user},
    };

    #[tokio::test]
    async fn blank_title_gets_default() {
        let db = db().await;
        let parent = user(&db, "p@example.com").await;
        let conv = Conversation::create(&db.pool, parent.id, Some("  ")).await.unwrap();
        assert_eq!(conv.title, DEFAULT_CONVERSATION_TITLE);
    }

    #[tokio::test]
    async fn preview_is_earliest_message_and_touch_reorders() {
        let db = db().await;
        let parent = user(&db, "p@example.com").await;
        let first = Conversation::create(&db.pool, parent.id, Some("Devoirs")).await.unwrap();
        let second = Conversation::create(&db.pool, parent.id, None).await.unwrap();

        ChatMessage::create(&db.pool, first.id, MessageRole::User, "Bonjour").await.unwrap();
        ChatMessage::create(&db.pool, first.id, MessageRole::Ai, "Salut").await.unwrap();

        // Force a later timestamp than the second conversation's creation
        sqlx::query("UPDATE chat_conversations SET updated_at = datetime('now', '+1 minute') WHERE id = $1")
            .bind(first.id)
            .execute(&db.pool)
            .await
            .unwrap();

        let list = Conversation::find_by_user_id_with_preview(&db.pool, parent.id)
            .await
            .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].conversation.id, first.id);
        assert_eq!(list[0].first_message.as_deref(), Some("Bonjour"));
        assert_eq!(list[1].conversation.id, second.id);
        assert!(list[1].first_message.is_none());
    }

    #[tokio::test]
    async fn delete_is_owner_scoped_and_cascades() {
        let db = db().await;
        let parent = user(&db, "p@example.com").await;
        let other = user(&db, "o@example.com").await;
        let conv = Conversation::create(&db.pool, parent.id, None).await.unwrap();
        ChatMessage::create(&db.pool, conv.id, MessageRole::User, "Bonjour").await.unwrap();

        assert_eq!(Conversation::delete(&db.pool, conv.id, other.id).await.unwrap(), 0);
        assert_eq!(Conversation::delete(&db.pool, conv.id, parent.id).await.unwrap(), 1);
        assert!(
            ChatMessage::find_by_conversation_id(&db.pool, conv.id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn json_flattens_preview() {
        let db = db().await;
        let parent = user(&db, "p@example.com").await;
        Conversation::create(&db.pool, parent.id, None).await.unwrap();
        let list = Conversation::find_by_user_id_with_preview(&db.pool, parent.id)
            .await
            .unwrap();
        let json = serde_json::to_value(&list[0]).unwrap();
        assert_eq!(json["title"], DEFAULT_CONVERSATION_TITLE);
        assert!(json["first_message"].is_null());
    }
}
