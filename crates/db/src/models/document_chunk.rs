use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// One line of an imported document with its embedding stored as a JSON array
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: i64,
    pub content: String,
    pub embedding: String,
    pub source_file: String,
    pub created_at: DateTime<Utc>,
}

impl DocumentChunk {
    /// Decode the stored embedding; `None` when it is not a JSON array of numbers
    pub fn embedding_vector(&self) -> Option<Vec<f64>> {
        serde_json::from_str(&self.embedding).ok()
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, DocumentChunk>(
            "SELECT id, content, embedding, source_file, created_at FROM document_chunks ORDER BY id ASC",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        content: &str,
        embedding: &[f64],
        source_file: &str,
    ) -> Result<Self, sqlx::Error> {
        let embedding =
            serde_json::to_string(embedding).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        sqlx::query_as::<_, DocumentChunk>(
            r#"INSERT INTO document_chunks (content, embedding, source_file)
               VALUES ($1, $2, $3)
               RETURNING id, content, embedding, source_file, created_at"#,
        )
        .bind(content)
        .bind(embedding)
        .bind(source_file)
        .fetch_one(pool)
        .await
    }

    pub async fn delete_all(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM document_chunks")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM document_chunks")
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::db;

    #[tokio::test]
    async fn stores_embedding_as_json() {
        let db = db().await;
        let chunk = DocumentChunk::create(&db.pool, "Horaires: 8h-16h", &[0.5, -1.0], "ecole.txt")
            .await
            .unwrap();
        assert_eq!(chunk.embedding_vector(), Some(vec![0.5, -1.0]));
        assert_eq!(DocumentChunk::count(&db.pool).await.unwrap(), 1);

        assert_eq!(DocumentChunk::delete_all(&db.pool).await.unwrap(), 1);
        assert!(DocumentChunk::find_all(&db.pool).await.unwrap().is_empty());
    }

    #[test]
    fn garbage_embedding_decodes_to_none() {
        let chunk = DocumentChunk {
            id: 1,
            content: "x".into(),
            embedding: "not json".into(),
            source_file: "a.txt".into(),
            created_at: Utc::now(),
        };
        assert!(chunk.embedding_vector().is_none());
    }
}
