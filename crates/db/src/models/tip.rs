use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;

pub const DEFAULT_TIP_ICON: &str = "💡";
pub const DEFAULT_TIP_COLOR: &str = "gradient-default";

/// Category value meaning "no filter" on the public listing
pub const ALL_CATEGORIES: &str = "all";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Tip {
    pub id: i64,
    pub category: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct TipData {
    pub category: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub color: String,
}

/// Raw admin request body
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct TipPayload {
    pub id: Option<i64>,
    pub category: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
}

impl TipPayload {
    /// Names of the required fields that are missing or blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("category", &self.category),
            ("title", &self.title),
            ("description", &self.description),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect()
    }

    /// Validated data with icon and color defaults applied
    pub fn into_data(self) -> Option<TipData> {
        let non_blank = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        Some(TipData {
            category: non_blank(self.category)?,
            title: non_blank(self.title)?,
            description: non_blank(self.description)?,
            icon: non_blank(self.icon).unwrap_or_else(|| DEFAULT_TIP_ICON.to_string()),
            color: non_blank(self.color).unwrap_or_else(|| DEFAULT_TIP_COLOR.to_string()),
        })
    }
}

const TIP_COLUMNS: &str = "id, category, title, description, icon, color, created_at, updated_at";

impl Tip {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tip>(&format!(
            "SELECT {TIP_COLUMNS} FROM tips ORDER BY category ASC, id ASC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_category(
        pool: &SqlitePool,
        category: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tip>(&format!(
            "SELECT {TIP_COLUMNS} FROM tips WHERE category = $1 ORDER BY id ASC"
        ))
        .bind(category)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tip>(&format!("SELECT {TIP_COLUMNS} FROM tips WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(pool: &SqlitePool, data: &TipData) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Tip>(&format!(
            r#"INSERT INTO tips (category, title, description, icon, color)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {TIP_COLUMNS}"#
        ))
        .bind(&data.category)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.icon)
        .bind(&data.color)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        data: &TipData,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tip>(&format!(
            r#"UPDATE tips
               SET category = $2,
                   title = $3,
                   description = $4,
                   icon = $5,
                   color = $6,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {TIP_COLUMNS}"#
        ))
        .bind(id)
        .bind(&data.category)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.icon)
        .bind(&data.color)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tips WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::db;

    fn payload(category: &str, title: &str) -> TipPayload {
        TipPayload {
            category: Some(category.into()),
            title: Some(title.into()),
            description: Some("Lire 10 minutes par jour".into()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_fill_icon_and_color() {
        let data = payload("lecture", "Lire").into_data().unwrap();
        assert_eq!(data.icon, DEFAULT_TIP_ICON);
        assert_eq!(data.color, DEFAULT_TIP_COLOR);
    }

    #[test]
    fn missing_fields_are_listed() {
        let empty = TipPayload {
            title: Some(" ".into()),
            ..Default::default()
        };
        assert_eq!(empty.missing_fields(), vec!["category", "title", "description"]);
        assert!(empty.into_data().is_none());
    }

    #[tokio::test]
    async fn listing_orders_and_filters() {
        let db = db().await;
        for (category, title) in [("sommeil", "A"), ("lecture", "B"), ("sommeil", "C")] {
            let data = payload(category, title).into_data().unwrap();
            Tip::create(&db.pool, &data).await.unwrap();
        }

        let all: Vec<_> = Tip::find_all(&db.pool)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(all, vec!["B", "A", "C"]);

        let sleep: Vec<_> = Tip::find_by_category(&db.pool, "sommeil")
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(sleep, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn update_and_delete_missing_tip() {
        let db = db().await;
        let data = payload("lecture", "Lire").into_data().unwrap();
        assert!(Tip::update(&db.pool, 42, &data).await.unwrap().is_none());
        assert_eq!(Tip::delete(&db.pool, 42).await.unwrap(), 0);

        let tip = Tip::create(&db.pool, &data).await.unwrap();
        let mut changed = data.clone();
        changed.title = "Lire ensemble".into();
        let updated = Tip::update(&db.pool, tip.id, &changed).await.unwrap().unwrap();
        assert_eq!(updated.title, "Lire ensemble");
        assert!(updated.updated_at >= tip.updated_at);
    }
}
