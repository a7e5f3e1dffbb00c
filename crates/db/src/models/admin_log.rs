use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AdminLog {
    pub id: i64,
    pub admin_id: i64,
    pub action: String,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AdminLogWithAdmin {
    #[serde(flatten)]
    #[sqlx(flatten)]
    #[ts(flatten)]
    pub log: AdminLog,
    pub admin_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateAdminLog {
    pub admin_id: i64,
    pub action: String,
    pub details: Option<String>,
    pub ip_address: Option<String>,
}

impl AdminLog {
    pub async fn create(pool: &SqlitePool, data: &CreateAdminLog) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AdminLog>(
            r#"INSERT INTO admin_logs (admin_id, action, details, ip_address)
               VALUES ($1, $2, $3, $4)
               RETURNING id, admin_id, action, details, ip_address, created_at"#,
        )
        .bind(data.admin_id)
        .bind(&data.action)
        .bind(&data.details)
        .bind(&data.ip_address)
        .fetch_one(pool)
        .await
    }

    /// Most recent entries first, with the acting admin's name
    pub async fn find_recent(
        pool: &SqlitePool,
        limit: i64,
    ) -> Result<Vec<AdminLogWithAdmin>, sqlx::Error> {
        sqlx::query_as::<_, AdminLogWithAdmin>(
            r#"SELECT
                l.id,
                l.admin_id,
                l.action,
                l.details,
                l.ip_address,
                l.created_at,
                u.name AS admin_name
            FROM admin_logs l
            LEFT JOIN users u ON u.id = l.admin_id
            ORDER BY l.created_at DESC, l.id DESC
            LIMIT $1"#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
