//! Startup check that the schema the API relies on is actually there.

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

/// Tables every route expects to find
pub const REQUIRED_TABLES: [&str; 7] = [
    "users",
    "children",
    "tips",
    "chat_conversations",
    "chat_messages",
    "document_chunks",
    "admin_logs",
];

#[derive(Debug, Error)]
pub enum DatabaseValidationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("missing tables: {}", .0.join(", "))]
    MissingTables(Vec<String>),
}

pub struct DatabaseValidator {
    pool: SqlitePool,
}

impl DatabaseValidator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Count applied migrations and look for every required table
    pub async fn validate(&self) -> Result<ValidationResult, DatabaseValidationError> {
        let migrations_table_exists = self.table_exists("_sqlx_migrations").await?;
        let migrations_applied = if migrations_table_exists {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
                .fetch_one(&self.pool)
                .await?
        } else {
            warn!("_sqlx_migrations table does not exist");
            0
        };

        let missing_tables = self.missing_tables(&REQUIRED_TABLES).await?;
        let result = ValidationResult {
            migrations_applied: migrations_applied as usize,
            missing_tables,
            latest_migration: self.latest_migration().await?,
        };

        if result.is_ok() {
            info!(
                migrations_applied = result.migrations_applied,
                latest = result.latest_migration.as_deref().unwrap_or("none"),
                "Database validation complete"
            );
        } else {
            warn!("{}", result.summary());
        }
        Ok(result)
    }

    /// Same as `validate`, but a missing table is an error
    pub async fn require_schema(&self) -> Result<ValidationResult, DatabaseValidationError> {
        let result = self.validate().await?;
        if !result.missing_tables.is_empty() {
            return Err(DatabaseValidationError::MissingTables(result.missing_tables));
        }
        Ok(result)
    }

    pub async fn missing_tables(
        &self,
        required_tables: &[&str],
    ) -> Result<Vec<String>, DatabaseValidationError> {
        let mut missing = Vec::new();
        for table in required_tables {
            if !self.table_exists(table).await? {
                missing.push(table.to_string());
            }
        }
        Ok(missing)
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DatabaseValidationError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = $1",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn latest_migration(&self) -> Result<Option<String>, DatabaseValidationError> {
        if !self.table_exists("_sqlx_migrations").await? {
            return Ok(None);
        }
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT description FROM _sqlx_migrations WHERE success = 1 ORDER BY version DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub migrations_applied: usize,
    pub missing_tables: Vec<String>,
    pub latest_migration: Option<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.migrations_applied > 0 && self.missing_tables.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.migrations_applied == 0 {
            "Database not initialized - migrations need to be run".to_string()
        } else if !self.missing_tables.is_empty() {
            format!("Database is missing tables: {}", self.missing_tables.join(", "))
        } else {
            format!("Database OK - {} migrations applied", self.migrations_applied)
        }
    }
}
