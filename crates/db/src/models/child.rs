use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "gender", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Gender {
    // The Angular forms send the French labels
    #[serde(alias = "garçon", alias = "garcon")]
    Boy,
    #[serde(alias = "fille")]
    Girl,
    Other,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Child {
    pub id: i64,
    pub user_id: i64, // Foreign key to User
    pub first_name: String,
    pub last_name: Option<String>,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub school_year: Option<String>,
    pub school_name: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Validated child fields, used by both create and update
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ChildData {
    pub first_name: String,
    pub last_name: Option<String>,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub school_year: Option<String>,
    pub school_name: Option<String>,
    pub address: Option<String>,
}

/// Raw request body: `id` present means update, absent means create
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpsertChild {
    pub id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub school_year: Option<String>,
    pub school_name: Option<String>,
    pub address: Option<String>,
}

impl UpsertChild {
    /// Split into the optional id and the validated fields; `None` when a required field is missing
    pub fn into_parts(self) -> Option<(Option<i64>, ChildData)> {
        let first_name = self.first_name.filter(|name| !name.trim().is_empty())?;
        Some((
            self.id,
            ChildData {
                first_name,
                last_name: self.last_name,
                birth_date: self.birth_date?,
                gender: self.gender?,
                school_year: self.school_year,
                school_name: self.school_name,
                address: self.address,
            },
        ))
    }
}

const CHILD_COLUMNS: &str = "id, user_id, first_name, last_name, birth_date, gender, school_year, school_name, address, created_at";

impl Child {
    pub async fn find_by_user_id(pool: &SqlitePool, user_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Child>(&format!(
            "SELECT {CHILD_COLUMNS} FROM children WHERE user_id = $1 ORDER BY first_name COLLATE NOCASE ASC, id ASC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &SqlitePool,
        id: i64,
        user_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Child>(&format!(
            "SELECT {CHILD_COLUMNS} FROM children WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        user_id: i64,
        data: &ChildData,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Child>(&format!(
            r#"INSERT INTO children (user_id, first_name, last_name, birth_date, gender, school_year, school_name, address)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING {CHILD_COLUMNS}"#
        ))
        .bind(user_id)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(data.birth_date)
        .bind(data.gender)
        .bind(&data.school_year)
        .bind(&data.school_name)
        .bind(&data.address)
        .fetch_one(pool)
        .await
    }

    /// Returns `None` when the child does not exist or belongs to another user
    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        user_id: i64,
        data: &ChildData,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Child>(&format!(
            r#"UPDATE children
               SET first_name = $3,
                   last_name = $4,
                   birth_date = $5,
                   gender = $6,
                   school_year = $7,
                   school_name = $8,
                   address = $9
               WHERE id = $1 AND user_id = $2
               RETURNING {CHILD_COLUMNS}"#
        ))
        .bind(id)
        .bind(user_id)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(data.birth_date)
        .bind(data.gender)
        .bind(&data.school_year)
        .bind(&data.school_name)
        .bind(&data.address)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: i64, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM children WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM children")
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{db, user};

    fn data(first_name: &str) -> ChildData {
        ChildData {
            first_name: first_name.to_string(),
            last_name: None,
            birth_date: NaiveDate::from_ymd_opt(2016, 3, 14).unwrap(),
            gender: Gender::Girl,
            school_year: Some("CE2".to_string()),
            school_name: None,
            address: None,
        }
    }

    #[test]
    fn french_gender_labels_deserialize() {
        let boy: Gender = serde_json::from_str("\"garçon\"").unwrap();
        let girl: Gender = serde_json::from_str("\"fille\"").unwrap();
        assert_eq!(boy, Gender::Boy);
        assert_eq!(girl, Gender::Girl);
    }

    #[test]
    fn upsert_requires_name_birth_date_and_gender() {
        let missing_gender = UpsertChild {
            first_name: Some("Lina".into()),
            birth_date: NaiveDate::from_ymd_opt(2016, 3, 14),
            ..Default::default()
        };
        assert!(missing_gender.into_parts().is_none());

        let blank_name = UpsertChild {
            first_name: Some("  ".into()),
            birth_date: NaiveDate::from_ymd_opt(2016, 3, 14),
            gender: Some(Gender::Girl),
            ..Default::default()
        };
        assert!(blank_name.into_parts().is_none());
    }

    #[tokio::test]
    async fn children_are_scoped_and_sorted() {
        let db = db().await;
        let parent = user(&db, "parent@example.com").await;
        let other = user(&db, "other@example.com").await;

        Child::create(&db.pool, parent.id, &data("Yasmine")).await.unwrap();
        Child::create(&db.pool, parent.id, &data("Adam")).await.unwrap();
        let foreign = Child::create(&db.pool, other.id, &data("Omar")).await.unwrap();

        let names: Vec<_> = Child::find_by_user_id(&db.pool, parent.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.first_name)
            .collect();
        assert_eq!(names, vec!["Adam", "Yasmine"]);

        assert!(
            Child::find_by_id(&db.pool, foreign.id, parent.id)
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(Child::delete(&db.pool, foreign.id, parent.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn first_names_sort_ignoring_case() {
        let db = db().await;
        let parent = user(&db, "parent@example.com").await;
        for name in ["Yasmine", "bilal", "Adam"] {
            Child::create(&db.pool, parent.id, &data(name)).await.unwrap();
        }

        let names: Vec<_> = Child::find_by_user_id(&db.pool, parent.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.first_name)
            .collect();
        assert_eq!(names, vec!["Adam", "bilal", "Yasmine"]);
    }

    #[tokio::test]
    async fn update_rewrites_fields() {
        let db = db().await;
        let parent = user(&db, "parent@example.com").await;
        let child = Child::create(&db.pool, parent.id, &data("Adam")).await.unwrap();

        let mut changed = data("Adam");
        changed.gender = Gender::Boy;
        changed.school_name = Some("École Ibn Khaldoun".into());
        let updated = Child::update(&db.pool, child.id, parent.id, &changed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.gender, Gender::Boy);
        assert_eq!(updated.school_name.as_deref(), Some("École Ibn Khaldoun"));
        assert_eq!(updated.birth_date, child.birth_date);
    }
}
