//! Admin panel queries and the audit trail in `admin_logs`.

use db::{
    DBService,
    models::{
        admin_log::{AdminLog, AdminLogWithAdmin, CreateAdminLog},
        child::Child,
        conversation::Conversation,
        message::ChatMessage,
        user::{User, UserProfile, UserSummary},
    },
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;

pub const RECENT_LOGS_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Impossible de se supprimer soi-même")]
    SelfDeletion,
    #[error("Utilisateur non trouvé")]
    UserNotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AdminStats {
    pub users: i64,
    pub children: i64,
    pub conversations: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UserActivityStats {
    pub conversations_count: i64,
    pub messages_sent_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UserDetails {
    pub profile: UserProfile,
    pub children: Vec<Child>,
    pub stats: UserActivityStats,
}

/// Who did it and from where, for the audit trail
#[derive(Debug, Clone)]
pub struct AdminActor {
    pub admin_id: i64,
    pub ip_address: Option<String>,
}

#[derive(Clone)]
pub struct AdminService {
    db: DBService,
}

impl AdminService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    pub async fn stats(&self) -> Result<AdminStats, AdminError> {
        Ok(AdminStats {
            users: User::count(&self.db.pool).await?,
            children: Child::count(&self.db.pool).await?,
            conversations: Conversation::count(&self.db.pool).await?,
        })
    }

    /// Everyone except the calling admin
    pub async fn users(&self, admin_id: i64) -> Result<Vec<UserSummary>, AdminError> {
        Ok(User::find_summaries_excluding(&self.db.pool, admin_id).await?)
    }

    pub async fn user_details(&self, user_id: i64) -> Result<UserDetails, AdminError> {
        let user = User::find_by_id(&self.db.pool, user_id)
            .await?
            .ok_or(AdminError::UserNotFound)?;
        let children = Child::find_by_user_id(&self.db.pool, user_id).await?;
        let stats = UserActivityStats {
            conversations_count: Conversation::count_for_user(&self.db.pool, user_id).await?,
            messages_sent_count: ChatMessage::count_user_messages_for_user(&self.db.pool, user_id)
                .await?,
        };
        Ok(UserDetails {
            profile: user.into(),
            children,
            stats,
        })
    }

    pub async fn delete_user(&self, actor: &AdminActor, user_id: i64) -> Result<(), AdminError> {
        if user_id == actor.admin_id {
            return Err(AdminError::SelfDeletion);
        }
        let user = User::find_by_id(&self.db.pool, user_id)
            .await?
            .ok_or(AdminError::UserNotFound)?;
        User::delete(&self.db.pool, user_id).await?;
        info!(admin_id = actor.admin_id, user_id, "user deleted by admin");

        self.record(
            actor,
            "delete_user",
            Some(format!("Suppression de l'utilisateur {} ({})", user.name, user.email)),
        )
        .await;
        Ok(())
    }

    pub async fn recent_logs(&self) -> Result<Vec<AdminLogWithAdmin>, AdminError> {
        Ok(AdminLog::find_recent(&self.db.pool, RECENT_LOGS_LIMIT).await?)
    }

    /// Append to the audit trail. A failed write is logged and otherwise ignored.
    pub async fn record(&self, actor: &AdminActor, action: &str, details: Option<String>) {
        let entry = CreateAdminLog {
            admin_id: actor.admin_id,
            action: action.to_string(),
            details,
            ip_address: actor.ip_address.clone(),
        };
        if let Err(e) = AdminLog::create(&self.db.pool, &entry).await {
            warn!(admin_id = actor.admin_id, action, error = %e, "failed to write admin log");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use db::models::{
        child::{ChildData, Gender},
        message::MessageRole,
        user::{CreateUser, UserRole},
    };

    use super::*;

    async fn user(db: &DBService, email: &str, role: UserRole) -> User {
        User::create(
            &db.pool,
            &CreateUser {
                name: email.split('@').next().unwrap_or_default().to_string(),
                email: email.to_string(),
                password_hash: "hash".into(),
                phone: None,
                role,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn details_count_only_user_messages() {
        let db = DBService::new_in_memory().await.unwrap();
        let admin = AdminService::new(db.clone());
        let parent = user(&db, "parent@example.com", UserRole::User).await;

        Child::create(
            &db.pool,
            parent.id,
            &ChildData {
                first_name: "Adam".into(),
                last_name: None,
                birth_date: NaiveDate::from_ymd_opt(2015, 9, 1).unwrap(),
                gender: Gender::Boy,
                school_year: None,
                school_name: None,
                address: None,
            },
        )
        .await
        .unwrap();
        let conv = Conversation::create(&db.pool, parent.id, None).await.unwrap();
        ChatMessage::create(&db.pool, conv.id, MessageRole::User, "Q").await.unwrap();
        ChatMessage::create(&db.pool, conv.id, MessageRole::Ai, "R").await.unwrap();

        let details = admin.user_details(parent.id).await.unwrap();
        assert_eq!(details.children.len(), 1);
        assert_eq!(details.stats.conversations_count, 1);
        assert_eq!(details.stats.messages_sent_count, 1);

        let stats = admin.stats().await.unwrap();
        assert_eq!((stats.users, stats.children, stats.conversations), (1, 1, 1));

        assert!(matches!(
            admin.user_details(999).await,
            Err(AdminError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn delete_refuses_self_and_logs_action() {
        let db = DBService::new_in_memory().await.unwrap();
        let admin = AdminService::new(db.clone());
        let boss = user(&db, "boss@example.com", UserRole::Admin).await;
        let parent = user(&db, "parent@example.com", UserRole::User).await;
        let actor = AdminActor {
            admin_id: boss.id,
            ip_address: Some("10.0.0.1".into()),
        };

        assert!(matches!(
            admin.delete_user(&actor, boss.id).await,
            Err(AdminError::SelfDeletion)
        ));
        admin.delete_user(&actor, parent.id).await.unwrap();
        assert!(matches!(
            admin.delete_user(&actor, parent.id).await,
            Err(AdminError::UserNotFound)
        ));

        let logs = admin.recent_logs().await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].log.action, "delete_user");
        assert_eq!(logs[0].log.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(logs[0].admin_name.as_deref(), Some("boss"));
        assert!(admin.users(boss.id).await.unwrap().is_empty());
    }
}
