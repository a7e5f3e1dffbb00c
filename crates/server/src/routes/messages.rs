use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    conversation::Conversation,
    message::{ChatMessage, MessageRole},
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::debug;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, extract::ApiJson, middleware::AuthUser};

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub conversation_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct CreateMessagePayload {
    pub conversation_id: Option<i64>,
    pub role: Option<String>,
    pub content: Option<String>,
}

impl CreateMessagePayload {
    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.conversation_id.is_none() {
            missing.push("conversation_id");
        }
        if self.role.as_deref().is_none_or(|r| r.trim().is_empty()) {
            missing.push("role");
        }
        if self.content.as_deref().is_none_or(|c| c.trim().is_empty()) {
            missing.push("content");
        }
        missing
    }
}

/// 403 unless the conversation exists and belongs to `user_id`
async fn ensure_owned(
    pool: &SqlitePool,
    conversation_id: i64,
    user_id: i64,
) -> Result<Conversation, ApiError> {
    Conversation::find_by_id(pool, conversation_id)
        .await?
        .filter(|c| c.user_id == user_id)
        .ok_or_else(|| {
            debug!(conversation_id, user_id, "conversation not owned by caller");
            ApiError::Forbidden("Accès non autorisé à cette conversation".to_string())
        })
}

pub async fn list_messages(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Query(query): Query<MessageQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<ChatMessage>>>, ApiError> {
    let conversation_id = query
        .conversation_id
        .ok_or_else(|| ApiError::BadRequest("ID de conversation requis".to_string()))?;
    let pool = &deployment.db().pool;
    ensure_owned(pool, conversation_id, user.id()).await?;

    let messages = ChatMessage::find_by_conversation_id(pool, conversation_id).await?;
    Ok(ResponseJson(ApiResponse::success(messages)))
}

pub async fn create_message(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    ApiJson(payload): ApiJson<CreateMessagePayload>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<ChatMessage>>), ApiError> {
    let missing = payload.missing_fields();
    if !missing.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Données manquantes : {}",
            missing.join(", ")
        )));
    }
    let (Some(conversation_id), Some(role), Some(content)) =
        (payload.conversation_id, payload.role, payload.content)
    else {
        return Err(ApiError::BadRequest("Données invalides".to_string()));
    };
    let role: MessageRole = role
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Rôle invalide : {role}")))?;

    let pool = &deployment.db().pool;
    ensure_owned(pool, conversation_id, user.id()).await?;

    let message = ChatMessage::create(pool, conversation_id, role, &content).await?;
    Conversation::touch(pool, conversation_id).await?;

    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success_with_message(
            message,
            "Message enregistré",
        )),
    ))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/messages", get(list_messages).post(create_message))
}
