use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State, rejection::JsonRejection},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use services::services::chatbot::{ChatbotError, ChatbotRequest, PreparedChat};
use tracing::{debug, info};

use crate::{DeploymentImpl, error::ApiError, middleware::OptionalAuthUser};

const NDJSON: &str = "application/x-ndjson";

#[derive(Debug, Deserialize)]
pub struct ChatbotQuery {
    pub question: Option<String>,
    pub conversation_id: Option<i64>,
    #[serde(default)]
    pub stream: bool,
}

impl From<ChatbotQuery> for ChatbotRequest {
    fn from(query: ChatbotQuery) -> Self {
        ChatbotRequest {
            conversation_id: query.conversation_id,
            stream: query.stream,
            question: query.question,
            ..Default::default()
        }
    }
}

async fn respond(
    deployment: &DeploymentImpl,
    caller: OptionalAuthUser,
    request: ChatbotRequest,
) -> Result<Response, ApiError> {
    let chatbot = deployment.chatbot();
    let chat: PreparedChat = chatbot.prepare(request).await?;
    info!(
        conversation_id = ?chat.conversation_id,
        stream = chat.stream,
        turns = chat.messages.len(),
        "chatbot request"
    );

    if chat.stream {
        let stream = chatbot.stream(chat, caller.id()).await?;
        Ok(([(header::CONTENT_TYPE, NDJSON)], Body::from_stream(stream)).into_response())
    } else {
        let body = chatbot.complete(chat, caller.id()).await?;
        Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
    }
}

/// GET /api/chatbot?question=...
pub async fn ask(
    State(deployment): State<DeploymentImpl>,
    caller: OptionalAuthUser,
    Query(query): Query<ChatbotQuery>,
) -> Result<Response, ApiError> {
    respond(&deployment, caller, query.into()).await
}

/// POST /api/chatbot with the chat history. An unreadable body counts as no question.
pub async fn chat(
    State(deployment): State<DeploymentImpl>,
    caller: OptionalAuthUser,
    payload: Result<Json<ChatbotRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        debug!(error = %rejection, "unreadable chatbot body");
        ChatbotError::MissingQuestion
    })?;
    respond(&deployment, caller, request).await
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/chatbot", get(ask).post(chat))
}
