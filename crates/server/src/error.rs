use std::collections::BTreeMap;

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use services::services::{
    admin::AdminError, auth::AuthError, chatbot::ChatbotError,
    document_import::DocumentImportError, homework::HomeworkError,
};
use thiserror::Error;
use tracing::{debug, error};
use utils::{jwt::JwtError, response::ApiResponse};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Admin(#[from] AdminError),
    #[error(transparent)]
    Chatbot(#[from] ChatbotError),
    #[error(transparent)]
    Homework(#[from] HomeworkError),
    #[error(transparent)]
    DocumentImport(#[from] DocumentImportError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(error = %rejection, "rejected request body");
        ApiError::BadRequest("Données invalides".to_string())
    }
}

fn envelope(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::error(message))).into_response()
}

fn validation(errors: BTreeMap<String, String>) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse::<()>::validation(errors)),
    )
        .into_response()
}

fn internal(err: &dyn std::error::Error) -> Response {
    error!(error = %err, "request failed");
    envelope(StatusCode::INTERNAL_SERVER_ERROR, "Erreur serveur")
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Auth(err) => match err {
                AuthError::Validation(errors) => validation(errors),
                AuthError::EmailTaken => envelope(StatusCode::CONFLICT, err.to_string()),
                AuthError::InvalidCredentials | AuthError::Token(_) => {
                    envelope(StatusCode::UNAUTHORIZED, err.to_string())
                }
                AuthError::UserNotFound => envelope(StatusCode::NOT_FOUND, err.to_string()),
                AuthError::Hash(_) | AuthError::Database(_) => internal(&err),
            },
            ApiError::Jwt(err) => envelope(StatusCode::UNAUTHORIZED, err.to_string()),
            ApiError::Admin(err) => match err {
                AdminError::SelfDeletion => envelope(StatusCode::BAD_REQUEST, err.to_string()),
                AdminError::UserNotFound => envelope(StatusCode::NOT_FOUND, err.to_string()),
                AdminError::Database(_) => internal(&err),
            },
            // The chatbot speaks the `{ "error": ... }` shape the widget expects
            ApiError::Chatbot(err) => {
                let status = match err {
                    ChatbotError::MissingQuestion => StatusCode::BAD_REQUEST,
                    ChatbotError::Ollama(_) | ChatbotError::Database(_) => {
                        error!(error = %err, "chatbot request failed");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, Json(json!({ "error": err.to_string() }))).into_response()
            }
            // Portal passthrough keeps the portal-era response shapes
            ApiError::Homework(err) => match err {
                HomeworkError::InvalidJson { ref raw_response } => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": err.to_string(), "raw_response": raw_response })),
                )
                    .into_response(),
                HomeworkError::Upstream { status, ref body } => (
                    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                    Json(json!({
                        "error": err.to_string(),
                        "status": status,
                        "upstream_response": body,
                    })),
                )
                    .into_response(),
                HomeworkError::NotFound(message) => (StatusCode::NOT_FOUND, message).into_response(),
                HomeworkError::Transport(_) => {
                    error!(error = %err, "homework portal unreachable");
                    (StatusCode::BAD_GATEWAY, Json(json!({ "error": err.to_string() })))
                        .into_response()
                }
                HomeworkError::Url(_) => internal(&err),
            },
            ApiError::DocumentImport(err) => internal(&err),
            ApiError::Database(err) => internal(&err),
            ApiError::BadRequest(message) => envelope(StatusCode::BAD_REQUEST, message),
            ApiError::Unauthorized(message) => envelope(StatusCode::UNAUTHORIZED, message),
            ApiError::Forbidden(message) => envelope(StatusCode::FORBIDDEN, message),
            ApiError::NotFound(message) => envelope(StatusCode::NOT_FOUND, message),
        }
    }
}
