use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::models::conversation::{Conversation, ConversationWithPreview, CreateConversation};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, extract::ApiJson, middleware::AuthUser};

const NOT_FOUND: &str = "Conversation non trouvée";

pub async fn list_conversations(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
) -> Result<ResponseJson<ApiResponse<Vec<ConversationWithPreview>>>, ApiError> {
    let conversations =
        Conversation::find_by_user_id_with_preview(&deployment.db().pool, user.id()).await?;
    Ok(ResponseJson(ApiResponse::success(conversations)))
}

pub async fn create_conversation(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    body: Bytes,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Conversation>>), ApiError> {
    // The body is optional here; an empty one means the default title
    let payload: CreateConversation = if body.iter().all(u8::is_ascii_whitespace) {
        CreateConversation::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|_| ApiError::BadRequest("Données invalides".to_string()))?
    };
    let title = payload.title;
    let conversation =
        Conversation::create(&deployment.db().pool, user.id(), title.as_deref()).await?;
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success_with_message(
            conversation,
            "Conversation créée",
        )),
    ))
}

pub async fn rename_conversation(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<CreateConversation>,
) -> Result<ResponseJson<ApiResponse<Conversation>>, ApiError> {
    let title = payload
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Titre requis".to_string()))?;
    let conversation = Conversation::update_title(&deployment.db().pool, id, user.id(), title)
        .await?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        conversation,
        "Conversation renommée",
    )))
}

pub async fn delete_conversation(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if Conversation::delete(&deployment.db().pool, id, user.id()).await? == 0 {
        return Err(ApiError::NotFound(NOT_FOUND.to_string()));
    }
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Conversation supprimée",
    )))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/conversations",
        Router::new()
            .route("/", get(list_conversations).post(create_conversation))
            .route("/{id}", put(rename_conversation).delete(delete_conversation)),
    )
}
