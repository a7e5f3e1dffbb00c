use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::child::{Child, UpsertChild};
use tracing::info;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, extract::ApiJson, middleware::AuthUser};

const INCOMPLETE: &str = "Données incomplètes";
const NOT_FOUND: &str = "Enfant non trouvé";

pub async fn list_children(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
) -> Result<ResponseJson<ApiResponse<Vec<Child>>>, ApiError> {
    let children = Child::find_by_user_id(&deployment.db().pool, user.id()).await?;
    Ok(ResponseJson(ApiResponse::success(children)))
}

pub async fn get_child(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<Child>>, ApiError> {
    let child = Child::find_by_id(&deployment.db().pool, id, user.id())
        .await?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;
    Ok(ResponseJson(ApiResponse::success(child)))
}

/// POST /api/children: updates when the body carries an `id`, creates otherwise
pub async fn upsert_child(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    ApiJson(payload): ApiJson<UpsertChild>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Child>>), ApiError> {
    let (id, data) = payload
        .into_parts()
        .ok_or_else(|| ApiError::BadRequest(INCOMPLETE.to_string()))?;
    let pool = &deployment.db().pool;

    match id {
        Some(id) => {
            let child = Child::update(pool, id, user.id(), &data)
                .await?
                .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;
            Ok((
                StatusCode::OK,
                ResponseJson(ApiResponse::success_with_message(child, "Enfant mis à jour")),
            ))
        }
        None => {
            let child = Child::create(pool, user.id(), &data).await?;
            info!(user_id = user.id(), child_id = child.id, "child added");
            Ok((
                StatusCode::CREATED,
                ResponseJson(ApiResponse::success_with_message(child, "Enfant ajouté")),
            ))
        }
    }
}

pub async fn update_child(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<UpsertChild>,
) -> Result<ResponseJson<ApiResponse<Child>>, ApiError> {
    let (_, data) = payload
        .into_parts()
        .ok_or_else(|| ApiError::BadRequest(INCOMPLETE.to_string()))?;
    let child = Child::update(&deployment.db().pool, id, user.id(), &data)
        .await?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        child,
        "Enfant mis à jour",
    )))
}

pub async fn delete_child(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if Child::delete(&deployment.db().pool, id, user.id()).await? == 0 {
        return Err(ApiError::NotFound(NOT_FOUND.to_string()));
    }
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Enfant supprimé",
    )))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/children",
        Router::new()
            .route("/", get(list_children).post(upsert_child))
            .route(
                "/{id}",
                get(get_child).put(update_child).delete(delete_child),
            ),
    )
}
