use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use db::models::user::UserProfile;
use services::services::auth::UpdateAccountRequest;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, extract::ApiJson, middleware::AuthUser};

pub async fn get_account(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
) -> Result<ResponseJson<ApiResponse<UserProfile>>, ApiError> {
    let profile = deployment.auth().profile(user.id()).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

/// PUT|POST /api/account; `newPassword` is optional
pub async fn update_account(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    ApiJson(payload): ApiJson<UpdateAccountRequest>,
) -> Result<ResponseJson<ApiResponse<UserProfile>>, ApiError> {
    let profile = deployment.auth().update_account(user.id(), payload).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        profile,
        "Profil mis à jour",
    )))
}

pub async fn delete_account(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.auth().delete_account(user.id()).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Compte supprimé",
    )))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route(
        "/account",
        get(get_account)
            .put(update_account)
            .post(update_account)
            .delete(delete_account),
    )
}
