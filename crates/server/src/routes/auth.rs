use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, post},
};
use services::services::auth::{
    AuthError, AuthResponse, LoginRequest, SignupRequest, VerifyResponse,
};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, extract::ApiJson, middleware::AuthUser};

/// POST /api/auth/signup
pub async fn signup(
    State(deployment): State<DeploymentImpl>,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<AuthResponse>>), ApiError> {
    let created = deployment.auth().signup(payload).await?;
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success_with_message(
            created,
            "Compte créé avec succès",
        )),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(deployment): State<DeploymentImpl>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<ResponseJson<ApiResponse<AuthResponse>>, ApiError> {
    let session = deployment.auth().login(payload).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        session,
        "Connexion réussie",
    )))
}

/// GET|POST /api/auth/verify
pub async fn verify(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
) -> Result<ResponseJson<ApiResponse<VerifyResponse>>, ApiError> {
    let user = match deployment.auth().profile(user.id()).await {
        Ok(profile) => profile,
        Err(AuthError::UserNotFound) => {
            return Err(ApiError::Unauthorized("Utilisateur non trouvé".to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    Ok(ResponseJson(ApiResponse::success_with_message(
        VerifyResponse { user },
        "Token valide",
    )))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/auth",
        Router::new()
            .route("/signup", post(signup))
            .route("/login", post(login))
            .route("/verify", get(verify).post(verify)),
    )
}
