use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{admin_log::AdminLogWithAdmin, user::UserSummary};
use services::services::{
    admin::{AdminActor, AdminStats, UserDetails},
    document_import::{ImportReport, import_documents},
};
use tracing::info;
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::{AdminUser, ClientIp},
};

pub async fn get_stats(
    State(deployment): State<DeploymentImpl>,
    _admin: AdminUser,
) -> Result<ResponseJson<ApiResponse<AdminStats>>, ApiError> {
    let stats = deployment.admin().stats().await?;
    Ok(ResponseJson(ApiResponse::success(stats)))
}

pub async fn list_users(
    State(deployment): State<DeploymentImpl>,
    admin: AdminUser,
) -> Result<ResponseJson<ApiResponse<Vec<UserSummary>>>, ApiError> {
    let users = deployment.admin().users(admin.id()).await?;
    Ok(ResponseJson(ApiResponse::success(users)))
}

pub async fn get_user(
    State(deployment): State<DeploymentImpl>,
    _admin: AdminUser,
    Path(user_id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<UserDetails>>, ApiError> {
    let details = deployment.admin().user_details(user_id).await?;
    Ok(ResponseJson(ApiResponse::success(details)))
}

pub async fn delete_user(
    State(deployment): State<DeploymentImpl>,
    admin: AdminUser,
    ClientIp(ip_address): ClientIp,
    Path(user_id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let actor = AdminActor {
        admin_id: admin.id(),
        ip_address,
    };
    deployment.admin().delete_user(&actor, user_id).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Utilisateur supprimé",
    )))
}

pub async fn list_logs(
    State(deployment): State<DeploymentImpl>,
    _admin: AdminUser,
) -> Result<ResponseJson<ApiResponse<Vec<AdminLogWithAdmin>>>, ApiError> {
    let logs = deployment.admin().recent_logs().await?;
    Ok(ResponseJson(ApiResponse::success(logs)))
}

/// Rebuild the chunk table from the configured documents directory
pub async fn import_documents_now(
    State(deployment): State<DeploymentImpl>,
    admin: AdminUser,
    ClientIp(ip_address): ClientIp,
) -> Result<ResponseJson<ApiResponse<ImportReport>>, ApiError> {
    let dir = deployment.config().documents_dir.clone();
    info!(admin_id = admin.id(), dir = %dir.display(), "document import requested");

    let report = import_documents(deployment.db(), deployment.ollama(), &dir).await?;

    let actor = AdminActor {
        admin_id: admin.id(),
        ip_address,
    };
    deployment
        .admin()
        .record(
            &actor,
            "import_documents",
            Some(format!(
                "{} fichiers, {} segments importés, {} échecs",
                report.files, report.chunks_imported, report.chunks_failed
            )),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success_with_message(
        report,
        "Documents importés",
    )))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/admin",
        Router::new()
            .route("/stats", get(get_stats))
            .route("/users", get(list_users))
            .route("/users/{id}", get(get_user).delete(delete_user))
            .route("/logs", get(list_logs))
            .route("/documents/import", post(import_documents_now)),
    )
}
