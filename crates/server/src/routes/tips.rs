use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::models::tip::{ALL_CATEGORIES, Tip, TipPayload};
use serde::Deserialize;
use services::services::admin::AdminActor;
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::ApiJson,
    middleware::{AdminUser, ClientIp},
};

const MISSING_FIELDS: &str = "Données manquantes (category, title, description requis)";
const NOT_FOUND: &str = "Astuce non trouvée";

#[derive(Debug, Deserialize)]
pub struct TipQuery {
    pub category: Option<String>,
}

fn actor(admin: &AdminUser, ip: ClientIp) -> AdminActor {
    AdminActor {
        admin_id: admin.id(),
        ip_address: ip.0,
    }
}

pub async fn list_tips(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<TipQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Tip>>>, ApiError> {
    let pool = &deployment.db().pool;
    let tips = match query.category.as_deref().map(str::trim) {
        Some(category) if !category.is_empty() && category != ALL_CATEGORIES => {
            Tip::find_by_category(pool, category).await?
        }
        _ => Tip::find_all(pool).await?,
    };
    Ok(ResponseJson(ApiResponse::success(tips)))
}

pub async fn create_tip(
    State(deployment): State<DeploymentImpl>,
    admin: AdminUser,
    ip: ClientIp,
    ApiJson(payload): ApiJson<TipPayload>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Tip>>), ApiError> {
    let data = payload
        .into_data()
        .ok_or_else(|| ApiError::BadRequest(MISSING_FIELDS.to_string()))?;
    let tip = Tip::create(&deployment.db().pool, &data).await?;

    deployment
        .admin()
        .record(
            &actor(&admin, ip),
            "create_tip",
            Some(format!("Ajout de l'astuce {} ({})", tip.id, tip.title)),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success_with_message(tip, "Astuce ajoutée")),
    ))
}

pub async fn update_tip(
    State(deployment): State<DeploymentImpl>,
    admin: AdminUser,
    ip: ClientIp,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<TipPayload>,
) -> Result<ResponseJson<ApiResponse<Tip>>, ApiError> {
    let data = payload
        .into_data()
        .ok_or_else(|| ApiError::BadRequest(MISSING_FIELDS.to_string()))?;
    let tip = Tip::update(&deployment.db().pool, id, &data)
        .await?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;

    deployment
        .admin()
        .record(
            &actor(&admin, ip),
            "update_tip",
            Some(format!("Modification de l'astuce {} ({})", tip.id, tip.title)),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success_with_message(
        tip,
        "Astuce modifiée",
    )))
}

pub async fn delete_tip(
    State(deployment): State<DeploymentImpl>,
    admin: AdminUser,
    ip: ClientIp,
    Path(id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if Tip::delete(&deployment.db().pool, id).await? == 0 {
        return Err(ApiError::NotFound(NOT_FOUND.to_string()));
    }

    deployment
        .admin()
        .record(
            &actor(&admin, ip),
            "delete_tip",
            Some(format!("Suppression de l'astuce {id}")),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Astuce supprimée",
    )))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/tips",
        Router::new()
            .route("/", get(list_tips).post(create_tip))
            .route("/{id}", put(update_tip).delete(delete_tip)),
    )
}
