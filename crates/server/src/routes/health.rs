use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use serde::{Deserialize, Serialize};
use tracing::warn;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::DeploymentImpl;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct HealthStatus {
    pub status: String,
    pub database: bool,
}

pub async fn health_check(
    State(deployment): State<DeploymentImpl>,
) -> ResponseJson<ApiResponse<HealthStatus>> {
    let database = sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&deployment.db().pool)
        .await
        .map_err(|e| warn!(error = %e, "health check query failed"))
        .is_ok();

    ResponseJson(ApiResponse::success(HealthStatus {
        status: if database { "ok" } else { "degraded" }.to_string(),
        database,
    }))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/health", get(health_check))
}
