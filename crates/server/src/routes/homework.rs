use axum::{
    Router,
    body::Body,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};
use services::services::homework::{Download, SearchParams};
use tokio_util::io::ReaderStream;
use tracing::warn;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct DetailQuery {
    #[serde(rename = "homeworkId")]
    pub homework_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(rename = "fileName")]
    pub file_name: Option<String>,
    pub path: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub async fn search_homework(
    State(deployment): State<DeploymentImpl>,
    Query(params): Query<SearchParams>,
) -> Result<ResponseJson<Value>, ApiError> {
    Ok(ResponseJson(deployment.homework().search(params).await?))
}

/// Upstream detail body relayed as-is
pub async fn homework_detail(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<DetailQuery>,
) -> Result<Response, ApiError> {
    let Some(homework_id) = non_blank(query.homework_id.as_deref()) else {
        return Ok((
            StatusCode::BAD_REQUEST,
            ResponseJson(json!({ "error": "Missing homeworkId" })),
        )
            .into_response());
    };
    let body = deployment.homework().detail(homework_id).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

fn attachment(file_name: &str) -> HeaderValue {
    let escaped = file_name.replace(['"', '\r', '\n'], "_");
    HeaderValue::from_str(&format!("attachment; filename=\"{escaped}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

pub async fn download_file(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let file_name = non_blank(query.file_name.as_deref());
    let path = non_blank(query.path.as_deref());
    if file_name.is_none() && path.is_none() {
        return Err(ApiError::BadRequest("Missing fileName or path".to_string()));
    }

    match deployment.homework().download(file_name, path).await? {
        Download::Local {
            path,
            file_name,
            content_type,
        } => {
            let file = match tokio::fs::File::open(&path).await {
                Ok(file) => file,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot open homework file");
                    return Err(ApiError::NotFound("Fichier introuvable".to_string()));
                }
            };
            let body = Body::from_stream(ReaderStream::new(file));
            Ok((
                [
                    (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
                    (header::CONTENT_DISPOSITION, attachment(&file_name)),
                ],
                body,
            )
                .into_response())
        }
        Download::Remote {
            bytes,
            file_name,
            content_type,
        } => {
            let content_type = HeaderValue::from_str(&content_type)
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
            Ok((
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CONTENT_DISPOSITION, attachment(&file_name)),
                ],
                bytes,
            )
                .into_response())
        }
    }
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .nest(
            "/homework",
            Router::new()
                .route("/search", get(search_homework))
                .route("/detail", get(homework_detail)),
        )
        .route("/download", get(download_file))
}
