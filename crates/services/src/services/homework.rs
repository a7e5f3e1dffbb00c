//! Bridge to the school's homework portal: search, detail lookup and file download.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use reqwest::{Client, StatusCode, header::USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::config::HomeworkConfig;

const BRIDGE_USER_AGENT: &str = "Rafi9ni-Bridge";
const HW_FILE_MARKER: &str = "HwFile/";

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum HomeworkError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("Invalid JSON from API 1")]
    InvalidJson { raw_response: String },
    #[error("Error fetching details")]
    Upstream { status: u16, body: String },
    #[error("{0}")]
    NotFound(String),
    #[error("invalid portal url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SearchParams {
    #[serde(rename = "levelId", default = "default_level_id")]
    pub level_id: u32,
    #[serde(default = "default_idrole")]
    pub idrole: u32,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_level_id() -> u32 {
    5
}

fn default_idrole() -> u32 {
    3
}

fn default_count() -> u32 {
    10
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            level_id: default_level_id(),
            idrole: default_idrole(),
            count: default_count(),
        }
    }
}

/// A file ready to be sent back to the browser
#[derive(Debug)]
pub enum Download {
    Local {
        path: PathBuf,
        file_name: String,
        content_type: &'static str,
    },
    Remote {
        bytes: Bytes,
        file_name: String,
        content_type: String,
    },
}

/// Content type for a locally served homework file
pub fn local_content_type(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc" | "docx") => DOCX_MIME,
        _ => OCTET_STREAM,
    }
}

/// Last path component, splitting on either slash
fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Map a path containing `HwFile/` onto the remote file server, encoding each segment
pub fn bridge_url(remote_base: &str, requested: &str) -> Result<Option<Url>, HomeworkError> {
    let normalized = requested.replace('\\', "/");
    let Some(pos) = normalized.find(HW_FILE_MARKER) else {
        return Ok(None);
    };
    let suffix = &normalized[pos..];

    let mut url = Url::parse(remote_base)?;
    url.path_segments_mut()
        .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend(suffix.split('/'));
    Ok(Some(url))
}

#[derive(Debug, Clone)]
pub struct HomeworkClient {
    http: Client,
    api_url: String,
    remote_files_url: String,
    api_token: Option<SecretString>,
    files_dir: PathBuf,
}

impl HomeworkClient {
    pub fn new(config: &HomeworkConfig) -> Result<Self, HomeworkError> {
        let http = Client::builder()
            .build()
            .map_err(|e| HomeworkError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            remote_files_url: config.remote_files_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            files_dir: config.files_dir.clone(),
        })
    }

    /// Homework list for a level; the portal's JSON is passed through untouched
    pub async fn search(&self, params: SearchParams) -> Result<Value, HomeworkError> {
        let url = format!(
            "{}/api/external/mobile/AI/SearchHomeWork/Rafi9ni/{}/{}/{}",
            self.api_url, params.level_id, params.idrole, params.count
        );
        debug!(%url, "searching homework");

        let raw_response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| HomeworkError::Transport(e.to_string()))?
            .text()
            .await
            .map_err(|e| HomeworkError::Transport(e.to_string()))?;

        serde_json::from_str(&raw_response).map_err(|e| {
            warn!(error = %e, "homework search returned non-JSON");
            HomeworkError::InvalidJson { raw_response }
        })
    }

    /// Detail of one homework, as the raw upstream body
    pub async fn detail(&self, homework_id: &str) -> Result<Bytes, HomeworkError> {
        let mut request = self
            .http
            .get(format!("{}/api/direct/mobile/homeWork/getDetail", self.api_url))
            .query(&[("id", homework_id)]);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let res = request
            .send()
            .await
            .map_err(|e| HomeworkError::Transport(e.to_string()))?;
        let status = res.status();
        let body = res
            .bytes()
            .await
            .map_err(|e| HomeworkError::Transport(e.to_string()))?;

        if status != StatusCode::OK {
            warn!(homework_id, %status, "homework detail failed");
            return Err(HomeworkError::Upstream {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body)
    }

    /// Find a file locally (only inside the configured files directory) or
    /// fetch it through the remote bridge.
    pub async fn download(
        &self,
        file_name: Option<&str>,
        path: Option<&str>,
    ) -> Result<Download, HomeworkError> {
        let requested = match (path, file_name) {
            (Some(path), _) => PathBuf::from(path.replace('\\', "/")),
            (None, Some(name)) => self.files_dir.join(name.replace('\\', "/")),
            (None, None) => {
                return Err(HomeworkError::NotFound(
                    "Missing fileName or path".to_string(),
                ));
            }
        };
        let display_name = base_name(file_name.or(path).unwrap_or_default()).to_string();

        if let Some(local) = self.local_file(&requested) {
            info!(path = %local.display(), "serving local homework file");
            return Ok(Download::Local {
                path: local,
                content_type: local_content_type(&display_name),
                file_name: display_name,
            });
        }

        let requested = requested.to_string_lossy().into_owned();
        let Some(url) = bridge_url(&self.remote_files_url, &requested)? else {
            warn!(path = %requested, "no HwFile segment, cannot bridge");
            return Err(HomeworkError::NotFound(format!(
                "Fichier introuvable localement et chemin non reconnu pour le serveur distant.\nChemin: {requested}"
            )));
        };

        info!(%url, "local file not found, fetching through bridge");
        let not_found = || {
            HomeworkError::NotFound(format!(
                "Fichier introuvable localement et impossible de le récupérer à distance.\nURL: {url}"
            ))
        };
        let res = self
            .http
            .get(url.clone())
            .header(USER_AGENT, BRIDGE_USER_AGENT)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "bridge fetch failed");
                not_found()
            })?;
        if !res.status().is_success() {
            warn!(status = %res.status(), "bridge fetch failed");
            return Err(not_found());
        }
        let bytes = res.bytes().await.map_err(|e| {
            warn!(error = %e, "bridge body read failed");
            not_found()
        })?;

        let file_name = base_name(&requested).to_string();
        let content_type = mime_guess::from_path(&file_name)
            .first_raw()
            .unwrap_or(OCTET_STREAM)
            .to_string();
        Ok(Download::Remote {
            bytes,
            file_name,
            content_type,
        })
    }

    fn local_file(&self, requested: &Path) -> Option<PathBuf> {
        let root = dunce::canonicalize(&self.files_dir).ok()?;
        let candidate = dunce::canonicalize(requested).ok()?;
        if !candidate.starts_with(&root) {
            warn!(path = %candidate.display(), "refusing file outside the homework directory");
            return None;
        }
        candidate.is_file().then_some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        extract::Query,
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::get,
    };
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    use super::*;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}")
    }

    fn client(files_dir: &Path, base: &str) -> HomeworkClient {
        HomeworkClient::new(&HomeworkConfig {
            files_dir: files_dir.to_path_buf(),
            remote_files_url: base.to_string(),
            api_url: base.to_string(),
            api_token: Some(SecretString::from("tech-token")),
        })
        .unwrap()
    }

    #[test]
    fn bridge_url_encodes_each_segment() {
        let url = bridge_url(
            "https://staff.rafi9ni.pro",
            r"C:\webapps\HwFile/Rafi9niAmani 2025Laataoui/devoir é.pdf",
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://staff.rafi9ni.pro/HwFile/Rafi9niAmani%202025Laataoui/devoir%20%C3%A9.pdf"
        );
        assert!(bridge_url("https://staff.rafi9ni.pro", "/tmp/other.pdf").unwrap().is_none());
    }

    #[test]
    fn content_types_by_extension() {
        assert_eq!(local_content_type("Devoir.PDF"), "application/pdf");
        assert_eq!(local_content_type("a.doc"), DOCX_MIME);
        assert_eq!(local_content_type("a.docx"), DOCX_MIME);
        assert_eq!(local_content_type("a.zip"), OCTET_STREAM);
        assert_eq!(local_content_type("noext"), OCTET_STREAM);
    }

    #[test]
    fn search_params_default() {
        let params: SearchParams = serde_json::from_str("{}").unwrap();
        assert_eq!((params.level_id, params.idrole, params.count), (5, 3, 10));
    }

    #[tokio::test]
    async fn local_files_are_confined_to_the_directory() {
        let root = tempfile::tempdir().unwrap();
        let files = root.path().join("files");
        std::fs::create_dir(&files).unwrap();
        std::fs::write(files.join("devoir.pdf"), b"%PDF").unwrap();
        std::fs::write(root.path().join("secret.txt"), b"nope").unwrap();

        let client = client(&files, "http://127.0.0.1:9");

        match client.download(Some("devoir.pdf"), None).await.unwrap() {
            Download::Local {
                file_name,
                content_type,
                ..
            } => {
                assert_eq!(file_name, "devoir.pdf");
                assert_eq!(content_type, "application/pdf");
            }
            other => panic!("expected local file, got {other:?}"),
        }

        let err = client
            .download(Some("../secret.txt"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, HomeworkError::NotFound(_)));

        let outside = root.path().join("secret.txt");
        let err = client
            .download(None, Some(outside.to_str().unwrap()))
            .await
            .unwrap_err();
        assert!(matches!(err, HomeworkError::NotFound(ref m) if m.contains("chemin non reconnu")));
    }

    #[tokio::test]
    async fn missing_local_file_is_fetched_through_bridge() {
        let base = serve(Router::new().route(
            "/HwFile/Classe%201/fiche.pdf",
            get(|headers: HeaderMap| async move {
                assert_eq!(headers[USER_AGENT], BRIDGE_USER_AGENT);
                "remote-bytes"
            }),
        ))
        .await;
        let dir = tempfile::tempdir().unwrap();
        let client = client(dir.path(), &base);

        match client
            .download(None, Some("/srv/webapps/HwFile/Classe 1/fiche.pdf"))
            .await
            .unwrap()
        {
            Download::Remote {
                bytes,
                file_name,
                content_type,
            } => {
                assert_eq!(&bytes[..], b"remote-bytes");
                assert_eq!(file_name, "fiche.pdf");
                assert_eq!(content_type, "application/pdf");
            }
            other => panic!("expected remote file, got {other:?}"),
        }

        let err = client
            .download(None, Some("/srv/webapps/HwFile/absent.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, HomeworkError::NotFound(ref m) if m.contains("URL: ")));
    }

    #[tokio::test]
    async fn search_passes_json_through_and_flags_garbage() {
        let base = serve(
            Router::new()
                .route(
                    "/api/external/mobile/AI/SearchHomeWork/Rafi9ni/5/3/10",
                    get(|| async { axum::Json(serde_json::json!([{"id": 1}])) }),
                )
                .route(
                    "/api/external/mobile/AI/SearchHomeWork/Rafi9ni/6/3/10",
                    get(|| async { "<html>oops</html>" }),
                ),
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let client = client(dir.path(), &base);

        let found = client.search(SearchParams::default()).await.unwrap();
        assert_eq!(found, serde_json::json!([{"id": 1}]));

        let err = client
            .search(SearchParams {
                level_id: 6,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(
            matches!(err, HomeworkError::InvalidJson { ref raw_response } if raw_response == "<html>oops</html>")
        );
    }

    #[tokio::test]
    async fn detail_sends_token_and_reports_upstream_status() {
        let base = serve(Router::new().route(
            "/api/direct/mobile/homeWork/getDetail",
            get(
                |Query(query): Query<HashMap<String, String>>, headers: HeaderMap| async move {
                    assert_eq!(headers["authorization"], "Bearer tech-token");
                    if query.get("id").map(String::as_str) == Some("42") {
                        (AxumStatus::OK, r#"{"title":"Maths"}"#)
                    } else {
                        (AxumStatus::NOT_FOUND, "missing")
                    }
                },
            ),
        ))
        .await;
        let dir = tempfile::tempdir().unwrap();
        let client = client(dir.path(), &base);

        let body = client.detail("42").await.unwrap();
        assert_eq!(&body[..], br#"{"title":"Maths"}"#);

        let err = client.detail("7").await.unwrap_err();
        assert!(
            matches!(err, HomeworkError::Upstream { status: 404, ref body } if body == "missing")
        );
    }
}
