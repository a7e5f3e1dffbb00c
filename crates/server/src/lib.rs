use std::{net::SocketAddr, time::Duration};

use axum::{
    Router,
    http::{
        HeaderName, HeaderValue, Method,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN},
    },
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub mod deployment;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;

pub type DeploymentImpl = deployment::Deployment;

/// Load `.env` into the process environment. Returns a warning to log once
/// tracing is up; a missing file is not worth one.
pub fn load_dotenv() -> Option<String> {
    dotenv_warning(dotenvy::dotenv().map(|_| ()))
}

fn dotenv_warning(result: Result<(), dotenvy::Error>) -> Option<String> {
    match result {
        Err(e) if !e.not_found() => Some(format!("failed to load .env: {e}")),
        _ => None,
    }
}

/// `RUST_LOG` wins; otherwise `info`
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = if allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| {
                HeaderValue::from_str(origin)
                    .map_err(|e| warn!(%origin, error = %e, "ignoring invalid CORS origin"))
                    .ok()
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            AUTHORIZATION,
            HeaderName::from_static("x-authorization"),
            HeaderName::from_static("x-token"),
            CONTENT_TYPE,
            ACCEPT,
            ORIGIN,
        ])
        .max_age(Duration::from_secs(60 * 60))
}

pub fn app(deployment: DeploymentImpl) -> Router {
    let cors = cors_layer(&deployment.config().cors_allowed_origins);
    Router::new()
        .nest("/api", routes::router(&deployment))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(deployment)
}

pub async fn serve(deployment: DeploymentImpl) -> anyhow::Result<()> {
    let address = deployment.config().bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app(deployment).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
