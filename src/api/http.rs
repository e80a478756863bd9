//! HTTP API Server
//!
//! Directory listings, file info, redirects to presigned URLs and proxied
//! downloads, plus the optional static browser UI.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::browser::{path, Browser};
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::version::BuildInfo;

/// Shared application state
pub struct AppState {
    pub browser: Arc<Browser>,
    pub build: BuildInfo,
}

/// HTTP API server
pub struct HttpServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(config: ServerConfig, browser: Arc<Browser>) -> Self {
        let state = Arc::new(AppState {
            browser,
            build: BuildInfo::current(),
        });

        Self { config, state }
    }

    /// Router with all routes and layers applied
    pub fn router(&self) -> Router {
        Self::create_router(Arc::clone(&self.state), &self.config)
    }

    fn create_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
        let mut router = Router::new()
            .route("/api/list", get(handle_list))
            .route("/api/open", get(handle_open))
            .route("/api/download", get(handle_download))
            .route("/api/stream", get(handle_stream))
            .route("/api/info", get(handle_info))
            .route("/api/version", get(handle_version))
            .route("/health", get(handle_health))
            .with_state(state);

        if let Some(dir) = &config.static_dir {
            router = router
                .nest_service("/static", ServeDir::new(dir))
                .route_service("/", ServeFile::new(dir.join("index.html")));
        }

        if config.cors_enabled {
            router = router.layer(CorsLayer::permissive());
        }

        router.layer(TraceLayer::new_for_http())
    }

    /// Start the HTTP server and run until Ctrl+C
    pub async fn start(&self) -> Result<()> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(&self.config.bind_address).await?;
        tracing::info!(
            "WolfBrowse listening on {} (bucket {})",
            self.config.bind_address,
            self.state.browser.bucket()
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// ============ Request/Response Types ============

/// Directory listing query
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub path: Option<String>,
}

/// Single file query
#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub file: Option<String>,
}

impl FileQuery {
    fn required(self) -> Result<String> {
        self.file
            .filter(|f| !f.is_empty())
            .ok_or_else(|| Error::InvalidInput("file parameter is required".into()))
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub bucket: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::Cancelled => (StatusCode::REQUEST_TIMEOUT, "cancelled"),
            Error::Backend(_) => (StatusCode::INTERNAL_SERVER_ERROR, "backend"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        if self.is_client_error() {
            tracing::debug!("Request rejected: {}", self);
        } else if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Token cancelled when the handler future is dropped, i.e. when the client
/// goes away before the response is produced
fn request_token() -> (CancellationToken, DropGuard) {
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    (token, guard)
}

/// `attachment; filename="..."` with characters that cannot appear in a
/// quoted header value replaced
fn attachment_header(file_name: &str) -> HeaderValue {
    let safe: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();

    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", safe))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

// ============ Handlers ============

async fn handle_list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse> {
    let (token, _guard) = request_token();
    let virtual_path = query.path.unwrap_or_else(|| "/".to_string());

    let listing = state.browser.list_directory(&virtual_path, &token).await?;
    Ok(Json(listing))
}

async fn handle_open(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> Result<Response> {
    let (token, _guard) = request_token();
    let file = query.required()?;

    let url = state.browser.resolve_download_target(&file, &token).await?;
    Ok(Redirect::temporary(&url).into_response())
}

async fn handle_download(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> Result<Response> {
    let (token, _guard) = request_token();
    let file = query.required()?;

    let url = state.browser.resolve_download_target(&file, &token).await?;
    let mut response = Redirect::temporary(&url).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_DISPOSITION, attachment_header(path::file_name(&file)));
    Ok(response)
}

async fn handle_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> Result<Response> {
    let (token, guard) = request_token();
    let file = query.required()?;

    let download = state.browser.stream_download(&file, &token).await?;
    // The body outlives this handler; dropping it closes the backend stream
    guard.disarm();

    let headers = [
        (
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        ),
        (header::CONTENT_LENGTH, HeaderValue::from(download.content_length)),
        (header::CONTENT_DISPOSITION, attachment_header(&download.file_name)),
    ];
    Ok((headers, Body::from_stream(download.body)).into_response())
}

async fn handle_info(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> Result<impl IntoResponse> {
    let (token, _guard) = request_token();
    let file = query.required()?;

    let info = state.browser.get_file_info(&file, &token).await?;
    Ok(Json(info))
}

async fn handle_version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build.clone())
}

async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        healthy: true,
        bucket: state.browser.bucket().to_string(),
    })
}
