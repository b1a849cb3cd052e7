//! HTTP surface: `POST /`, `POST /download`, `GET /health`.
//!
//! Every endpoint allows any origin, method and header. Each request gets a
//! `uuid` request id carried on its tracing span, so the source text,
//! pipeline timings and any failure can be matched up in the log. Callers
//! only ever see a generic error body.

use crate::config::{RenderConfig, ServerConfig};
use crate::convert::{latex_to_pdf, latex_to_slides};
use crate::error::RenderError;
use crate::output::SlidesOutput;
use axum::{
    extract::{DefaultBodyLimit, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// Declared file name of a source download.
pub const SOURCE_DOWNLOAD_NAME: &str = "output.tex";
/// Declared file name of a PDF download.
pub const PDF_DOWNLOAD_NAME: &str = "output.pdf";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    config: Arc<RenderConfig>,
}

impl AppState {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }
}

/// Body of both POST endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LatexRequest {
    pub latex: String,
}

/// Query string of `POST /download`.
#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    /// Return the source instead of the compiled PDF.
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub source: bool,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Build the application router.
pub fn router(config: &ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", post(generate_images))
        .route("/download", post(download))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState::new(config.render.clone()))
}

/// Bind `config.bind` and serve until `shutdown` resolves.
pub async fn serve(
    config: ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("tex2slides listening on {}", listener.local_addr()?);

    axum::serve(listener, router(&config))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /`: compile and return every page as a base64 JPEG.
async fn generate_images(
    State(state): State<AppState>,
    Json(request): Json<LatexRequest>,
) -> Result<Json<SlidesOutput>, ApiError> {
    let span = info_span!("generate_images", request_id = %Uuid::new_v4());
    let output = latex_to_slides(&request.latex, state.config())
        .instrument(span.clone())
        .await
        .inspect_err(|e| span.in_scope(|| error!("Slide generation failed: {}", e)))?;

    span.in_scope(|| info!(stats = ?output.stats, "Returning {} slides", output.slides.len()));
    Ok(Json(output))
}

/// `POST /download?source=<bool>`: return the source or the compiled PDF.
///
/// Both artifacts are served from memory, so concurrent downloads never
/// touch a shared file.
async fn download(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
    Json(request): Json<LatexRequest>,
) -> Result<Response, ApiError> {
    let span = info_span!("download", request_id = %Uuid::new_v4(), source = query.source);

    if query.source {
        span.in_scope(|| info!("Returning {} bytes of LaTeX source", request.latex.len()));
        return Ok(attachment(
            SOURCE_DOWNLOAD_NAME,
            "application/x-tex",
            request.latex.into_bytes(),
        ));
    }

    let pdf = latex_to_pdf(&request.latex, state.config())
        .instrument(span.clone())
        .await
        .inspect_err(|e| span.in_scope(|| error!("PDF download failed: {}", e)))?;

    Ok(attachment(PDF_DOWNLOAD_NAME, "application/pdf", pdf.bytes))
}

fn attachment(file_name: &str, content_type: &'static str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    )
        .into_response()
}

/// Accept the boolean spellings form-encoded clients send.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_flag(&raw).ok_or_else(|| de::Error::custom(format!("invalid boolean {:?}", raw)))
}

// ── Errors ───────────────────────────────────────────────────────────────

/// Error returned by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Render(e) = &self;
        let (status, error, message) = match e {
            RenderError::CompileTimeout { .. } => (
                StatusCode::GATEWAY_TIMEOUT,
                "compile_timeout",
                "LaTeX compilation took too long",
            ),
            e if e.is_compilation_failure() => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "compilation_failed",
                "The LaTeX source could not be compiled",
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred",
            ),
        };

        (status, Json(ErrorResponse { error, message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app_with(render: RenderConfig) -> Router {
        router(&ServerConfig {
            render,
            ..ServerConfig::default()
        })
    }

    fn app() -> Router {
        app_with(
            RenderConfig::builder()
                .latex_program("definitely-not-a-latex-engine-7c1f")
                .build()
                .unwrap(),
        )
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[test]
    fn parse_flag_accepts_common_spellings() {
        for raw in ["true", "True", "1", "yes", "on", " t "] {
            assert_eq!(parse_flag(raw), Some(true), "{raw}");
        }
        for raw in ["false", "FALSE", "0", "no", "off", "f"] {
            assert_eq!(parse_flag(raw), Some(false), "{raw}");
        }
        assert_eq!(parse_flag("maybe"), None);
        assert_eq!(parse_flag(""), None);
    }

    #[tokio::test]
    async fn download_source_returns_text_as_output_tex() {
        let response = app()
            .oneshot(post_json("/download?source=true", r#"{"latex":"hello"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(disposition, "attachment; filename=\"output.tex\"");
        assert_eq!(body_bytes(response).await, b"hello");
    }

    #[tokio::test]
    async fn download_source_accepts_yes() {
        let response = app()
            .oneshot(post_json("/download?source=yes", r#"{"latex":"x"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"x");
    }

    #[tokio::test]
    async fn download_rejects_unknown_flag() {
        let response = app()
            .oneshot(post_json("/download?source=maybe", r#"{"latex":"x"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_latex_field_is_rejected() {
        let response = app().oneshot(post_json("/", r#"{"text":"x"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn pipeline_failure_is_opaque() {
        let response = app()
            .oneshot(post_json("/", r#"{"latex":"\\documentclass{article}"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["error"], "internal_error");
        assert!(!body.to_string().contains("definitely-not-a-latex-engine"));
    }

    #[tokio::test]
    async fn pdf_download_without_engine_fails() {
        let response = app()
            .oneshot(post_json("/download", r#"{"latex":"x"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn bad_source_maps_to_compilation_failed() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let engine = dir.path().join("fake-latex");
        std::fs::write(&engine, "#!/bin/sh\necho '! Emergency stop.' > output.log\nexit 1\n").unwrap();
        std::fs::set_permissions(&engine, std::fs::Permissions::from_mode(0o755)).unwrap();

        let app = app_with(
            RenderConfig::builder()
                .latex_program(engine.to_string_lossy())
                .build()
                .unwrap(),
        );
        let response = app.oneshot(post_json("/", r#"{"latex":"\\bogus"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["error"], "compilation_failed");
        assert!(!body.to_string().contains("Emergency stop"));
    }

    #[tokio::test]
    async fn empty_document_maps_to_compilation_failed() {
        let err = RenderError::EmptyDocument {
            path: "/tmp/tex2slides-abc/output.pdf".into(),
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["error"], "compilation_failed");
        assert!(!body.to_string().contains("tex2slides-abc"));
    }

    #[test]
    fn timeout_maps_to_gateway_timeout() {
        let response = ApiError::from(RenderError::CompileTimeout { secs: 5 }).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn cors_preflight_allows_any_origin() {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/")
            .header(header::ORIGIN, "https://slides.example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert!(response.status().is_success());
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    #[tokio::test]
    async fn health_reports_version() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn concurrent_source_downloads_do_not_mix() {
        let app = app();
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let app = app.clone();
                tokio::spawn(async move {
                    let body = format!(r#"{{"latex":"doc {i}"}}"#);
                    let response = app
                        .oneshot(post_json("/download?source=true", &body))
                        .await
                        .unwrap();
                    (i, body_bytes(response).await)
                })
            })
            .collect();

        for handle in handles {
            let (i, bytes) = handle.await.unwrap();
            assert_eq!(bytes, format!("doc {i}").into_bytes());
        }
    }
}
