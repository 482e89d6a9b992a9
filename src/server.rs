use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    error::ReconError,
    export::ExportFormat,
    session::ScanSession,
    types::{LegacyScanResult, ScanRequest},
};

#[derive(Clone)]
pub struct AppState {
    session: Arc<ScanSession>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ReconError {
    fn into_response(self) -> Response {
        let status = match &self {
            ReconError::InvalidTarget(_)
            | ReconError::InvalidRequest(_)
            | ReconError::InvalidRange(_) => StatusCode::BAD_REQUEST,
            ReconError::ResolutionFailure { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ReconError::NoResultAvailable => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ScanQuery {
    /// `minimal` selects the `{ "open_ports": [...] }` shape.
    #[serde(default)]
    pub mode: Option<String>,
}

/// Build the HTTP surface around a session; static files from `static_dir` are the fallback.
pub fn router(session: Arc<ScanSession>, static_dir: &str) -> Router {
    let state = AppState { session };

    let exports = Router::new()
        .route("/json", get(export_json))
        .route("/csv", get(export_csv))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    Router::new()
        .route("/scan", post(post_scan))
        .route("/api/status", get(get_status))
        .nest("/export", exports)
        .with_state(state)
        .fallback_service(ServeDir::new(static_dir).append_index_html_on_directories(true))
        .layer(TraceLayer::new_for_http())
}

pub async fn spawn_server(bind: &str, session: Arc<ScanSession>) -> Result<()> {
    let app = router(session, "static");
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(%bind, "serving UI");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn post_scan(
    State(app): State<AppState>,
    Query(q): Query<ScanQuery>,
    body: std::result::Result<Json<ScanRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return ReconError::InvalidRequest(rejection.body_text()).into_response(),
    };
    match app.session.scan(&req).await {
        Ok(result) if q.mode.as_deref() == Some("minimal") => {
            (StatusCode::OK, Json(LegacyScanResult::from(result.as_ref()))).into_response()
        }
        Ok(result) => (StatusCode::OK, Json(result.as_ref().clone())).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn get_status(State(app): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(app.session.status().await))
}

async fn export_json(State(app): State<AppState>) -> Response {
    export(app, ExportFormat::Json).await
}

async fn export_csv(State(app): State<AppState>) -> Response {
    export(app, ExportFormat::Csv).await
}

async fn export(app: AppState, format: ExportFormat) -> Response {
    match app.session.export(format).await {
        Ok(doc) => {
            let disposition = format!("attachment; filename={}", doc.file_name());
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, doc.content_type().to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                doc.body,
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}
