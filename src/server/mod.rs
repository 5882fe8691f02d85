//! Web form for triggering the pipeline interactively.

pub mod pages;

use crate::constants::PROCESSED_CSV_NAME;
use crate::error::Result;
use crate::ingest::Upload;
use crate::pipeline::Pipeline;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path},
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use hyper::Server;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

const RECENT_RUNS_SHOWN: usize = 10;
const CACHED_OUTPUTS: usize = 16;

/// Processed CSVs of the latest runs, kept for the download link.
pub struct OutputCache {
    capacity: usize,
    order: VecDeque<Uuid>,
    files: HashMap<Uuid, Vec<u8>>,
}

impl OutputCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            files: HashMap::new(),
        }
    }

    pub fn insert(&mut self, run_id: Uuid, csv: Vec<u8>) {
        if self.files.insert(run_id, csv).is_none() {
            self.order.push_back(run_id);
        }
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.files.remove(&evicted);
            }
        }
    }

    pub fn get(&self, run_id: &Uuid) -> Option<Vec<u8>> {
        self.files.get(run_id).cloned()
    }
}

pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub outputs: Mutex<OutputCache>,
    pub metrics: Option<PrometheusHandle>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, metrics: Option<PrometheusHandle>, max_upload_bytes: usize) -> Self {
        Self {
            pipeline,
            outputs: Mutex::new(OutputCache::new(CACHED_OUTPUTS)),
            metrics,
            max_upload_bytes,
        }
    }
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "campaign-pipeline",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn index(Extension(state): Extension<Arc<AppState>>) -> Response {
    let recent = match state.pipeline.ledger() {
        Some(ledger) => ledger.recent(RECENT_RUNS_SHOWN).unwrap_or_else(|e| {
            warn!("Failed to read run history: {}", e);
            Vec::new()
        }),
        None => Vec::new(),
    };
    render_page(StatusCode::OK, pages::index_page(&recent, state.max_upload_bytes))
}

fn render_page(status: StatusCode, page: Result<String>) -> Response {
    match page {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!("Template rendering failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "template rendering failed").into_response()
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    render_page(status, pages::error_page(message))
}

async fn read_upload(multipart: &mut Multipart) -> std::result::Result<Option<Upload>, String> {
    while let Some(field) = multipart.next_field().await.map_err(|e| e.to_string())? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| e.to_string())?;
        return Ok(Some(Upload::new(file_name, bytes.to_vec())));
    }
    Ok(None)
}

async fn upload(Extension(state): Extension<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let upload = match read_upload(&mut multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => return error_response(StatusCode::BAD_REQUEST, "no file field named 'file' in the form"),
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &format!("could not read upload: {e}")),
    };

    let outcome = match state.pipeline.run(upload).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let status = if e.is_client_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            return error_response(status, &e.to_string());
        }
    };

    match outcome.to_csv() {
        Ok(csv) => state.outputs.lock().unwrap().insert(outcome.run_id, csv),
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
    render_page(StatusCode::OK, pages::result_page(&outcome))
}

async fn download(Extension(state): Extension<Arc<AppState>>, Path(run_id): Path<Uuid>) -> Response {
    let csv = state.outputs.lock().unwrap().get(&run_id);
    match csv {
        Some(bytes) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{PROCESSED_CSV_NAME}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "no processed output cached for this run"),
    }
}

async fn metrics(Extension(state): Extension<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// Create the HTTP server with all routes
pub fn create_server(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .route("/runs/:run_id/download", get(download))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(Extension(state))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Start the HTTP server on the specified address
pub async fn start_server(state: Arc<AppState>, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_server(state);
    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    info!("🚀 HTTP server running on http://{}", addr);
    info!("💚 Health check: http://{}/health", addr);

    Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
