use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header},
    response::Response,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::ApiError;
use crate::normalizer::{self, ChartData};
use crate::storage;

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub struct AppState {
    config: Config,
}

#[derive(Serialize)]
struct ParsedResponse {
    ok: bool,
    file: String,
    #[serde(flatten)]
    data: ChartData,
}

#[derive(Deserialize)]
struct DeleteQuery {
    password: Option<String>,
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&config.data_dir)?;

    let listener = TcpListener::bind(&config.bind_addr).await?;
    log::info!(
        "Listening on http://{} (data dir: {})",
        listener.local_addr()?,
        config.data_dir.display()
    );
    axum::serve(listener, router(config)).await?;

    Ok(())
}

/// Build the API router
///
/// Exposed separately from [`run`] so integration tests can drive the
/// service without binding a socket.
pub fn router(config: Config) -> Router {
    let cors = cors_layer(&config.allowed_origin);
    let state = Arc::new(AppState { config });

    Router::new()
        .route("/api/files", get(list_files))
        .route("/api/files/:name/parsed", get(get_parsed))
        .route("/api/files/:name/raw", get(get_raw))
        .route("/api/files/:name", delete(delete_file))
        .route("/api/upload", post(upload))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-admin-pass"),
        ]);

    if origin == "*" {
        layer.allow_origin(Any)
    } else {
        // An unparseable configured origin falls back to wildcard rather
        // than refusing to start
        layer.allow_origin(
            origin
                .parse::<HeaderValue>()
                .unwrap_or_else(|_| HeaderValue::from_static("*")),
        )
    }
}

async fn list_files(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let base = base_url(&state.config, &headers);
    let files: Vec<serde_json::Value> = storage::list_workbooks(&state.config.data_dir)?
        .into_iter()
        .map(|file| {
            let url = format!("{base}/api/files/{}/parsed", urlencoding::encode(&file.name));
            serde_json::json!({
                "name": file.name,
                "size": file.size,
                "mtime": file.mtime,
                "url": url,
            })
        })
        .collect();

    Ok(Json(serde_json::json!({ "ok": true, "files": files })))
}

async fn get_parsed(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ParsedResponse>, ApiError> {
    let bytes = storage::read_workbook(&state.config.data_dir, &name)?;
    let data = normalizer::chart_data_from_bytes(&bytes)?;
    log::debug!("Parsed {name}: {} rows", data.rows.len());

    Ok(Json(ParsedResponse {
        ok: true,
        file: name,
        data,
    }))
}

async fn get_raw(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let bytes = storage::read_workbook(&state.config.data_dir, &name)?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, XLSX_CONTENT_TYPE)
        .body(axum::body::Body::from(bytes))
        .unwrap())
}

async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut original_name = String::new();
    let mut bytes = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.to_string()))?
    {
        if field.name() == Some("file") {
            original_name = field.file_name().unwrap_or_default().to_string();
            bytes = field
                .bytes()
                .await
                .map_err(|err| ApiError::BadRequest(err.to_string()))?
                .to_vec();
        }
    }

    if bytes.is_empty() {
        return Err(ApiError::BadRequest("Missing file".to_string()));
    }
    if !storage::is_xlsx(&original_name) {
        return Err(ApiError::BadRequest("Only .xlsx allowed".to_string()));
    }

    let saved = storage::stored_name(&original_name);
    storage::save_workbook(&state.config.data_dir, &saved, &bytes)?;
    log::info!("Stored upload {saved} ({} bytes)", bytes.len());

    Ok(Json(serde_json::json!({ "ok": true, "saved": saved })))
}

async fn delete_file(
    Path(name): Path<String>,
    Query(query): Query<DeleteQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let pass = headers
        .get("x-admin-pass")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or(query.password);
    if pass.as_deref() != Some(state.config.delete_pass.as_str()) {
        return Err(ApiError::Forbidden);
    }

    storage::delete_workbook(&state.config.data_dir, &name)?;
    log::info!("Deleted {name}");

    Ok(Json(serde_json::json!({ "ok": true, "deleted": name })))
}

// Absolute URL base for the file listing: configured value if set, else
// reconstructed from the request's Host header.
fn base_url(config: &Config, headers: &HeaderMap) -> String {
    if let Some(base) = &config.public_base_url {
        return base.clone();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}")
}
