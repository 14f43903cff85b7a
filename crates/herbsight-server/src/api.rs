use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use herbsight_shared::schema::InvokeRequest;
use herbsight_shared::types::mime_for_file_name;
use herbsight_shared::{
    KnowledgeDraft, KnowledgeFilter, NewScan, PlantKnowledgeEntry, Scan, ScanId, ScanPatch,
    SessionUser,
};
use herbsight_store::Database;
use serde::Serialize;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{self, require_admin, require_session};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::file_store::FileStore;
use crate::llm::{inline_image_url, LlmGateway};
use crate::rate_limit::{rate_limit_middleware, RateLimiter};

// multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub files: Arc<FileStore>,
    pub llm: Arc<LlmGateway>,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let limited = Router::new()
        .route("/files", post(upload_file))
        .route("/integrations/invoke-llm", post(invoke_llm))
        .route_layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/auth/register", post(register))
        .route("/auth/me", get(me))
        .route("/files/:name", get(download_file))
        .route("/entities/scans", get(list_scans).post(create_scan))
        .route(
            "/entities/scans/:id",
            get(get_scan).patch(patch_scan).delete(delete_scan),
        )
        .route("/entities/plants", get(list_plants).post(create_plant))
        .route(
            "/entities/plants/:id",
            get(get_plant).put(update_plant).delete(delete_plant),
        )
        .merge(limited)
        .layer(DefaultBodyLimit::max(
            state.config.max_upload_size + MULTIPART_OVERHEAD,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    registration_open: bool,
    identification_enabled: bool,
}

#[derive(Serialize)]
struct RegisterResponse {
    token: String,
    user: SessionUser,
}

#[derive(Serialize)]
struct UploadResponse {
    file_url: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        registration_open: state.config.registration_open,
        identification_enabled: state.llm.is_configured(),
    })
}

// ─── Auth ───

async fn register(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<RegisterResponse>), ServerError> {
    let (token, user) = auth::register(&state).await?;
    Ok((StatusCode::CREATED, Json(RegisterResponse { token, user })))
}

async fn me(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<SessionUser>, ServerError> {
    Ok(Json(require_session(&headers, &state).await?))
}

// ─── Files ───

async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ServerError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        // an explicit image/* part type wins, otherwise go by the file name
        let mime_type = match field.content_type() {
            Some(ct) if ct.starts_with("image/") => ct.to_string(),
            other => field
                .file_name()
                .and_then(mime_for_file_name)
                .map(str::to_string)
                .or_else(|| other.map(str::to_string))
                .unwrap_or_default(),
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {}", e)))?;

        let stored = state.files.store_file(&data, &mime_type).await?;

        let recorded = state.db.lock().await.insert_file(&stored);
        if let Err(e) = recorded {
            discard_unrecorded(&state.files, &stored.name).await;
            return Err(e.into());
        }

        info!(
            name = %stored.name,
            size = stored.file_size,
            mime = %stored.mime_type,
            "File uploaded"
        );

        return Ok(Json(UploadResponse {
            file_url: state.config.file_url(&stored.name),
        }));
    }

    Err(ServerError::BadRequest(
        "Missing 'file' field in multipart form".to_string(),
    ))
}

/// Remove a stored upload whose metadata row could not be written. A failure
/// here leaves an orphan on disk, so it is logged rather than returned.
async fn discard_unrecorded(files: &FileStore, name: &str) {
    if let Err(e) = files.delete_file(name).await {
        warn!(name = %name, error = %e, "Failed to remove unrecorded upload");
    }
}

async fn download_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let meta = state.db.lock().await.get_file(&name)?;
    let data = state.files.read_file(&meta.name).await?;
    Ok(([(header::CONTENT_TYPE, meta.mime_type)], data))
}

// ─── Identification ───

async fn invoke_llm(
    State(state): State<AppState>,
    Json(req): Json<InvokeRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    if req.prompt.trim().is_empty() {
        return Err(ServerError::BadRequest("prompt is required".into()));
    }
    if req.file_urls.is_empty() {
        return Err(ServerError::BadRequest("at least one file URL is required".into()));
    }

    let mut image_urls = Vec::with_capacity(req.file_urls.len());
    for url in &req.file_urls {
        image_urls.push(inline_image_url(&state.files, &state.config, url).await?);
    }

    let result = state.llm.invoke(&req, &image_urls).await?;
    Ok(Json(result))
}

// ─── Scans ───

async fn create_scan(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(new_scan): Json<NewScan>,
) -> Result<(StatusCode, Json<Scan>), ServerError> {
    let user = require_session(&headers, &state).await?;
    let scan = new_scan.with_id(ScanId::new_remote());

    state.db.lock().await.insert_scan(user.id, &scan)?;

    info!(user = %user.id, scan = %scan.id, "Scan created");
    Ok((StatusCode::CREATED, Json(scan)))
}

async fn list_scans(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<Scan>>, ServerError> {
    let user = require_session(&headers, &state).await?;
    let scans = state.db.lock().await.list_scans(user.id)?;
    Ok(Json(scans))
}

async fn get_scan(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Scan>, ServerError> {
    let user = require_session(&headers, &state).await?;
    let scan = state.db.lock().await.get_scan(user.id, id)?;
    Ok(Json(scan))
}

async fn patch_scan(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ScanPatch>,
) -> Result<Json<Scan>, ServerError> {
    let user = require_session(&headers, &state).await?;

    let db = state.db.lock().await;
    let mut scan = db.get_scan(user.id, id)?;
    scan.apply(&patch);
    if !db.update_scan(user.id, &scan)? {
        return Err(ServerError::NotFound(format!("scan {id}")));
    }

    Ok(Json(scan))
}

async fn delete_scan(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let user = require_session(&headers, &state).await?;

    if !state.db.lock().await.delete_scan(user.id, id)? {
        return Err(ServerError::NotFound(format!("scan {id}")));
    }

    info!(user = %user.id, scan = %id, "Scan deleted");
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ─── Knowledge base (admin only) ───

fn validate_draft(draft: &KnowledgeDraft) -> Result<(), ServerError> {
    draft
        .validate()
        .map_err(|field| ServerError::BadRequest(format!("{field} is required")))
}

async fn list_plants(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(filter): Query<KnowledgeFilter>,
) -> Result<Json<Vec<PlantKnowledgeEntry>>, ServerError> {
    require_admin(&headers, &state).await?;
    let plants = state.db.lock().await.list_plants(&filter)?;
    Ok(Json(plants))
}

async fn create_plant(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(draft): Json<KnowledgeDraft>,
) -> Result<(StatusCode, Json<PlantKnowledgeEntry>), ServerError> {
    let admin = require_admin(&headers, &state).await?;
    validate_draft(&draft)?;

    let entry = draft.into_entry(Uuid::new_v4(), Utc::now());
    state.db.lock().await.insert_plant(&entry)?;

    info!(
        admin = %admin.id,
        plant = %entry.id,
        name = %entry.draft.common_name,
        "Knowledge entry created"
    );
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn get_plant(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PlantKnowledgeEntry>, ServerError> {
    require_admin(&headers, &state).await?;
    let entry = state.db.lock().await.get_plant(id)?;
    Ok(Json(entry))
}

async fn update_plant(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(draft): Json<KnowledgeDraft>,
) -> Result<Json<PlantKnowledgeEntry>, ServerError> {
    require_admin(&headers, &state).await?;
    validate_draft(&draft)?;

    let db = state.db.lock().await;
    if !db.update_plant(id, &draft)? {
        return Err(ServerError::NotFound(format!("plant {id}")));
    }
    Ok(Json(db.get_plant(id)?))
}

async fn delete_plant(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let admin = require_admin(&headers, &state).await?;

    if !state.db.lock().await.delete_plant(id)? {
        return Err(ServerError::NotFound(format!("plant {id}")));
    }

    info!(admin = %admin.id, plant = %id, "Knowledge entry deleted");
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
