use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::errors::{CacheError, ConfigError, IngestError};
use crate::ingest::CompressionTrigger;
use crate::query::QueryRequest;
use crate::rate::{CompressionRate, QueryComplexity, recommend};
use crate::runtime::Runtime;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub runtime: Runtime,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    #[serde(default)]
    pub task_type: String,
    #[serde(alias = "data_size_words")]
    pub data_size: usize,
    #[serde(default = "default_complexity")]
    pub complexity: String,
}

fn default_complexity() -> String {
    "moderate".to_string()
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub task_type: String,
    pub recommended_rate: CompressionRate,
    pub target_ratio: u32,
    pub data_size: usize,
    pub complexity: QueryComplexity,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::DocumentNotFound { .. } => ApiError::NotFound(err.to_string()),
            IngestError::Config(_) | IngestError::NoChunks { .. } => {
                ApiError::BadRequest(err.to_string())
            }
            IngestError::NotUtf8 { .. } | IngestError::Tier { .. } => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/query", post(query))
        .route("/compress", post(compress))
        .route("/recommend", post(recommend_rate))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn query(
    State(state): State<SharedState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let rate = req
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let response = state
        .runtime
        .responder
        .answer(&req.query, &req.task_type, rate)
        .await
        .inspect_err(|e| error!(error = %e, task_type = %req.task_type, "Query failed"))?;
    Ok(Json(response))
}

async fn compress(
    State(state): State<SharedState>,
    payload: Result<Json<CompressionTrigger>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(trigger) = payload?;
    if trigger.task_type.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Missing required parameter: task_type".to_string(),
        ));
    }
    if trigger.chunk_count == 0 {
        return Err(ApiError::BadRequest(
            "chunk_count must be at least 1".to_string(),
        ));
    }

    let report = state
        .runtime
        .ingest
        .run_compression(&trigger)
        .await
        .inspect_err(|e| warn!(error = %e, task_type = %trigger.task_type, "Compression trigger failed"))?;
    Ok(Json(report))
}

async fn recommend_rate(
    payload: Result<Json<RecommendRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let complexity: QueryComplexity = req
        .complexity
        .parse()
        .map_err(|e: ConfigError| ApiError::BadRequest(e.to_string()))?;
    let rate = recommend(&req.task_type, req.data_size, complexity);
    Ok(Json(RecommendResponse {
        task_type: req.task_type,
        recommended_rate: rate,
        target_ratio: rate.target_ratio(),
        data_size: req.data_size,
        complexity,
    }))
}
