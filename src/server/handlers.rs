use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use super::state::AppState;
use crate::geo::Suggestion;
use crate::pipeline::{EstimateError, EstimateResponse};

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
}

pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ApiErrorBody { error: self.1 })).into_response()
    }
}

impl From<EstimateError> for ApiError {
    fn from(e: EstimateError) -> Self {
        Self(StatusCode::BAD_REQUEST, e.to_string())
    }
}

// ─── POST /calculate ─────────────────────────────────────────────

/// Fields are loose JSON: anything that is not a string counts as empty.
#[derive(Deserialize, Default)]
pub struct CalculateRequest {
    #[serde(default)]
    pub pickup: Option<Value>,
    #[serde(default)]
    pub drop: Option<Value>,
}

fn text(v: &Option<Value>) -> String {
    v.as_ref()
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub async fn calculate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CalculateRequest>, JsonRejection>,
) -> Result<Json<EstimateResponse>, ApiError> {
    let start = Instant::now();
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let pickup = text(&req.pickup);
    let drop = text(&req.drop);

    let (p, d) = (pickup.clone(), drop.clone());
    let worker = state.clone();
    let estimate = tokio::task::spawn_blocking(move || worker.pipeline.estimate(&p, &d))
        .await
        .map_err(|e| {
            error!(error = %e, "estimate task failed");
            ApiError(StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
        })?;

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    match estimate {
        Ok(est) => {
            info!(
                pickup = %pickup.trim(),
                drop = %drop.trim(),
                estimated = est.is_estimated,
                elapsed_ms,
                "POST /calculate"
            );
            Ok(Json(est.to_response()))
        }
        Err(e) => {
            info!(
                pickup = %pickup.trim(),
                drop = %drop.trim(),
                error = %e,
                elapsed_ms,
                "POST /calculate rejected"
            );
            Err(e.into())
        }
    }
}

// ─── GET /suggest ────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SuggestQuery {
    pub q: Option<String>,
}

#[derive(Serialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<Suggestion>,
}

/// Always 200; failures become an empty list.
pub async fn suggest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SuggestQuery>,
) -> Json<SuggestResponse> {
    let q = params.q.unwrap_or_default();
    let worker = state.clone();
    let suggestions = tokio::task::spawn_blocking(move || worker.pipeline.geo().suggest(&q))
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, "suggest task failed");
            Vec::new()
        });
    Json(SuggestResponse { suggestions })
}

// ─── GET /health ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub offline: bool,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        offline: state.offline,
    })
}
