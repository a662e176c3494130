use std::sync::{Arc, Mutex};

use shuttle_axum::axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::batch::{BatchJob, BatchOrchestrator, EntityOutcome, JobOptions, SignalsReply};
use crate::cache::CacheEntry;
use crate::error::SignalError;
use crate::model::{FetchRequest, Prospect};

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<BatchOrchestrator>,
    shutdown: CancellationToken,
    /// Token shared by the batches running now; swapped for a fresh child of
    /// `shutdown` after each cancel.
    batches: Arc<Mutex<CancellationToken>>,
}

impl AppState {
    pub fn new(pipeline: Arc<BatchOrchestrator>) -> Self {
        Self::with_shutdown(pipeline, CancellationToken::new())
    }

    /// Cancelling `shutdown` stops running batches at the next entity boundary
    /// and every later batch before its first entity.
    pub fn with_shutdown(pipeline: Arc<BatchOrchestrator>, shutdown: CancellationToken) -> Self {
        Self {
            pipeline,
            batches: Arc::new(Mutex::new(shutdown.child_token())),
            shutdown,
        }
    }

    fn batch_token(&self) -> CancellationToken {
        self.batches.lock().expect("batch token mutex poisoned").clone()
    }

    /// Cancel the batches running now; later requests get a fresh token.
    pub fn cancel_batches(&self) {
        let mut current = self.batches.lock().expect("batch token mutex poisoned");
        current.cancel();
        *current = self.shutdown.child_token();
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/signals", post(fetch_signals))
        .route("/batch", post(run_batch))
        .route("/batch/cancel", post(cancel_batches))
        .route("/cache/{entity}", get(get_cache).delete(invalidate_cache))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Error body: `{"error": "..."}` with a status derived from the error kind.
pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

impl From<SignalError> for ApiError {
    fn from(e: SignalError) -> Self {
        let status = match &e {
            SignalError::EntityProcessing { .. } => StatusCode::CONFLICT,
            SignalError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            SignalError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_GATEWAY,
        };
        ApiError(status, e.to_string())
    }
}

fn bad_request(msg: &str) -> ApiError {
    ApiError(StatusCode::BAD_REQUEST, msg.to_string())
}

async fn fetch_signals(
    State(state): State<AppState>,
    Json(req): Json<FetchRequest>,
) -> Result<Json<SignalsReply>, ApiError> {
    if req.entity_name.trim().is_empty() {
        return Err(bad_request("entity_name must not be empty"));
    }
    let reply = state.pipeline.fetch_signals(&req).await?;
    Ok(Json(reply))
}

#[derive(serde::Deserialize)]
struct BatchReq {
    prospects: Vec<Prospect>,
    #[serde(default)]
    options: JobOptions,
}

#[derive(serde::Serialize)]
struct BatchResp {
    progress: f64,
    outcomes: Vec<EntityOutcome>,
}

async fn run_batch(
    State(state): State<AppState>,
    Json(body): Json<BatchReq>,
) -> Result<Json<BatchResp>, ApiError> {
    if body.prospects.is_empty() {
        return Err(bad_request("prospects must not be empty"));
    }
    let job = BatchJob::new(body.prospects, body.options);
    let cancel = state.batch_token();
    let pipeline = state.pipeline.clone();
    // Own task: a dropped request must not abort an entity halfway.
    let (progress, outcomes) = tokio::spawn(async move {
        let outcomes = pipeline.run_batch(&job, &cancel).await;
        (job.progress().fraction(), outcomes)
    })
    .await
    .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, format!("batch task failed: {e}")))?;
    info!(target: "signals::api", prospects = outcomes.len(), progress, "batch request served");
    Ok(Json(BatchResp { progress, outcomes }))
}

async fn cancel_batches(State(state): State<AppState>) -> StatusCode {
    warn!(target: "signals::api", "batch cancellation requested");
    state.cancel_batches();
    StatusCode::ACCEPTED
}

async fn get_cache(
    State(state): State<AppState>,
    Path(entity): Path<String>,
) -> Result<Json<CacheEntry>, ApiError> {
    state
        .pipeline
        .cache()
        .get(&entity)
        .map(Json)
        .ok_or_else(|| ApiError(StatusCode::NOT_FOUND, format!("no cache entry for '{entity}'")))
}

async fn invalidate_cache(State(state): State<AppState>, Path(entity): Path<String>) -> StatusCode {
    if state.pipeline.cache().invalidate(&entity) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::fakes::offline_extractor;
    use crate::fetch::EntityFetcher;
    use crate::generate::MockGenerator;
    use crate::sources::{PrimarySource, SecondarySource};
    use crate::SessionCache;

    fn state(shutdown: CancellationToken) -> AppState {
        let ex = offline_extractor();
        let pipeline = BatchOrchestrator::new(
            PipelineConfig::default(),
            EntityFetcher::new(
                PrimarySource::new(None, ex.clone(), 60, 5),
                SecondarySource::new(None, ex, 5),
            ),
            Arc::new(MockGenerator::fixed("x")),
            Arc::new(SessionCache::new()),
        );
        AppState::with_shutdown(Arc::new(pipeline), shutdown)
    }

    #[test]
    fn cancel_stops_running_batches_only() {
        let s = state(CancellationToken::new());
        let running = s.batch_token();
        s.cancel_batches();
        assert!(running.is_cancelled());
        assert!(!s.batch_token().is_cancelled());
    }

    #[test]
    fn shutdown_reaches_every_batch_token() {
        let shutdown = CancellationToken::new();
        let s = state(shutdown.clone());
        let running = s.batch_token();
        shutdown.cancel();
        assert!(running.is_cancelled());
        s.cancel_batches();
        assert!(s.batch_token().is_cancelled());
    }
}
