//! # REST API
//!
//! Builds the axum router that exposes the chain over HTTP. All endpoints
//! share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                       | Description                          |
//! |--------|----------------------------|--------------------------------------|
//! | GET    | `/health`                  | Liveness probe                       |
//! | GET    | `/status`                  | Version, hash algorithm, height      |
//! | POST   | `/blocks`                  | Append a block                       |
//! | GET    | `/blocks/:height`          | Block by height                      |
//! | GET    | `/blocks/:height/validate` | Validate one block                   |
//! | GET    | `/chain/validate`          | Validate every block and link        |

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use strand_protocol::storage::{Block, BlockValidation, ChainError, ChainManager, SledStore};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// The chain type served by the node.
pub type NodeChain = ChainManager<SledStore>;

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The chain this node owns.
    pub chain: Arc<NodeChain>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/blocks", post(append_handler))
        .route("/blocks/:height", get(block_by_height_handler))
        .route("/blocks/:height/validate", get(validate_block_handler))
        .route("/chain/validate", get(validate_chain_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Request payload for `POST /blocks`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AppendRequest {
    /// Opaque payload to seal into the new block.
    pub body: serde_json::Value,
}

/// Response payload for `POST /blocks`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AppendResponse {
    pub height: u64,
    pub hash: String,
}

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Hash algorithm the chain is sealed with.
    pub hash_algorithm: String,
    /// Height of the last block, -1 when empty.
    pub height: i64,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for `GET /chain/validate`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChainValidationResponse {
    pub valid: bool,
    /// Failing heights in ascending order.
    pub invalid_heights: Vec<u64>,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — returns node status summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        version: state.version.clone(),
        hash_algorithm: state.chain.algorithm().to_string(),
        height: state.chain.current_height(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `POST /blocks` — seal the payload into a new block.
///
/// Returns 201 with the new height and hash, or 500 if the store rejected
/// the write (the height is not consumed in that case).
async fn append_handler(
    State(state): State<AppState>,
    Json(req): Json<AppendRequest>,
) -> Response {
    let timer = state.metrics.append_latency_seconds.start_timer();
    let result = state.chain.append(Block::new(req.body));
    timer.observe_duration();

    match result {
        Ok(block) => {
            state.metrics.blocks_appended_total.inc();
            state.metrics.chain_height.set(block.height as i64);
            (
                StatusCode::CREATED,
                Json(AppendResponse {
                    height: block.height,
                    hash: block.hash,
                }),
            )
                .into_response()
        }
        Err(e) => {
            state.metrics.append_failures_total.inc();
            tracing::error!(error = %e, "append failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// `GET /blocks/:height` — block by height.
async fn block_by_height_handler(
    State(state): State<AppState>,
    Path(height): Path<u64>,
) -> Response {
    match state.chain.get_block(height) {
        Ok(block) => Json(block).into_response(),
        Err(e @ ChainError::NotFound(_)) => error_response(StatusCode::NOT_FOUND, e.to_string()),
        Err(e) => {
            tracing::error!(height, error = %e, "block lookup failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// `GET /blocks/:height/validate` — check one block's own hash.
///
/// A missing block is reported as invalid, not as 404.
async fn validate_block_handler(
    State(state): State<AppState>,
    Path(height): Path<u64>,
) -> Json<BlockValidation> {
    let result = state.chain.validate_block(height);
    state.metrics.validation_runs_total.inc();
    if !result.valid {
        state.metrics.invalid_blocks_total.inc();
    }
    Json(result)
}

/// `GET /chain/validate` — validate every block and every link.
///
/// Runs on the blocking pool since it reads and hashes the whole chain.
async fn validate_chain_handler(State(state): State<AppState>) -> Response {
    let chain = Arc::clone(&state.chain);
    let invalid = match tokio::task::spawn_blocking(move || chain.validate_chain()).await {
        Ok(invalid) => invalid,
        Err(e) => {
            tracing::error!(error = %e, "chain validation task failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "validation failed");
        }
    };

    state.metrics.validation_runs_total.inc();
    state.metrics.invalid_blocks_total.inc_by(invalid.len() as u64);

    Json(ChainValidationResponse {
        valid: invalid.is_empty(),
        invalid_heights: invalid.into_iter().collect(),
    })
    .into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
