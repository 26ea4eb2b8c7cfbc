//! HTTP API for practice sessions.
//!
//! # Endpoints
//!
//! - `POST /api/sessions` - Create a session from a [`SessionRequest`]
//! - `GET /api/sessions/:id` - Current session state
//! - `POST /api/sessions/:id/generate` - Generate and evaluate the code
//! - `POST /api/sessions/:id/review` - Submit a review
//! - `POST /api/sessions/:id/reset` - Start the session over
//! - `GET /api/sessions/:id/report` - Final report of a completed session
//!
//! # Example
//!
//! ```no_run
//! use drill_engine::{create_router, AppState, Config, Services};
//!
//! # async fn example(services: Services) {
//! let state = AppState::new(&services, Config::default());
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use drill_report::{Report, ReportGenerator};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::DrillError;
use crate::handle::{HandleSettings, SessionRegistry};
use crate::report::report_input;
use crate::services::Services;
use crate::session::SessionState;
use crate::validator::{build_state, SessionRequest};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for the review endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    /// The learner's review text.
    pub text: String,
    /// Iteration the review was written for; the current one when absent.
    #[serde(default)]
    pub iteration: Option<u32>,
}

/// Response body for the report endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    /// Session the report belongs to.
    pub session_id: String,
    /// The comparison report text.
    pub report: String,
    /// Structured summary computed from the session counts.
    pub summary: Report,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// Engine configuration.
    pub config: Config,
    /// Live sessions.
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    /// Creates application state with an empty registry.
    #[must_use]
    pub fn new(services: &Services, config: Config) -> Self {
        let engine = Arc::new(Engine::new(services, &config));
        Self::with_engine(engine, config)
    }

    /// Creates application state around an existing engine.
    #[must_use]
    pub fn with_engine(engine: Arc<Engine>, config: Config) -> Self {
        let registry = SessionRegistry::new(engine, HandleSettings::from(&config));
        Self {
            config,
            registry: Arc::new(registry),
        }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Engine errors, rendered as JSON with a matching status code.
#[derive(Debug)]
struct ApiError(DrillError);

impl From<DrillError> for ApiError {
    fn from(err: DrillError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DrillError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
            DrillError::SessionBusy { .. } => StatusCode::SERVICE_UNAVAILABLE,
            DrillError::InvalidPhase { .. } | DrillError::StaleSubmission { .. } => {
                StatusCode::CONFLICT
            }
            DrillError::ValidationError { .. } | DrillError::ReviewSubmissionError { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            DrillError::GenerationFailure { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
pub fn create_router(state: AppState) -> Router {
    // Configure CORS for development (allow all origins)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/sessions", post(handle_create))
        .route("/sessions/:id", get(handle_get))
        .route("/sessions/:id/generate", post(handle_generate))
        .route("/sessions/:id/review", post(handle_review))
        .route("/sessions/:id/reset", post(handle_reset))
        .route("/sessions/:id/report", get(handle_report));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `POST /api/sessions`.
async fn handle_create(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SessionRequest>,
) -> Result<(StatusCode, Json<SessionState>), ApiError> {
    let session = build_state(&request, &state.config)?;
    let handle = state.registry.insert(session).await;
    info!(session_id = %handle.id(), "Session created");
    Ok((StatusCode::CREATED, Json(handle.snapshot().await)))
}

/// Handler for `GET /api/sessions/:id`.
async fn handle_get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionState>, ApiError> {
    let handle = state.registry.get(&id).await?;
    Ok(Json(handle.snapshot().await))
}

/// Handler for `POST /api/sessions/:id/generate`.
async fn handle_generate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionState>, ApiError> {
    let handle = state.registry.get(&id).await?;
    let session = handle.generate().await.map_err(|e| {
        warn!(session_id = %id, error = %e, "Generation request failed");
        e
    })?;
    info!(session_id = %id, phase = %session.phase, "Generation finished");
    Ok(Json(session))
}

/// Handler for `POST /api/sessions/:id/review`.
async fn handle_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<SessionState>, ApiError> {
    let handle = state.registry.get(&id).await?;
    let session = handle
        .submit_review(&request.text, request.iteration)
        .await?;
    info!(
        session_id = %id,
        phase = %session.phase,
        iteration = session.current_iteration,
        "Review processed"
    );
    Ok(Json(session))
}

/// Handler for `POST /api/sessions/:id/reset`.
async fn handle_reset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionState>, ApiError> {
    let handle = state.registry.get(&id).await?;
    Ok(Json(handle.reset().await?))
}

/// Handler for `GET /api/sessions/:id/report`.
async fn handle_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ReportResponse>, ApiError> {
    let handle = state.registry.get(&id).await?;
    let session = handle.snapshot().await;

    let report = match session.comparison_report.clone() {
        Some(report) if session.is_complete() => report,
        _ => return Err(DrillError::invalid_phase("read the report", session.phase).into()),
    };

    Ok(Json(ReportResponse {
        session_id: session.id.clone(),
        report,
        summary: ReportGenerator::new(report_input(&session)).generate(),
    }))
}

// ============================================================================
// Tests
// ============================================================================
