use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::post};
use log::{error, info};
use serde_json::json;
use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::data::{ShiftRequest, SolveResult};
use crate::error::ShiftError;
use crate::export;
use crate::optimize;
use crate::solver::HighsSolver;

/// Error body returned by every endpoint.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<ShiftError> for ApiError {
    fn from(e: ShiftError) -> Self {
        let status = match e {
            ShiftError::Validation(_) | ShiftError::Reference(_) => StatusCode::BAD_REQUEST,
            ShiftError::Integrity(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{}", self.message);
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

// the solve blocks, so keep it off the async workers
async fn run_request(
    solver: Arc<HighsSolver>,
    request: ShiftRequest,
) -> Result<SolveResult, ApiError> {
    tokio::task::spawn_blocking(move || optimize(&request, solver.as_ref()))
        .await
        .map_err(|e| {
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("solver task failed: {e}"),
            )
        })?
        .map_err(ApiError::from)
}

async fn solve_handler(
    State(solver): State<Arc<HighsSolver>>,
    Json(request): Json<ShiftRequest>,
) -> Result<Json<SolveResult>, ApiError> {
    run_request(solver, request).await.map(Json)
}

async fn export_handler(
    State(solver): State<Arc<HighsSolver>>,
    Json(request): Json<ShiftRequest>,
) -> Result<Response, ApiError> {
    let result = run_request(solver, request).await?;
    let Some(assignment) = result.assignment else {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            format!("no assignment to export (status {})", result.status),
        ));
    };
    let body = export::to_csv_string(&assignment)
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], body).into_response())
}

pub fn router(solver: HighsSolver) -> Router {
    Router::new()
        .route("/v1/shift/solve", post(solve_handler))
        .route("/v1/shift/export", post(export_handler))
        .with_state(Arc::new(solver))
}

pub async fn run_server(config: ServiceConfig) -> std::io::Result<()> {
    let app = router(HighsSolver::new(config.solver));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await
}
