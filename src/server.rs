//! HTTP surface: `GET /api` returns the normalized company list

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::error;

use crate::data::CompanyOutput;
use crate::pipeline::{Pipeline, PipelineError};

/// Error returned by handlers; every pipeline failure is a 500 with a JSON body
#[derive(Debug)]
pub struct ApiError(PipelineError);

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = %self.0, kind = ?self.0.kind(), "failed to produce company list");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

/// Builds the application router
///
/// Both `/api` and `/api/` are served; other methods on them get 405 and other
/// paths 404 from axum's defaults.
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/api", get(list_companies))
        .route("/api/", get(list_companies))
        .with_state(pipeline)
}

async fn list_companies(
    State(pipeline): State<Arc<Pipeline>>,
) -> Result<Json<Vec<CompanyOutput>>, ApiError> {
    Ok(Json(pipeline.companies().await?))
}

/// Serves the router on an already-bound listener until the process exits
pub async fn serve(listener: TcpListener, pipeline: Arc<Pipeline>) -> std::io::Result<()> {
    axum::serve(listener, router(pipeline)).await
}
