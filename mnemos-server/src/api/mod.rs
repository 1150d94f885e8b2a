// Copyright 2025 Mnemos (https://github.com/mnemos-ai)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! HTTP API surface
//!
//! Thin axum handlers over the memory engine. Validation failures map to
//! 400, lock contention to 409, missing resources to 404; backend and
//! timeout failures surface as 500 with an opaque message, with the detail
//! kept in the logs and the request id echoed in the `x-request-id` header.

pub mod admin;
pub mod health;
pub mod ingest;
pub mod query;

use std::sync::Arc;

use axum::{
    extract::Request,
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use mnemos_core::{Coordinator, GraphStore, MemoryError, TaskQueue};
use mnemos_memory::{IngestService, Scheduler, Workspace};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub ingest: Arc<IngestService>,
    pub workspace: Arc<Workspace>,
    pub scheduler: Arc<Scheduler>,
    pub graph: Arc<dyn GraphStore>,
    pub coordinator: Arc<dyn Coordinator>,
    pub queue: Arc<dyn TaskQueue>,
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error")]
    Internal,
}

impl From<MemoryError> for ApiError {
    fn from(e: MemoryError) -> Self {
        match e {
            MemoryError::Validation(msg) => ApiError::BadRequest(msg),
            MemoryError::NotFound(msg) => ApiError::NotFound(msg),
            MemoryError::LockHeld(msg) => ApiError::Conflict(msg),
            other => {
                // Detail stays in the logs; the client gets an opaque 500.
                error!(kind = other.kind(), error = %other, "request failed");
                ApiError::Internal
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            ),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Per-request id, honored from `x-request-id` or freshly minted, echoed on
/// the response and attached to request extensions for handlers.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let rid = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(rid.clone()));
    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&rid) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Request id attached by [`request_id_middleware`].
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Build the API router over the shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/ingest", post(ingest::ingest))
        .route("/api/v1/query", post(query::query))
        .route("/api/v1/graph/:tenant_id/stats", get(admin::graph_stats))
        .route(
            "/api/v1/admin/consolidate/:tenant_id",
            post(admin::force_consolidation),
        )
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
