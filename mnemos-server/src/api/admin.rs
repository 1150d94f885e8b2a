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

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::info;

use mnemos_core::{ConsolidationTask, GraphStats};

use super::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct ConsolidateResponse {
    pub message: String,
    pub tenant_id: String,
}

/// POST /api/v1/admin/consolidate/:tenant_id: force a consolidation run.
///
/// Bypasses the trigger check and the scheduler's enqueue gate. Execution
/// is still serialized by the worker's per-tenant run lock, so a forced
/// task racing a scheduled one completes without work instead of writing
/// twice.
pub async fn force_consolidation(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<(StatusCode, Json<ConsolidateResponse>), ApiError> {
    if tenant_id.is_empty() {
        return Err(ApiError::BadRequest("tenant_id is required".into()));
    }

    state
        .queue
        .enqueue(ConsolidationTask {
            tenant_id: tenant_id.clone(),
        })
        .await?;

    info!(tenant_id, "consolidation force-enqueued");
    Ok((
        StatusCode::ACCEPTED,
        Json(ConsolidateResponse {
            message: "consolidation enqueued".into(),
            tenant_id,
        }),
    ))
}

/// GET /api/v1/graph/:tenant_id/stats: semantic store counters.
pub async fn graph_stats(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<GraphStats>, ApiError> {
    let stats = state.graph.stats(&tenant_id).await?;
    Ok(Json(stats))
}
