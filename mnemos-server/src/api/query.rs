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

use axum::{extract::State, Json};
use tracing::debug;

use mnemos_core::{MemoryError, QueryRequest, QueryResponse};

use super::{ApiError, AppState};

/// POST /api/v1/query: assemble context for a query.
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    if request.tenant_id.is_empty() {
        return Err(MemoryError::Validation("tenant_id is required".into()).into());
    }
    if request.query.is_empty() {
        return Err(MemoryError::Validation("query is required".into()).into());
    }

    debug!(tenant_id = %request.tenant_id, "query request");
    state.scheduler.record_activity(&request.tenant_id);

    let response = state.workspace.query(&request).await?;
    Ok(Json(response))
}
