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

use mnemos_core::{IngestRequest, IngestResponse};

use super::{ApiError, AppState};

/// POST /api/v1/ingest: append-only episodic write.
///
/// The ingest service validates the request; only accepted turns reach the
/// conversation buffer or reset the tenant's idle clock.
pub async fn ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    debug!(tenant_id = %request.tenant_id, content_length = request.content.len(), "ingest request");

    let response = state
        .ingest
        .ingest(&request.tenant_id, &request.content, &request.role)
        .await?;

    state.scheduler.record_activity(&request.tenant_id);
    state
        .workspace
        .add_turn(&request.tenant_id, &request.role, &request.content);

    Ok(Json(response))
}
