use axum::{extract::State, Extension, Json};

use crate::middleware::RequestId;

use super::{analyze::ReportItem, map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

/// Returns the most recent analysis reports, newest first, each with
/// its full per-video breakdown.
pub(super) async fn get_history(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<ReportItem>>>, ApiError> {
    let reports = ytpulse_db::recent_reports(&state.pool, state.history_limit)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = reports.into_iter().map(ReportItem::from).collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
