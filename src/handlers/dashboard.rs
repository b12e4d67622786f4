use axum::{extract::State, routing::get, Json, Router};

use crate::services::dashboard::DashboardSummary;
use crate::{errors::ServiceError, ApiResponse, AppState};

/// Dashboard summary
#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    summary = "Get dashboard",
    description = "One row per contract through its display period, plus global counters and per-currency totals",
    responses(
        (status = 200, description = "Dashboard retrieved successfully", body = ApiResponse<DashboardSummary>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_dashboard(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DashboardSummary>>, ServiceError> {
    let summary = state.services.dashboard.get_summary().await?;
    Ok(Json(ApiResponse::success(summary)))
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/", get(get_dashboard))
}
