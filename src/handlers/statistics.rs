use axum::{extract::State, routing::get, Json, Router};

use crate::services::statistics::StatisticsReport;
use crate::{errors::ServiceError, ApiResponse, AppState};

/// Statistics report
#[utoipa::path(
    get,
    path = "/api/v1/statistics",
    summary = "Get statistics",
    description = "Per-currency execution, contract and product rankings, the expiration watchlist, and the monthly spending trend",
    responses(
        (status = 200, description = "Statistics retrieved successfully", body = ApiResponse<StatisticsReport>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_statistics(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StatisticsReport>>, ServiceError> {
    let report = state.services.statistics.get_statistics().await?;
    Ok(Json(ApiResponse::success(report)))
}

pub fn statistics_routes() -> Router<AppState> {
    Router::new().route("/", get(get_statistics))
}
