use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
    Json, Router,
};
use uuid::Uuid;

use crate::services::periods::{CreatePeriodRequest, PeriodResponse, UpdatePeriodRequest};
use crate::{errors::ServiceError, ApiResponse, AppState};

/// List a contract's periods
#[utoipa::path(
    get,
    path = "/api/v1/contracts/{id}/periods",
    summary = "List periods",
    description = "Get a contract's periods, oldest first, each with its budget position",
    params(("id" = Uuid, Path, description = "Contract ID")),
    responses(
        (status = 200, description = "Periods retrieved successfully", body = ApiResponse<Vec<PeriodResponse>>),
        (status = 404, description = "Contract not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn list_contract_periods(
    State(state): State<AppState>,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<PeriodResponse>>>, ServiceError> {
    let periods = state.services.periods.list_periods(contract_id).await?;
    Ok(Json(ApiResponse::success(periods)))
}

/// Add a period to a contract
#[utoipa::path(
    post,
    path = "/api/v1/contracts/{id}/periods",
    summary = "Create period",
    description = "Add a follow-on period; name and start date default to continue the latest period",
    params(("id" = Uuid, Path, description = "Contract ID")),
    request_body = CreatePeriodRequest,
    responses(
        (status = 201, description = "Period created successfully", body = ApiResponse<PeriodResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Contract not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn create_contract_period(
    State(state): State<AppState>,
    Path(contract_id): Path<Uuid>,
    Json(request): Json<CreatePeriodRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PeriodResponse>>), ServiceError> {
    let period = state
        .services
        .periods
        .create_period(contract_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(period))))
}

/// Update period
#[utoipa::path(
    put,
    path = "/api/v1/periods/{id}",
    summary = "Update period",
    description = "Update a period's fields; activation goes through its own endpoint",
    params(("id" = Uuid, Path, description = "Period ID")),
    request_body = UpdatePeriodRequest,
    responses(
        (status = 200, description = "Period updated successfully", body = ApiResponse<PeriodResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Period not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_period(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePeriodRequest>,
) -> Result<Json<ApiResponse<PeriodResponse>>, ServiceError> {
    let period = state.services.periods.update_period(id, request).await?;
    Ok(Json(ApiResponse::success(period)))
}

/// Activate period
#[utoipa::path(
    post,
    path = "/api/v1/periods/{id}/activate",
    summary = "Activate period",
    description = "Make this the contract's running period, closing any other active one",
    params(("id" = Uuid, Path, description = "Period ID")),
    responses(
        (status = 200, description = "Period activated successfully", body = ApiResponse<PeriodResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 404, description = "Period not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn activate_period(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PeriodResponse>>, ServiceError> {
    let period = state.services.periods.activate_period(id).await?;
    Ok(Json(ApiResponse::success(period)))
}

/// Delete period
#[utoipa::path(
    delete,
    path = "/api/v1/periods/{id}",
    summary = "Delete period",
    description = "Delete a period along with its orders and injections",
    params(("id" = Uuid, Path, description = "Period ID")),
    responses(
        (status = 204, description = "Period deleted successfully"),
        (status = 404, description = "Period not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn delete_period(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.periods.delete_period(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn period_routes() -> Router<AppState> {
    Router::new()
        .route("/:id", put(update_period).delete(delete_period))
        .route("/:id/activate", post(activate_period))
}
