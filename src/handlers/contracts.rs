use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::PaginationParams;
use super::{injections, periods};
use crate::services::contracts::{
    ContractDetailResponse, ContractListResponse, ContractResponse, CreateContractRequest,
    UpdateContractRequest,
};
use crate::{errors::ServiceError, ApiResponse, AppState};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ContractSearchQuery {
    /// Free text matched against code, name, and supplier
    pub search: Option<String>,
}

/// List contracts
#[utoipa::path(
    get,
    path = "/api/v1/contracts",
    summary = "List contracts",
    description = "Get a paginated list of contracts with their line items",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<u64>, Query, description = "Items per page (default: 20)"),
        ("search" = Option<String>, Query, description = "Search term matched against code, name, and supplier"),
    ),
    responses(
        (status = 200, description = "Contracts retrieved successfully", body = ApiResponse<ContractListResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn list_contracts(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<ContractSearchQuery>,
) -> Result<Json<ApiResponse<ContractListResponse>>, ServiceError> {
    let per_page = pagination.capped_per_page(state.config.api_max_page_size as u64);
    let contracts = state
        .services
        .contracts
        .list_contracts(filter.search, pagination.page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(contracts)))
}

/// Create contract
#[utoipa::path(
    post,
    path = "/api/v1/contracts",
    summary = "Create contract",
    description = "Register a contract together with its line items and initial period",
    request_body = CreateContractRequest,
    responses(
        (status = 201, description = "Contract created successfully", body = ApiResponse<ContractResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn create_contract(
    State(state): State<AppState>,
    Json(request): Json<CreateContractRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ContractResponse>>), ServiceError> {
    let contract = state.services.contracts.create_contract(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(contract))))
}

/// Get contract detail
#[utoipa::path(
    get,
    path = "/api/v1/contracts/{id}",
    summary = "Get contract",
    description = "Retrieve a contract with its items and every period's budget position, orders, and injections",
    params(("id" = Uuid, Path, description = "Contract ID")),
    responses(
        (status = 200, description = "Contract retrieved successfully", body = ApiResponse<ContractDetailResponse>),
        (status = 404, description = "Contract not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_contract(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ContractDetailResponse>>, ServiceError> {
    match state.services.contracts.get_contract_detail(id).await? {
        Some(detail) => Ok(Json(ApiResponse::success(detail))),
        None => Err(ServiceError::NotFound(format!(
            "Contract with ID {} not found",
            id
        ))),
    }
}

/// Update contract
#[utoipa::path(
    put,
    path = "/api/v1/contracts/{id}",
    summary = "Update contract",
    description = "Update contract fields; a provided item list replaces the existing one",
    params(("id" = Uuid, Path, description = "Contract ID")),
    request_body = UpdateContractRequest,
    responses(
        (status = 200, description = "Contract updated successfully", body = ApiResponse<ContractResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Contract not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_contract(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateContractRequest>,
) -> Result<Json<ApiResponse<ContractResponse>>, ServiceError> {
    let contract = state.services.contracts.update_contract(id, request).await?;
    Ok(Json(ApiResponse::success(contract)))
}

/// Delete contract
#[utoipa::path(
    delete,
    path = "/api/v1/contracts/{id}",
    summary = "Delete contract",
    description = "Delete a contract with its items, periods, orders, and injections",
    params(("id" = Uuid, Path, description = "Contract ID")),
    responses(
        (status = 204, description = "Contract deleted successfully"),
        (status = 404, description = "Contract not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn delete_contract(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.contracts.delete_contract(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn contract_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_contracts).post(create_contract))
        .route(
            "/:id",
            get(get_contract)
                .put(update_contract)
                .delete(delete_contract),
        )
        .route(
            "/:id/periods",
            get(periods::list_contract_periods).post(periods::create_contract_period),
        )
        .route(
            "/:id/injections",
            post(injections::create_contract_injection),
        )
}
