use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::common::PaginationParams;
use crate::services::injections::{
    CreateInjectionRequest, InjectionFilters, InjectionListResponse, InjectionResponse,
    UpdateInjectionRequest,
};
use crate::{errors::ServiceError, ApiResponse, AppState};

/// Injection payload; the target contract comes from the path.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateInjectionBody {
    pub amount: Decimal,
    /// Defaults to today.
    pub injection_date: Option<NaiveDate>,
    /// The authorizing letter ("oficio") number.
    pub reference_number: Option<String>,
    pub description: Option<String>,
    pub document_name: Option<String>,
    /// PDF backing document as a `data:application/pdf;base64,` URL.
    pub document_data: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct InjectionListQuery {
    /// Free text matched against the reference number and description
    pub q: Option<String>,
    pub contract_id: Option<Uuid>,
}

/// Record injection
#[utoipa::path(
    post,
    path = "/api/v1/contracts/{id}/injections",
    summary = "Record injection",
    description = "Add budget to the contract's active period",
    params(("id" = Uuid, Path, description = "Contract ID")),
    request_body = CreateInjectionBody,
    responses(
        (status = 201, description = "Injection recorded successfully", body = ApiResponse<InjectionResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request data or no active period", body = crate::errors::ErrorResponse),
        (status = 404, description = "Contract not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn create_contract_injection(
    State(state): State<AppState>,
    Path(contract_id): Path<Uuid>,
    Json(body): Json<CreateInjectionBody>,
) -> Result<(StatusCode, Json<ApiResponse<InjectionResponse>>), ServiceError> {
    let request = CreateInjectionRequest {
        contract_id,
        amount: body.amount,
        injection_date: body.injection_date,
        reference_number: body.reference_number,
        description: body.description,
        document_name: body.document_name,
        document_data: body.document_data,
    };
    let injection = state.services.injections.create_injection(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(injection))))
}

/// List injections
#[utoipa::path(
    get,
    path = "/api/v1/injections",
    summary = "List injections",
    description = "Get a paginated injection history across contracts, newest first",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<u64>, Query, description = "Items per page (default: 20)"),
        ("q" = Option<String>, Query, description = "Search term"),
        ("contract_id" = Option<Uuid>, Query, description = "Restrict to one contract"),
    ),
    responses(
        (status = 200, description = "Injections retrieved successfully", body = ApiResponse<InjectionListResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn list_injections(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<InjectionListQuery>,
) -> Result<Json<ApiResponse<InjectionListResponse>>, ServiceError> {
    let per_page = pagination.capped_per_page(state.config.api_max_page_size as u64);
    let filters = InjectionFilters {
        search: query.q,
        contract_id: query.contract_id,
    };
    let injections = state
        .services
        .injections
        .list_injections(filters, pagination.page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(injections)))
}

/// Update injection
#[utoipa::path(
    put,
    path = "/api/v1/injections/{id}",
    summary = "Update injection",
    description = "Update an injection's amount, date, references, or backing document",
    params(("id" = Uuid, Path, description = "Injection ID")),
    request_body = UpdateInjectionRequest,
    responses(
        (status = 200, description = "Injection updated successfully", body = ApiResponse<InjectionResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Injection not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_injection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateInjectionRequest>,
) -> Result<Json<ApiResponse<InjectionResponse>>, ServiceError> {
    let injection = state
        .services
        .injections
        .update_injection(id, request)
        .await?;
    Ok(Json(ApiResponse::success(injection)))
}

/// Delete injection
#[utoipa::path(
    delete,
    path = "/api/v1/injections/{id}",
    summary = "Delete injection",
    description = "Delete an injection, removing its amount from the period's budget",
    params(("id" = Uuid, Path, description = "Injection ID")),
    responses(
        (status = 204, description = "Injection deleted successfully"),
        (status = 404, description = "Injection not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn delete_injection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.injections.delete_injection(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn injection_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_injections))
        .route("/:id", put(update_injection).delete(delete_injection))
}
