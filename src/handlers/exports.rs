use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use super::orders::OrderListQuery;
use crate::services::exports::CsvExport;
use crate::{errors::ServiceError, AppState};

fn csv_response(export: CsvExport) -> Response {
    (
        [
            (
                header::CONTENT_TYPE,
                "text/csv; charset=utf-8".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.filename),
            ),
        ],
        export.content,
    )
        .into_response()
}

/// Download order history
#[utoipa::path(
    get,
    path = "/api/v1/exports/orders.csv",
    summary = "Export orders",
    description = "Order history as a CSV download, honoring the order list filters",
    params(
        ("q" = Option<String>, Query, description = "Search term"),
        ("contract_id" = Option<Uuid>, Query, description = "Restrict to one contract"),
        ("period_id" = Option<Uuid>, Query, description = "Restrict to one period"),
        ("from" = Option<NaiveDate>, Query, description = "Earliest order date"),
        ("to" = Option<NaiveDate>, Query, description = "Latest order date"),
    ),
    responses(
        (status = 200, description = "CSV file", content_type = "text/csv", body = String),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn export_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Response, ServiceError> {
    let export = state.services.exports.export_orders(query.into()).await?;
    Ok(csv_response(export))
}

/// Download injection history
#[utoipa::path(
    get,
    path = "/api/v1/exports/injections.csv",
    summary = "Export injections",
    description = "Budget injection history as a CSV download",
    responses(
        (status = 200, description = "CSV file", content_type = "text/csv", body = String),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn export_injections(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let export = state.services.exports.export_injections().await?;
    Ok(csv_response(export))
}

/// Download the contract register
#[utoipa::path(
    get,
    path = "/api/v1/exports/contracts.csv",
    summary = "Export contracts",
    description = "Contract register as a CSV download, one row per line item",
    responses(
        (status = 200, description = "CSV file", content_type = "text/csv", body = String),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn export_contracts(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let export = state.services.exports.export_contracts().await?;
    Ok(csv_response(export))
}

pub fn export_routes() -> Router<AppState> {
    Router::new()
        .route("/orders.csv", get(export_orders))
        .route("/injections.csv", get(export_injections))
        .route("/contracts.csv", get(export_contracts))
}
