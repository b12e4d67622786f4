use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "MedSupply API",
        version = "0.3.0",
        description = r#"
# Medical Supply Contract Management API

Tracks medical-supply procurement contracts through their execution periods:
budgets, purchase orders, budget injections, and the reporting built on top
of them.

## Concepts

- **Contract**: a supply agreement with up to three medication line items.
- **Period**: one execution window of a contract, carrying its own budget.
  At most one period per contract is active at a time.
- **Order**: a purchase against a period's budget. Orders never overdraw
  the period's balance.
- **Injection**: extra budget added to a contract's active period, backed
  by an authorizing letter and optionally a PDF document.

## Pagination

List endpoints take `page` (default 1) and `per_page` (default 20) query
parameters.

## Error Handling

Errors use a consistent envelope with appropriate HTTP status codes:

```json
{
  "error": "Unprocessable Entity",
  "message": "Order amount 600 exceeds the period's available balance 450",
  "request_id": "0e0f8f6e-4b1a-4f4e-9d5c-7b1d2a3c4d5e",
  "timestamp": "2025-06-01T00:00:00Z"
}
```
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Contracts", description = "Contract and line item management"),
        (name = "Periods", description = "Execution period management"),
        (name = "Orders", description = "Purchase order management"),
        (name = "Injections", description = "Budget injection management"),
        (name = "Reports", description = "Dashboard, statistics, and CSV downloads"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Contracts
        crate::handlers::contracts::list_contracts,
        crate::handlers::contracts::create_contract,
        crate::handlers::contracts::get_contract,
        crate::handlers::contracts::update_contract,
        crate::handlers::contracts::delete_contract,

        // Periods
        crate::handlers::periods::list_contract_periods,
        crate::handlers::periods::create_contract_period,
        crate::handlers::periods::update_period,
        crate::handlers::periods::activate_period,
        crate::handlers::periods::delete_period,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::delete_order,

        // Injections
        crate::handlers::injections::create_contract_injection,
        crate::handlers::injections::list_injections,
        crate::handlers::injections::update_injection,
        crate::handlers::injections::delete_injection,

        // Reports
        crate::handlers::dashboard::get_dashboard,
        crate::handlers::statistics::get_statistics,
        crate::handlers::exports::export_orders,
        crate::handlers::exports::export_injections,
        crate::handlers::exports::export_contracts,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,

            // Contract types
            crate::services::contracts::ContractResponse,
            crate::services::contracts::ContractItemResponse,
            crate::services::contracts::ContractListResponse,
            crate::services::contracts::ContractDetailResponse,
            crate::services::contracts::PeriodDetailResponse,
            crate::services::contracts::CreateContractRequest,
            crate::services::contracts::UpdateContractRequest,
            crate::services::contracts::ContractItemInput,
            crate::services::contracts::InitialPeriodInput,

            // Period types
            crate::services::periods::PeriodResponse,
            crate::services::periods::CreatePeriodRequest,
            crate::services::periods::UpdatePeriodRequest,

            // Order types
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderListItem,
            crate::services::orders::OrderListResponse,
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::UpdateOrderRequest,

            // Injection types
            crate::services::injections::InjectionResponse,
            crate::services::injections::InjectionListItem,
            crate::services::injections::InjectionListResponse,
            crate::handlers::injections::CreateInjectionBody,
            crate::services::injections::UpdateInjectionRequest,

            // Report types
            crate::services::dashboard::DashboardSummary,
            crate::services::dashboard::DashboardRow,
            crate::services::dashboard::DashboardStats,
            crate::services::dashboard::CurrencyTotals,
            crate::services::statistics::StatisticsReport,
            crate::services::statistics::CurrencyExecution,
            crate::services::statistics::ContractExecution,
            crate::services::statistics::ExpiringContract,
            crate::services::statistics::ProductTotal,
            crate::services::statistics::MonthlyTotal,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_the_core_paths() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("MedSupply API"));
        assert!(json.contains("/api/v1/contracts"));
        assert!(json.contains("/api/v1/dashboard"));
        assert!(json.contains("/api/v1/exports/orders.csv"));
    }
}
