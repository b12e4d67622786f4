use crate::{
    budget::{self, BudgetSnapshot, CurrencyKind},
    cache::{CacheScope, InMemoryCache},
    db::DbPool,
    entities::{
        contract::{self, Entity as ContractEntity},
        contract_item::{self, Entity as ContractItemEntity},
        injection::{self, Entity as InjectionEntity},
        order::{self, Entity as OrderEntity},
        period::{self, Entity as PeriodEntity},
    },
    errors::ServiceError,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{EntityTrait, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// One contract on the dashboard, shown through its display period: the
/// active one, or the earliest when none is active.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardRow {
    pub contract_id: Uuid,
    pub code: String,
    pub name: String,
    pub supplier: String,
    /// First line item's name; falls back to the contract name.
    pub product: String,
    pub currency: String,
    pub period_id: Option<Uuid>,
    pub period_name: Option<String>,
    pub end_date: Option<NaiveDate>,
    pub current_budget: Decimal,
    pub executed: Decimal,
    pub balance: Decimal,
    pub execution_percent: Decimal,
    pub critical: bool,
    pub expiring: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrencyTotals {
    pub currency: String,
    pub budget: Decimal,
    pub executed: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardStats {
    pub total_contracts: u64,
    pub active_contracts: u64,
    pub critical_contracts: u64,
    pub expiring_contracts: u64,
    pub totals: Vec<CurrencyTotals>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardSummary {
    pub rows: Vec<DashboardRow>,
    pub stats: DashboardStats,
}

/// Read-side service assembling the contract dashboard
#[derive(Clone)]
pub struct DashboardService {
    db_pool: Arc<DbPool>,
    cache: Arc<InMemoryCache>,
    cache_ttl: Option<Duration>,
}

impl DashboardService {
    pub fn new(
        db_pool: Arc<DbPool>,
        cache: Arc<InMemoryCache>,
        cache_ttl: Option<Duration>,
    ) -> Self {
        Self {
            db_pool,
            cache,
            cache_ttl,
        }
    }

    /// Builds the dashboard: one row per contract plus global stats.
    #[instrument(skip(self))]
    pub async fn get_summary(&self) -> Result<DashboardSummary, ServiceError> {
        let cache_key = CacheScope::Dashboard.key("summary");
        if let Ok(Some(cached)) = self.cache.get_json::<DashboardSummary>(&cache_key).await {
            return Ok(cached);
        }

        let db = &*self.db_pool;

        let contracts = ContractEntity::find()
            .order_by_asc(contract::Column::Code)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch contracts for dashboard");
                ServiceError::DatabaseError(e.into())
            })?;

        let items = ContractItemEntity::find()
            .order_by_asc(contract_item::Column::Position)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch contract items for dashboard");
                ServiceError::DatabaseError(e.into())
            })?;

        let periods = PeriodEntity::find()
            .order_by_asc(period::Column::StartDate)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch periods for dashboard");
                ServiceError::DatabaseError(e.into())
            })?;

        let orders = OrderEntity::find().all(db).await.map_err(|e| {
            error!(error = %e, "Failed to fetch orders for dashboard");
            ServiceError::DatabaseError(e.into())
        })?;

        let injections = InjectionEntity::find().all(db).await.map_err(|e| {
            error!(error = %e, "Failed to fetch injections for dashboard");
            ServiceError::DatabaseError(e.into())
        })?;

        let today = chrono::Utc::now().date_naive();
        let summary = assemble_summary(today, &contracts, &items, &periods, &orders, &injections);

        if let Err(e) = self.cache.set_json(&cache_key, &summary, self.cache_ttl).await {
            warn!(error = %e, "Failed to cache dashboard summary");
        }

        info!(
            contracts = summary.stats.total_contracts,
            critical = summary.stats.critical_contracts,
            "Dashboard summary assembled successfully"
        );

        Ok(summary)
    }
}

/// Pure assembly over already-fetched rows, so the aggregation logic can be
/// exercised without a database.
pub(crate) fn assemble_summary(
    today: NaiveDate,
    contracts: &[contract::Model],
    items: &[contract_item::Model],
    periods: &[period::Model],
    orders: &[order::Model],
    injections: &[injection::Model],
) -> DashboardSummary {
    let mut items_by_contract: HashMap<Uuid, Vec<&contract_item::Model>> = HashMap::new();
    for item in items {
        items_by_contract.entry(item.contract_id).or_default().push(item);
    }
    let mut periods_by_contract: HashMap<Uuid, Vec<period::Model>> = HashMap::new();
    for p in periods {
        periods_by_contract
            .entry(p.contract_id)
            .or_default()
            .push(p.clone());
    }
    let mut orders_by_period: HashMap<Uuid, Vec<Decimal>> = HashMap::new();
    for o in orders {
        orders_by_period.entry(o.period_id).or_default().push(o.amount);
    }
    let mut injections_by_period: HashMap<Uuid, Vec<Decimal>> = HashMap::new();
    for i in injections {
        injections_by_period
            .entry(i.period_id)
            .or_default()
            .push(i.amount);
    }

    let mut rows = Vec::with_capacity(contracts.len());
    let mut active_contracts = 0u64;
    let mut totals: HashMap<CurrencyKind, CurrencyTotals> = HashMap::new();

    for contract_model in contracts {
        let contract_periods = periods_by_contract
            .get(&contract_model.id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        if contract_periods.iter().any(period::Model::is_active) {
            active_contracts += 1;
        }

        let display_period = budget::select_display_period(contract_periods);

        let (snapshot, currency_kind) = match display_period {
            Some(p) => {
                let snapshot = budget::compute_snapshot(
                    p.allocated_budget,
                    injections_by_period
                        .get(&p.id)
                        .into_iter()
                        .flatten()
                        .copied(),
                    orders_by_period.get(&p.id).into_iter().flatten().copied(),
                );
                let kind = CurrencyKind::classify(
                    p.currency
                        .as_deref()
                        .or(contract_model.currency.as_deref()),
                );
                (snapshot, kind)
            }
            None => (
                BudgetSnapshot::zero(),
                CurrencyKind::classify(contract_model.currency.as_deref()),
            ),
        };

        let product = items_by_contract
            .get(&contract_model.id)
            .and_then(|items| items.first())
            .map(|item| item.name.clone())
            .unwrap_or_else(|| contract_model.name.clone());

        let expiring = display_period
            .map(|p| budget::expires_within_window(p.end_date, today))
            .unwrap_or(false);

        let entry = totals
            .entry(currency_kind)
            .or_insert_with(|| CurrencyTotals {
                currency: currency_kind.label().to_string(),
                budget: Decimal::ZERO,
                executed: Decimal::ZERO,
                balance: Decimal::ZERO,
            });
        entry.budget += snapshot.current_budget;
        entry.executed += snapshot.executed;
        entry.balance += snapshot.balance;

        rows.push(DashboardRow {
            contract_id: contract_model.id,
            code: contract_model.code.clone(),
            name: contract_model.name.clone(),
            supplier: contract_model.supplier.clone(),
            product,
            currency: currency_kind.label().to_string(),
            period_id: display_period.map(|p| p.id),
            period_name: display_period.map(|p| p.name.clone()),
            end_date: display_period.map(|p| p.end_date),
            current_budget: snapshot.current_budget,
            executed: snapshot.executed,
            balance: snapshot.balance,
            execution_percent: snapshot.display_percent(),
            critical: snapshot.is_critical(),
            expiring,
        });
    }

    rows.sort_by(|a, b| a.product.to_lowercase().cmp(&b.product.to_lowercase()));

    let critical_contracts = rows.iter().filter(|r| r.critical).count() as u64;
    let expiring_contracts = rows.iter().filter(|r| r.expiring).count() as u64;

    let mut currency_totals = Vec::new();
    for kind in [CurrencyKind::Crc, CurrencyKind::Usd] {
        if let Some(entry) = totals.remove(&kind) {
            currency_totals.push(entry);
        }
    }

    DashboardSummary {
        rows,
        stats: DashboardStats {
            total_contracts: contracts.len() as u64,
            active_contracts,
            critical_contracts,
            expiring_contracts,
            totals: currency_totals,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use rust_decimal_macros::dec;

    fn contract_model(code: &str, name: &str, currency: Option<&str>) -> contract::Model {
        contract::Model {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: name.to_string(),
            tender_reference: None,
            legal_reference: None,
            supplier: "Proveedor SA".to_string(),
            unit_price: None,
            start_date: None,
            currency: currency.map(str::to_string),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn item_model(contract_id: Uuid, name: &str, position: i32) -> contract_item::Model {
        contract_item::Model {
            id: Uuid::new_v4(),
            contract_id,
            code: format!("ITEM-{}", position),
            name: name.to_string(),
            currency: None,
            unit_price: Some(dec!(10)),
            position,
            created_at: Utc::now(),
        }
    }

    fn period_model(
        contract_id: Uuid,
        status: &str,
        budget: Decimal,
        end_date: NaiveDate,
    ) -> period::Model {
        period::Model {
            id: Uuid::new_v4(),
            contract_id,
            name: "Periodo 1".to_string(),
            start_date: end_date - ChronoDuration::days(365),
            end_date,
            allocated_budget: budget,
            initial_budget: Some(budget),
            status: status.to_string(),
            currency: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn order_model(period_id: Uuid, amount: Decimal) -> order::Model {
        order::Model {
            id: Uuid::new_v4(),
            period_id,
            item_id: None,
            order_date: Utc::now().date_naive(),
            amount,
            quantity: None,
            sap_reference: None,
            sicop_reference: None,
            pur: None,
            reservation_number: None,
            product_code: None,
            product_name: None,
            description: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn injection_model(period_id: Uuid, amount: Decimal) -> injection::Model {
        injection::Model {
            id: Uuid::new_v4(),
            period_id,
            amount,
            injection_date: Utc::now().date_naive(),
            reference_number: None,
            description: None,
            document_name: None,
            document_data: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn summary_reports_budget_position_per_contract() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let contract = contract_model("CONT-001", "Analgesicos", Some("CRC"));
        let item = item_model(contract.id, "Acetaminofen 500mg", 0);
        let period = period_model(
            contract.id,
            "active",
            dec!(1000),
            NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
        );
        let orders = vec![
            order_model(period.id, dec!(300)),
            order_model(period.id, dec!(150)),
        ];
        let injections = vec![injection_model(period.id, dec!(200))];

        let summary = assemble_summary(
            today,
            &[contract],
            &[item],
            &[period],
            &orders,
            &injections,
        );

        assert_eq!(summary.rows.len(), 1);
        let row = &summary.rows[0];
        assert_eq!(row.product, "Acetaminofen 500mg");
        assert_eq!(row.currency, "CRC");
        assert_eq!(row.current_budget, dec!(1200));
        assert_eq!(row.executed, dec!(450));
        assert_eq!(row.balance, dec!(750));
        assert_eq!(row.execution_percent, dec!(37.5));
        assert!(!row.critical);
        assert!(!row.expiring);

        assert_eq!(summary.stats.total_contracts, 1);
        assert_eq!(summary.stats.active_contracts, 1);
        assert_eq!(summary.stats.totals.len(), 1);
        assert_eq!(summary.stats.totals[0].currency, "CRC");
        assert_eq!(summary.stats.totals[0].balance, dec!(750));
    }

    #[test]
    fn rows_sort_by_product_name_case_insensitively() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let contract_a = contract_model("CONT-001", "Contrato A", None);
        let contract_b = contract_model("CONT-002", "Contrato B", None);
        let items = vec![
            item_model(contract_a.id, "zinc oxido", 0),
            item_model(contract_b.id, "Amoxicilina", 0),
        ];

        let summary = assemble_summary(
            today,
            &[contract_a, contract_b],
            &items,
            &[],
            &[],
            &[],
        );

        assert_eq!(summary.rows[0].product, "Amoxicilina");
        assert_eq!(summary.rows[1].product, "zinc oxido");
    }

    #[test]
    fn contract_without_periods_gets_a_zero_row() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let contract = contract_model("CONT-001", "Sueros", None);

        let summary = assemble_summary(today, &[contract], &[], &[], &[], &[]);

        let row = &summary.rows[0];
        assert_eq!(row.product, "Sueros");
        assert_eq!(row.currency, "USD");
        assert!(row.period_id.is_none());
        assert_eq!(row.current_budget, Decimal::ZERO);
        assert_eq!(row.execution_percent, Decimal::ZERO);
        assert_eq!(summary.stats.active_contracts, 0);
    }

    #[test]
    fn critical_and_expiring_counters_follow_row_flags() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let contract_hot = contract_model("CONT-001", "Casi agotado", None);
        let contract_expiring = contract_model("CONT-002", "Por vencer", None);

        let period_hot = period_model(
            contract_hot.id,
            "active",
            dec!(100),
            NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
        );
        // Ends inside the ninety-day warning window
        let period_expiring = period_model(
            contract_expiring.id,
            "active",
            dec!(100),
            today + ChronoDuration::days(30),
        );

        let orders = vec![order_model(period_hot.id, dec!(95))];

        let summary = assemble_summary(
            today,
            &[contract_hot, contract_expiring],
            &[],
            &[period_hot, period_expiring],
            &orders,
            &[],
        );

        assert_eq!(summary.stats.critical_contracts, 1);
        assert_eq!(summary.stats.expiring_contracts, 1);
    }

    #[test]
    fn display_period_prefers_active_over_earlier_pending() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let contract = contract_model("CONT-001", "Vacunas", None);

        let mut pending = period_model(
            contract.id,
            "pending",
            dec!(500),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        );
        pending.start_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut active = period_model(
            contract.id,
            "active",
            dec!(800),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
        );
        active.start_date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let active_id = active.id;

        let summary = assemble_summary(today, &[contract], &[], &[pending, active], &[], &[]);

        assert_eq!(summary.rows[0].period_id, Some(active_id));
        assert_eq!(summary.rows[0].current_budget, dec!(800));
    }
}
