use crate::{
    budget::{self, CurrencyKind},
    cache::{CacheScope, InMemoryCache},
    db::DbPool,
    entities::{
        contract::{self, Entity as ContractEntity},
        injection::{self, Entity as InjectionEntity},
        order::{self, Entity as OrderEntity},
        period::{self, Entity as PeriodEntity},
    },
    errors::ServiceError,
};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Fixed conversion rate used to line up colones amounts with dollar ones
/// in cross-currency rankings.
pub const CRC_PER_USD: Decimal = dec!(500);

/// How many months the spending trend looks back, current month included.
pub const TREND_MONTHS: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrencyExecution {
    pub currency: String,
    pub budget: Decimal,
    pub executed: Decimal,
    pub percent: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContractExecution {
    pub contract_id: Uuid,
    pub code: String,
    pub name: String,
    pub supplier: String,
    pub current_budget: Decimal,
    pub executed: Decimal,
    pub execution_percent: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExpiringContract {
    pub contract_id: Uuid,
    pub code: String,
    pub name: String,
    pub supplier: String,
    pub period_name: String,
    pub end_date: NaiveDate,
    pub days_remaining: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductTotal {
    pub code: Option<String>,
    pub name: String,
    /// Spending in dollars; colones orders are converted at [`CRC_PER_USD`].
    pub total_usd: Decimal,
    pub order_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MonthlyTotal {
    /// Calendar month in `YYYY-MM` form.
    pub month: String,
    pub total_usd: Decimal,
    /// Share of the busiest month, so charts can scale bars to 100.
    pub percent_of_max: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatisticsReport {
    pub currency_execution: Vec<CurrencyExecution>,
    pub top_contracts: Vec<ContractExecution>,
    pub expiring: Vec<ExpiringContract>,
    pub top_products: Vec<ProductTotal>,
    pub monthly_trend: Vec<MonthlyTotal>,
}

/// Read-side service for the statistics screen
#[derive(Clone)]
pub struct StatisticsService {
    db_pool: Arc<DbPool>,
    cache: Arc<InMemoryCache>,
    cache_ttl: Option<Duration>,
}

impl StatisticsService {
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

    #[instrument(skip(self))]
    pub async fn get_statistics(&self) -> Result<StatisticsReport, ServiceError> {
        let cache_key = CacheScope::Dashboard.key("statistics");
        if let Ok(Some(cached)) = self.cache.get_json::<StatisticsReport>(&cache_key).await {
            return Ok(cached);
        }

        let db = &*self.db_pool;

        let contracts = ContractEntity::find()
            .order_by_asc(contract::Column::Code)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch contracts for statistics");
                ServiceError::DatabaseError(e.into())
            })?;

        let periods = PeriodEntity::find()
            .order_by_asc(period::Column::StartDate)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch periods for statistics");
                ServiceError::DatabaseError(e.into())
            })?;

        let orders = OrderEntity::find().all(db).await.map_err(|e| {
            error!(error = %e, "Failed to fetch orders for statistics");
            ServiceError::DatabaseError(e.into())
        })?;

        let injections = InjectionEntity::find().all(db).await.map_err(|e| {
            error!(error = %e, "Failed to fetch injections for statistics");
            ServiceError::DatabaseError(e.into())
        })?;

        let today = chrono::Utc::now().date_naive();
        let report = build_statistics(today, &contracts, &periods, &orders, &injections);

        if let Err(e) = self.cache.set_json(&cache_key, &report, self.cache_ttl).await {
            warn!(error = %e, "Failed to cache statistics report");
        }

        info!(
            top_contracts = report.top_contracts.len(),
            expiring = report.expiring.len(),
            "Statistics report assembled successfully"
        );

        Ok(report)
    }
}

fn to_usd(amount: Decimal, currency: CurrencyKind) -> Decimal {
    match currency {
        CurrencyKind::Crc => amount / CRC_PER_USD,
        CurrencyKind::Usd => amount,
    }
}

fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

/// The last [`TREND_MONTHS`] calendar months, oldest first, current month
/// last.
fn trend_months(today: NaiveDate) -> Vec<(i32, u32)> {
    let mut months = Vec::with_capacity(TREND_MONTHS);
    let (mut year, mut month) = (today.year(), today.month());
    for _ in 0..TREND_MONTHS {
        months.push((year, month));
        let (y, m) = previous_month(year, month);
        year = y;
        month = m;
    }
    months.reverse();
    months
}

pub(crate) fn build_statistics(
    today: NaiveDate,
    contracts: &[contract::Model],
    periods: &[period::Model],
    orders: &[order::Model],
    injections: &[injection::Model],
) -> StatisticsReport {
    let contracts_by_id: HashMap<Uuid, &contract::Model> =
        contracts.iter().map(|c| (c.id, c)).collect();
    let periods_by_id: HashMap<Uuid, &period::Model> = periods.iter().map(|p| (p.id, p)).collect();

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

    // Per-currency execution and the contract ranking both read each
    // contract through its display period
    let mut currency_sums: HashMap<CurrencyKind, (Decimal, Decimal)> = HashMap::new();
    let mut ranked: Vec<ContractExecution> = Vec::new();

    for contract_model in contracts {
        let contract_periods = periods_by_contract
            .get(&contract_model.id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let Some(display_period) = budget::select_display_period(contract_periods) else {
            continue;
        };

        let snapshot = budget::compute_snapshot(
            display_period.allocated_budget,
            injections_by_period
                .get(&display_period.id)
                .into_iter()
                .flatten()
                .copied(),
            orders_by_period
                .get(&display_period.id)
                .into_iter()
                .flatten()
                .copied(),
        );
        let kind = CurrencyKind::classify(
            display_period
                .currency
                .as_deref()
                .or(contract_model.currency.as_deref()),
        );

        let sums = currency_sums.entry(kind).or_insert((Decimal::ZERO, Decimal::ZERO));
        sums.0 += snapshot.current_budget;
        sums.1 += snapshot.executed;

        ranked.push(ContractExecution {
            contract_id: contract_model.id,
            code: contract_model.code.clone(),
            name: contract_model.name.clone(),
            supplier: contract_model.supplier.clone(),
            current_budget: snapshot.current_budget,
            executed: snapshot.executed,
            execution_percent: snapshot.display_percent(),
        });
    }

    let mut currency_execution = Vec::new();
    for kind in [CurrencyKind::Crc, CurrencyKind::Usd] {
        if let Some((budget_sum, executed_sum)) = currency_sums.remove(&kind) {
            let percent = if budget_sum > Decimal::ZERO {
                ((executed_sum / budget_sum) * Decimal::ONE_HUNDRED).min(Decimal::ONE_HUNDRED)
            } else {
                Decimal::ZERO
            };
            currency_execution.push(CurrencyExecution {
                currency: kind.label().to_string(),
                budget: budget_sum,
                executed: executed_sum,
                percent,
            });
        }
    }

    // Rank by execution, keeping one entry per contract code (renewed
    // contracts share a code; the furthest-along one represents it)
    ranked.sort_by(|a, b| {
        b.execution_percent
            .cmp(&a.execution_percent)
            .then_with(|| b.executed.cmp(&a.executed))
    });
    let mut seen_codes: HashSet<String> = HashSet::new();
    let mut top_contracts = Vec::new();
    for entry in ranked {
        if seen_codes.insert(entry.code.clone()) {
            top_contracts.push(entry);
            if top_contracts.len() == 10 {
                break;
            }
        }
    }

    // Expiration watchlist covers running periods only
    let mut expiring: Vec<ExpiringContract> = periods
        .iter()
        .filter(|p| p.is_active() && budget::expires_within_window(p.end_date, today))
        .filter_map(|p| {
            let contract_model = contracts_by_id.get(&p.contract_id)?;
            Some(ExpiringContract {
                contract_id: contract_model.id,
                code: contract_model.code.clone(),
                name: contract_model.name.clone(),
                supplier: contract_model.supplier.clone(),
                period_name: p.name.clone(),
                end_date: p.end_date,
                days_remaining: budget::days_remaining(p.end_date, today),
            })
        })
        .collect();
    expiring.sort_by_key(|e| e.days_remaining);

    let order_currency = |order_model: &order::Model| -> CurrencyKind {
        periods_by_id
            .get(&order_model.period_id)
            .map(|p| {
                CurrencyKind::classify(p.currency.as_deref().or_else(|| {
                    contracts_by_id
                        .get(&p.contract_id)
                        .and_then(|c| c.currency.as_deref())
                }))
            })
            .unwrap_or(CurrencyKind::Usd)
    };

    // Product ranking in dollar terms
    let mut product_sums: HashMap<String, ProductTotal> = HashMap::new();
    for order_model in orders {
        let Some(name) = order_model
            .product_name
            .clone()
            .or_else(|| order_model.product_code.clone())
        else {
            continue;
        };
        let kind = order_currency(order_model);

        let entry = product_sums
            .entry(name.to_lowercase())
            .or_insert_with(|| ProductTotal {
                code: order_model.product_code.clone(),
                name,
                total_usd: Decimal::ZERO,
                order_count: 0,
            });
        entry.total_usd += to_usd(order_model.amount, kind);
        entry.order_count += 1;
    }
    let mut top_products: Vec<ProductTotal> = product_sums.into_values().collect();
    top_products.sort_by(|a, b| b.total_usd.cmp(&a.total_usd));
    top_products.truncate(5);
    for product in &mut top_products {
        product.total_usd = product.total_usd.round_dp(2);
    }

    // Spending trend over the recent months, scaled to the busiest one
    let months = trend_months(today);
    let mut month_sums: HashMap<(i32, u32), Decimal> =
        months.iter().map(|&key| (key, Decimal::ZERO)).collect();
    for order_model in orders {
        let key = (order_model.order_date.year(), order_model.order_date.month());
        if let Some(sum) = month_sums.get_mut(&key) {
            *sum += to_usd(order_model.amount, order_currency(order_model));
        }
    }
    let max_month = month_sums.values().copied().max().unwrap_or(Decimal::ZERO);
    let monthly_trend: Vec<MonthlyTotal> = months
        .into_iter()
        .map(|(year, month)| {
            let total = month_sums.get(&(year, month)).copied().unwrap_or(Decimal::ZERO);
            let percent_of_max = if max_month > Decimal::ZERO {
                ((total / max_month) * Decimal::ONE_HUNDRED).round_dp(1)
            } else {
                Decimal::ZERO
            };
            MonthlyTotal {
                month: format!("{:04}-{:02}", year, month),
                total_usd: total.round_dp(2),
                percent_of_max,
            }
        })
        .collect();

    StatisticsReport {
        currency_execution,
        top_contracts,
        expiring,
        top_products,
        monthly_trend,
    }
}
