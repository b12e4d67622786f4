use crate::{
    budget,
    cache::{CacheScope, InMemoryCache},
    db::DbPool,
    entities::{
        contract::Entity as ContractEntity,
        injection::{self, Entity as InjectionEntity},
        order::{self, Entity as OrderEntity},
        period::{self, ActiveModel as PeriodActiveModel, Entity as PeriodEntity, PeriodStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Request/Response types for the period service
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePeriodRequest {
    /// Defaults to "Periodo N+1" when omitted.
    #[validate(length(min = 1, max = 100, message = "Period name must not be empty"))]
    pub name: Option<String>,
    /// Defaults to the day after the latest existing end date.
    pub start_date: Option<NaiveDate>,
    pub end_date: NaiveDate,
    pub allocated_budget: Decimal,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdatePeriodRequest {
    #[validate(length(min = 1, max = 100, message = "Period name must not be empty"))]
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub allocated_budget: Option<Decimal>,
    pub currency: Option<String>,
    /// Accepts `pending` or `closed` (Spanish labels included); making a
    /// period active goes through the activation endpoint.
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PeriodResponse {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub allocated_budget: Decimal,
    pub status: String,
    pub currency: Option<String>,
    pub current_budget: Decimal,
    pub executed: Decimal,
    pub balance: Decimal,
    pub execution_percent: Decimal,
    pub critical: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Builds the budget-carrying response for one period from its own orders
/// and injections.
pub(crate) fn period_response(
    model: &period::Model,
    orders: &[order::Model],
    injections: &[injection::Model],
) -> PeriodResponse {
    let snapshot = budget::compute_snapshot(
        model.allocated_budget,
        injections.iter().map(|i| i.amount),
        orders.iter().map(|o| o.amount),
    );

    PeriodResponse {
        id: model.id,
        contract_id: model.contract_id,
        name: model.name.clone(),
        start_date: model.start_date,
        end_date: model.end_date,
        allocated_budget: model.allocated_budget,
        status: model
            .status_enum()
            .map(|s| s.to_string())
            .unwrap_or_else(|| model.status.clone()),
        currency: model.currency.clone(),
        current_budget: snapshot.current_budget,
        executed: snapshot.executed,
        balance: snapshot.balance,
        execution_percent: snapshot.display_percent(),
        critical: snapshot.is_critical(),
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

/// Follow-on defaults: name is `Periodo N+1`, start date the day after the
/// latest existing end date.
fn follow_on_defaults(existing: &[period::Model]) -> (String, Option<NaiveDate>) {
    let name = format!("Periodo {}", existing.len() + 1);
    let start = existing
        .iter()
        .map(|p| p.end_date)
        .max()
        .and_then(|d| d.succ_opt());
    (name, start)
}

/// Service for managing contract periods
#[derive(Clone)]
pub struct PeriodService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    cache: Arc<InMemoryCache>,
    cache_ttl: Option<Duration>,
}

impl PeriodService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        cache: Arc<InMemoryCache>,
        cache_ttl: Option<Duration>,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            cache,
            cache_ttl,
        }
    }

    /// Lists a contract's periods, oldest first, each with its computed
    /// budget position.
    #[instrument(skip(self), fields(contract_id = %contract_id))]
    pub async fn list_periods(&self, contract_id: Uuid) -> Result<Vec<PeriodResponse>, ServiceError> {
        let cache_key = CacheScope::Periods.key(&contract_id.to_string());
        if let Ok(Some(cached)) = self.cache.get_json::<Vec<PeriodResponse>>(&cache_key).await {
            return Ok(cached);
        }

        let db = &*self.db_pool;

        let contract = ContractEntity::find_by_id(contract_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, contract_id = %contract_id, "Failed to fetch contract for period listing");
                ServiceError::DatabaseError(e.into())
            })?;
        if contract.is_none() {
            return Err(ServiceError::NotFound("Contract not found".to_string()));
        }

        let periods = PeriodEntity::find()
            .filter(period::Column::ContractId.eq(contract_id))
            .order_by_asc(period::Column::StartDate)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, contract_id = %contract_id, "Failed to fetch periods");
                ServiceError::DatabaseError(e.into())
            })?;

        let period_ids: Vec<Uuid> = periods.iter().map(|p| p.id).collect();
        let (orders, injections) = load_period_children(db, &period_ids).await?;

        let responses: Vec<PeriodResponse> = periods
            .iter()
            .map(|p| {
                let period_orders: Vec<order::Model> = orders
                    .iter()
                    .filter(|o| o.period_id == p.id)
                    .cloned()
                    .collect();
                let period_injections: Vec<injection::Model> = injections
                    .iter()
                    .filter(|i| i.period_id == p.id)
                    .cloned()
                    .collect();
                period_response(p, &period_orders, &period_injections)
            })
            .collect();

        if let Err(e) = self
            .cache
            .set_json(&cache_key, &responses, self.cache_ttl)
            .await
        {
            warn!(error = %e, contract_id = %contract_id, "Failed to cache period listing");
        }

        Ok(responses)
    }

    /// Creates a follow-on period for a contract. Name and start date fall
    /// back to the chained defaults; status starts as Pending.
    #[instrument(skip(self, request), fields(contract_id = %contract_id))]
    pub async fn create_period(
        &self,
        contract_id: Uuid,
        request: CreatePeriodRequest,
    ) -> Result<PeriodResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        if request.allocated_budget < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Allocated budget must not be negative".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let now = Utc::now();
        let period_id = Uuid::new_v4();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for period creation");
            ServiceError::DatabaseError(e.into())
        })?;

        let contract = ContractEntity::find_by_id(contract_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, contract_id = %contract_id, "Failed to fetch contract for period creation");
                ServiceError::DatabaseError(e.into())
            })?;
        if contract.is_none() {
            return Err(ServiceError::NotFound("Contract not found".to_string()));
        }

        let existing = PeriodEntity::find()
            .filter(period::Column::ContractId.eq(contract_id))
            .order_by_asc(period::Column::StartDate)
            .all(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, contract_id = %contract_id, "Failed to fetch existing periods");
                ServiceError::DatabaseError(e.into())
            })?;

        let (default_name, default_start) = follow_on_defaults(&existing);
        let name = request.name.unwrap_or(default_name);
        let start_date = request
            .start_date
            .or(default_start)
            .ok_or_else(|| {
                ServiceError::ValidationError(
                    "A start date is required for a contract's first period".to_string(),
                )
            })?;

        if request.end_date <= start_date {
            return Err(ServiceError::ValidationError(
                "End date must be after the start date".to_string(),
            ));
        }

        let period_active_model = PeriodActiveModel {
            id: Set(period_id),
            contract_id: Set(contract_id),
            name: Set(name),
            start_date: Set(start_date),
            end_date: Set(request.end_date),
            allocated_budget: Set(request.allocated_budget),
            initial_budget: Set(Some(request.allocated_budget)),
            status: Set(PeriodStatus::Pending.to_string()),
            currency: Set(request.currency),
            created_at: Set(now),
            updated_at: Set(None),
        };

        let period_model = period_active_model.insert(&txn).await.map_err(|e| {
            error!(error = %e, period_id = %period_id, "Failed to create period");
            ServiceError::DatabaseError(e.into())
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, period_id = %period_id, "Failed to commit period creation");
            ServiceError::DatabaseError(e.into())
        })?;

        info!(period_id = %period_id, contract_id = %contract_id, "Period created successfully");

        self.invalidate_caches().await;

        if let Some(event_sender) = &self.event_sender {
            event_sender
                .send_or_log(Event::PeriodCreated {
                    contract_id,
                    period_id,
                })
                .await;
        }

        Ok(period_response(&period_model, &[], &[]))
    }

    /// Updates a period's descriptive fields and budget. Activation is not
    /// reachable from here, which keeps the one-active invariant local to
    /// `activate_period`.
    #[instrument(skip(self, request), fields(period_id = %period_id))]
    pub async fn update_period(
        &self,
        period_id: Uuid,
        request: UpdatePeriodRequest,
    ) -> Result<PeriodResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let new_status = match &request.status {
            Some(raw) => {
                let status = PeriodStatus::parse(raw).ok_or_else(|| {
                    ServiceError::ValidationError(format!("Unknown period status: {}", raw))
                })?;
                if status == PeriodStatus::Active {
                    return Err(ServiceError::InvalidOperation(
                        "Use the activation endpoint to make a period active".to_string(),
                    ));
                }
                Some(status)
            }
            None => None,
        };

        if let Some(budget) = request.allocated_budget {
            if budget < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Allocated budget must not be negative".to_string(),
                ));
            }
        }

        let db = &*self.db_pool;
        let now = Utc::now();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, period_id = %period_id, "Failed to start transaction for period update");
            ServiceError::DatabaseError(e.into())
        })?;

        let period = PeriodEntity::find_by_id(period_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, period_id = %period_id, "Failed to find period for update");
                ServiceError::DatabaseError(e.into())
            })?
            .ok_or_else(|| {
                warn!(period_id = %period_id, "Period not found for update");
                ServiceError::NotFound("Period not found".to_string())
            })?;

        let effective_start = request.start_date.unwrap_or(period.start_date);
        let effective_end = request.end_date.unwrap_or(period.end_date);
        if effective_end <= effective_start {
            return Err(ServiceError::ValidationError(
                "End date must be after the start date".to_string(),
            ));
        }

        let contract_id = period.contract_id;
        let mut period_active_model: PeriodActiveModel = period.into();
        if let Some(name) = request.name {
            period_active_model.name = Set(name);
        }
        if let Some(start_date) = request.start_date {
            period_active_model.start_date = Set(start_date);
        }
        if let Some(end_date) = request.end_date {
            period_active_model.end_date = Set(end_date);
        }
        if let Some(budget) = request.allocated_budget {
            period_active_model.allocated_budget = Set(budget);
        }
        if let Some(currency) = request.currency {
            period_active_model.currency = Set(Some(currency));
        }
        if let Some(status) = new_status {
            period_active_model.status = Set(status.to_string());
        }
        period_active_model.updated_at = Set(Some(now));

        let updated = period_active_model.update(&txn).await.map_err(|e| {
            error!(error = %e, period_id = %period_id, "Failed to update period");
            ServiceError::DatabaseError(e.into())
        })?;

        let (orders, injections) = load_period_children(&txn, &[period_id]).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, period_id = %period_id, "Failed to commit period update");
            ServiceError::DatabaseError(e.into())
        })?;

        info!(period_id = %period_id, contract_id = %contract_id, "Period updated successfully");

        self.invalidate_caches().await;

        if let Some(event_sender) = &self.event_sender {
            event_sender.send_or_log(Event::PeriodUpdated(period_id)).await;
        }

        Ok(period_response(&updated, &orders, &injections))
    }

    /// Makes a period the contract's single active one. The previously
    /// active sibling, if any, is closed in the same transaction.
    #[instrument(skip(self), fields(period_id = %period_id))]
    pub async fn activate_period(&self, period_id: Uuid) -> Result<PeriodResponse, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, period_id = %period_id, "Failed to start transaction for period activation");
            ServiceError::DatabaseError(e.into())
        })?;

        let period = PeriodEntity::find_by_id(period_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, period_id = %period_id, "Failed to find period for activation");
                ServiceError::DatabaseError(e.into())
            })?
            .ok_or_else(|| {
                warn!(period_id = %period_id, "Period not found for activation");
                ServiceError::NotFound("Period not found".to_string())
            })?;

        let contract_id = period.contract_id;

        let siblings = PeriodEntity::find()
            .filter(period::Column::ContractId.eq(contract_id))
            .all(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, contract_id = %contract_id, "Failed to fetch sibling periods");
                ServiceError::DatabaseError(e.into())
            })?;

        let mut previous_active = None;
        for sibling in siblings {
            if sibling.id != period_id && sibling.is_active() {
                previous_active.get_or_insert(sibling.id);
                let sibling_id = sibling.id;
                let mut sibling_active_model: PeriodActiveModel = sibling.into();
                sibling_active_model.status = Set(PeriodStatus::Closed.to_string());
                sibling_active_model.updated_at = Set(Some(now));
                sibling_active_model.update(&txn).await.map_err(|e| {
                    error!(error = %e, period_id = %sibling_id, "Failed to close previously active period");
                    ServiceError::DatabaseError(e.into())
                })?;
            }
        }

        let mut period_active_model: PeriodActiveModel = period.into();
        period_active_model.status = Set(PeriodStatus::Active.to_string());
        period_active_model.updated_at = Set(Some(now));

        let activated = period_active_model.update(&txn).await.map_err(|e| {
            error!(error = %e, period_id = %period_id, "Failed to activate period");
            ServiceError::DatabaseError(e.into())
        })?;

        let (orders, injections) = load_period_children(&txn, &[period_id]).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, period_id = %period_id, "Failed to commit period activation");
            ServiceError::DatabaseError(e.into())
        })?;

        info!(
            period_id = %period_id,
            contract_id = %contract_id,
            previous_active = ?previous_active,
            "Period activated successfully"
        );

        self.invalidate_caches().await;

        if let Some(event_sender) = &self.event_sender {
            event_sender
                .send_or_log(Event::PeriodActivated {
                    contract_id,
                    period_id,
                    previous_active,
                })
                .await;
        }

        Ok(period_response(&activated, &orders, &injections))
    }

    /// Deletes a period together with its orders and injections.
    #[instrument(skip(self), fields(period_id = %period_id))]
    pub async fn delete_period(&self, period_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, period_id = %period_id, "Failed to start transaction for period deletion");
            ServiceError::DatabaseError(e.into())
        })?;

        let period = PeriodEntity::find_by_id(period_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, period_id = %period_id, "Failed to find period for deletion");
                ServiceError::DatabaseError(e.into())
            })?
            .ok_or_else(|| {
                warn!(period_id = %period_id, "Period not found for deletion");
                ServiceError::NotFound("Period not found".to_string())
            })?;

        let contract_id = period.contract_id;

        OrderEntity::delete_many()
            .filter(order::Column::PeriodId.eq(period_id))
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, period_id = %period_id, "Failed to delete period orders");
                ServiceError::DatabaseError(e.into())
            })?;

        InjectionEntity::delete_many()
            .filter(injection::Column::PeriodId.eq(period_id))
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, period_id = %period_id, "Failed to delete period injections");
                ServiceError::DatabaseError(e.into())
            })?;

        PeriodEntity::delete_by_id(period_id)
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, period_id = %period_id, "Failed to delete period");
                ServiceError::DatabaseError(e.into())
            })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, period_id = %period_id, "Failed to commit period deletion");
            ServiceError::DatabaseError(e.into())
        })?;

        info!(period_id = %period_id, contract_id = %contract_id, "Period deleted successfully");

        self.invalidate_caches().await;

        if let Some(event_sender) = &self.event_sender {
            event_sender.send_or_log(Event::PeriodDeleted(period_id)).await;
        }

        Ok(())
    }

    async fn invalidate_caches(&self) {
        if let Err(e) = self
            .cache
            .invalidate(&[CacheScope::Periods, CacheScope::Dashboard])
            .await
        {
            warn!(error = %e, "Failed to invalidate period caches");
        }
    }
}

/// Fetches the orders and injections belonging to the given periods.
pub(crate) async fn load_period_children<C: sea_orm::ConnectionTrait>(
    db: &C,
    period_ids: &[Uuid],
) -> Result<(Vec<order::Model>, Vec<injection::Model>), ServiceError> {
    if period_ids.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    let orders = OrderEntity::find()
        .filter(order::Column::PeriodId.is_in(period_ids.to_vec()))
        .all(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch orders for periods");
            ServiceError::DatabaseError(e.into())
        })?;

    let injections = InjectionEntity::find()
        .filter(injection::Column::PeriodId.is_in(period_ids.to_vec()))
        .all(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch injections for periods");
            ServiceError::DatabaseError(e.into())
        })?;

    Ok((orders, injections))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn period_model(name: &str, start: &str, end: &str, status: &str) -> period::Model {
        period::Model {
            id: Uuid::new_v4(),
            contract_id: Uuid::new_v4(),
            name: name.to_string(),
            start_date: start.parse().unwrap(),
            end_date: end.parse().unwrap(),
            allocated_budget: dec!(1000),
            initial_budget: Some(dec!(1000)),
            status: status.to_string(),
            currency: Some("CRC".to_string()),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn order_model(period_id: Uuid, amount: Decimal) -> order::Model {
        order::Model {
            id: Uuid::new_v4(),
            period_id,
            item_id: None,
            order_date: "2025-03-01".parse().unwrap(),
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
            injection_date: "2025-02-01".parse().unwrap(),
            reference_number: None,
            description: None,
            document_name: None,
            document_data: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn period_response_carries_budget_position() {
        let model = period_model("Periodo 1", "2025-01-01", "2025-12-31", "active");
        let orders = vec![
            order_model(model.id, dec!(300)),
            order_model(model.id, dec!(150)),
        ];
        let injections = vec![injection_model(model.id, dec!(200))];

        let response = period_response(&model, &orders, &injections);

        assert_eq!(response.current_budget, dec!(1200));
        assert_eq!(response.executed, dec!(450));
        assert_eq!(response.balance, dec!(750));
        assert_eq!(response.execution_percent, dec!(37.5));
        assert!(!response.critical);
        assert_eq!(response.status, "active");
    }

    #[test]
    fn period_response_canonicalizes_legacy_status() {
        let model = period_model("Periodo 1", "2025-01-01", "2025-12-31", "Activo");
        let response = period_response(&model, &[], &[]);
        assert_eq!(response.status, "active");
    }

    #[test]
    fn follow_on_defaults_chain_from_latest_end() {
        let periods = vec![
            period_model("Periodo 1", "2024-01-01", "2024-12-31", "closed"),
            period_model("Periodo 2", "2025-01-01", "2025-12-31", "active"),
        ];

        let (name, start) = follow_on_defaults(&periods);
        assert_eq!(name, "Periodo 3");
        assert_eq!(start, Some("2026-01-01".parse().unwrap()));
    }

    #[test]
    fn follow_on_defaults_for_first_period_have_no_start() {
        let (name, start) = follow_on_defaults(&[]);
        assert_eq!(name, "Periodo 1");
        assert_eq!(start, None);
    }
}
