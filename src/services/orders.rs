use crate::{
    budget,
    cache::{CacheScope, InMemoryCache},
    db::DbPool,
    entities::{
        contract::{self, Entity as ContractEntity},
        contract_item::{self, Entity as ContractItemEntity},
        order::{self, ActiveModel as OrderActiveModel, Entity as OrderEntity},
        period::{self, Entity as PeriodEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Request/Response types for the order service
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    pub period_id: Uuid,
    /// Defaults to today.
    pub order_date: Option<NaiveDate>,
    /// Contract item the order draws; required when `amount` is omitted.
    pub item_id: Option<Uuid>,
    pub quantity: Option<Decimal>,
    /// Explicit amount; computed as quantity x item unit price when omitted.
    pub amount: Option<Decimal>,
    #[validate(length(max = 100, message = "SAP reference is too long"))]
    pub sap_reference: Option<String>,
    #[validate(length(max = 100, message = "SICOP reference is too long"))]
    pub sicop_reference: Option<String>,
    #[validate(length(max = 100, message = "PUR is too long"))]
    pub pur: Option<String>,
    #[validate(length(max = 100, message = "Reservation number is too long"))]
    pub reservation_number: Option<String>,
    #[validate(length(max = 500, message = "Description is too long"))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderRequest {
    pub order_date: Option<NaiveDate>,
    pub item_id: Option<Uuid>,
    pub quantity: Option<Decimal>,
    pub amount: Option<Decimal>,
    #[validate(length(max = 100, message = "SAP reference is too long"))]
    pub sap_reference: Option<String>,
    #[validate(length(max = 100, message = "SICOP reference is too long"))]
    pub sicop_reference: Option<String>,
    #[validate(length(max = 100, message = "PUR is too long"))]
    pub pur: Option<String>,
    #[validate(length(max = 100, message = "Reservation number is too long"))]
    pub reservation_number: Option<String>,
    #[validate(length(max = 500, message = "Description is too long"))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub period_id: Uuid,
    pub item_id: Option<Uuid>,
    pub order_date: NaiveDate,
    pub amount: Decimal,
    pub quantity: Option<Decimal>,
    pub sap_reference: Option<String>,
    pub sicop_reference: Option<String>,
    pub pur: Option<String>,
    pub reservation_number: Option<String>,
    pub product_code: Option<String>,
    pub product_name: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<order::Model> for OrderResponse {
    fn from(model: order::Model) -> Self {
        Self {
            id: model.id,
            period_id: model.period_id,
            item_id: model.item_id,
            order_date: model.order_date,
            amount: model.amount,
            quantity: model.quantity,
            sap_reference: model.sap_reference,
            sicop_reference: model.sicop_reference,
            pur: model.pur,
            reservation_number: model.reservation_number,
            product_code: model.product_code,
            product_name: model.product_name,
            description: model.description,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// One order history row, flattened order -> period -> contract.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderListItem {
    pub id: Uuid,
    pub order_date: NaiveDate,
    pub amount: Decimal,
    pub quantity: Option<Decimal>,
    pub sap_reference: Option<String>,
    pub sicop_reference: Option<String>,
    pub pur: Option<String>,
    pub reservation_number: Option<String>,
    pub product_code: Option<String>,
    pub product_name: Option<String>,
    pub description: Option<String>,
    pub period_id: Uuid,
    pub period_name: String,
    pub contract_id: Uuid,
    pub contract_code: String,
    pub contract_name: String,
    pub supplier: String,
    pub tender_reference: Option<String>,
    pub legal_reference: Option<String>,
    /// Bucketed currency label, CRC or USD.
    pub currency: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderListItem>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Filters for the order history listing and the matching export.
#[derive(Debug, Clone, Default)]
pub struct OrderFilters {
    pub search: Option<String>,
    pub contract_id: Option<Uuid>,
    pub period_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl OrderFilters {
    /// Builds the query condition. A contract filter resolves to the
    /// contract's period ids first.
    pub(crate) async fn condition<C: ConnectionTrait>(
        &self,
        db: &C,
    ) -> Result<Condition, ServiceError> {
        let mut condition = Condition::all();

        if let Some(period_id) = self.period_id {
            condition = condition.add(order::Column::PeriodId.eq(period_id));
        } else if let Some(contract_id) = self.contract_id {
            let period_ids = PeriodEntity::find()
                .filter(period::Column::ContractId.eq(contract_id))
                .all(db)
                .await
                .map_err(|e| {
                    error!(error = %e, contract_id = %contract_id, "Failed to resolve contract periods for order filter");
                    ServiceError::DatabaseError(e.into())
                })?
                .into_iter()
                .map(|p| p.id)
                .collect::<Vec<Uuid>>();
            condition = condition.add(order::Column::PeriodId.is_in(period_ids));
        }

        if let Some(from) = self.from {
            condition = condition.add(order::Column::OrderDate.gte(from));
        }
        if let Some(to) = self.to {
            condition = condition.add(order::Column::OrderDate.lte(to));
        }

        if let Some(search) = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            condition = condition.add(
                Condition::any()
                    .add(order::Column::SapReference.contains(search))
                    .add(order::Column::SicopReference.contains(search))
                    .add(order::Column::ProductName.contains(search)),
            );
        }

        Ok(condition)
    }
}

/// Amount resolution: an explicit amount wins; otherwise quantity x unit
/// price, a missing unit price counting as zero.
fn derive_amount(
    explicit: Option<Decimal>,
    quantity: Option<Decimal>,
    unit_price: Option<Decimal>,
) -> Option<Decimal> {
    explicit.or_else(|| quantity.map(|q| q * unit_price.unwrap_or(Decimal::ZERO)))
}

/// Service for managing purchase orders against period budgets
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    cache: Arc<InMemoryCache>,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        cache: Arc<InMemoryCache>,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            cache,
        }
    }

    /// Creates an order against a period, rejecting amounts beyond the
    /// period's available balance.
    #[instrument(skip(self, request), fields(period_id = %request.period_id))]
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<OrderResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        if matches!(request.amount, Some(a) if a < Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "Order amount must not be negative".to_string(),
            ));
        }
        if matches!(request.quantity, Some(q) if q < Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "Order quantity must not be negative".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e.into())
        })?;

        let period = PeriodEntity::find_by_id(request.period_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, period_id = %request.period_id, "Failed to fetch period for order creation");
                ServiceError::DatabaseError(e.into())
            })?
            .ok_or_else(|| ServiceError::NotFound("Period not found".to_string()))?;

        let item = self
            .resolve_item(&txn, request.item_id, period.contract_id)
            .await?;

        let amount = derive_amount(
            request.amount,
            request.quantity,
            item.as_ref().and_then(|i| i.unit_price),
        )
        .ok_or_else(|| {
            ServiceError::ValidationError(
                "Either an amount or an item with a quantity is required".to_string(),
            )
        })?;
        if request.amount.is_none() && item.is_none() {
            return Err(ServiceError::ValidationError(
                "Either an amount or an item with a quantity is required".to_string(),
            ));
        }

        let snapshot = period_snapshot(&txn, &period).await?;
        if amount > snapshot.balance {
            return Err(ServiceError::InsufficientBudget(format!(
                "Order amount {} exceeds the period's available balance {}",
                amount, snapshot.balance
            )));
        }

        let order_active_model = OrderActiveModel {
            id: Set(order_id),
            period_id: Set(period.id),
            item_id: Set(item.as_ref().map(|i| i.id)),
            order_date: Set(request.order_date.unwrap_or_else(|| Utc::now().date_naive())),
            amount: Set(amount),
            quantity: Set(request.quantity),
            sap_reference: Set(request.sap_reference),
            sicop_reference: Set(request.sicop_reference),
            pur: Set(request.pur),
            reservation_number: Set(request.reservation_number),
            product_code: Set(item.as_ref().map(|i| i.code.clone())),
            product_name: Set(item.as_ref().map(|i| i.name.clone())),
            description: Set(request.description),
            created_at: Set(now),
            updated_at: Set(None),
        };

        let order_model = order_active_model.insert(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to create order");
            ServiceError::DatabaseError(e.into())
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order creation");
            ServiceError::DatabaseError(e.into())
        })?;

        info!(
            order_id = %order_id,
            period_id = %period.id,
            amount = %amount,
            "Order created successfully"
        );

        self.invalidate_caches().await;

        if let Some(event_sender) = &self.event_sender {
            event_sender.send_or_log(Event::OrderPlaced(order_id)).await;
        }

        Ok(OrderResponse::from(order_model))
    }

    /// Retrieves an order by ID
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<OrderResponse>, ServiceError> {
        let db = &*self.db_pool;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to fetch order");
                ServiceError::DatabaseError(e.into())
            })?;

        Ok(order.map(OrderResponse::from))
    }

    /// Lists order history rows, newest first, with contract context.
    #[instrument(skip(self, filters))]
    pub async fn list_orders(
        &self,
        filters: OrderFilters,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let page = page.max(1);
        let per_page = per_page.max(1);

        let db = &*self.db_pool;
        let condition = filters.condition(db).await?;

        let paginator = OrderEntity::find()
            .filter(condition)
            .order_by_desc(order::Column::OrderDate)
            .order_by_desc(order::Column::CreatedAt)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count orders");
            ServiceError::DatabaseError(e.into())
        })?;

        let orders = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page = page, per_page = per_page, "Failed to fetch orders page");
            ServiceError::DatabaseError(e.into())
        })?;

        let rows = stitch_order_rows(db, orders).await?;

        info!(total = total, page = page, returned_count = rows.len(), "Orders listed successfully");

        Ok(OrderListResponse {
            orders: rows,
            total,
            page,
            per_page,
        })
    }

    /// Updates an order. The order's previous amount is released before the
    /// balance check, so reducing or keeping an amount always passes.
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub async fn update_order(
        &self,
        order_id: Uuid,
        request: UpdateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        if matches!(request.amount, Some(a) if a < Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "Order amount must not be negative".to_string(),
            ));
        }
        if matches!(request.quantity, Some(q) if q < Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "Order quantity must not be negative".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let now = Utc::now();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to start transaction for order update");
            ServiceError::DatabaseError(e.into())
        })?;

        let existing = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to find order for update");
                ServiceError::DatabaseError(e.into())
            })?
            .ok_or_else(|| {
                warn!(order_id = %order_id, "Order not found for update");
                ServiceError::NotFound("Order not found".to_string())
            })?;

        let period = PeriodEntity::find_by_id(existing.period_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to fetch period for order update");
                ServiceError::DatabaseError(e.into())
            })?
            .ok_or_else(|| ServiceError::NotFound("Period not found".to_string()))?;

        // Effective item: a newly supplied one, else the stored reference
        let new_item = self
            .resolve_item(&txn, request.item_id, period.contract_id)
            .await?;
        let effective_item = match (&new_item, existing.item_id) {
            (Some(item), _) => Some(item.clone()),
            (None, Some(stored_id)) => {
                match self
                    .resolve_item(&txn, Some(stored_id), period.contract_id)
                    .await
                {
                    Ok(item) => item,
                    // A reference left behind by an item-set replacement;
                    // the order keeps its product snapshot
                    Err(ServiceError::ValidationError(_)) => None,
                    Err(e) => return Err(e),
                }
            }
            (None, None) => None,
        };

        let new_amount = match (request.amount, request.quantity) {
            (Some(amount), _) => amount,
            (None, Some(quantity)) => {
                let unit_price = effective_item
                    .as_ref()
                    .and_then(|i| i.unit_price)
                    .unwrap_or(Decimal::ZERO);
                quantity * unit_price
            }
            (None, None) => existing.amount,
        };

        let snapshot = period_snapshot(&txn, &period).await?;
        let available = snapshot.balance + existing.amount;
        if new_amount > available {
            return Err(ServiceError::InsufficientBudget(format!(
                "Order amount {} exceeds the period's available balance {}",
                new_amount, available
            )));
        }

        let mut order_active_model: OrderActiveModel = existing.into();
        order_active_model.amount = Set(new_amount);
        if let Some(order_date) = request.order_date {
            order_active_model.order_date = Set(order_date);
        }
        if let Some(quantity) = request.quantity {
            order_active_model.quantity = Set(Some(quantity));
        }
        if let Some(item) = &new_item {
            order_active_model.item_id = Set(Some(item.id));
            order_active_model.product_code = Set(Some(item.code.clone()));
            order_active_model.product_name = Set(Some(item.name.clone()));
        }
        if let Some(sap_reference) = request.sap_reference {
            order_active_model.sap_reference = Set(Some(sap_reference));
        }
        if let Some(sicop_reference) = request.sicop_reference {
            order_active_model.sicop_reference = Set(Some(sicop_reference));
        }
        if let Some(pur) = request.pur {
            order_active_model.pur = Set(Some(pur));
        }
        if let Some(reservation_number) = request.reservation_number {
            order_active_model.reservation_number = Set(Some(reservation_number));
        }
        if let Some(description) = request.description {
            order_active_model.description = Set(Some(description));
        }
        order_active_model.updated_at = Set(Some(now));

        let updated = order_active_model.update(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to update order");
            ServiceError::DatabaseError(e.into())
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order update");
            ServiceError::DatabaseError(e.into())
        })?;

        info!(order_id = %order_id, amount = %new_amount, "Order updated successfully");

        self.invalidate_caches().await;

        if let Some(event_sender) = &self.event_sender {
            event_sender.send_or_log(Event::OrderUpdated(order_id)).await;
        }

        Ok(OrderResponse::from(updated))
    }

    /// Deletes an order, releasing its amount back to the period balance.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to find order for deletion");
                ServiceError::DatabaseError(e.into())
            })?
            .ok_or_else(|| {
                warn!(order_id = %order_id, "Order not found for deletion");
                ServiceError::NotFound("Order not found".to_string())
            })?;

        OrderEntity::delete_by_id(order.id)
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to delete order");
                ServiceError::DatabaseError(e.into())
            })?;

        info!(order_id = %order_id, "Order deleted successfully");

        self.invalidate_caches().await;

        if let Some(event_sender) = &self.event_sender {
            event_sender.send_or_log(Event::OrderDeleted(order_id)).await;
        }

        Ok(())
    }

    /// Resolves an item reference against the owning contract. Unknown or
    /// foreign items are request errors, not 404s.
    async fn resolve_item<C: ConnectionTrait>(
        &self,
        db: &C,
        item_id: Option<Uuid>,
        contract_id: Uuid,
    ) -> Result<Option<contract_item::Model>, ServiceError> {
        let Some(item_id) = item_id else {
            return Ok(None);
        };

        let item = ContractItemEntity::find_by_id(item_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, item_id = %item_id, "Failed to fetch contract item");
                ServiceError::DatabaseError(e.into())
            })?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Order references an unknown contract item ({})",
                    item_id
                ))
            })?;

        if item.contract_id != contract_id {
            return Err(ServiceError::ValidationError(
                "Order item belongs to a different contract".to_string(),
            ));
        }

        Ok(Some(item))
    }

    async fn invalidate_caches(&self) {
        if let Err(e) = self
            .cache
            .invalidate(&[CacheScope::Periods, CacheScope::Dashboard])
            .await
        {
            warn!(error = %e, "Failed to invalidate order caches");
        }
    }
}

/// Computes the budget position of a period from the store.
pub(crate) async fn period_snapshot<C: ConnectionTrait>(
    db: &C,
    period: &period::Model,
) -> Result<budget::BudgetSnapshot, ServiceError> {
    let (orders, injections) =
        crate::services::periods::load_period_children(db, &[period.id]).await?;

    Ok(budget::compute_snapshot(
        period.allocated_budget,
        injections.iter().map(|i| i.amount),
        orders.iter().map(|o| o.amount),
    ))
}

/// Joins a batch of orders with their periods and contracts.
pub(crate) async fn stitch_order_rows<C: ConnectionTrait>(
    db: &C,
    orders: Vec<order::Model>,
) -> Result<Vec<OrderListItem>, ServiceError> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let period_ids: Vec<Uuid> = orders
        .iter()
        .map(|o| o.period_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let periods: HashMap<Uuid, period::Model> = PeriodEntity::find()
        .filter(period::Column::Id.is_in(period_ids))
        .all(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch periods for order rows");
            ServiceError::DatabaseError(e.into())
        })?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let contract_ids: Vec<Uuid> = periods
        .values()
        .map(|p| p.contract_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let contracts: HashMap<Uuid, contract::Model> = ContractEntity::find()
        .filter(contract::Column::Id.is_in(contract_ids))
        .all(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch contracts for order rows");
            ServiceError::DatabaseError(e.into())
        })?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let mut rows = Vec::with_capacity(orders.len());
    for order_model in orders {
        // Parents exist by foreign key; a missing one means a concurrent
        // delete, and the row is skipped
        let Some(period_model) = periods.get(&order_model.period_id) else {
            warn!(order_id = %order_model.id, "Order period disappeared during listing");
            continue;
        };
        let Some(contract_model) = contracts.get(&period_model.contract_id) else {
            warn!(order_id = %order_model.id, "Order contract disappeared during listing");
            continue;
        };

        let currency = budget::CurrencyKind::classify(
            period_model
                .currency
                .as_deref()
                .or(contract_model.currency.as_deref()),
        )
        .label()
        .to_string();

        rows.push(OrderListItem {
            id: order_model.id,
            order_date: order_model.order_date,
            amount: order_model.amount,
            quantity: order_model.quantity,
            sap_reference: order_model.sap_reference,
            sicop_reference: order_model.sicop_reference,
            pur: order_model.pur,
            reservation_number: order_model.reservation_number,
            product_code: order_model.product_code,
            product_name: order_model.product_name,
            description: order_model.description,
            period_id: period_model.id,
            period_name: period_model.name.clone(),
            contract_id: contract_model.id,
            contract_code: contract_model.code.clone(),
            contract_name: contract_model.name.clone(),
            supplier: contract_model.supplier.clone(),
            tender_reference: contract_model.tender_reference.clone(),
            legal_reference: contract_model.legal_reference.clone(),
            currency,
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn explicit_amount_wins_over_derivation() {
        assert_eq!(
            derive_amount(Some(dec!(99)), Some(dec!(10)), Some(dec!(5))),
            Some(dec!(99))
        );
    }

    #[test]
    fn amount_derives_from_quantity_and_unit_price() {
        assert_eq!(
            derive_amount(None, Some(dec!(10)), Some(dec!(2.5))),
            Some(dec!(25))
        );
    }

    #[test]
    fn missing_unit_price_counts_as_zero() {
        assert_eq!(derive_amount(None, Some(dec!(10)), None), Some(dec!(0)));
    }

    #[test]
    fn no_amount_and_no_quantity_cannot_resolve() {
        assert_eq!(derive_amount(None, None, Some(dec!(5))), None);
    }

    #[test]
    fn model_maps_to_response() {
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let period_id = Uuid::new_v4();

        let model = order::Model {
            id: order_id,
            period_id,
            item_id: None,
            order_date: "2025-03-10".parse().unwrap(),
            amount: dec!(300),
            quantity: Some(dec!(3)),
            sap_reference: Some("4500012345".to_string()),
            sicop_reference: None,
            pur: None,
            reservation_number: Some("RES-9".to_string()),
            product_code: Some("MED-001".to_string()),
            product_name: Some("Acetaminofen 500mg".to_string()),
            description: None,
            created_at: now,
            updated_at: None,
        };

        let response = OrderResponse::from(model);
        assert_eq!(response.id, order_id);
        assert_eq!(response.period_id, period_id);
        assert_eq!(response.amount, dec!(300));
        assert_eq!(response.product_name.as_deref(), Some("Acetaminofen 500mg"));
    }
}
