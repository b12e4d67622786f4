use crate::{
    cache::{CacheScope, InMemoryCache},
    db::DbPool,
    entities::{
        contract::{self, ActiveModel as ContractActiveModel, Entity as ContractEntity},
        contract_item::{
            self, ActiveModel as ContractItemActiveModel, Entity as ContractItemEntity,
        },
        injection::{self, Entity as InjectionEntity},
        order::{self, Entity as OrderEntity},
        period::{self, ActiveModel as PeriodActiveModel, Entity as PeriodEntity, PeriodStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::injections::InjectionResponse,
    services::orders::OrderResponse,
    services::periods::{self, PeriodResponse},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Request/Response types for the contract service
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ContractItemInput {
    #[validate(length(min = 1, max = 50, message = "Item code is required"))]
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "Item name is required"))]
    pub name: String,
    pub currency: Option<String>,
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct InitialPeriodInput {
    /// Defaults to "Periodo 1".
    #[validate(length(min = 1, max = 100, message = "Period name must not be empty"))]
    pub name: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub allocated_budget: Decimal,
    pub currency: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateContractRequest {
    #[validate(length(min = 1, max = 50, message = "Contract code is required"))]
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "Contract name is required"))]
    pub name: String,
    #[validate(length(max = 100, message = "Tender reference is too long"))]
    pub tender_reference: Option<String>,
    #[validate(length(max = 100, message = "Legal reference is too long"))]
    pub legal_reference: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Supplier is required"))]
    pub supplier: String,
    pub unit_price: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub currency: Option<String>,
    /// The medication line items, one to three of them.
    #[validate(length(min = 1, max = 3, message = "A contract carries between one and three items"))]
    pub items: Vec<ContractItemInput>,
    /// The contract's first execution window, created Active.
    pub initial_period: InitialPeriodInput,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateContractRequest {
    #[validate(length(min = 1, max = 50, message = "Contract code must not be empty"))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Contract name must not be empty"))]
    pub name: Option<String>,
    #[validate(length(max = 100, message = "Tender reference is too long"))]
    pub tender_reference: Option<String>,
    #[validate(length(max = 100, message = "Legal reference is too long"))]
    pub legal_reference: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Supplier must not be empty"))]
    pub supplier: Option<String>,
    pub unit_price: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub currency: Option<String>,
    /// When present, replaces the whole item set. Existing orders keep
    /// their product snapshot; their item reference is cleared.
    #[validate(length(min = 1, max = 3, message = "A contract carries between one and three items"))]
    pub items: Option<Vec<ContractItemInput>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContractItemResponse {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub currency: Option<String>,
    pub unit_price: Option<Decimal>,
    pub position: i32,
}

impl From<contract_item::Model> for ContractItemResponse {
    fn from(model: contract_item::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            name: model.name,
            currency: model.currency,
            unit_price: model.unit_price,
            position: model.position,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContractResponse {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub tender_reference: Option<String>,
    pub legal_reference: Option<String>,
    pub supplier: String,
    pub unit_price: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub currency: Option<String>,
    pub items: Vec<ContractItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ContractListResponse {
    pub contracts: Vec<ContractResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// One period of the contract detail, with its orders and injections.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PeriodDetailResponse {
    pub period: PeriodResponse,
    pub orders: Vec<OrderResponse>,
    pub injections: Vec<InjectionResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ContractDetailResponse {
    pub contract: ContractResponse,
    pub periods: Vec<PeriodDetailResponse>,
}

fn contract_response(
    model: &contract::Model,
    items: Vec<contract_item::Model>,
) -> ContractResponse {
    ContractResponse {
        id: model.id,
        code: model.code.clone(),
        name: model.name.clone(),
        tender_reference: model.tender_reference.clone(),
        legal_reference: model.legal_reference.clone(),
        supplier: model.supplier.clone(),
        unit_price: model.unit_price,
        start_date: model.start_date,
        currency: model.currency.clone(),
        items: items.into_iter().map(ContractItemResponse::from).collect(),
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

/// Service for managing procurement contracts
#[derive(Clone)]
pub struct ContractService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    cache: Arc<InMemoryCache>,
    cache_ttl: Option<Duration>,
}

impl ContractService {
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

    /// Creates a contract with its line items and initial period in one
    /// transaction. Either everything lands or nothing does.
    #[instrument(skip(self, request), fields(code = %request.code, supplier = %request.supplier))]
    pub async fn create_contract(
        &self,
        request: CreateContractRequest,
    ) -> Result<ContractResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        for item in &request.items {
            item.validate()
                .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        }
        request
            .initial_period
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        if request.initial_period.end_date <= request.initial_period.start_date {
            return Err(ServiceError::ValidationError(
                "End date must be after the start date".to_string(),
            ));
        }
        if request.initial_period.allocated_budget < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Allocated budget must not be negative".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let now = Utc::now();
        let contract_id = Uuid::new_v4();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for contract creation");
            ServiceError::DatabaseError(e.into())
        })?;

        let contract_active_model = ContractActiveModel {
            id: Set(contract_id),
            code: Set(request.code.clone()),
            name: Set(request.name.clone()),
            tender_reference: Set(request.tender_reference.clone()),
            legal_reference: Set(request.legal_reference.clone()),
            supplier: Set(request.supplier.clone()),
            unit_price: Set(request.unit_price),
            start_date: Set(request.start_date),
            currency: Set(request.currency.clone()),
            created_at: Set(now),
            updated_at: Set(None),
        };

        let contract_model = contract_active_model.insert(&txn).await.map_err(|e| {
            error!(error = %e, contract_id = %contract_id, "Failed to create contract");
            ServiceError::DatabaseError(e.into())
        })?;

        let mut item_models = Vec::with_capacity(request.items.len());
        for (position, item) in request.items.iter().enumerate() {
            let item_active_model = ContractItemActiveModel {
                id: Set(Uuid::new_v4()),
                contract_id: Set(contract_id),
                code: Set(item.code.clone()),
                name: Set(item.name.clone()),
                currency: Set(item.currency.clone()),
                unit_price: Set(item.unit_price),
                position: Set(position as i32),
                created_at: Set(now),
            };
            let item_model = item_active_model.insert(&txn).await.map_err(|e| {
                error!(error = %e, contract_id = %contract_id, "Failed to create contract item");
                ServiceError::DatabaseError(e.into())
            })?;
            item_models.push(item_model);
        }

        // The first period opens Active so the contract can take orders and
        // injections right away
        let period_id = Uuid::new_v4();
        let period_active_model = PeriodActiveModel {
            id: Set(period_id),
            contract_id: Set(contract_id),
            name: Set(request
                .initial_period
                .name
                .clone()
                .unwrap_or_else(|| "Periodo 1".to_string())),
            start_date: Set(request.initial_period.start_date),
            end_date: Set(request.initial_period.end_date),
            allocated_budget: Set(request.initial_period.allocated_budget),
            initial_budget: Set(Some(request.initial_period.allocated_budget)),
            status: Set(PeriodStatus::Active.to_string()),
            currency: Set(request
                .initial_period
                .currency
                .clone()
                .or_else(|| request.currency.clone())),
            created_at: Set(now),
            updated_at: Set(None),
        };

        period_active_model.insert(&txn).await.map_err(|e| {
            error!(error = %e, contract_id = %contract_id, "Failed to create initial period");
            ServiceError::DatabaseError(e.into())
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, contract_id = %contract_id, "Failed to commit contract creation");
            ServiceError::DatabaseError(e.into())
        })?;

        info!(
            contract_id = %contract_id,
            code = %request.code,
            items = item_models.len(),
            "Contract created successfully"
        );

        self.invalidate_caches().await;

        if let Some(event_sender) = &self.event_sender {
            event_sender
                .send_or_log(Event::ContractCreated(contract_id))
                .await;
        }

        Ok(contract_response(&contract_model, item_models))
    }

    /// Lists contracts with their items, filtered by a free-text search
    /// over code, name, and supplier.
    #[instrument(skip(self))]
    pub async fn list_contracts(
        &self,
        search: Option<String>,
        page: u64,
        per_page: u64,
    ) -> Result<ContractListResponse, ServiceError> {
        let page = page.max(1);
        let per_page = per_page.max(1);

        let normalized_search = search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let cache_key = CacheScope::Contracts.key(&format!(
            "list:{}:{}:{}",
            page,
            per_page,
            normalized_search.as_deref().unwrap_or("")
        ));
        if let Ok(Some(cached)) = self
            .cache
            .get_json::<ContractListResponse>(&cache_key)
            .await
        {
            return Ok(cached);
        }

        let db = &*self.db_pool;

        let mut condition = Condition::all();
        if let Some(term) = &normalized_search {
            condition = condition.add(
                Condition::any()
                    .add(contract::Column::Code.contains(term))
                    .add(contract::Column::Name.contains(term))
                    .add(contract::Column::Supplier.contains(term)),
            );
        }

        let paginator = ContractEntity::find()
            .filter(condition)
            .order_by_asc(contract::Column::Code)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count contracts");
            ServiceError::DatabaseError(e.into())
        })?;

        let contracts = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page = page, per_page = per_page, "Failed to fetch contracts page");
            ServiceError::DatabaseError(e.into())
        })?;

        let contract_ids: Vec<Uuid> = contracts.iter().map(|c| c.id).collect();
        let items = if contract_ids.is_empty() {
            Vec::new()
        } else {
            ContractItemEntity::find()
                .filter(contract_item::Column::ContractId.is_in(contract_ids))
                .order_by_asc(contract_item::Column::Position)
                .all(db)
                .await
                .map_err(|e| {
                    error!(error = %e, "Failed to fetch contract items");
                    ServiceError::DatabaseError(e.into())
                })?
        };

        let mut items_by_contract: HashMap<Uuid, Vec<contract_item::Model>> = HashMap::new();
        for item in items {
            items_by_contract
                .entry(item.contract_id)
                .or_default()
                .push(item);
        }

        let responses: Vec<ContractResponse> = contracts
            .iter()
            .map(|c| {
                contract_response(c, items_by_contract.remove(&c.id).unwrap_or_default())
            })
            .collect();

        let response = ContractListResponse {
            contracts: responses,
            total,
            page,
            per_page,
        };

        if let Err(e) = self
            .cache
            .set_json(&cache_key, &response, self.cache_ttl)
            .await
        {
            warn!(error = %e, "Failed to cache contract listing");
        }

        info!(total = total, page = page, "Contracts listed successfully");

        Ok(response)
    }

    /// Full contract view: items plus every period with its budget
    /// position, orders, and injections. Always read fresh.
    #[instrument(skip(self), fields(contract_id = %contract_id))]
    pub async fn get_contract_detail(
        &self,
        contract_id: Uuid,
    ) -> Result<Option<ContractDetailResponse>, ServiceError> {
        let db = &*self.db_pool;

        let Some(contract_model) = ContractEntity::find_by_id(contract_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, contract_id = %contract_id, "Failed to fetch contract");
                ServiceError::DatabaseError(e.into())
            })?
        else {
            return Ok(None);
        };

        let items = ContractItemEntity::find()
            .filter(contract_item::Column::ContractId.eq(contract_id))
            .order_by_asc(contract_item::Column::Position)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, contract_id = %contract_id, "Failed to fetch contract items");
                ServiceError::DatabaseError(e.into())
            })?;

        let period_models = PeriodEntity::find()
            .filter(period::Column::ContractId.eq(contract_id))
            .order_by_asc(period::Column::StartDate)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, contract_id = %contract_id, "Failed to fetch contract periods");
                ServiceError::DatabaseError(e.into())
            })?;

        let period_ids: Vec<Uuid> = period_models.iter().map(|p| p.id).collect();
        let (orders, injections) = periods::load_period_children(db, &period_ids).await?;

        let period_details: Vec<PeriodDetailResponse> = period_models
            .iter()
            .map(|p| {
                let mut period_orders: Vec<order::Model> = orders
                    .iter()
                    .filter(|o| o.period_id == p.id)
                    .cloned()
                    .collect();
                period_orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
                let mut period_injections: Vec<injection::Model> = injections
                    .iter()
                    .filter(|i| i.period_id == p.id)
                    .cloned()
                    .collect();
                period_injections.sort_by(|a, b| b.injection_date.cmp(&a.injection_date));

                PeriodDetailResponse {
                    period: periods::period_response(p, &period_orders, &period_injections),
                    orders: period_orders.into_iter().map(OrderResponse::from).collect(),
                    injections: period_injections
                        .into_iter()
                        .map(InjectionResponse::from)
                        .collect(),
                }
            })
            .collect();

        Ok(Some(ContractDetailResponse {
            contract: contract_response(&contract_model, items),
            periods: period_details,
        }))
    }

    /// Updates a contract; a provided item list replaces the previous one.
    #[instrument(skip(self, request), fields(contract_id = %contract_id))]
    pub async fn update_contract(
        &self,
        contract_id: Uuid,
        request: UpdateContractRequest,
    ) -> Result<ContractResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if let Some(items) = &request.items {
            for item in items {
                item.validate()
                    .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
            }
        }

        let db = &*self.db_pool;
        let now = Utc::now();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, contract_id = %contract_id, "Failed to start transaction for contract update");
            ServiceError::DatabaseError(e.into())
        })?;

        let contract_model = ContractEntity::find_by_id(contract_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, contract_id = %contract_id, "Failed to find contract for update");
                ServiceError::DatabaseError(e.into())
            })?
            .ok_or_else(|| {
                warn!(contract_id = %contract_id, "Contract not found for update");
                ServiceError::NotFound("Contract not found".to_string())
            })?;

        let mut contract_active_model: ContractActiveModel = contract_model.into();
        if let Some(code) = request.code {
            contract_active_model.code = Set(code);
        }
        if let Some(name) = request.name {
            contract_active_model.name = Set(name);
        }
        if let Some(tender_reference) = request.tender_reference {
            contract_active_model.tender_reference = Set(Some(tender_reference));
        }
        if let Some(legal_reference) = request.legal_reference {
            contract_active_model.legal_reference = Set(Some(legal_reference));
        }
        if let Some(supplier) = request.supplier {
            contract_active_model.supplier = Set(supplier);
        }
        if let Some(unit_price) = request.unit_price {
            contract_active_model.unit_price = Set(Some(unit_price));
        }
        if let Some(start_date) = request.start_date {
            contract_active_model.start_date = Set(Some(start_date));
        }
        if let Some(currency) = request.currency {
            contract_active_model.currency = Set(Some(currency));
        }
        contract_active_model.updated_at = Set(Some(now));

        let updated_contract = contract_active_model.update(&txn).await.map_err(|e| {
            error!(error = %e, contract_id = %contract_id, "Failed to update contract");
            ServiceError::DatabaseError(e.into())
        })?;

        let item_models = if let Some(new_items) = request.items {
            let old_item_ids: Vec<Uuid> = ContractItemEntity::find()
                .filter(contract_item::Column::ContractId.eq(contract_id))
                .all(&txn)
                .await
                .map_err(|e| {
                    error!(error = %e, contract_id = %contract_id, "Failed to fetch items for replacement");
                    ServiceError::DatabaseError(e.into())
                })?
                .into_iter()
                .map(|i| i.id)
                .collect();

            if !old_item_ids.is_empty() {
                // Orders keep their product snapshot; only the live item
                // reference is dropped
                OrderEntity::update_many()
                    .col_expr(order::Column::ItemId, Expr::value(Option::<Uuid>::None))
                    .filter(order::Column::ItemId.is_in(old_item_ids.clone()))
                    .exec(&txn)
                    .await
                    .map_err(|e| {
                        error!(error = %e, contract_id = %contract_id, "Failed to detach orders from replaced items");
                        ServiceError::DatabaseError(e.into())
                    })?;

                ContractItemEntity::delete_many()
                    .filter(contract_item::Column::Id.is_in(old_item_ids))
                    .exec(&txn)
                    .await
                    .map_err(|e| {
                        error!(error = %e, contract_id = %contract_id, "Failed to delete replaced items");
                        ServiceError::DatabaseError(e.into())
                    })?;
            }

            let mut inserted = Vec::with_capacity(new_items.len());
            for (position, item) in new_items.iter().enumerate() {
                let item_active_model = ContractItemActiveModel {
                    id: Set(Uuid::new_v4()),
                    contract_id: Set(contract_id),
                    code: Set(item.code.clone()),
                    name: Set(item.name.clone()),
                    currency: Set(item.currency.clone()),
                    unit_price: Set(item.unit_price),
                    position: Set(position as i32),
                    created_at: Set(now),
                };
                let item_model = item_active_model.insert(&txn).await.map_err(|e| {
                    error!(error = %e, contract_id = %contract_id, "Failed to insert replacement item");
                    ServiceError::DatabaseError(e.into())
                })?;
                inserted.push(item_model);
            }
            inserted
        } else {
            ContractItemEntity::find()
                .filter(contract_item::Column::ContractId.eq(contract_id))
                .order_by_asc(contract_item::Column::Position)
                .all(&txn)
                .await
                .map_err(|e| {
                    error!(error = %e, contract_id = %contract_id, "Failed to fetch contract items");
                    ServiceError::DatabaseError(e.into())
                })?
        };

        txn.commit().await.map_err(|e| {
            error!(error = %e, contract_id = %contract_id, "Failed to commit contract update");
            ServiceError::DatabaseError(e.into())
        })?;

        info!(contract_id = %contract_id, "Contract updated successfully");

        self.invalidate_caches().await;

        if let Some(event_sender) = &self.event_sender {
            event_sender
                .send_or_log(Event::ContractUpdated(contract_id))
                .await;
        }

        Ok(contract_response(&updated_contract, item_models))
    }

    /// Deletes a contract and everything under it: items, periods, orders,
    /// and injections, in one transaction.
    #[instrument(skip(self), fields(contract_id = %contract_id))]
    pub async fn delete_contract(&self, contract_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, contract_id = %contract_id, "Failed to start transaction for contract deletion");
            ServiceError::DatabaseError(e.into())
        })?;

        let contract_model = ContractEntity::find_by_id(contract_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, contract_id = %contract_id, "Failed to find contract for deletion");
                ServiceError::DatabaseError(e.into())
            })?
            .ok_or_else(|| {
                warn!(contract_id = %contract_id, "Contract not found for deletion");
                ServiceError::NotFound("Contract not found".to_string())
            })?;

        let period_ids: Vec<Uuid> = PeriodEntity::find()
            .filter(period::Column::ContractId.eq(contract_id))
            .all(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, contract_id = %contract_id, "Failed to fetch periods for deletion");
                ServiceError::DatabaseError(e.into())
            })?
            .into_iter()
            .map(|p| p.id)
            .collect();

        if !period_ids.is_empty() {
            OrderEntity::delete_many()
                .filter(order::Column::PeriodId.is_in(period_ids.clone()))
                .exec(&txn)
                .await
                .map_err(|e| {
                    error!(error = %e, contract_id = %contract_id, "Failed to delete contract orders");
                    ServiceError::DatabaseError(e.into())
                })?;

            InjectionEntity::delete_many()
                .filter(injection::Column::PeriodId.is_in(period_ids.clone()))
                .exec(&txn)
                .await
                .map_err(|e| {
                    error!(error = %e, contract_id = %contract_id, "Failed to delete contract injections");
                    ServiceError::DatabaseError(e.into())
                })?;

            PeriodEntity::delete_many()
                .filter(period::Column::Id.is_in(period_ids))
                .exec(&txn)
                .await
                .map_err(|e| {
                    error!(error = %e, contract_id = %contract_id, "Failed to delete contract periods");
                    ServiceError::DatabaseError(e.into())
                })?;
        }

        ContractItemEntity::delete_many()
            .filter(contract_item::Column::ContractId.eq(contract_id))
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, contract_id = %contract_id, "Failed to delete contract items");
                ServiceError::DatabaseError(e.into())
            })?;

        ContractEntity::delete_by_id(contract_model.id)
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, contract_id = %contract_id, "Failed to delete contract");
                ServiceError::DatabaseError(e.into())
            })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, contract_id = %contract_id, "Failed to commit contract deletion");
            ServiceError::DatabaseError(e.into())
        })?;

        info!(contract_id = %contract_id, "Contract deleted successfully");

        self.invalidate_caches().await;

        if let Some(event_sender) = &self.event_sender {
            event_sender
                .send_or_log(Event::ContractDeleted(contract_id))
                .await;
        }

        Ok(())
    }

    async fn invalidate_caches(&self) {
        if let Err(e) = self
            .cache
            .invalidate(&[
                CacheScope::Contracts,
                CacheScope::Periods,
                CacheScope::Dashboard,
            ])
            .await
        {
            warn!(error = %e, "Failed to invalidate contract caches");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn contract_response_keeps_item_positions() {
        let now = Utc::now();
        let contract_id = Uuid::new_v4();

        let model = contract::Model {
            id: contract_id,
            code: "CONT-2024-001".to_string(),
            name: "Suministro de analgesicos".to_string(),
            tender_reference: Some("2024LN-000001".to_string()),
            legal_reference: None,
            supplier: "Distribuidora Medica SA".to_string(),
            unit_price: None,
            start_date: Some("2024-01-15".parse().unwrap()),
            currency: Some("CRC".to_string()),
            created_at: now,
            updated_at: None,
        };

        let items = vec![
            contract_item::Model {
                id: Uuid::new_v4(),
                contract_id,
                code: "MED-001".to_string(),
                name: "Acetaminofen 500mg".to_string(),
                currency: Some("CRC".to_string()),
                unit_price: Some(dec!(125.50)),
                position: 0,
                created_at: now,
            },
            contract_item::Model {
                id: Uuid::new_v4(),
                contract_id,
                code: "MED-002".to_string(),
                name: "Ibuprofeno 400mg".to_string(),
                currency: Some("CRC".to_string()),
                unit_price: Some(dec!(210)),
                position: 1,
                created_at: now,
            },
        ];

        let response = contract_response(&model, items);

        assert_eq!(response.code, "CONT-2024-001");
        assert_eq!(response.items.len(), 2);
        assert_eq!(response.items[0].position, 0);
        assert_eq!(response.items[0].name, "Acetaminofen 500mg");
        assert_eq!(response.items[1].position, 1);
    }
}
