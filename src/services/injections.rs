use crate::{
    budget,
    cache::{CacheScope, InMemoryCache},
    db::DbPool,
    entities::{
        contract::{self, Entity as ContractEntity},
        injection::{self, ActiveModel as InjectionActiveModel, Entity as InjectionEntity},
        period::{self, Entity as PeriodEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
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

pub const PDF_DATA_URL_PREFIX: &str = "data:application/pdf;base64,";
/// Decoded size ceiling for a backing document.
pub const MAX_ATTACHMENT_BYTES: usize = 500 * 1024;

/// Request/Response types for the budget injection service
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateInjectionRequest {
    /// The injection lands in this contract's active period.
    pub contract_id: Uuid,
    pub amount: Decimal,
    /// Defaults to today.
    pub injection_date: Option<NaiveDate>,
    /// The authorizing letter ("oficio") number.
    #[validate(length(max = 100, message = "Reference number is too long"))]
    pub reference_number: Option<String>,
    #[validate(length(max = 500, message = "Description is too long"))]
    pub description: Option<String>,
    #[validate(length(max = 200, message = "Document name is too long"))]
    pub document_name: Option<String>,
    /// PDF backing document as a `data:application/pdf;base64,` URL.
    pub document_data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateInjectionRequest {
    pub amount: Option<Decimal>,
    pub injection_date: Option<NaiveDate>,
    #[validate(length(max = 100, message = "Reference number is too long"))]
    pub reference_number: Option<String>,
    #[validate(length(max = 500, message = "Description is too long"))]
    pub description: Option<String>,
    #[validate(length(max = 200, message = "Document name is too long"))]
    pub document_name: Option<String>,
    pub document_data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InjectionResponse {
    pub id: Uuid,
    pub period_id: Uuid,
    pub amount: Decimal,
    pub injection_date: NaiveDate,
    pub reference_number: Option<String>,
    pub description: Option<String>,
    pub document_name: Option<String>,
    pub document_data: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<injection::Model> for InjectionResponse {
    fn from(model: injection::Model) -> Self {
        Self {
            id: model.id,
            period_id: model.period_id,
            amount: model.amount,
            injection_date: model.injection_date,
            reference_number: model.reference_number,
            description: model.description,
            document_name: model.document_name,
            document_data: model.document_data,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// One injection listing row with contract context. The document payload
/// itself is not carried, only its presence.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InjectionListItem {
    pub id: Uuid,
    pub injection_date: NaiveDate,
    pub amount: Decimal,
    pub reference_number: Option<String>,
    pub description: Option<String>,
    pub document_name: Option<String>,
    pub has_document: bool,
    pub period_id: Uuid,
    pub period_name: String,
    pub contract_id: Uuid,
    pub contract_code: String,
    pub contract_name: String,
    pub supplier: String,
    /// Bucketed currency label, CRC or USD.
    pub currency: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InjectionListResponse {
    pub injections: Vec<InjectionListItem>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Clone, Default)]
pub struct InjectionFilters {
    pub search: Option<String>,
    pub contract_id: Option<Uuid>,
}

/// Checks a backing document: a PDF data URL whose decoded payload stays
/// within the size ceiling.
fn validate_attachment(data_url: &str) -> Result<(), ServiceError> {
    let payload = data_url.strip_prefix(PDF_DATA_URL_PREFIX).ok_or_else(|| {
        ServiceError::ValidationError(
            "Backing document must be a base64 PDF data URL".to_string(),
        )
    })?;

    let decoded = STANDARD.decode(payload).map_err(|_| {
        ServiceError::ValidationError("Backing document is not valid base64".to_string())
    })?;

    if decoded.len() > MAX_ATTACHMENT_BYTES {
        return Err(ServiceError::ValidationError(format!(
            "Backing document exceeds the {}KB limit",
            MAX_ATTACHMENT_BYTES / 1024
        )));
    }

    Ok(())
}

/// Service for managing budget injections
#[derive(Clone)]
pub struct InjectionService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    cache: Arc<InMemoryCache>,
}

impl InjectionService {
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

    /// Records an injection into the contract's active period. A contract
    /// without an active period cannot receive one.
    #[instrument(skip(self, request), fields(contract_id = %request.contract_id, amount = %request.amount))]
    pub async fn create_injection(
        &self,
        request: CreateInjectionRequest,
    ) -> Result<InjectionResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        if request.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Injection amount must be positive".to_string(),
            ));
        }
        if let Some(document) = &request.document_data {
            validate_attachment(document)?;
        }

        let db = &*self.db_pool;
        let now = Utc::now();
        let injection_id = Uuid::new_v4();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for injection creation");
            ServiceError::DatabaseError(e.into())
        })?;

        let contract = ContractEntity::find_by_id(request.contract_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, contract_id = %request.contract_id, "Failed to fetch contract for injection");
                ServiceError::DatabaseError(e.into())
            })?
            .ok_or_else(|| ServiceError::NotFound("Contract not found".to_string()))?;

        let periods = PeriodEntity::find()
            .filter(period::Column::ContractId.eq(contract.id))
            .all(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, contract_id = %contract.id, "Failed to fetch periods for injection");
                ServiceError::DatabaseError(e.into())
            })?;

        let active_period = budget::find_active_period(&periods).ok_or_else(|| {
            warn!(contract_id = %contract.id, "Injection rejected: contract has no active period");
            ServiceError::InvalidOperation(
                "Contract has no active period to receive the injection".to_string(),
            )
        })?;

        let injection_active_model = InjectionActiveModel {
            id: Set(injection_id),
            period_id: Set(active_period.id),
            amount: Set(request.amount),
            injection_date: Set(request
                .injection_date
                .unwrap_or_else(|| Utc::now().date_naive())),
            reference_number: Set(request.reference_number),
            description: Set(request.description),
            document_name: Set(request.document_name),
            document_data: Set(request.document_data),
            created_at: Set(now),
            updated_at: Set(None),
        };

        let injection_model = injection_active_model.insert(&txn).await.map_err(|e| {
            error!(error = %e, injection_id = %injection_id, "Failed to create injection");
            ServiceError::DatabaseError(e.into())
        })?;

        let period_id = injection_model.period_id;

        txn.commit().await.map_err(|e| {
            error!(error = %e, injection_id = %injection_id, "Failed to commit injection creation");
            ServiceError::DatabaseError(e.into())
        })?;

        info!(
            injection_id = %injection_id,
            period_id = %period_id,
            amount = %request.amount,
            "Budget injection recorded successfully"
        );

        self.invalidate_caches().await;

        if let Some(event_sender) = &self.event_sender {
            event_sender
                .send_or_log(Event::InjectionRecorded {
                    period_id,
                    injection_id,
                })
                .await;
        }

        Ok(InjectionResponse::from(injection_model))
    }

    /// Lists injections, newest first, with contract context.
    #[instrument(skip(self, filters))]
    pub async fn list_injections(
        &self,
        filters: InjectionFilters,
        page: u64,
        per_page: u64,
    ) -> Result<InjectionListResponse, ServiceError> {
        let page = page.max(1);
        let per_page = per_page.max(1);

        let db = &*self.db_pool;

        let mut condition = Condition::all();
        if let Some(contract_id) = filters.contract_id {
            let period_ids: Vec<Uuid> = PeriodEntity::find()
                .filter(period::Column::ContractId.eq(contract_id))
                .all(db)
                .await
                .map_err(|e| {
                    error!(error = %e, contract_id = %contract_id, "Failed to resolve contract periods for injection filter");
                    ServiceError::DatabaseError(e.into())
                })?
                .into_iter()
                .map(|p| p.id)
                .collect();
            condition = condition.add(injection::Column::PeriodId.is_in(period_ids));
        }
        if let Some(search) = filters
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            condition = condition.add(
                Condition::any()
                    .add(injection::Column::ReferenceNumber.contains(search))
                    .add(injection::Column::Description.contains(search)),
            );
        }

        let paginator = InjectionEntity::find()
            .filter(condition)
            .order_by_desc(injection::Column::InjectionDate)
            .order_by_desc(injection::Column::CreatedAt)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count injections");
            ServiceError::DatabaseError(e.into())
        })?;

        let injections = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page = page, per_page = per_page, "Failed to fetch injections page");
            ServiceError::DatabaseError(e.into())
        })?;

        let rows = stitch_injection_rows(db, injections).await?;

        info!(total = total, page = page, returned_count = rows.len(), "Injections listed successfully");

        Ok(InjectionListResponse {
            injections: rows,
            total,
            page,
            per_page,
        })
    }

    /// Updates an injection's fields; the period association never changes.
    #[instrument(skip(self, request), fields(injection_id = %injection_id))]
    pub async fn update_injection(
        &self,
        injection_id: Uuid,
        request: UpdateInjectionRequest,
    ) -> Result<InjectionResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        if matches!(request.amount, Some(a) if a <= Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "Injection amount must be positive".to_string(),
            ));
        }
        if let Some(document) = &request.document_data {
            validate_attachment(document)?;
        }

        let db = &*self.db_pool;
        let now = Utc::now();

        let injection_model = InjectionEntity::find_by_id(injection_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, injection_id = %injection_id, "Failed to find injection for update");
                ServiceError::DatabaseError(e.into())
            })?
            .ok_or_else(|| {
                warn!(injection_id = %injection_id, "Injection not found for update");
                ServiceError::NotFound("Injection not found".to_string())
            })?;

        let mut injection_active_model: InjectionActiveModel = injection_model.into();
        if let Some(amount) = request.amount {
            injection_active_model.amount = Set(amount);
        }
        if let Some(injection_date) = request.injection_date {
            injection_active_model.injection_date = Set(injection_date);
        }
        if let Some(reference_number) = request.reference_number {
            injection_active_model.reference_number = Set(Some(reference_number));
        }
        if let Some(description) = request.description {
            injection_active_model.description = Set(Some(description));
        }
        if let Some(document_name) = request.document_name {
            injection_active_model.document_name = Set(Some(document_name));
        }
        if let Some(document_data) = request.document_data {
            injection_active_model.document_data = Set(Some(document_data));
        }
        injection_active_model.updated_at = Set(Some(now));

        let updated = injection_active_model.update(db).await.map_err(|e| {
            error!(error = %e, injection_id = %injection_id, "Failed to update injection");
            ServiceError::DatabaseError(e.into())
        })?;

        info!(injection_id = %injection_id, "Injection updated successfully");

        self.invalidate_caches().await;

        if let Some(event_sender) = &self.event_sender {
            event_sender
                .send_or_log(Event::InjectionUpdated(injection_id))
                .await;
        }

        Ok(InjectionResponse::from(updated))
    }

    /// Deletes an injection, removing its amount from the period budget.
    #[instrument(skip(self), fields(injection_id = %injection_id))]
    pub async fn delete_injection(&self, injection_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let injection_model = InjectionEntity::find_by_id(injection_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, injection_id = %injection_id, "Failed to find injection for deletion");
                ServiceError::DatabaseError(e.into())
            })?
            .ok_or_else(|| {
                warn!(injection_id = %injection_id, "Injection not found for deletion");
                ServiceError::NotFound("Injection not found".to_string())
            })?;

        InjectionEntity::delete_by_id(injection_model.id)
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, injection_id = %injection_id, "Failed to delete injection");
                ServiceError::DatabaseError(e.into())
            })?;

        info!(injection_id = %injection_id, "Injection deleted successfully");

        self.invalidate_caches().await;

        if let Some(event_sender) = &self.event_sender {
            event_sender
                .send_or_log(Event::InjectionDeleted(injection_id))
                .await;
        }

        Ok(())
    }

    async fn invalidate_caches(&self) {
        if let Err(e) = self
            .cache
            .invalidate(&[CacheScope::Periods, CacheScope::Dashboard])
            .await
        {
            warn!(error = %e, "Failed to invalidate injection caches");
        }
    }
}

/// Joins a batch of injections with their periods and contracts.
pub(crate) async fn stitch_injection_rows<C: ConnectionTrait>(
    db: &C,
    injections: Vec<injection::Model>,
) -> Result<Vec<InjectionListItem>, ServiceError> {
    if injections.is_empty() {
        return Ok(Vec::new());
    }

    let period_ids: Vec<Uuid> = injections
        .iter()
        .map(|i| i.period_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let periods: HashMap<Uuid, period::Model> = PeriodEntity::find()
        .filter(period::Column::Id.is_in(period_ids))
        .all(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch periods for injection rows");
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
            error!(error = %e, "Failed to fetch contracts for injection rows");
            ServiceError::DatabaseError(e.into())
        })?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let mut rows = Vec::with_capacity(injections.len());
    for injection_model in injections {
        let Some(period_model) = periods.get(&injection_model.period_id) else {
            warn!(injection_id = %injection_model.id, "Injection period disappeared during listing");
            continue;
        };
        let Some(contract_model) = contracts.get(&period_model.contract_id) else {
            warn!(injection_id = %injection_model.id, "Injection contract disappeared during listing");
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

        rows.push(InjectionListItem {
            id: injection_model.id,
            injection_date: injection_model.injection_date,
            amount: injection_model.amount,
            reference_number: injection_model.reference_number,
            description: injection_model.description,
            document_name: injection_model.document_name,
            has_document: injection_model.document_data.is_some(),
            period_id: period_model.id,
            period_name: period_model.name.clone(),
            contract_id: contract_model.id,
            contract_code: contract_model.code.clone(),
            contract_name: contract_model.name.clone(),
            supplier: contract_model.supplier.clone(),
            currency,
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn pdf_data_url(payload: &[u8]) -> String {
        format!("{}{}", PDF_DATA_URL_PREFIX, STANDARD.encode(payload))
    }

    #[test]
    fn small_pdf_attachment_passes() {
        let url = pdf_data_url(b"%PDF-1.4 minimal");
        assert!(validate_attachment(&url).is_ok());
    }

    #[test]
    fn non_pdf_data_url_is_rejected() {
        let url = format!("data:image/png;base64,{}", STANDARD.encode(b"not a pdf"));
        assert_matches!(
            validate_attachment(&url),
            Err(ServiceError::ValidationError(message)) if message.contains("PDF data URL")
        );
    }

    #[test]
    fn malformed_base64_is_rejected() {
        let url = format!("{}%%%not-base64%%%", PDF_DATA_URL_PREFIX);
        assert_matches!(
            validate_attachment(&url),
            Err(ServiceError::ValidationError(message)) if message.contains("base64")
        );
    }

    #[test]
    fn attachment_over_size_ceiling_is_rejected() {
        let url = pdf_data_url(&vec![0u8; MAX_ATTACHMENT_BYTES + 1]);
        assert_matches!(
            validate_attachment(&url),
            Err(ServiceError::ValidationError(message)) if message.contains("limit")
        );
    }

    #[test]
    fn attachment_at_size_ceiling_passes() {
        let url = pdf_data_url(&vec![0u8; MAX_ATTACHMENT_BYTES]);
        assert!(validate_attachment(&url).is_ok());
    }
}
