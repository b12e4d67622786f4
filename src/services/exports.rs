use crate::{
    budget::{self, CurrencyKind},
    db::DbPool,
    entities::{
        contract::{self, Entity as ContractEntity},
        contract_item::{self, Entity as ContractItemEntity},
        injection::{self, Entity as InjectionEntity},
        order::{self, Entity as OrderEntity},
        period::{self, Entity as PeriodEntity},
    },
    errors::ServiceError,
    services::injections::{self, InjectionListItem},
    services::orders::{self, OrderFilters, OrderListItem},
};
use chrono::NaiveDate;
use sea_orm::{EntityTrait, QueryFilter, QueryOrder};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

const ORDER_HEADERS: [&str; 14] = [
    "Fecha",
    "Concurso",
    "N° Contrato",
    "Periodo",
    "Código Contrato",
    "Nombre Contrato",
    "Medicamento",
    "Proveedor",
    "Referencia SAP",
    "Referencia SICOP",
    "PUR",
    "N° Reserva",
    "Monto",
    "Moneda",
];

const INJECTION_HEADERS: [&str; 8] = [
    "Fecha",
    "Inyección ID",
    "Contrato",
    "Proveedor",
    "Oficio",
    "Monto",
    "Moneda",
    "Descripción",
];

const CONTRACT_HEADERS: [&str; 11] = [
    "ID",
    "Código Contrato",
    "Referencia Legal",
    "Concurso",
    "Periodos",
    "Proveedor",
    "Item Código",
    "Item Descripción",
    "Precio Unitario",
    "Moneda",
    "Estado",
];

/// A ready-to-download spreadsheet.
#[derive(Debug, Clone)]
pub struct CsvExport {
    pub filename: String,
    pub content: String,
}

/// Quotes a field when it carries the delimiter, a quote, or a newline;
/// embedded quotes are doubled.
pub fn escape_field(value: &str, delimiter: char) -> String {
    if value.contains(delimiter) || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn build_csv(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(headers.join(","));
    for row in rows {
        let line: Vec<String> = row.iter().map(|field| escape_field(field, ',')).collect();
        lines.push(line.join(","));
    }
    lines.join("\n")
}

fn dated_filename(prefix: &str, today: NaiveDate) -> String {
    format!("{}{}.csv", prefix, today.format("%Y-%m-%d"))
}

/// Body dates use the day-first form the procurement office reads.
fn display_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn order_row(item: &OrderListItem) -> Vec<String> {
    vec![
        display_date(item.order_date),
        item.tender_reference.clone().unwrap_or_default(),
        item.legal_reference.clone().unwrap_or_default(),
        item.period_name.clone(),
        item.contract_code.clone(),
        item.contract_name.clone(),
        item.product_name
            .clone()
            .or_else(|| item.product_code.clone())
            .unwrap_or_default(),
        item.supplier.clone(),
        item.sap_reference.clone().unwrap_or_default(),
        item.sicop_reference.clone().unwrap_or_default(),
        item.pur.clone().unwrap_or_default(),
        item.reservation_number.clone().unwrap_or_default(),
        item.amount.to_string(),
        item.currency.clone(),
    ]
}

fn injection_row(item: &InjectionListItem) -> Vec<String> {
    vec![
        display_date(item.injection_date),
        item.id.to_string(),
        item.contract_name.clone(),
        item.supplier.clone(),
        item.reference_number.clone().unwrap_or_default(),
        item.amount.to_string(),
        item.currency.clone(),
        item.description.clone().unwrap_or_default(),
    ]
}

fn contract_item_row(
    contract_model: &contract::Model,
    item: Option<&contract_item::Model>,
    period_count: usize,
    status_label: &str,
) -> Vec<String> {
    let currency = CurrencyKind::classify(
        item.and_then(|i| i.currency.as_deref())
            .or(contract_model.currency.as_deref()),
    );
    vec![
        contract_model.id.to_string(),
        contract_model.code.clone(),
        contract_model.legal_reference.clone().unwrap_or_default(),
        contract_model.tender_reference.clone().unwrap_or_default(),
        period_count.to_string(),
        contract_model.supplier.clone(),
        item.map(|i| i.code.clone()).unwrap_or_default(),
        item.map(|i| i.name.clone()).unwrap_or_default(),
        item.and_then(|i| i.unit_price)
            .or(contract_model.unit_price)
            .map(|p| p.to_string())
            .unwrap_or_default(),
        currency.label().to_string(),
        status_label.to_string(),
    ]
}

/// Builds the downloadable spreadsheets
#[derive(Clone)]
pub struct ExportService {
    db_pool: Arc<DbPool>,
}

impl ExportService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Order history, newest first, honoring the same filters as the
    /// order listing.
    #[instrument(skip(self, filters))]
    pub async fn export_orders(&self, filters: OrderFilters) -> Result<CsvExport, ServiceError> {
        let db = &*self.db_pool;

        let condition = filters.condition(db).await?;
        let order_models = OrderEntity::find()
            .filter(condition)
            .order_by_desc(order::Column::OrderDate)
            .order_by_desc(order::Column::CreatedAt)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch orders for export");
                ServiceError::DatabaseError(e.into())
            })?;

        let rows = orders::stitch_order_rows(db, order_models).await?;
        let csv_rows: Vec<Vec<String>> = rows.iter().map(order_row).collect();

        info!(rows = csv_rows.len(), "Order export built successfully");

        Ok(CsvExport {
            filename: dated_filename("historial_pedidos_", chrono::Utc::now().date_naive()),
            content: build_csv(&ORDER_HEADERS, csv_rows),
        })
    }

    /// Budget injection history, newest first.
    #[instrument(skip(self))]
    pub async fn export_injections(&self) -> Result<CsvExport, ServiceError> {
        let db = &*self.db_pool;

        let injection_models = InjectionEntity::find()
            .order_by_desc(injection::Column::InjectionDate)
            .order_by_desc(injection::Column::CreatedAt)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch injections for export");
                ServiceError::DatabaseError(e.into())
            })?;

        let rows = injections::stitch_injection_rows(db, injection_models).await?;
        let csv_rows: Vec<Vec<String>> = rows.iter().map(injection_row).collect();

        info!(rows = csv_rows.len(), "Injection export built successfully");

        Ok(CsvExport {
            filename: dated_filename(
                "inyecciones_presupuesto_",
                chrono::Utc::now().date_naive(),
            ),
            content: build_csv(&INJECTION_HEADERS, csv_rows),
        })
    }

    /// Contract register, one row per line item.
    #[instrument(skip(self))]
    pub async fn export_contracts(&self) -> Result<CsvExport, ServiceError> {
        let db = &*self.db_pool;

        let contracts = ContractEntity::find()
            .order_by_asc(contract::Column::Code)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch contracts for export");
                ServiceError::DatabaseError(e.into())
            })?;

        let items = ContractItemEntity::find()
            .order_by_asc(contract_item::Column::Position)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch contract items for export");
                ServiceError::DatabaseError(e.into())
            })?;

        let periods = PeriodEntity::find()
            .order_by_asc(period::Column::StartDate)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch periods for export");
                ServiceError::DatabaseError(e.into())
            })?;

        let mut items_by_contract: HashMap<Uuid, Vec<&contract_item::Model>> = HashMap::new();
        for item in &items {
            items_by_contract.entry(item.contract_id).or_default().push(item);
        }
        let mut periods_by_contract: HashMap<Uuid, Vec<period::Model>> = HashMap::new();
        for p in &periods {
            periods_by_contract
                .entry(p.contract_id)
                .or_default()
                .push(p.clone());
        }

        let mut csv_rows = Vec::new();
        for contract_model in &contracts {
            let contract_periods = periods_by_contract
                .get(&contract_model.id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let status_label = budget::select_display_period(contract_periods)
                .and_then(|p| p.status_enum())
                .map(|s| s.spanish_label())
                .unwrap_or("");

            match items_by_contract.get(&contract_model.id) {
                Some(contract_items) if !contract_items.is_empty() => {
                    for item in contract_items {
                        csv_rows.push(contract_item_row(
                            contract_model,
                            Some(item),
                            contract_periods.len(),
                            status_label,
                        ));
                    }
                }
                _ => {
                    csv_rows.push(contract_item_row(
                        contract_model,
                        None,
                        contract_periods.len(),
                        status_label,
                    ));
                }
            }
        }

        info!(rows = csv_rows.len(), "Contract export built successfully");

        Ok(CsvExport {
            filename: dated_filename("contratos_export_", chrono::Utc::now().date_naive()),
            content: build_csv(&CONTRACT_HEADERS, csv_rows),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fields_with_commas_and_quotes_are_escaped() {
        assert_eq!(
            escape_field("Acme, Inc. \"Best\"", ','),
            "\"Acme, Inc. \"\"Best\"\"\""
        );
    }

    #[test]
    fn plain_fields_pass_through_unquoted() {
        assert_eq!(escape_field("Acetaminofen 500mg", ','), "Acetaminofen 500mg");
    }

    #[test]
    fn fields_with_newlines_are_quoted() {
        assert_eq!(escape_field("linea 1\nlinea 2", ','), "\"linea 1\nlinea 2\"");
    }

    #[test]
    fn csv_has_no_trailing_newline() {
        let csv = build_csv(
            &["A", "B"],
            vec![
                vec!["1".to_string(), "2".to_string()],
                vec!["3".to_string(), "4".to_string()],
            ],
        );
        assert_eq!(csv, "A,B\n1,2\n3,4");
    }

    #[test]
    fn filenames_carry_the_export_date() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(
            dated_filename("historial_pedidos_", today),
            "historial_pedidos_2025-06-01.csv"
        );
        assert_eq!(
            dated_filename("inyecciones_presupuesto_", today),
            "inyecciones_presupuesto_2025-06-01.csv"
        );
        assert_eq!(
            dated_filename("contratos_export_", today),
            "contratos_export_2025-06-01.csv"
        );
    }

    #[test]
    fn body_dates_are_day_first() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(display_date(date), "01/06/2025");
    }

    #[test]
    fn order_rows_follow_the_column_order() {
        let item = OrderListItem {
            id: Uuid::new_v4(),
            order_date: NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(),
            amount: dec!(450.75),
            quantity: None,
            sap_reference: Some("SAP-123".to_string()),
            sicop_reference: None,
            pur: Some("PUR-9".to_string()),
            reservation_number: None,
            product_code: Some("MED-001".to_string()),
            product_name: Some("Acetaminofen 500mg".to_string()),
            description: None,
            period_id: Uuid::new_v4(),
            period_name: "Periodo 1".to_string(),
            contract_id: Uuid::new_v4(),
            contract_code: "CONT-2024-001".to_string(),
            contract_name: "Analgesicos".to_string(),
            supplier: "Distribuidora, S.A.".to_string(),
            tender_reference: Some("2024LN-000001".to_string()),
            legal_reference: Some("C-555".to_string()),
            currency: "CRC".to_string(),
        };

        let row = order_row(&item);
        assert_eq!(row.len(), ORDER_HEADERS.len());
        assert_eq!(row[0], "15/03/2025");
        assert_eq!(row[1], "2024LN-000001");
        assert_eq!(row[2], "C-555");
        assert_eq!(row[6], "Acetaminofen 500mg");
        assert_eq!(row[12], "450.75");
        assert_eq!(row[13], "CRC");

        // The supplier cell gets quoted once the row is serialized
        let csv = build_csv(&ORDER_HEADERS, vec![row]);
        assert!(csv.contains("\"Distribuidora, S.A.\""));
    }

    #[test]
    fn contract_rows_fall_back_to_contract_fields() {
        let contract_model = contract::Model {
            id: Uuid::new_v4(),
            code: "CONT-2024-001".to_string(),
            name: "Analgesicos".to_string(),
            tender_reference: Some("2024LN-000001".to_string()),
            legal_reference: None,
            supplier: "Proveedor SA".to_string(),
            unit_price: Some(dec!(99.50)),
            start_date: None,
            currency: Some("colones".to_string()),
            created_at: chrono::Utc::now(),
            updated_at: None,
        };

        let row = contract_item_row(&contract_model, None, 2, "Activo");
        assert_eq!(row.len(), CONTRACT_HEADERS.len());
        assert_eq!(row[1], "CONT-2024-001");
        assert_eq!(row[2], "");
        assert_eq!(row[4], "2");
        assert_eq!(row[6], "");
        assert_eq!(row[8], "99.50");
        assert_eq!(row[9], "CRC");
        assert_eq!(row[10], "Activo");
    }
}
