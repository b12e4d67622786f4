use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter as StrumEnumIter, EnumString};
use uuid::Uuid;
use validator::Validate;

/// Enum representing the lifecycle states of a contract period.
///
/// Stored as lowercase text. At most one period per contract may be Active;
/// the service layer enforces this when activating.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    StrumEnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PeriodStatus {
    Pending,
    Active,
    Closed,
}

impl PeriodStatus {
    /// Lenient parser accepting both canonical labels and the Spanish labels
    /// carried by legacy rows ("Activo", "Pendiente", "Cerrado").
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "pendiente" => Some(Self::Pending),
            "active" | "activo" => Some(Self::Active),
            "closed" | "cerrado" => Some(Self::Closed),
            _ => None,
        }
    }

    /// Spanish display label, the form spreadsheet exports carry.
    pub fn spanish_label(&self) -> &'static str {
        match self {
            Self::Pending => "Pendiente",
            Self::Active => "Activo",
            Self::Closed => "Cerrado",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "periods")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub contract_id: Uuid,

    #[validate(length(
        min = 1,
        max = 100,
        message = "Period name must be between 1 and 100 characters"
    ))]
    pub name: String,

    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub allocated_budget: Decimal,
    pub initial_budget: Option<Decimal>,
    pub status: String,
    pub currency: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Parsed status; `None` if the stored label is unrecognized.
    pub fn status_enum(&self) -> Option<PeriodStatus> {
        PeriodStatus::parse(&self.status)
    }

    pub fn is_active(&self) -> bool {
        self.status_enum() == Some(PeriodStatus::Active)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::contract::Entity",
        from = "Column::ContractId",
        to = "super::contract::Column::Id"
    )]
    Contract,
    #[sea_orm(has_many = "super::order::Entity")]
    Order,
    #[sea_orm(has_many = "super::injection::Entity")]
    Injection,
}

impl Related<super::contract::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contract.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::injection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Injection.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr> {
        let mut active_model = self;

        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        } else if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(Some(now));
        }

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_accepts_canonical_and_legacy_labels() {
        assert_eq!(PeriodStatus::parse("active"), Some(PeriodStatus::Active));
        assert_eq!(PeriodStatus::parse("Activo"), Some(PeriodStatus::Active));
        assert_eq!(PeriodStatus::parse(" ACTIVO "), Some(PeriodStatus::Active));
        assert_eq!(
            PeriodStatus::parse("pendiente"),
            Some(PeriodStatus::Pending)
        );
        assert_eq!(PeriodStatus::parse("Cerrado"), Some(PeriodStatus::Closed));
        assert_eq!(PeriodStatus::parse("archived"), None);
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            PeriodStatus::Pending,
            PeriodStatus::Active,
            PeriodStatus::Closed,
        ] {
            assert_eq!(PeriodStatus::parse(status.as_ref()), Some(status));
        }
    }
}
