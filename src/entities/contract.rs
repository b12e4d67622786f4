use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "contracts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(
        min = 1,
        max = 50,
        message = "Contract code must be between 1 and 50 characters"
    ))]
    pub code: String,

    #[validate(length(
        min = 1,
        max = 200,
        message = "Contract name must be between 1 and 200 characters"
    ))]
    pub name: String,

    pub tender_reference: Option<String>,
    pub legal_reference: Option<String>,

    #[validate(length(
        min = 1,
        max = 200,
        message = "Supplier name must be between 1 and 200 characters"
    ))]
    pub supplier: String,

    pub unit_price: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub currency: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::contract_item::Entity")]
    ContractItem,
    #[sea_orm(has_many = "super::period::Entity")]
    Period,
}

impl Related<super::contract_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ContractItem.def()
    }
}

impl Related<super::period::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Period.def()
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
