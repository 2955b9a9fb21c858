//! Netting (set-off) records.
//!
//! A netting record offsets one counterparty's sales and purchase vouchers
//! against each other instead of moving cash. Both sides must sum to the
//! same `amount_minor` by construction. Confirming a draft emits exactly two
//! pre-allocated transactions (one deposit, one withdrawal) whose ids are
//! stored back on the record so cancellation can reverse exactly those.

use chrono::NaiveDate;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NettingStatus {
    Draft,
    Confirmed,
    Cancelled,
}

impl NettingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl TryFrom<&str> for NettingStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "draft" => Ok(Self::Draft),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(EngineError::InvalidName(format!(
                "invalid netting status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NettingRecord {
    pub id: Uuid,
    pub counterparty_id: Uuid,
    pub netting_date: NaiveDate,
    pub amount_minor: i64,
    pub status: NettingStatus,
    pub memo: Option<String>,
    pub deposit_transaction_id: Option<Uuid>,
    pub withdrawal_transaction_id: Option<Uuid>,
    pub created_by: String,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "nettings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub counterparty_id: String,
    pub netting_date: Date,
    pub amount_minor: i64,
    pub status: String,
    pub memo: Option<String>,
    pub deposit_transaction_id: Option<String>,
    pub withdrawal_transaction_id: Option<String>,
    pub created_by: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::counterparties::Entity",
        from = "Column::CounterpartyId",
        to = "super::counterparties::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Counterparties,
    #[sea_orm(has_many = "super::netting_links::Entity")]
    Links,
}

impl Related<super::counterparties::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Counterparties.def()
    }
}

impl Related<super::netting_links::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Links.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&NettingRecord> for ActiveModel {
    fn from(record: &NettingRecord) -> Self {
        Self {
            id: ActiveValue::Set(record.id.to_string()),
            counterparty_id: ActiveValue::Set(record.counterparty_id.to_string()),
            netting_date: ActiveValue::Set(record.netting_date),
            amount_minor: ActiveValue::Set(record.amount_minor),
            status: ActiveValue::Set(record.status.as_str().to_string()),
            memo: ActiveValue::Set(record.memo.clone()),
            deposit_transaction_id: ActiveValue::Set(
                record.deposit_transaction_id.map(|id| id.to_string()),
            ),
            withdrawal_transaction_id: ActiveValue::Set(
                record.withdrawal_transaction_id.map(|id| id.to_string()),
            ),
            created_by: ActiveValue::Set(record.created_by.clone()),
        }
    }
}

impl TryFrom<Model> for NettingRecord {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: crate::util::parse_uuid(&model.id, "netting")?,
            counterparty_id: crate::util::parse_uuid(&model.counterparty_id, "counterparty")?,
            netting_date: model.netting_date,
            amount_minor: model.amount_minor,
            status: NettingStatus::try_from(model.status.as_str())?,
            memo: model.memo,
            deposit_transaction_id: model
                .deposit_transaction_id
                .and_then(|s| Uuid::parse_str(&s).ok()),
            withdrawal_transaction_id: model
                .withdrawal_transaction_id
                .and_then(|s| Uuid::parse_str(&s).ok()),
            created_by: model.created_by,
        })
    }
}
