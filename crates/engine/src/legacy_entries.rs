//! Legacy receipt/payment rows.
//!
//! The older single-entry model applied money directly to a voucher with no
//! intermediate transaction. These rows still contribute to a voucher's
//! applied-amount sum and are unioned with transaction allocations behind
//! the status deriver's applied-amount query, so a future migration can drop
//! this table without touching callers.

use chrono::NaiveDate;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyEntryKind {
    Receipt,
    Payment,
}

impl LegacyEntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Receipt => "receipt",
            Self::Payment => "payment",
        }
    }
}

impl TryFrom<&str> for LegacyEntryKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "receipt" => Ok(Self::Receipt),
            "payment" => Ok(Self::Payment),
            other => Err(EngineError::InvalidName(format!(
                "invalid legacy entry kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyEntry {
    pub id: Uuid,
    pub voucher_id: Uuid,
    pub kind: LegacyEntryKind,
    pub entry_date: NaiveDate,
    pub amount_minor: i64,
    pub memo: Option<String>,
    pub created_by: String,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "legacy_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub voucher_id: String,
    pub kind: String,
    pub entry_date: Date,
    pub amount_minor: i64,
    pub memo: Option<String>,
    pub created_by: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::vouchers::Entity",
        from = "Column::VoucherId",
        to = "super::vouchers::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Vouchers,
}

impl Related<super::vouchers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vouchers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&LegacyEntry> for ActiveModel {
    fn from(entry: &LegacyEntry) -> Self {
        Self {
            id: ActiveValue::Set(entry.id.to_string()),
            voucher_id: ActiveValue::Set(entry.voucher_id.to_string()),
            kind: ActiveValue::Set(entry.kind.as_str().to_string()),
            entry_date: ActiveValue::Set(entry.entry_date),
            amount_minor: ActiveValue::Set(entry.amount_minor),
            memo: ActiveValue::Set(entry.memo.clone()),
            created_by: ActiveValue::Set(entry.created_by.clone()),
        }
    }
}

impl TryFrom<Model> for LegacyEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: crate::util::parse_uuid(&model.id, "legacy entry")?,
            voucher_id: crate::util::parse_uuid(&model.voucher_id, "voucher")?,
            kind: LegacyEntryKind::try_from(model.kind.as_str())?,
            entry_date: model.entry_date,
            amount_minor: model.amount_minor,
            memo: model.memo,
            created_by: model.created_by,
        })
    }
}
