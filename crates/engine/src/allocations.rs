//! Transaction allocations.
//!
//! An allocation applies part (or all) of a transaction's amount to one
//! voucher. It is the only path by which money reaches a voucher in the new
//! model; legacy receipt/payment rows are the other, older source and both
//! feed the same applied-amount sum.
//!
//! Invariants enforced by the allocation operations:
//! - `amount_minor > 0`
//! - unique per `(transaction_id, voucher_id)` pair
//! - the sum of a transaction's allocations equals its `allocated_minor`
//!   and never exceeds its `amount_minor`

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionAllocation {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub voucher_id: Uuid,
    pub amount_minor: i64,
    /// FIFO sequencing within the owning transaction, kept for audit.
    pub allocation_order: i32,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "allocations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub transaction_id: String,
    pub voucher_id: String,
    pub amount_minor: i64,
    pub allocation_order: i32,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::TransactionId",
        to = "super::transactions::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Transactions,
    #[sea_orm(
        belongs_to = "super::vouchers::Entity",
        from = "Column::VoucherId",
        to = "super::vouchers::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Vouchers,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::vouchers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vouchers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&TransactionAllocation> for ActiveModel {
    fn from(alloc: &TransactionAllocation) -> Self {
        Self {
            id: ActiveValue::Set(alloc.id.to_string()),
            transaction_id: ActiveValue::Set(alloc.transaction_id.to_string()),
            voucher_id: ActiveValue::Set(alloc.voucher_id.to_string()),
            amount_minor: ActiveValue::Set(alloc.amount_minor),
            allocation_order: ActiveValue::Set(alloc.allocation_order),
            created_by: ActiveValue::Set(alloc.created_by.clone()),
            created_at: ActiveValue::Set(alloc.created_at),
        }
    }
}

impl TryFrom<Model> for TransactionAllocation {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: crate::util::parse_uuid(&model.id, "allocation")?,
            transaction_id: crate::util::parse_uuid(&model.transaction_id, "transaction")?,
            voucher_id: crate::util::parse_uuid(&model.voucher_id, "voucher")?,
            amount_minor: model.amount_minor,
            allocation_order: model.allocation_order,
            created_by: model.created_by,
            created_at: model.created_at,
        })
    }
}
