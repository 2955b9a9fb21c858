//! Counterparty transaction primitives.
//!
//! A `CounterpartyTransaction` is a discrete deposit/withdrawal event against
//! a counterparty, independent of any voucher. Money is applied to vouchers
//! only through [`allocations`](super::allocations); `allocated_minor` is
//! mutated exclusively by the allocation operations and its status is derived
//! from the allocation ratio.

use chrono::NaiveDate;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            other => Err(EngineError::InvalidName(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSource {
    Manual,
    BankImport,
    Netting,
}

impl TransactionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::BankImport => "bank_import",
            Self::Netting => "netting",
        }
    }
}

impl TryFrom<&str> for TransactionSource {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "manual" => Ok(Self::Manual),
            "bank_import" => Ok(Self::BankImport),
            "netting" => Ok(Self::Netting),
            other => Err(EngineError::InvalidName(format!(
                "invalid transaction source: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Partial,
    Allocated,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Partial => "partial",
            Self::Allocated => "allocated",
            Self::Cancelled => "cancelled",
        }
    }

    /// Status derived from the allocation ratio of a live transaction.
    pub fn from_allocation(allocated_minor: i64, amount_minor: i64) -> Self {
        if allocated_minor == 0 {
            Self::Pending
        } else if allocated_minor < amount_minor {
            Self::Partial
        } else {
            Self::Allocated
        }
    }
}

impl TryFrom<&str> for TransactionStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "partial" => Ok(Self::Partial),
            "allocated" => Ok(Self::Allocated),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(EngineError::InvalidName(format!(
                "invalid transaction status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterpartyTransaction {
    pub id: Uuid,
    pub counterparty_id: Uuid,
    pub kind: TransactionKind,
    pub source: TransactionSource,
    pub status: TransactionStatus,
    pub occurred_on: NaiveDate,
    pub amount_minor: i64,
    pub allocated_minor: i64,
    pub bank_reference: Option<String>,
    pub memo: Option<String>,
    pub created_by: String,
}

impl CounterpartyTransaction {
    pub fn new(
        counterparty_id: Uuid,
        kind: TransactionKind,
        source: TransactionSource,
        occurred_on: NaiveDate,
        amount_minor: i64,
        bank_reference: Option<String>,
        memo: Option<String>,
        created_by: String,
    ) -> ResultEngine<Self> {
        if amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(
                "amount_minor must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            counterparty_id,
            kind,
            source,
            status: TransactionStatus::Pending,
            occurred_on,
            amount_minor,
            allocated_minor: 0,
            bank_reference,
            memo,
            created_by,
        })
    }

    /// Amount not yet applied to any voucher.
    pub fn unallocated_minor(&self) -> i64 {
        self.amount_minor - self.allocated_minor
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub counterparty_id: String,
    pub kind: String,
    pub source: String,
    pub status: String,
    pub occurred_on: Date,
    pub amount_minor: i64,
    pub allocated_minor: i64,
    pub bank_reference: Option<String>,
    pub memo: Option<String>,
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
    #[sea_orm(has_many = "super::allocations::Entity")]
    Allocations,
}

impl Related<super::counterparties::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Counterparties.def()
    }
}

impl Related<super::allocations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&CounterpartyTransaction> for ActiveModel {
    fn from(tx: &CounterpartyTransaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            counterparty_id: ActiveValue::Set(tx.counterparty_id.to_string()),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            source: ActiveValue::Set(tx.source.as_str().to_string()),
            status: ActiveValue::Set(tx.status.as_str().to_string()),
            occurred_on: ActiveValue::Set(tx.occurred_on),
            amount_minor: ActiveValue::Set(tx.amount_minor),
            allocated_minor: ActiveValue::Set(tx.allocated_minor),
            bank_reference: ActiveValue::Set(tx.bank_reference.clone()),
            memo: ActiveValue::Set(tx.memo.clone()),
            created_by: ActiveValue::Set(tx.created_by.clone()),
        }
    }
}

impl TryFrom<Model> for CounterpartyTransaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: crate::util::parse_uuid(&model.id, "transaction")?,
            counterparty_id: crate::util::parse_uuid(&model.counterparty_id, "counterparty")?,
            kind: TransactionKind::try_from(model.kind.as_str())?,
            source: TransactionSource::try_from(model.source.as_str())?,
            status: TransactionStatus::try_from(model.status.as_str())?,
            occurred_on: model.occurred_on,
            amount_minor: model.amount_minor,
            allocated_minor: model.allocated_minor,
            bank_reference: model.bank_reference,
            memo: model.memo,
            created_by: model.created_by,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_from_allocation_ratio() {
        assert_eq!(
            TransactionStatus::from_allocation(0, 1000),
            TransactionStatus::Pending
        );
        assert_eq!(
            TransactionStatus::from_allocation(400, 1000),
            TransactionStatus::Partial
        );
        assert_eq!(
            TransactionStatus::from_allocation(1000, 1000),
            TransactionStatus::Allocated
        );
    }

    #[test]
    fn new_rejects_non_positive_amounts() {
        let err = CounterpartyTransaction::new(
            Uuid::new_v4(),
            TransactionKind::Deposit,
            TransactionSource::Manual,
            chrono::NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            0,
            None,
            None,
            "alice".to_string(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidAmount("amount_minor must be > 0".to_string())
        );
    }
}
