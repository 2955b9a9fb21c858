//! Voucher primitives.
//!
//! A `Voucher` is an accounts-receivable (sales) or accounts-payable
//! (purchase) document being settled. Its identity is the composite
//! `(counterparty_id, trade_date, voucher_number)`.
//!
//! Both status columns are derived state: they are recomputed from the sum
//! of applied money (legacy receipts/payments plus transaction allocations)
//! after every allocation-affecting operation, and are never set directly
//! except by the period-lock operations.

use chrono::NaiveDate;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoucherKind {
    Sales,
    Purchase,
}

impl VoucherKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::Purchase => "purchase",
        }
    }
}

impl TryFrom<&str> for VoucherKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "sales" => Ok(Self::Sales),
            "purchase" => Ok(Self::Purchase),
            other => Err(EngineError::InvalidName(format!(
                "invalid voucher kind: {other}"
            ))),
        }
    }
}

/// Sales-side settlement axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Open,
    Settling,
    Settled,
    Locked,
}

impl SettlementStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Settling => "settling",
            Self::Settled => "settled",
            Self::Locked => "locked",
        }
    }
}

impl TryFrom<&str> for SettlementStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "open" => Ok(Self::Open),
            "settling" => Ok(Self::Settling),
            "settled" => Ok(Self::Settled),
            "locked" => Ok(Self::Locked),
            other => Err(EngineError::InvalidName(format!(
                "invalid settlement status: {other}"
            ))),
        }
    }
}

/// Purchase-side payment axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
    Locked,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Partial => "partial",
            Self::Paid => "paid",
            Self::Locked => "locked",
        }
    }
}

impl TryFrom<&str> for PaymentStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "unpaid" => Ok(Self::Unpaid),
            "partial" => Ok(Self::Partial),
            "paid" => Ok(Self::Paid),
            "locked" => Ok(Self::Locked),
            other => Err(EngineError::InvalidName(format!(
                "invalid payment status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    pub id: Uuid,
    pub counterparty_id: Uuid,
    pub kind: VoucherKind,
    pub trade_date: NaiveDate,
    pub voucher_number: String,
    pub total_minor: i64,
    pub settlement_status: SettlementStatus,
    pub payment_status: PaymentStatus,
    pub is_adjustment: bool,
    pub original_voucher_id: Option<Uuid>,
    pub created_by: String,
}

impl Voucher {
    pub fn new(
        counterparty_id: Uuid,
        kind: VoucherKind,
        trade_date: NaiveDate,
        voucher_number: String,
        total_minor: i64,
        created_by: String,
    ) -> Result<Self, EngineError> {
        if total_minor <= 0 {
            return Err(EngineError::InvalidAmount(
                "total_minor must be > 0".to_string(),
            ));
        }
        if voucher_number.trim().is_empty() {
            return Err(EngineError::InvalidName(
                "voucher_number must not be empty".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            counterparty_id,
            kind,
            trade_date,
            voucher_number,
            total_minor,
            settlement_status: SettlementStatus::Open,
            payment_status: PaymentStatus::Unpaid,
            is_adjustment: false,
            original_voucher_id: None,
            created_by,
        })
    }

    /// True when the status axis relevant for this voucher's kind is locked.
    pub fn is_locked(&self) -> bool {
        match self.kind {
            VoucherKind::Sales => self.settlement_status == SettlementStatus::Locked,
            VoucherKind::Purchase => self.payment_status == PaymentStatus::Locked,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "vouchers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub counterparty_id: String,
    pub kind: String,
    pub trade_date: Date,
    pub voucher_number: String,
    pub total_minor: i64,
    pub settlement_status: String,
    pub payment_status: String,
    pub is_adjustment: bool,
    pub original_voucher_id: Option<String>,
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

impl From<&Voucher> for ActiveModel {
    fn from(voucher: &Voucher) -> Self {
        Self {
            id: ActiveValue::Set(voucher.id.to_string()),
            counterparty_id: ActiveValue::Set(voucher.counterparty_id.to_string()),
            kind: ActiveValue::Set(voucher.kind.as_str().to_string()),
            trade_date: ActiveValue::Set(voucher.trade_date),
            voucher_number: ActiveValue::Set(voucher.voucher_number.clone()),
            total_minor: ActiveValue::Set(voucher.total_minor),
            settlement_status: ActiveValue::Set(voucher.settlement_status.as_str().to_string()),
            payment_status: ActiveValue::Set(voucher.payment_status.as_str().to_string()),
            is_adjustment: ActiveValue::Set(voucher.is_adjustment),
            original_voucher_id: ActiveValue::Set(
                voucher.original_voucher_id.map(|id| id.to_string()),
            ),
            created_by: ActiveValue::Set(voucher.created_by.clone()),
        }
    }
}

impl TryFrom<Model> for Voucher {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: crate::util::parse_uuid(&model.id, "voucher")?,
            counterparty_id: crate::util::parse_uuid(&model.counterparty_id, "counterparty")?,
            kind: VoucherKind::try_from(model.kind.as_str())?,
            trade_date: model.trade_date,
            voucher_number: model.voucher_number,
            total_minor: model.total_minor,
            settlement_status: SettlementStatus::try_from(model.settlement_status.as_str())?,
            payment_status: PaymentStatus::try_from(model.payment_status.as_str())?,
            is_adjustment: model.is_adjustment,
            original_voucher_id: model
                .original_voucher_id
                .and_then(|s| Uuid::parse_str(&s).ok()),
            created_by: model.created_by,
        })
    }
}
