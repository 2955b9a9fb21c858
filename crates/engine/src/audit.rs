//! Audit log rows.
//!
//! Every state-changing operation emits one record with the acting user,
//! an action tag, the target entity, and optional before/after JSON
//! snapshots. The table stands in for the external audit sink at its
//! interface boundary.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    CounterpartyCreate,
    CounterpartyDeactivate,
    AliasAdd,
    AliasRemove,
    TransactionCreate,
    TransactionCancel,
    AllocationCreate,
    AllocationDelete,
    NettingCreate,
    NettingConfirm,
    NettingCancel,
    BankImportUpload,
    BankImportIngest,
    BankImportAutoMatch,
    BankImportFail,
    BankImportConfirm,
    BankImportDelete,
    LineMatch,
    LineExclude,
    VoucherCreate,
    VoucherDelete,
    VoucherLock,
    VoucherUnlock,
    PeriodLock,
    PeriodUnlock,
    LegacyEntryCreate,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CounterpartyCreate => "counterparty.create",
            Self::CounterpartyDeactivate => "counterparty.deactivate",
            Self::AliasAdd => "alias.add",
            Self::AliasRemove => "alias.remove",
            Self::TransactionCreate => "transaction.create",
            Self::TransactionCancel => "transaction.cancel",
            Self::AllocationCreate => "allocation.create",
            Self::AllocationDelete => "allocation.delete",
            Self::NettingCreate => "netting.create",
            Self::NettingConfirm => "netting.confirm",
            Self::NettingCancel => "netting.cancel",
            Self::BankImportUpload => "bank_import.upload",
            Self::BankImportIngest => "bank_import.ingest",
            Self::BankImportAutoMatch => "bank_import.auto_match",
            Self::BankImportFail => "bank_import.fail",
            Self::BankImportConfirm => "bank_import.confirm",
            Self::BankImportDelete => "bank_import.delete",
            Self::LineMatch => "bank_import.line_match",
            Self::LineExclude => "bank_import.line_exclude",
            Self::VoucherCreate => "voucher.create",
            Self::VoucherDelete => "voucher.delete",
            Self::VoucherLock => "voucher.lock",
            Self::VoucherUnlock => "voucher.unlock",
            Self::PeriodLock => "period.lock",
            Self::PeriodUnlock => "period.unlock",
            Self::LegacyEntryCreate => "legacy_entry.create",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub actor: String,
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    pub before: Option<String>,
    pub after: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub actor: String,
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    pub before: Option<String>,
    pub after: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&AuditRecord> for ActiveModel {
    fn from(record: &AuditRecord) -> Self {
        Self {
            id: ActiveValue::Set(record.id.to_string()),
            actor: ActiveValue::Set(record.actor.clone()),
            action: ActiveValue::Set(record.action.clone()),
            target_type: ActiveValue::Set(record.target_type.clone()),
            target_id: ActiveValue::Set(record.target_id.clone()),
            before: ActiveValue::Set(record.before.clone()),
            after: ActiveValue::Set(record.after.clone()),
            created_at: ActiveValue::Set(record.created_at),
        }
    }
}

impl TryFrom<Model> for AuditRecord {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: crate::util::parse_uuid(&model.id, "audit record")?,
            actor: model.actor,
            action: model.action,
            target_type: model.target_type,
            target_id: model.target_id,
            before: model.before,
            after: model.after,
            created_at: model.created_at,
        })
    }
}
