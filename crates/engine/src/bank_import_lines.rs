//! Parsed bank statement lines.
//!
//! A line's raw data is immutable once ingested; only its matching state
//! moves. The `duplicate_key` is a sha256 content hash over
//! `date|amount|description|reference` and flags re-imports against any
//! other non-excluded line system-wide. It is advisory (non-unique): a
//! duplicate line is kept visible for review instead of being dropped.

use chrono::NaiveDate;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::EngineError;

/// One statement row as handed over by the external parsing worker.
///
/// Rows with a missing date or a zero amount are dropped during ingestion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRow {
    pub date: Option<NaiveDate>,
    pub description: String,
    /// Signed: positive for deposits, negative for withdrawals.
    pub amount_minor: i64,
    pub balance_minor: Option<i64>,
    pub counterparty_name: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    Unmatched,
    Matched,
    Duplicate,
    Excluded,
    Confirmed,
}

impl LineStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unmatched => "unmatched",
            Self::Matched => "matched",
            Self::Duplicate => "duplicate",
            Self::Excluded => "excluded",
            Self::Confirmed => "confirmed",
        }
    }
}

impl TryFrom<&str> for LineStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "unmatched" => Ok(Self::Unmatched),
            "matched" => Ok(Self::Matched),
            "duplicate" => Ok(Self::Duplicate),
            "excluded" => Ok(Self::Excluded),
            "confirmed" => Ok(Self::Confirmed),
            other => Err(EngineError::InvalidName(format!(
                "invalid line status: {other}"
            ))),
        }
    }
}

/// Content hash used to flag re-imported lines (64 hex chars).
pub fn duplicate_key(
    date: NaiveDate,
    amount_minor: i64,
    description: &str,
    reference: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(date.format("%Y-%m-%d").to_string());
    hasher.update("|");
    hasher.update(amount_minor.to_string());
    hasher.update("|");
    hasher.update(description);
    hasher.update("|");
    hasher.update(reference.unwrap_or_default());
    format!("{:x}", hasher.finalize())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankImportLine {
    pub id: Uuid,
    pub job_id: Uuid,
    pub line_no: i32,
    pub occurred_on: NaiveDate,
    pub description: String,
    pub amount_minor: i64,
    pub balance_minor: Option<i64>,
    pub counterparty_name: Option<String>,
    pub bank_reference: Option<String>,
    pub duplicate_key: String,
    pub status: LineStatus,
    pub counterparty_id: Option<Uuid>,
    /// 0–100; 100 for alias/exact matches and manual overrides.
    pub match_confidence: i32,
    pub transaction_id: Option<Uuid>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bank_import_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub job_id: String,
    pub line_no: i32,
    pub occurred_on: Date,
    pub description: String,
    pub amount_minor: i64,
    pub balance_minor: Option<i64>,
    pub counterparty_name: Option<String>,
    pub bank_reference: Option<String>,
    pub duplicate_key: String,
    pub status: String,
    pub counterparty_id: Option<String>,
    pub match_confidence: i32,
    pub transaction_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bank_imports::Entity",
        from = "Column::JobId",
        to = "super::bank_imports::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Jobs,
}

impl Related<super::bank_imports::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Jobs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&BankImportLine> for ActiveModel {
    fn from(line: &BankImportLine) -> Self {
        Self {
            id: ActiveValue::Set(line.id.to_string()),
            job_id: ActiveValue::Set(line.job_id.to_string()),
            line_no: ActiveValue::Set(line.line_no),
            occurred_on: ActiveValue::Set(line.occurred_on),
            description: ActiveValue::Set(line.description.clone()),
            amount_minor: ActiveValue::Set(line.amount_minor),
            balance_minor: ActiveValue::Set(line.balance_minor),
            counterparty_name: ActiveValue::Set(line.counterparty_name.clone()),
            bank_reference: ActiveValue::Set(line.bank_reference.clone()),
            duplicate_key: ActiveValue::Set(line.duplicate_key.clone()),
            status: ActiveValue::Set(line.status.as_str().to_string()),
            counterparty_id: ActiveValue::Set(line.counterparty_id.map(|id| id.to_string())),
            match_confidence: ActiveValue::Set(line.match_confidence),
            transaction_id: ActiveValue::Set(line.transaction_id.map(|id| id.to_string())),
        }
    }
}

impl TryFrom<Model> for BankImportLine {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: crate::util::parse_uuid(&model.id, "bank import line")?,
            job_id: crate::util::parse_uuid(&model.job_id, "bank import job")?,
            line_no: model.line_no,
            occurred_on: model.occurred_on,
            description: model.description,
            amount_minor: model.amount_minor,
            balance_minor: model.balance_minor,
            counterparty_name: model.counterparty_name,
            bank_reference: model.bank_reference,
            duplicate_key: model.duplicate_key,
            status: LineStatus::try_from(model.status.as_str())?,
            counterparty_id: model.counterparty_id.and_then(|s| Uuid::parse_str(&s).ok()),
            match_confidence: model.match_confidence,
            transaction_id: model.transaction_id.and_then(|s| Uuid::parse_str(&s).ok()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_key_is_stable_and_64_hex() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let a = duplicate_key(date, -500, "supplier X", Some("REF1"));
        let b = duplicate_key(date, -500, "supplier X", Some("REF1"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn duplicate_key_distinguishes_fields() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let base = duplicate_key(date, -500, "supplier X", Some("REF1"));
        assert_ne!(base, duplicate_key(date, -501, "supplier X", Some("REF1")));
        assert_ne!(base, duplicate_key(date, -500, "supplier Y", Some("REF1")));
        assert_ne!(base, duplicate_key(date, -500, "supplier X", None));
    }
}
