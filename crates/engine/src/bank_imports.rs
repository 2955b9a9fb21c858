//! Bank statement import jobs.
//!
//! One job per uploaded statement file. The file hash is the whole-file
//! idempotency token: re-uploading the same bytes is rejected. Parsing
//! happens in an external worker; the engine receives already-extracted rows
//! via `ingest_rows` and owns everything after that (dedup, matching,
//! confirmation).

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankImportStatus {
    Uploaded,
    Parsed,
    Reviewing,
    Confirmed,
    Failed,
}

impl BankImportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Parsed => "parsed",
            Self::Reviewing => "reviewing",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}

impl TryFrom<&str> for BankImportStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "uploaded" => Ok(Self::Uploaded),
            "parsed" => Ok(Self::Parsed),
            "reviewing" => Ok(Self::Reviewing),
            "confirmed" => Ok(Self::Confirmed),
            "failed" => Ok(Self::Failed),
            other => Err(EngineError::InvalidName(format!(
                "invalid bank import status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankImportJob {
    pub id: Uuid,
    pub file_name: String,
    pub file_hash: String,
    pub status: BankImportStatus,
    pub total_lines: i32,
    pub matched_lines: i32,
    pub confirmed_lines: i32,
    pub error: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bank_import_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub file_name: String,
    pub file_hash: String,
    pub status: String,
    pub total_lines: i32,
    pub matched_lines: i32,
    pub confirmed_lines: i32,
    pub error: Option<String>,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::bank_import_lines::Entity")]
    Lines,
}

impl Related<super::bank_import_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&BankImportJob> for ActiveModel {
    fn from(job: &BankImportJob) -> Self {
        Self {
            id: ActiveValue::Set(job.id.to_string()),
            file_name: ActiveValue::Set(job.file_name.clone()),
            file_hash: ActiveValue::Set(job.file_hash.clone()),
            status: ActiveValue::Set(job.status.as_str().to_string()),
            total_lines: ActiveValue::Set(job.total_lines),
            matched_lines: ActiveValue::Set(job.matched_lines),
            confirmed_lines: ActiveValue::Set(job.confirmed_lines),
            error: ActiveValue::Set(job.error.clone()),
            created_by: ActiveValue::Set(job.created_by.clone()),
            created_at: ActiveValue::Set(job.created_at),
        }
    }
}

impl TryFrom<Model> for BankImportJob {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: crate::util::parse_uuid(&model.id, "bank import job")?,
            file_name: model.file_name,
            file_hash: model.file_hash,
            status: BankImportStatus::try_from(model.status.as_str())?,
            total_lines: model.total_lines,
            matched_lines: model.matched_lines,
            confirmed_lines: model.confirmed_lines,
            error: model.error,
            created_by: model.created_by,
            created_at: model.created_at,
        })
    }
}
