//! Month-granularity close state.
//!
//! One row per `year_month` (`YYYY-MM`), independent per month. A locked
//! month blocks allocation and voucher mutation for trade dates inside it.
//! `Adjusting` is stored and round-trips, but no operation performs the
//! `Locked -> Adjusting` transition yet.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodState {
    Open,
    Locked,
    Adjusting,
}

impl PeriodState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Locked => "locked",
            Self::Adjusting => "adjusting",
        }
    }
}

impl TryFrom<&str> for PeriodState {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "open" => Ok(Self::Open),
            "locked" => Ok(Self::Locked),
            "adjusting" => Ok(Self::Adjusting),
            other => Err(EngineError::InvalidName(format!(
                "invalid period state: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodLock {
    pub id: Uuid,
    pub year_month: String,
    pub state: PeriodState,
    pub locked_voucher_count: i32,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub unlocked_by: Option<String>,
    pub unlocked_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "period_locks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub year_month: String,
    pub state: String,
    pub locked_voucher_count: i32,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTimeUtc>,
    pub unlocked_by: Option<String>,
    pub unlocked_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&PeriodLock> for ActiveModel {
    fn from(lock: &PeriodLock) -> Self {
        Self {
            id: ActiveValue::Set(lock.id.to_string()),
            year_month: ActiveValue::Set(lock.year_month.clone()),
            state: ActiveValue::Set(lock.state.as_str().to_string()),
            locked_voucher_count: ActiveValue::Set(lock.locked_voucher_count),
            locked_by: ActiveValue::Set(lock.locked_by.clone()),
            locked_at: ActiveValue::Set(lock.locked_at),
            unlocked_by: ActiveValue::Set(lock.unlocked_by.clone()),
            unlocked_at: ActiveValue::Set(lock.unlocked_at),
        }
    }
}

impl TryFrom<Model> for PeriodLock {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: crate::util::parse_uuid(&model.id, "period lock")?,
            year_month: model.year_month,
            state: PeriodState::try_from(model.state.as_str())?,
            locked_voucher_count: model.locked_voucher_count,
            locked_by: model.locked_by,
            locked_at: model.locked_at,
            unlocked_by: model.unlocked_by,
            unlocked_at: model.unlocked_at,
        })
    }
}
