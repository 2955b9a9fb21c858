//! Counterparties: the trading partners money moves against.
//!
//! A counterparty owns transactions and vouchers; its name (and the aliases
//! in [`aliases`](super::aliases)) is what bank statement lines are matched
//! against.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterpartyKind {
    Buyer,
    Seller,
    Both,
}

impl CounterpartyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Seller => "seller",
            Self::Both => "both",
        }
    }
}

impl TryFrom<&str> for CounterpartyKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "buyer" => Ok(Self::Buyer),
            "seller" => Ok(Self::Seller),
            "both" => Ok(Self::Both),
            other => Err(EngineError::InvalidName(format!(
                "invalid counterparty kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterparty {
    pub id: Uuid,
    pub name: String,
    pub code: Option<String>,
    pub kind: CounterpartyKind,
    pub branch: Option<String>,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "counterparties")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub name_norm: String,
    pub code: Option<String>,
    pub kind: String,
    pub branch: Option<String>,
    pub active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::aliases::Entity")]
    Aliases,
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
    #[sea_orm(has_many = "super::vouchers::Entity")]
    Vouchers,
}

impl Related<super::aliases::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Aliases.def()
    }
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

impl From<&Counterparty> for ActiveModel {
    fn from(cp: &Counterparty) -> Self {
        Self {
            id: ActiveValue::Set(cp.id.to_string()),
            name: ActiveValue::Set(cp.name.clone()),
            name_norm: ActiveValue::Set(crate::util::normalize_match_key(&cp.name)),
            code: ActiveValue::Set(cp.code.clone()),
            kind: ActiveValue::Set(cp.kind.as_str().to_string()),
            branch: ActiveValue::Set(cp.branch.clone()),
            active: ActiveValue::Set(cp.active),
        }
    }
}

impl TryFrom<Model> for Counterparty {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: crate::util::parse_uuid(&model.id, "counterparty")?,
            name: model.name,
            code: model.code,
            kind: CounterpartyKind::try_from(model.kind.as_str())?,
            branch: model.branch,
            active: model.active,
        })
    }
}
