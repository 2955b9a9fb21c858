//! Counterparty name aliases.
//!
//! Bank statements rarely carry a counterparty's canonical name; aliases map
//! the strings that actually appear ("ACME CO LTD", half-width kana spellings)
//! back to one counterparty. An alias is globally unique on its normalized
//! form, across all counterparties.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterpartyAlias {
    pub id: Uuid,
    pub counterparty_id: Uuid,
    pub alias: String,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "counterparty_aliases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub counterparty_id: String,
    pub alias: String,
    pub alias_norm: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::counterparties::Entity",
        from = "Column::CounterpartyId",
        to = "super::counterparties::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Counterparties,
}

impl Related<super::counterparties::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Counterparties.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&CounterpartyAlias> for ActiveModel {
    fn from(alias: &CounterpartyAlias) -> Self {
        Self {
            id: ActiveValue::Set(alias.id.to_string()),
            counterparty_id: ActiveValue::Set(alias.counterparty_id.to_string()),
            alias: ActiveValue::Set(alias.alias.clone()),
            alias_norm: ActiveValue::Set(crate::util::normalize_match_key(&alias.alias)),
        }
    }
}

impl TryFrom<Model> for CounterpartyAlias {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: crate::util::parse_uuid(&model.id, "alias")?,
            counterparty_id: crate::util::parse_uuid(&model.counterparty_id, "counterparty")?,
            alias: model.alias,
        })
    }
}
