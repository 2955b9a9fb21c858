//! Per-voucher links of a netting record.
//!
//! Each link names one participating voucher and the amount netted against
//! it (> 0, unique per netting+voucher). The voucher's kind decides which
//! side of the set-off it sits on.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NettingVoucherLink {
    pub id: Uuid,
    pub netting_id: Uuid,
    pub voucher_id: Uuid,
    pub amount_minor: i64,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "netting_links")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub netting_id: String,
    pub voucher_id: String,
    pub amount_minor: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::nettings::Entity",
        from = "Column::NettingId",
        to = "super::nettings::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Nettings,
    #[sea_orm(
        belongs_to = "super::vouchers::Entity",
        from = "Column::VoucherId",
        to = "super::vouchers::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Vouchers,
}

impl Related<super::nettings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Nettings.def()
    }
}

impl Related<super::vouchers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vouchers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&NettingVoucherLink> for ActiveModel {
    fn from(link: &NettingVoucherLink) -> Self {
        Self {
            id: ActiveValue::Set(link.id.to_string()),
            netting_id: ActiveValue::Set(link.netting_id.to_string()),
            voucher_id: ActiveValue::Set(link.voucher_id.to_string()),
            amount_minor: ActiveValue::Set(link.amount_minor),
        }
    }
}

impl TryFrom<Model> for NettingVoucherLink {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: crate::util::parse_uuid(&model.id, "netting link")?,
            netting_id: crate::util::parse_uuid(&model.netting_id, "netting")?,
            voucher_id: crate::util::parse_uuid(&model.voucher_id, "voucher")?,
            amount_minor: model.amount_minor,
        })
    }
}
