use std::collections::HashSet;

use chrono::NaiveDate;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    AuditAction, EngineError, NettingRecord, NettingStatus, NettingVoucherLink, ResultEngine,
    TransactionKind, TransactionSource, Voucher, VoucherKind, netting_links, nettings,
    util::normalize_optional_text,
};

use super::{Engine, audit::NONE, with_tx};

/// One voucher's share of a set-off side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NettingItem {
    pub voucher_id: Uuid,
    pub amount_minor: i64,
}

impl Engine {
    /// Package a draft set-off between one counterparty's sales and
    /// purchase vouchers.
    ///
    /// Both sides must sum to the same amount, and every item is validated
    /// against its voucher's current available balance. No transactions or
    /// allocations are created yet; balances are re-checked at confirm time
    /// because they may shift in between.
    pub async fn create_netting(
        &self,
        counterparty_id: Uuid,
        netting_date: NaiveDate,
        sales_items: &[NettingItem],
        purchase_items: &[NettingItem],
        memo: Option<&str>,
        user_id: &str,
    ) -> ResultEngine<NettingRecord> {
        if sales_items.is_empty() || purchase_items.is_empty() {
            return Err(EngineError::InvalidAmount(
                "a set-off needs at least one voucher on each side".to_string(),
            ));
        }
        let sales_total: i64 = sales_items.iter().map(|item| item.amount_minor).sum();
        let purchase_total: i64 = purchase_items.iter().map(|item| item.amount_minor).sum();
        if sales_total != purchase_total {
            return Err(EngineError::Unbalanced(format!(
                "sales side sums to {sales_total}, purchase side to {purchase_total}"
            )));
        }

        let mut seen = HashSet::new();
        for item in sales_items.iter().chain(purchase_items) {
            if item.amount_minor <= 0 {
                return Err(EngineError::InvalidAmount(
                    "netting item amount must be > 0".to_string(),
                ));
            }
            if !seen.insert(item.voucher_id) {
                return Err(EngineError::ExistingKey(format!(
                    "voucher {} listed twice in set-off",
                    item.voucher_id
                )));
            }
        }

        with_tx!(self, |db_tx| {
            self.require_counterparty(&db_tx, counterparty_id).await?;
            self.validate_netting_items(&db_tx, counterparty_id, sales_items, VoucherKind::Sales)
                .await?;
            self.validate_netting_items(
                &db_tx,
                counterparty_id,
                purchase_items,
                VoucherKind::Purchase,
            )
            .await?;

            let record = NettingRecord {
                id: Uuid::new_v4(),
                counterparty_id,
                netting_date,
                amount_minor: sales_total,
                status: NettingStatus::Draft,
                memo: normalize_optional_text(memo),
                deposit_transaction_id: None,
                withdrawal_transaction_id: None,
                created_by: user_id.to_string(),
            };
            nettings::ActiveModel::from(&record).insert(&db_tx).await?;

            for item in sales_items.iter().chain(purchase_items) {
                let link = NettingVoucherLink {
                    id: Uuid::new_v4(),
                    netting_id: record.id,
                    voucher_id: item.voucher_id,
                    amount_minor: item.amount_minor,
                };
                netting_links::ActiveModel::from(&link).insert(&db_tx).await?;
            }

            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::NettingCreate,
                "netting",
                &record.id.to_string(),
                NONE,
                Some(&record),
            )
            .await?;
            debug!(netting_id = %record.id, amount_minor = sales_total, "netting draft created");
            Ok(record)
        })
    }

    /// Confirm a draft set-off.
    ///
    /// Every link is re-validated against the voucher's *current* available
    /// balance (concurrent allocations may have consumed it since the
    /// draft), then exactly two transactions are created: one deposit
    /// allocated across the sales vouchers and one withdrawal of the same
    /// amount allocated across the purchase vouchers. Both end fully
    /// allocated.
    pub async fn confirm_netting(&self, netting_id: Uuid, user_id: &str) -> ResultEngine<NettingRecord> {
        with_tx!(self, |db_tx| {
            let model = self.require_netting(&db_tx, netting_id).await?;
            let mut record = NettingRecord::try_from(model)?;
            if record.status != NettingStatus::Draft {
                return Err(EngineError::StateConflict(format!(
                    "netting is {}, only drafts can be confirmed",
                    record.status.as_str()
                )));
            }

            let links = self.netting_link_sides(&db_tx, netting_id).await?;

            let deposit = self
                .create_transaction_in(
                    &db_tx,
                    record.counterparty_id,
                    TransactionKind::Deposit,
                    TransactionSource::Netting,
                    record.netting_date,
                    record.amount_minor,
                    None,
                    record.memo.as_deref(),
                    user_id,
                )
                .await?;
            for (link, _) in links.iter().filter(|(_, kind)| *kind == VoucherKind::Sales) {
                self.allocate_in(
                    &db_tx,
                    deposit.id,
                    link.voucher_id,
                    link.amount_minor,
                    None,
                    user_id,
                )
                .await?;
            }

            let withdrawal = self
                .create_transaction_in(
                    &db_tx,
                    record.counterparty_id,
                    TransactionKind::Withdrawal,
                    TransactionSource::Netting,
                    record.netting_date,
                    record.amount_minor,
                    None,
                    record.memo.as_deref(),
                    user_id,
                )
                .await?;
            for (link, _) in links
                .iter()
                .filter(|(_, kind)| *kind == VoucherKind::Purchase)
            {
                self.allocate_in(
                    &db_tx,
                    withdrawal.id,
                    link.voucher_id,
                    link.amount_minor,
                    None,
                    user_id,
                )
                .await?;
            }

            let before = record.clone();
            record.status = NettingStatus::Confirmed;
            record.deposit_transaction_id = Some(deposit.id);
            record.withdrawal_transaction_id = Some(withdrawal.id);
            let active = nettings::ActiveModel {
                id: ActiveValue::Set(netting_id.to_string()),
                status: ActiveValue::Set(record.status.as_str().to_string()),
                deposit_transaction_id: ActiveValue::Set(Some(deposit.id.to_string())),
                withdrawal_transaction_id: ActiveValue::Set(Some(withdrawal.id.to_string())),
                ..Default::default()
            };
            active.update(&db_tx).await?;

            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::NettingConfirm,
                "netting",
                &netting_id.to_string(),
                Some(&before),
                Some(&record),
            )
            .await?;
            info!(netting_id = %netting_id, amount_minor = record.amount_minor, "netting confirmed");
            Ok(record)
        })
    }

    /// Cancel a set-off.
    ///
    /// A draft is simply marked cancelled. A confirmed netting is reversed
    /// atomically: every allocation generated by its two transactions is
    /// deleted (re-deriving each voucher's status), both transactions are
    /// cancelled, then the record is marked cancelled. Either everything is
    /// reversed or nothing is.
    pub async fn cancel_netting(&self, netting_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = self.require_netting(&db_tx, netting_id).await?;
            let record = NettingRecord::try_from(model)?;

            match record.status {
                NettingStatus::Cancelled => {
                    return Err(EngineError::StateConflict(
                        "netting already cancelled".to_string(),
                    ));
                }
                NettingStatus::Draft => {}
                NettingStatus::Confirmed => {
                    for transaction_id in [
                        record.deposit_transaction_id,
                        record.withdrawal_transaction_id,
                    ]
                    .into_iter()
                    .flatten()
                    {
                        let allocation_models = crate::allocations::Entity::find()
                            .filter(
                                crate::allocations::Column::TransactionId
                                    .eq(transaction_id.to_string()),
                            )
                            .all(&db_tx)
                            .await?;
                        for allocation_model in allocation_models {
                            let allocation_id =
                                crate::util::parse_uuid(&allocation_model.id, "allocation")?;
                            self.delete_allocation_in(&db_tx, allocation_id, user_id)
                                .await?;
                        }
                        self.cancel_transaction_in(&db_tx, transaction_id, user_id)
                            .await?;
                    }
                }
            }

            let mut after = record.clone();
            after.status = NettingStatus::Cancelled;
            let active = nettings::ActiveModel {
                id: ActiveValue::Set(netting_id.to_string()),
                status: ActiveValue::Set(NettingStatus::Cancelled.as_str().to_string()),
                ..Default::default()
            };
            active.update(&db_tx).await?;

            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::NettingCancel,
                "netting",
                &netting_id.to_string(),
                Some(&record),
                Some(&after),
            )
            .await?;
            info!(netting_id = %netting_id, was = record.status.as_str(), "netting cancelled");
            Ok(())
        })
    }

    pub async fn netting(&self, netting_id: Uuid) -> ResultEngine<NettingRecord> {
        let model = nettings::Entity::find_by_id(netting_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("netting not exists".to_string()))?;
        NettingRecord::try_from(model)
    }

    pub async fn netting_links(&self, netting_id: Uuid) -> ResultEngine<Vec<NettingVoucherLink>> {
        let models = netting_links::Entity::find()
            .filter(netting_links::Column::NettingId.eq(netting_id.to_string()))
            .order_by_asc(netting_links::Column::Id)
            .all(&self.database)
            .await?;
        models
            .into_iter()
            .map(NettingVoucherLink::try_from)
            .collect()
    }

    /// Validate one side's items: vouchers exist, belong to the
    /// counterparty, sit on the right side, are not locked, and have
    /// enough available balance for the requested amount.
    async fn validate_netting_items(
        &self,
        db_tx: &DatabaseTransaction,
        counterparty_id: Uuid,
        items: &[NettingItem],
        expected_kind: VoucherKind,
    ) -> ResultEngine<()> {
        for item in items {
            let model = self.require_voucher(db_tx, item.voucher_id).await?;
            let voucher = Voucher::try_from(model.clone())?;
            if voucher.counterparty_id != counterparty_id {
                return Err(EngineError::KeyNotFound("voucher not exists".to_string()));
            }
            if voucher.kind != expected_kind {
                return Err(EngineError::InvalidAmount(format!(
                    "voucher {} is {}, expected {}",
                    voucher.voucher_number,
                    voucher.kind.as_str(),
                    expected_kind.as_str()
                )));
            }
            if voucher.is_locked() {
                return Err(EngineError::StateConflict("voucher is locked".to_string()));
            }
            let applied = self.voucher_applied_minor(db_tx, &model).await?;
            let available = voucher.total_minor - applied;
            if item.amount_minor > available {
                return Err(EngineError::InsufficientBalance(format!(
                    "netting amount {} exceeds voucher {}'s available balance {available}",
                    item.amount_minor, voucher.voucher_number
                )));
            }
        }
        Ok(())
    }

    async fn require_netting(
        &self,
        db_tx: &DatabaseTransaction,
        netting_id: Uuid,
    ) -> ResultEngine<nettings::Model> {
        nettings::Entity::find_by_id(netting_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("netting not exists".to_string()))
    }

    /// Load a netting's links paired with each voucher's side.
    async fn netting_link_sides(
        &self,
        db_tx: &DatabaseTransaction,
        netting_id: Uuid,
    ) -> ResultEngine<Vec<(NettingVoucherLink, VoucherKind)>> {
        let rows: Vec<(netting_links::Model, Option<crate::vouchers::Model>)> =
            netting_links::Entity::find()
                .filter(netting_links::Column::NettingId.eq(netting_id.to_string()))
                .find_also_related(crate::vouchers::Entity)
                .all(db_tx)
                .await?;

        let mut out = Vec::with_capacity(rows.len());
        for (link_model, voucher_model) in rows {
            let voucher_model = voucher_model
                .ok_or_else(|| EngineError::KeyNotFound("voucher not exists".to_string()))?;
            let kind = VoucherKind::try_from(voucher_model.kind.as_str())?;
            out.push((NettingVoucherLink::try_from(link_model)?, kind));
        }
        Ok(out)
    }
}
