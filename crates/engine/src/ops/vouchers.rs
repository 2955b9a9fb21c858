use chrono::NaiveDate;
use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use tracing::debug;
use uuid::Uuid;

use crate::{
    AuditAction, EngineError, ResultEngine, Voucher, VoucherKind, allocations, legacy_entries,
    util::normalize_required_name, vouchers,
};

use super::{BatchOutcome, Engine, audit::NONE, with_tx};

/// Filters for listing vouchers. All fields are conjunctive.
#[derive(Clone, Debug, Default)]
pub struct VoucherListFilter {
    pub counterparty_id: Option<Uuid>,
    pub kind: Option<VoucherKind>,
    /// Inclusive lower bound on trade_date.
    pub from: Option<NaiveDate>,
    /// Exclusive upper bound on trade_date.
    pub to: Option<NaiveDate>,
}

/// A voucher plus its computed settlement arithmetic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoucherSummary {
    pub voucher: Voucher,
    /// Legacy receipts/payments plus live allocations.
    pub applied_minor: i64,
    /// `total_minor - applied_minor`, floored at zero.
    pub available_minor: i64,
}

impl Engine {
    /// Create a voucher.
    ///
    /// Identity is the composite `(counterparty_id, trade_date,
    /// voucher_number)`; creation in a locked month is rejected.
    pub async fn create_voucher(
        &self,
        counterparty_id: Uuid,
        kind: VoucherKind,
        trade_date: NaiveDate,
        voucher_number: &str,
        total_minor: i64,
        user_id: &str,
    ) -> ResultEngine<Voucher> {
        let voucher_number = normalize_required_name(voucher_number, "voucher_number")?;

        with_tx!(self, |db_tx| {
            self.require_counterparty(&db_tx, counterparty_id).await?;
            self.require_period_open(&db_tx, trade_date).await?;
            self.require_unique_voucher(&db_tx, counterparty_id, trade_date, &voucher_number)
                .await?;

            let voucher = Voucher::new(
                counterparty_id,
                kind,
                trade_date,
                voucher_number,
                total_minor,
                user_id.to_string(),
            )?;
            vouchers::ActiveModel::from(&voucher).insert(&db_tx).await?;
            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::VoucherCreate,
                "voucher",
                &voucher.id.to_string(),
                NONE,
                Some(&voucher),
            )
            .await?;
            debug!(voucher_id = %voucher.id, kind = kind.as_str(), "voucher created");
            Ok(voucher)
        })
    }

    /// Create an adjustment voucher carrying a delta against an already
    /// locked original. Counterparty and kind are inherited; the adjustment
    /// starts OPEN/UNPAID regardless of the original's lock state and is
    /// gated only by its own trade date's month.
    pub async fn create_adjustment_voucher(
        &self,
        original_voucher_id: Uuid,
        trade_date: NaiveDate,
        voucher_number: &str,
        total_minor: i64,
        user_id: &str,
    ) -> ResultEngine<Voucher> {
        let voucher_number = normalize_required_name(voucher_number, "voucher_number")?;

        with_tx!(self, |db_tx| {
            let original = self.require_voucher(&db_tx, original_voucher_id).await?;
            let counterparty_id = crate::util::parse_uuid(&original.counterparty_id, "counterparty")?;
            let kind = VoucherKind::try_from(original.kind.as_str())?;

            self.require_period_open(&db_tx, trade_date).await?;
            self.require_unique_voucher(&db_tx, counterparty_id, trade_date, &voucher_number)
                .await?;

            let mut voucher = Voucher::new(
                counterparty_id,
                kind,
                trade_date,
                voucher_number,
                total_minor,
                user_id.to_string(),
            )?;
            voucher.is_adjustment = true;
            voucher.original_voucher_id = Some(original_voucher_id);
            vouchers::ActiveModel::from(&voucher).insert(&db_tx).await?;
            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::VoucherCreate,
                "voucher",
                &voucher.id.to_string(),
                NONE,
                Some(&voucher),
            )
            .await?;
            Ok(voucher)
        })
    }

    /// Return a voucher with its computed applied/available amounts.
    pub async fn voucher(&self, voucher_id: Uuid) -> ResultEngine<VoucherSummary> {
        with_tx!(self, |db_tx| {
            let model = self.require_voucher(&db_tx, voucher_id).await?;
            let applied = self.voucher_applied_minor(&db_tx, &model).await?;
            let voucher = Voucher::try_from(model)?;
            let available = (voucher.total_minor - applied).max(0);
            Ok(VoucherSummary {
                voucher,
                applied_minor: applied,
                available_minor: available,
            })
        })
    }

    pub async fn list_vouchers(&self, filter: &VoucherListFilter) -> ResultEngine<Vec<Voucher>> {
        let mut query = vouchers::Entity::find()
            .order_by_asc(vouchers::Column::TradeDate)
            .order_by_asc(vouchers::Column::VoucherNumber);
        if let Some(counterparty_id) = filter.counterparty_id {
            query = query.filter(vouchers::Column::CounterpartyId.eq(counterparty_id.to_string()));
        }
        if let Some(kind) = filter.kind {
            query = query.filter(vouchers::Column::Kind.eq(kind.as_str()));
        }
        if let Some(from) = filter.from {
            query = query.filter(vouchers::Column::TradeDate.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(vouchers::Column::TradeDate.lt(to));
        }
        let models = query.all(&self.database).await?;
        models.into_iter().map(Voucher::try_from).collect()
    }

    /// Best-effort bulk delete.
    ///
    /// Items are processed sequentially; unknown ids are skips, vouchers
    /// with applied money or a locked axis are per-item errors. This is the
    /// batch category of operations: it never aborts the remaining items.
    pub async fn delete_vouchers(
        &self,
        voucher_ids: &[Uuid],
        user_id: &str,
    ) -> ResultEngine<BatchOutcome> {
        let mut outcome = BatchOutcome::default();

        for &voucher_id in voucher_ids {
            match self.delete_voucher(voucher_id, user_id).await {
                Ok(()) => outcome.success_count += 1,
                Err(EngineError::KeyNotFound(_)) => outcome.skipped_count += 1,
                Err(err) => outcome.errors.push(format!("{voucher_id}: {err}")),
            }
        }

        Ok(outcome)
    }

    async fn delete_voucher(&self, voucher_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = self.require_voucher(&db_tx, voucher_id).await?;
            let voucher = Voucher::try_from(model.clone())?;

            if voucher.is_locked() {
                return Err(EngineError::StateConflict(
                    "voucher is locked".to_string(),
                ));
            }
            self.require_period_open(&db_tx, voucher.trade_date).await?;

            let allocation_count = allocations::Entity::find()
                .filter(allocations::Column::VoucherId.eq(voucher_id.to_string()))
                .count(&db_tx)
                .await?;
            let legacy_count = legacy_entries::Entity::find()
                .filter(legacy_entries::Column::VoucherId.eq(voucher_id.to_string()))
                .count(&db_tx)
                .await?;
            if allocation_count > 0 || legacy_count > 0 {
                return Err(EngineError::StateConflict(
                    "voucher has applied money; remove allocations first".to_string(),
                ));
            }

            model.delete(&db_tx).await?;
            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::VoucherDelete,
                "voucher",
                &voucher_id.to_string(),
                Some(&voucher),
                NONE,
            )
            .await?;
            Ok(())
        })
    }

    pub(super) async fn require_voucher(
        &self,
        db_tx: &DatabaseTransaction,
        voucher_id: Uuid,
    ) -> ResultEngine<vouchers::Model> {
        vouchers::Entity::find_by_id(voucher_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("voucher not exists".to_string()))
    }

    async fn require_unique_voucher(
        &self,
        db_tx: &DatabaseTransaction,
        counterparty_id: Uuid,
        trade_date: NaiveDate,
        voucher_number: &str,
    ) -> ResultEngine<()> {
        let existing = vouchers::Entity::find()
            .filter(vouchers::Column::CounterpartyId.eq(counterparty_id.to_string()))
            .filter(vouchers::Column::TradeDate.eq(trade_date))
            .filter(vouchers::Column::VoucherNumber.eq(voucher_number))
            .one(db_tx)
            .await?;
        if existing.is_some() {
            return Err(EngineError::ExistingKey(format!(
                "voucher {voucher_number} on {trade_date}"
            )));
        }
        Ok(())
    }
}
