use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    AuditAction, EngineError, PaymentStatus, PeriodLock, PeriodState, ResultEngine,
    SettlementStatus, Voucher, period_locks,
    util::{validate_year_month, year_month_of},
    vouchers,
};

use super::{Engine, audit::NONE, with_tx};

/// Per-item summary of a best-effort batch operation.
///
/// Batches never abort on a bad item: already-in-target-state and unknown
/// ids are counted as skips, anything else lands in `errors` and the
/// remaining items still run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub success_count: usize,
    pub skipped_count: usize,
    pub errors: Vec<String>,
}

/// First day of the month and first day of the following month.
fn month_bounds(year_month: &str) -> ResultEngine<(NaiveDate, NaiveDate)> {
    validate_year_month(year_month)?;
    let year: i32 = year_month[..4]
        .parse()
        .map_err(|_| EngineError::InvalidName(format!("invalid year_month: {year_month}")))?;
    let month: u32 = year_month[5..]
        .parse()
        .map_err(|_| EngineError::InvalidName(format!("invalid year_month: {year_month}")))?;
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| EngineError::InvalidName(format!("invalid year_month: {year_month}")))?;
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| EngineError::InvalidName(format!("invalid year_month: {year_month}")))?;
    Ok((start, end))
}

impl Engine {
    /// Close a month: every voucher with a trade date inside it gets both
    /// status axes forced to `locked`, regardless of derived value.
    ///
    /// Idempotent at month granularity: locking an already-locked month
    /// returns the existing row untouched.
    pub async fn lock_period(&self, year_month: &str, user_id: &str) -> ResultEngine<PeriodLock> {
        with_tx!(self, |db_tx| {
            let (start, end) = month_bounds(year_month)?;
            let existing = self.period_lock_row(&db_tx, year_month).await?;
            if let Some(model) = &existing {
                let lock = PeriodLock::try_from(model.clone())?;
                if lock.state == PeriodState::Locked {
                    return Ok(lock);
                }
            }

            let voucher_models = vouchers::Entity::find()
                .filter(vouchers::Column::TradeDate.gte(start))
                .filter(vouchers::Column::TradeDate.lt(end))
                .all(&db_tx)
                .await?;
            let locked_count = voucher_models.len() as i32;
            for model in voucher_models {
                let active = vouchers::ActiveModel {
                    id: ActiveValue::Set(model.id),
                    settlement_status: ActiveValue::Set(
                        SettlementStatus::Locked.as_str().to_string(),
                    ),
                    payment_status: ActiveValue::Set(PaymentStatus::Locked.as_str().to_string()),
                    ..Default::default()
                };
                active.update(&db_tx).await?;
            }

            let before = match &existing {
                Some(model) => Some(PeriodLock::try_from(model.clone())?),
                None => None,
            };
            let lock = PeriodLock {
                id: before
                    .as_ref()
                    .map_or_else(Uuid::new_v4, |previous| previous.id),
                year_month: year_month.to_string(),
                state: PeriodState::Locked,
                locked_voucher_count: locked_count,
                locked_by: Some(user_id.to_string()),
                locked_at: Some(Utc::now()),
                unlocked_by: None,
                unlocked_at: None,
            };
            let active = period_locks::ActiveModel::from(&lock);
            if existing.is_some() {
                active.update(&db_tx).await?;
            } else {
                active.insert(&db_tx).await?;
            }

            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::PeriodLock,
                "period",
                year_month,
                before.as_ref(),
                Some(&lock),
            )
            .await?;
            info!(year_month, locked_count, "period locked");
            Ok(lock)
        })
    }

    /// Reopen a month. Every voucher in it goes back to the zero-state
    /// (`open`/`unpaid`) literally, NOT re-derived from its allocation
    /// history; callers who need accurate statuses must trigger a
    /// re-derivation through an allocation mutation afterwards.
    ///
    /// Unlocking an already-open month is a no-op, and so is unlocking a
    /// month with no lock row at all (a missing row means open everywhere
    /// else in the engine).
    pub async fn unlock_period(&self, year_month: &str, user_id: &str) -> ResultEngine<PeriodLock> {
        with_tx!(self, |db_tx| {
            let (start, end) = month_bounds(year_month)?;
            let Some(model) = self.period_lock_row(&db_tx, year_month).await? else {
                return Ok(PeriodLock {
                    id: Uuid::new_v4(),
                    year_month: year_month.to_string(),
                    state: PeriodState::Open,
                    locked_voucher_count: 0,
                    locked_by: None,
                    locked_at: None,
                    unlocked_by: None,
                    unlocked_at: None,
                });
            };
            let before = PeriodLock::try_from(model)?;
            if before.state == PeriodState::Open {
                return Ok(before);
            }

            let voucher_models = vouchers::Entity::find()
                .filter(vouchers::Column::TradeDate.gte(start))
                .filter(vouchers::Column::TradeDate.lt(end))
                .all(&db_tx)
                .await?;
            for model in voucher_models {
                let active = vouchers::ActiveModel {
                    id: ActiveValue::Set(model.id),
                    settlement_status: ActiveValue::Set(SettlementStatus::Open.as_str().to_string()),
                    payment_status: ActiveValue::Set(PaymentStatus::Unpaid.as_str().to_string()),
                    ..Default::default()
                };
                active.update(&db_tx).await?;
            }

            let mut lock = before.clone();
            lock.state = PeriodState::Open;
            lock.locked_voucher_count = 0;
            lock.unlocked_by = Some(user_id.to_string());
            lock.unlocked_at = Some(Utc::now());
            period_locks::ActiveModel::from(&lock).update(&db_tx).await?;

            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::PeriodUnlock,
                "period",
                year_month,
                Some(&before),
                Some(&lock),
            )
            .await?;
            info!(year_month, "period unlocked");
            Ok(lock)
        })
    }

    /// Lock a single voucher: both axes forced to `locked`.
    ///
    /// Unlike the month-level operation this is strict: a voucher already
    /// locked on both axes is a state conflict, not a no-op.
    pub async fn lock_voucher(&self, voucher_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.lock_voucher_in(&db_tx, voucher_id, user_id).await
        })
    }

    /// Unlock a single voucher back to `open`/`unpaid`. Strict like
    /// [`Engine::lock_voucher`]: an unlocked voucher is a state conflict.
    pub async fn unlock_voucher(&self, voucher_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.unlock_voucher_in(&db_tx, voucher_id, user_id).await
        })
    }

    /// Best-effort batch lock: vouchers already locked on both axes and
    /// unknown ids are skipped, other failures are collected per item.
    pub async fn lock_vouchers(
        &self,
        voucher_ids: &[Uuid],
        user_id: &str,
    ) -> ResultEngine<BatchOutcome> {
        with_tx!(self, |db_tx| {
            let mut outcome = BatchOutcome::default();
            for voucher_id in voucher_ids {
                match self.lock_voucher_in(&db_tx, *voucher_id, user_id).await {
                    Ok(()) => outcome.success_count += 1,
                    Err(EngineError::StateConflict(_)) | Err(EngineError::KeyNotFound(_)) => {
                        outcome.skipped_count += 1;
                    }
                    Err(error) => outcome.errors.push(format!("{voucher_id}: {error}")),
                }
            }
            Ok(outcome)
        })
    }

    /// Best-effort batch unlock, same skip semantics as
    /// [`Engine::lock_vouchers`].
    pub async fn unlock_vouchers(
        &self,
        voucher_ids: &[Uuid],
        user_id: &str,
    ) -> ResultEngine<BatchOutcome> {
        with_tx!(self, |db_tx| {
            let mut outcome = BatchOutcome::default();
            for voucher_id in voucher_ids {
                match self.unlock_voucher_in(&db_tx, *voucher_id, user_id).await {
                    Ok(()) => outcome.success_count += 1,
                    Err(EngineError::StateConflict(_)) | Err(EngineError::KeyNotFound(_)) => {
                        outcome.skipped_count += 1;
                    }
                    Err(error) => outcome.errors.push(format!("{voucher_id}: {error}")),
                }
            }
            Ok(outcome)
        })
    }

    pub async fn period_lock(&self, year_month: &str) -> ResultEngine<PeriodLock> {
        validate_year_month(year_month)?;
        let model = period_locks::Entity::find()
            .filter(period_locks::Column::YearMonth.eq(year_month))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("period lock not exists".to_string()))?;
        PeriodLock::try_from(model)
    }

    pub async fn list_period_locks(&self) -> ResultEngine<Vec<PeriodLock>> {
        let models = period_locks::Entity::find()
            .order_by_asc(period_locks::Column::YearMonth)
            .all(&self.database)
            .await?;
        models.into_iter().map(PeriodLock::try_from).collect()
    }

    /// True when the month containing `date` is in the `locked` state.
    /// A missing row means open.
    pub(super) async fn period_locked(
        &self,
        db_tx: &DatabaseTransaction,
        date: NaiveDate,
    ) -> ResultEngine<bool> {
        let year_month = year_month_of(date);
        let existing = self.period_lock_row(db_tx, &year_month).await?;
        Ok(existing.is_some_and(|model| model.state == PeriodState::Locked.as_str()))
    }

    /// Reject mutations whose trade date falls inside a locked month.
    pub(super) async fn require_period_open(
        &self,
        db_tx: &DatabaseTransaction,
        date: NaiveDate,
    ) -> ResultEngine<()> {
        if self.period_locked(db_tx, date).await? {
            return Err(EngineError::StateConflict(format!(
                "period {} is locked",
                year_month_of(date)
            )));
        }
        Ok(())
    }

    async fn lock_voucher_in(
        &self,
        db_tx: &DatabaseTransaction,
        voucher_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        let model = self.require_voucher(db_tx, voucher_id).await?;
        let before = Voucher::try_from(model)?;
        if before.settlement_status == SettlementStatus::Locked
            && before.payment_status == PaymentStatus::Locked
        {
            return Err(EngineError::StateConflict(
                "voucher already locked".to_string(),
            ));
        }

        let mut after = before.clone();
        after.settlement_status = SettlementStatus::Locked;
        after.payment_status = PaymentStatus::Locked;
        let active = vouchers::ActiveModel {
            id: ActiveValue::Set(voucher_id.to_string()),
            settlement_status: ActiveValue::Set(SettlementStatus::Locked.as_str().to_string()),
            payment_status: ActiveValue::Set(PaymentStatus::Locked.as_str().to_string()),
            ..Default::default()
        };
        active.update(db_tx).await?;

        self.record_audit(
            db_tx,
            user_id,
            AuditAction::VoucherLock,
            "voucher",
            &voucher_id.to_string(),
            Some(&before),
            Some(&after),
        )
        .await
    }

    async fn unlock_voucher_in(
        &self,
        db_tx: &DatabaseTransaction,
        voucher_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        let model = self.require_voucher(db_tx, voucher_id).await?;
        let before = Voucher::try_from(model)?;
        if before.settlement_status != SettlementStatus::Locked
            && before.payment_status != PaymentStatus::Locked
        {
            return Err(EngineError::StateConflict(
                "voucher is not locked".to_string(),
            ));
        }

        let mut after = before.clone();
        after.settlement_status = SettlementStatus::Open;
        after.payment_status = PaymentStatus::Unpaid;
        let active = vouchers::ActiveModel {
            id: ActiveValue::Set(voucher_id.to_string()),
            settlement_status: ActiveValue::Set(SettlementStatus::Open.as_str().to_string()),
            payment_status: ActiveValue::Set(PaymentStatus::Unpaid.as_str().to_string()),
            ..Default::default()
        };
        active.update(db_tx).await?;

        self.record_audit(
            db_tx,
            user_id,
            AuditAction::VoucherUnlock,
            "voucher",
            &voucher_id.to_string(),
            Some(&before),
            Some(&after),
        )
        .await
    }

    async fn period_lock_row(
        &self,
        db_tx: &DatabaseTransaction,
        year_month: &str,
    ) -> ResultEngine<Option<period_locks::Model>> {
        Ok(period_locks::Entity::find()
            .filter(period_locks::Column::YearMonth.eq(year_month))
            .one(db_tx)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Datelike;

    use super::*;

    #[test]
    fn month_bounds_spans_exactly_one_month() {
        let (start, end) = month_bounds("2026-03").unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 4, 1).unwrap());
    }

    #[test]
    fn month_bounds_rolls_over_december() {
        let (start, end) = month_bounds("2025-12").unwrap();
        assert_eq!(start.year(), 2025);
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
    }

    #[test]
    fn month_bounds_rejects_malformed_input() {
        assert!(month_bounds("2026-13").is_err());
        assert!(month_bounds("202603").is_err());
        assert!(month_bounds("2026-3").is_err());
    }
}
