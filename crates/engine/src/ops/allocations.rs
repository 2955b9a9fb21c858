use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    AuditAction, EngineError, ResultEngine, TransactionAllocation, TransactionStatus, Voucher,
    allocations, transactions, vouchers,
};

use super::{Engine, audit::NONE, status::applying_kind, with_tx};

impl Engine {
    /// Apply part (or all) of a transaction's amount to a voucher.
    ///
    /// Conservation preconditions, checked against current DB state inside
    /// one transaction:
    /// - the transaction is not cancelled and has enough unallocated amount
    /// - the voucher has enough available balance and its relevant status
    ///   axis is not locked
    /// - the (transaction, voucher) pair is not already allocated
    /// - the transaction kind matches the voucher side (deposits settle
    ///   sales vouchers, withdrawals pay purchase vouchers)
    pub async fn allocate(
        &self,
        transaction_id: Uuid,
        voucher_id: Uuid,
        amount_minor: i64,
        order: Option<i32>,
        user_id: &str,
    ) -> ResultEngine<TransactionAllocation> {
        with_tx!(self, |db_tx| {
            self.allocate_in(&db_tx, transaction_id, voucher_id, amount_minor, order, user_id)
                .await
        })
    }

    pub(super) async fn allocate_in(
        &self,
        db_tx: &DatabaseTransaction,
        transaction_id: Uuid,
        voucher_id: Uuid,
        amount_minor: i64,
        order: Option<i32>,
        user_id: &str,
    ) -> ResultEngine<TransactionAllocation> {
        if amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(
                "amount_minor must be > 0".to_string(),
            ));
        }

        let tx_model = self.require_transaction(db_tx, transaction_id).await?;
        if tx_model.status == TransactionStatus::Cancelled.as_str() {
            return Err(EngineError::StateConflict(
                "transaction is cancelled".to_string(),
            ));
        }
        let unallocated = tx_model.amount_minor - tx_model.allocated_minor;
        if amount_minor > unallocated {
            return Err(EngineError::InsufficientBalance(format!(
                "allocation of {amount_minor} exceeds transaction's unallocated amount {unallocated}"
            )));
        }

        let voucher_model = self.require_voucher(db_tx, voucher_id).await?;
        let voucher = Voucher::try_from(voucher_model.clone())?;
        if voucher.is_locked() {
            return Err(EngineError::StateConflict("voucher is locked".to_string()));
        }
        self.require_period_open(db_tx, voucher.trade_date).await?;

        let expected_kind = applying_kind(voucher.kind);
        if tx_model.kind != expected_kind.as_str() {
            return Err(EngineError::InvalidAmount(format!(
                "a {} voucher is settled by {} transactions, got {}",
                voucher.kind.as_str(),
                expected_kind.as_str(),
                tx_model.kind
            )));
        }

        let existing = allocations::Entity::find()
            .filter(allocations::Column::TransactionId.eq(transaction_id.to_string()))
            .filter(allocations::Column::VoucherId.eq(voucher_id.to_string()))
            .one(db_tx)
            .await?;
        if existing.is_some() {
            return Err(EngineError::ExistingKey(format!(
                "allocation ({transaction_id}, {voucher_id})"
            )));
        }

        let applied = self.voucher_applied_minor(db_tx, &voucher_model).await?;
        let available = voucher.total_minor - applied;
        if amount_minor > available {
            return Err(EngineError::InsufficientBalance(format!(
                "allocation of {amount_minor} exceeds voucher's available balance {available}"
            )));
        }

        let allocation_order = match order {
            Some(order) => order,
            None => self.next_allocation_order(db_tx, transaction_id).await?,
        };

        let allocation = TransactionAllocation {
            id: Uuid::new_v4(),
            transaction_id,
            voucher_id,
            amount_minor,
            allocation_order,
            created_by: user_id.to_string(),
            created_at: Utc::now(),
        };
        allocations::ActiveModel::from(&allocation).insert(db_tx).await?;

        let new_allocated = tx_model.allocated_minor + amount_minor;
        let tx_active = transactions::ActiveModel {
            id: ActiveValue::Set(transaction_id.to_string()),
            allocated_minor: ActiveValue::Set(new_allocated),
            status: ActiveValue::Set(
                TransactionStatus::from_allocation(new_allocated, tx_model.amount_minor)
                    .as_str()
                    .to_string(),
            ),
            ..Default::default()
        };
        tx_active.update(db_tx).await?;

        self.refresh_voucher_status(db_tx, &voucher_id.to_string())
            .await?;
        self.record_audit(
            db_tx,
            user_id,
            AuditAction::AllocationCreate,
            "allocation",
            &allocation.id.to_string(),
            NONE,
            Some(&allocation),
        )
        .await?;
        debug!(
            transaction_id = %transaction_id,
            voucher_id = %voucher_id,
            amount_minor,
            "allocation created"
        );
        Ok(allocation)
    }

    /// Apply a transaction to a list of target vouchers FIFO: oldest
    /// trade_date first, tie-broken by voucher_number ascending.
    ///
    /// Stops when the transaction is exhausted or no target has remaining
    /// balance; any remainder stays unallocated (transaction ends PARTIAL).
    /// Targets that cannot legally receive money are passed over, not
    /// errored: locked vouchers, vouchers in a locked month, fully-settled
    /// vouchers, and vouchers this transaction already allocated to.
    pub async fn auto_allocate(
        &self,
        transaction_id: Uuid,
        voucher_ids: &[Uuid],
        user_id: &str,
    ) -> ResultEngine<Vec<TransactionAllocation>> {
        with_tx!(self, |db_tx| {
            let tx_model = self.require_transaction(&db_tx, transaction_id).await?;
            if tx_model.status == TransactionStatus::Cancelled.as_str() {
                return Err(EngineError::StateConflict(
                    "transaction is cancelled".to_string(),
                ));
            }

            let ids: Vec<String> = voucher_ids.iter().map(|id| id.to_string()).collect();
            let targets = vouchers::Entity::find()
                .filter(vouchers::Column::Id.is_in(ids))
                .order_by_asc(vouchers::Column::TradeDate)
                .order_by_asc(vouchers::Column::VoucherNumber)
                .order_by_asc(vouchers::Column::Id)
                .all(&db_tx)
                .await?;
            if targets.len() != voucher_ids.len() {
                return Err(EngineError::KeyNotFound(
                    "voucher not exists".to_string(),
                ));
            }

            let mut remaining = tx_model.amount_minor - tx_model.allocated_minor;
            let mut created = Vec::new();

            for target in targets {
                if remaining == 0 {
                    break;
                }
                let voucher = Voucher::try_from(target.clone())?;
                if voucher.is_locked() {
                    continue;
                }
                if self.period_locked(&db_tx, voucher.trade_date).await? {
                    continue;
                }
                let already = allocations::Entity::find()
                    .filter(allocations::Column::TransactionId.eq(transaction_id.to_string()))
                    .filter(allocations::Column::VoucherId.eq(voucher.id.to_string()))
                    .one(&db_tx)
                    .await?;
                if already.is_some() {
                    continue;
                }
                let applied = self.voucher_applied_minor(&db_tx, &target).await?;
                let available = voucher.total_minor - applied;
                if available <= 0 {
                    continue;
                }

                let amount = remaining.min(available);
                let allocation = self
                    .allocate_in(&db_tx, transaction_id, voucher.id, amount, None, user_id)
                    .await?;
                remaining -= amount;
                created.push(allocation);
            }

            debug!(
                transaction_id = %transaction_id,
                allocations = created.len(),
                remainder_minor = remaining,
                "auto-allocation finished"
            );
            Ok(created)
        })
    }

    /// Reverse one allocation: the owning transaction's allocated amount is
    /// decremented and the voucher's status re-derived. Blocked while the
    /// voucher is locked or its month is closed.
    pub async fn delete_allocation(&self, allocation_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.delete_allocation_in(&db_tx, allocation_id, user_id)
                .await
        })
    }

    pub(super) async fn delete_allocation_in(
        &self,
        db_tx: &DatabaseTransaction,
        allocation_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        let model = allocations::Entity::find_by_id(allocation_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("allocation not exists".to_string()))?;
        let allocation = TransactionAllocation::try_from(model.clone())?;

        let voucher_model = self.require_voucher(db_tx, allocation.voucher_id).await?;
        let voucher = Voucher::try_from(voucher_model)?;
        if voucher.is_locked() {
            return Err(EngineError::StateConflict("voucher is locked".to_string()));
        }
        self.require_period_open(db_tx, voucher.trade_date).await?;

        let tx_model = self
            .require_transaction(db_tx, allocation.transaction_id)
            .await?;

        model.delete(db_tx).await?;

        let new_allocated = tx_model.allocated_minor - allocation.amount_minor;
        let status = if tx_model.status == TransactionStatus::Cancelled.as_str() {
            TransactionStatus::Cancelled
        } else {
            TransactionStatus::from_allocation(new_allocated, tx_model.amount_minor)
        };
        let tx_active = transactions::ActiveModel {
            id: ActiveValue::Set(tx_model.id.clone()),
            allocated_minor: ActiveValue::Set(new_allocated),
            status: ActiveValue::Set(status.as_str().to_string()),
            ..Default::default()
        };
        tx_active.update(db_tx).await?;

        self.refresh_voucher_status(db_tx, &allocation.voucher_id.to_string())
            .await?;
        self.record_audit(
            db_tx,
            user_id,
            AuditAction::AllocationDelete,
            "allocation",
            &allocation_id.to_string(),
            Some(&allocation),
            NONE,
        )
        .await?;
        Ok(())
    }

    pub async fn list_allocations(
        &self,
        transaction_id: Uuid,
    ) -> ResultEngine<Vec<TransactionAllocation>> {
        let models = allocations::Entity::find()
            .filter(allocations::Column::TransactionId.eq(transaction_id.to_string()))
            .order_by_asc(allocations::Column::AllocationOrder)
            .all(&self.database)
            .await?;
        models
            .into_iter()
            .map(TransactionAllocation::try_from)
            .collect()
    }

    async fn next_allocation_order(
        &self,
        db_tx: &DatabaseTransaction,
        transaction_id: Uuid,
    ) -> ResultEngine<i32> {
        let last = allocations::Entity::find()
            .filter(allocations::Column::TransactionId.eq(transaction_id.to_string()))
            .order_by_desc(allocations::Column::AllocationOrder)
            .limit(1)
            .one(db_tx)
            .await?;
        Ok(last.map_or(1, |model| model.allocation_order + 1))
    }
}
