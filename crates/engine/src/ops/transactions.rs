use chrono::NaiveDate;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    AuditAction, CounterpartyTransaction, EngineError, ResultEngine, TransactionKind,
    TransactionSource, TransactionStatus, allocations, transactions,
    util::normalize_optional_text,
};

use super::{Engine, audit::NONE, with_tx};

/// Filters for listing transactions. All fields are conjunctive.
#[derive(Clone, Debug, Default)]
pub struct TransactionListFilter {
    pub counterparty_id: Option<Uuid>,
    pub source: Option<TransactionSource>,
    pub status: Option<TransactionStatus>,
    /// Inclusive lower bound on occurred_on.
    pub from: Option<NaiveDate>,
    /// Exclusive upper bound on occurred_on.
    pub to: Option<NaiveDate>,
}

impl Engine {
    /// Record a deposit/withdrawal event against a counterparty.
    ///
    /// `bank_reference` is the import idempotency token and must be unique
    /// across all transactions when present.
    pub async fn create_transaction(
        &self,
        counterparty_id: Uuid,
        kind: TransactionKind,
        source: TransactionSource,
        occurred_on: NaiveDate,
        amount_minor: i64,
        bank_reference: Option<&str>,
        memo: Option<&str>,
        user_id: &str,
    ) -> ResultEngine<CounterpartyTransaction> {
        with_tx!(self, |db_tx| {
            let tx = self
                .create_transaction_in(
                    &db_tx,
                    counterparty_id,
                    kind,
                    source,
                    occurred_on,
                    amount_minor,
                    bank_reference,
                    memo,
                    user_id,
                )
                .await?;
            Ok(tx)
        })
    }

    /// Transaction creation inside an existing DB transaction, shared with
    /// bank import confirmation and netting confirmation.
    pub(super) async fn create_transaction_in(
        &self,
        db_tx: &DatabaseTransaction,
        counterparty_id: Uuid,
        kind: TransactionKind,
        source: TransactionSource,
        occurred_on: NaiveDate,
        amount_minor: i64,
        bank_reference: Option<&str>,
        memo: Option<&str>,
        user_id: &str,
    ) -> ResultEngine<CounterpartyTransaction> {
        self.require_counterparty(db_tx, counterparty_id).await?;

        let bank_reference = normalize_optional_text(bank_reference);
        if let Some(reference) = bank_reference.as_deref() {
            let existing = transactions::Entity::find()
                .filter(transactions::Column::BankReference.eq(reference))
                .one(db_tx)
                .await?;
            if existing.is_some() {
                return Err(EngineError::ExistingKey(format!(
                    "bank_reference {reference}"
                )));
            }
        }

        let tx = CounterpartyTransaction::new(
            counterparty_id,
            kind,
            source,
            occurred_on,
            amount_minor,
            bank_reference,
            normalize_optional_text(memo),
            user_id.to_string(),
        )?;
        transactions::ActiveModel::from(&tx).insert(db_tx).await?;
        self.record_audit(
            db_tx,
            user_id,
            AuditAction::TransactionCreate,
            "transaction",
            &tx.id.to_string(),
            NONE,
            Some(&tx),
        )
        .await?;
        debug!(
            transaction_id = %tx.id,
            kind = kind.as_str(),
            source = source.as_str(),
            amount_minor,
            "transaction created"
        );
        Ok(tx)
    }

    /// Cancel a transaction.
    ///
    /// All of its allocations must already be deleted/reversed; a cancelled
    /// transaction carries `allocated_minor = 0` and is terminal.
    pub async fn cancel_transaction(&self, transaction_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.cancel_transaction_in(&db_tx, transaction_id, user_id)
                .await
        })
    }

    pub(super) async fn cancel_transaction_in(
        &self,
        db_tx: &DatabaseTransaction,
        transaction_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        let model = self.require_transaction(db_tx, transaction_id).await?;
        let before = CounterpartyTransaction::try_from(model.clone())?;

        if before.status == TransactionStatus::Cancelled {
            return Err(EngineError::StateConflict(
                "transaction already cancelled".to_string(),
            ));
        }

        let remaining = allocations::Entity::find()
            .filter(allocations::Column::TransactionId.eq(transaction_id.to_string()))
            .count(db_tx)
            .await?;
        if remaining > 0 {
            return Err(EngineError::StateConflict(format!(
                "transaction has {remaining} allocation(s); delete them first"
            )));
        }

        let active = transactions::ActiveModel {
            id: ActiveValue::Set(transaction_id.to_string()),
            status: ActiveValue::Set(TransactionStatus::Cancelled.as_str().to_string()),
            allocated_minor: ActiveValue::Set(0),
            ..Default::default()
        };
        active.update(db_tx).await?;

        let mut after = before.clone();
        after.status = TransactionStatus::Cancelled;
        after.allocated_minor = 0;
        self.record_audit(
            db_tx,
            user_id,
            AuditAction::TransactionCancel,
            "transaction",
            &transaction_id.to_string(),
            Some(&before),
            Some(&after),
        )
        .await?;
        Ok(())
    }

    pub async fn transaction(&self, transaction_id: Uuid) -> ResultEngine<CounterpartyTransaction> {
        let model = transactions::Entity::find_by_id(transaction_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("transaction not exists".to_string()))?;
        CounterpartyTransaction::try_from(model)
    }

    pub async fn list_transactions(
        &self,
        filter: &TransactionListFilter,
    ) -> ResultEngine<Vec<CounterpartyTransaction>> {
        let mut query = transactions::Entity::find()
            .order_by_asc(transactions::Column::OccurredOn)
            .order_by_asc(transactions::Column::Id);
        if let Some(counterparty_id) = filter.counterparty_id {
            query =
                query.filter(transactions::Column::CounterpartyId.eq(counterparty_id.to_string()));
        }
        if let Some(source) = filter.source {
            query = query.filter(transactions::Column::Source.eq(source.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(transactions::Column::Status.eq(status.as_str()));
        }
        if let Some(from) = filter.from {
            query = query.filter(transactions::Column::OccurredOn.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(transactions::Column::OccurredOn.lt(to));
        }
        let models = query.all(&self.database).await?;
        models
            .into_iter()
            .map(CounterpartyTransaction::try_from)
            .collect()
    }

    pub(super) async fn require_transaction(
        &self,
        db_tx: &DatabaseTransaction,
        transaction_id: Uuid,
    ) -> ResultEngine<transactions::Model> {
        transactions::Entity::find_by_id(transaction_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("transaction not exists".to_string()))
    }
}
