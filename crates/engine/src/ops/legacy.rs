use chrono::NaiveDate;
use sea_orm::{QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use tracing::debug;
use uuid::Uuid;

use crate::{
    AuditAction, EngineError, LegacyEntry, LegacyEntryKind, ResultEngine, Voucher, VoucherKind,
    legacy_entries, util::normalize_optional_text,
};

use super::{Engine, audit::NONE, with_tx};

impl Engine {
    /// Record an old-style receipt/payment row directly against a voucher.
    ///
    /// Legacy entries bypass the transaction ledger but never the status
    /// derivation: they count toward the voucher's applied sum and trigger
    /// the same recompute as an allocation would.
    pub async fn record_legacy_entry(
        &self,
        voucher_id: Uuid,
        kind: LegacyEntryKind,
        entry_date: NaiveDate,
        amount_minor: i64,
        memo: Option<&str>,
        user_id: &str,
    ) -> ResultEngine<LegacyEntry> {
        if amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(
                "amount_minor must be > 0".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            let model = self.require_voucher(&db_tx, voucher_id).await?;
            let voucher = Voucher::try_from(model.clone())?;
            let expected = match voucher.kind {
                VoucherKind::Sales => LegacyEntryKind::Receipt,
                VoucherKind::Purchase => LegacyEntryKind::Payment,
            };
            if kind != expected {
                return Err(EngineError::InvalidAmount(format!(
                    "a {} entry cannot apply to a {} voucher",
                    kind.as_str(),
                    voucher.kind.as_str()
                )));
            }
            if voucher.is_locked() {
                return Err(EngineError::StateConflict("voucher is locked".to_string()));
            }
            self.require_period_open(&db_tx, voucher.trade_date).await?;

            let applied = self.voucher_applied_minor(&db_tx, &model).await?;
            let available = voucher.total_minor - applied;
            if amount_minor > available {
                return Err(EngineError::InsufficientBalance(format!(
                    "entry amount {amount_minor} exceeds voucher's available balance {available}"
                )));
            }

            let entry = LegacyEntry {
                id: Uuid::new_v4(),
                voucher_id,
                kind,
                entry_date,
                amount_minor,
                memo: normalize_optional_text(memo),
                created_by: user_id.to_string(),
            };
            legacy_entries::ActiveModel::from(&entry).insert(&db_tx).await?;
            self.refresh_voucher_status(&db_tx, &voucher_id.to_string())
                .await?;

            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::LegacyEntryCreate,
                "legacy_entry",
                &entry.id.to_string(),
                NONE,
                Some(&entry),
            )
            .await?;
            debug!(voucher_id = %voucher_id, amount_minor, "legacy entry recorded");
            Ok(entry)
        })
    }

    pub async fn list_legacy_entries(&self, voucher_id: Uuid) -> ResultEngine<Vec<LegacyEntry>> {
        let models = legacy_entries::Entity::find()
            .filter(legacy_entries::Column::VoucherId.eq(voucher_id.to_string()))
            .order_by_asc(legacy_entries::Column::EntryDate)
            .all(&self.database)
            .await?;
        models.into_iter().map(LegacyEntry::try_from).collect()
    }
}
