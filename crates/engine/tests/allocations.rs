use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    Counterparty, CounterpartyKind, Engine, EngineError, LegacyEntryKind, PaymentStatus,
    SettlementStatus, TransactionKind, TransactionSource, TransactionStatus, Voucher, VoucherKind,
};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db.clone()).build();
    (engine, db)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn seed_counterparty(engine: &Engine) -> Counterparty {
    engine
        .create_counterparty("Acme Trading", None, CounterpartyKind::Both, None, "alice")
        .await
        .unwrap()
}

async fn seed_sales_voucher(engine: &Engine, cp: &Counterparty, number: &str, total: i64) -> Voucher {
    engine
        .create_voucher(cp.id, VoucherKind::Sales, date(2026, 4, 10), number, total, "alice")
        .await
        .unwrap()
}

#[tokio::test]
async fn two_deposits_settle_a_voucher_and_third_is_rejected() {
    let (engine, _db) = engine_with_db().await;
    let cp = seed_counterparty(&engine).await;
    let voucher = seed_sales_voucher(&engine, &cp, "S-001", 1000).await;

    let first = engine
        .create_transaction(
            cp.id,
            TransactionKind::Deposit,
            TransactionSource::Manual,
            date(2026, 4, 12),
            600,
            None,
            None,
            "alice",
        )
        .await
        .unwrap();
    engine
        .allocate(first.id, voucher.id, 600, None, "alice")
        .await
        .unwrap();

    let summary = engine.voucher(voucher.id).await.unwrap();
    assert_eq!(summary.voucher.settlement_status, SettlementStatus::Settling);
    assert_eq!(summary.available_minor, 400);
    let first = engine.transaction(first.id).await.unwrap();
    assert_eq!(first.status, TransactionStatus::Allocated);
    assert_eq!(first.allocated_minor, 600);

    let second = engine
        .create_transaction(
            cp.id,
            TransactionKind::Deposit,
            TransactionSource::Manual,
            date(2026, 4, 20),
            400,
            None,
            None,
            "alice",
        )
        .await
        .unwrap();
    engine
        .allocate(second.id, voucher.id, 400, None, "alice")
        .await
        .unwrap();

    let summary = engine.voucher(voucher.id).await.unwrap();
    assert_eq!(summary.voucher.settlement_status, SettlementStatus::Settled);
    assert_eq!(summary.available_minor, 0);

    // Voucher is exhausted: any further allocation must bounce.
    let third = engine
        .create_transaction(
            cp.id,
            TransactionKind::Deposit,
            TransactionSource::Manual,
            date(2026, 4, 21),
            50,
            None,
            None,
            "alice",
        )
        .await
        .unwrap();
    let err = engine
        .allocate(third.id, voucher.id, 50, None, "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientBalance(_)));
}

#[tokio::test]
async fn allocation_never_exceeds_transaction_balance() {
    let (engine, _db) = engine_with_db().await;
    let cp = seed_counterparty(&engine).await;
    let v1 = seed_sales_voucher(&engine, &cp, "S-001", 1000).await;
    let v2 = seed_sales_voucher(&engine, &cp, "S-002", 1000).await;

    let tx = engine
        .create_transaction(
            cp.id,
            TransactionKind::Deposit,
            TransactionSource::Manual,
            date(2026, 4, 12),
            500,
            None,
            None,
            "alice",
        )
        .await
        .unwrap();
    engine.allocate(tx.id, v1.id, 300, None, "alice").await.unwrap();

    let err = engine
        .allocate(tx.id, v2.id, 300, None, "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientBalance(_)));

    let tx = engine.transaction(tx.id).await.unwrap();
    assert_eq!(tx.allocated_minor, 300);
    assert_eq!(tx.status, TransactionStatus::Partial);
}

#[tokio::test]
async fn withdrawal_cannot_settle_a_sales_voucher() {
    let (engine, _db) = engine_with_db().await;
    let cp = seed_counterparty(&engine).await;
    let voucher = seed_sales_voucher(&engine, &cp, "S-001", 1000).await;

    let tx = engine
        .create_transaction(
            cp.id,
            TransactionKind::Withdrawal,
            TransactionSource::Manual,
            date(2026, 4, 12),
            500,
            None,
            None,
            "alice",
        )
        .await
        .unwrap();
    let err = engine
        .allocate(tx.id, voucher.id, 500, None, "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
}

#[tokio::test]
async fn auto_allocate_walks_vouchers_oldest_first() {
    let (engine, _db) = engine_with_db().await;
    let cp = seed_counterparty(&engine).await;
    let old = engine
        .create_voucher(cp.id, VoucherKind::Sales, date(2026, 4, 1), "S-OLD", 400, "alice")
        .await
        .unwrap();
    let mid = engine
        .create_voucher(cp.id, VoucherKind::Sales, date(2026, 4, 5), "S-MID", 400, "alice")
        .await
        .unwrap();
    let new = engine
        .create_voucher(cp.id, VoucherKind::Sales, date(2026, 4, 9), "S-NEW", 400, "alice")
        .await
        .unwrap();

    let tx = engine
        .create_transaction(
            cp.id,
            TransactionKind::Deposit,
            TransactionSource::Manual,
            date(2026, 4, 12),
            900,
            None,
            None,
            "alice",
        )
        .await
        .unwrap();
    let allocations = engine
        .auto_allocate(tx.id, &[new.id, old.id, mid.id], "alice")
        .await
        .unwrap();

    assert_eq!(allocations.len(), 3);
    assert_eq!(allocations[0].voucher_id, old.id);
    assert_eq!(allocations[0].amount_minor, 400);
    assert_eq!(allocations[1].voucher_id, mid.id);
    assert_eq!(allocations[1].amount_minor, 400);
    assert_eq!(allocations[2].voucher_id, new.id);
    assert_eq!(allocations[2].amount_minor, 100);

    let tx = engine.transaction(tx.id).await.unwrap();
    assert_eq!(tx.status, TransactionStatus::Allocated);
    assert_eq!(engine.voucher(new.id).await.unwrap().available_minor, 300);
}

#[tokio::test]
async fn auto_allocate_leaves_remainder_partial() {
    let (engine, _db) = engine_with_db().await;
    let cp = seed_counterparty(&engine).await;
    let voucher = seed_sales_voucher(&engine, &cp, "S-001", 300).await;

    let tx = engine
        .create_transaction(
            cp.id,
            TransactionKind::Deposit,
            TransactionSource::Manual,
            date(2026, 4, 12),
            500,
            None,
            None,
            "alice",
        )
        .await
        .unwrap();
    engine.auto_allocate(tx.id, &[voucher.id], "alice").await.unwrap();

    let tx = engine.transaction(tx.id).await.unwrap();
    assert_eq!(tx.allocated_minor, 300);
    assert_eq!(tx.status, TransactionStatus::Partial);
}

#[tokio::test]
async fn deleting_an_allocation_re_derives_both_sides() {
    let (engine, _db) = engine_with_db().await;
    let cp = seed_counterparty(&engine).await;
    let voucher = seed_sales_voucher(&engine, &cp, "S-001", 600).await;

    let tx = engine
        .create_transaction(
            cp.id,
            TransactionKind::Deposit,
            TransactionSource::Manual,
            date(2026, 4, 12),
            600,
            None,
            None,
            "alice",
        )
        .await
        .unwrap();
    let allocation = engine
        .allocate(tx.id, voucher.id, 600, None, "alice")
        .await
        .unwrap();
    assert_eq!(
        engine.voucher(voucher.id).await.unwrap().voucher.settlement_status,
        SettlementStatus::Settled
    );

    engine.delete_allocation(allocation.id, "alice").await.unwrap();

    let tx = engine.transaction(tx.id).await.unwrap();
    assert_eq!(tx.allocated_minor, 0);
    assert_eq!(tx.status, TransactionStatus::Pending);
    let summary = engine.voucher(voucher.id).await.unwrap();
    assert_eq!(summary.voucher.settlement_status, SettlementStatus::Open);
    assert_eq!(summary.available_minor, 600);
}

#[tokio::test]
async fn cancel_requires_allocations_reversed_first() {
    let (engine, _db) = engine_with_db().await;
    let cp = seed_counterparty(&engine).await;
    let voucher = seed_sales_voucher(&engine, &cp, "S-001", 600).await;

    let tx = engine
        .create_transaction(
            cp.id,
            TransactionKind::Deposit,
            TransactionSource::Manual,
            date(2026, 4, 12),
            600,
            None,
            None,
            "alice",
        )
        .await
        .unwrap();
    let allocation = engine
        .allocate(tx.id, voucher.id, 600, None, "alice")
        .await
        .unwrap();

    let err = engine.cancel_transaction(tx.id, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));

    engine.delete_allocation(allocation.id, "alice").await.unwrap();
    engine.cancel_transaction(tx.id, "alice").await.unwrap();

    let tx = engine.transaction(tx.id).await.unwrap();
    assert_eq!(tx.status, TransactionStatus::Cancelled);
    assert_eq!(tx.allocated_minor, 0);

    let err = engine.cancel_transaction(tx.id, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
}

#[tokio::test]
async fn legacy_entries_count_toward_applied_balance() {
    let (engine, _db) = engine_with_db().await;
    let cp = seed_counterparty(&engine).await;
    let voucher = seed_sales_voucher(&engine, &cp, "S-001", 1000).await;

    engine
        .record_legacy_entry(
            voucher.id,
            LegacyEntryKind::Receipt,
            date(2026, 4, 11),
            400,
            Some("carried over"),
            "alice",
        )
        .await
        .unwrap();
    let summary = engine.voucher(voucher.id).await.unwrap();
    assert_eq!(summary.applied_minor, 400);
    assert_eq!(summary.voucher.settlement_status, SettlementStatus::Settling);

    let tx = engine
        .create_transaction(
            cp.id,
            TransactionKind::Deposit,
            TransactionSource::Manual,
            date(2026, 4, 12),
            700,
            None,
            None,
            "alice",
        )
        .await
        .unwrap();
    let err = engine
        .allocate(tx.id, voucher.id, 700, None, "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientBalance(_)));

    engine.allocate(tx.id, voucher.id, 600, None, "alice").await.unwrap();
    let summary = engine.voucher(voucher.id).await.unwrap();
    assert_eq!(summary.voucher.settlement_status, SettlementStatus::Settled);
    assert_eq!(summary.voucher.payment_status, PaymentStatus::Unpaid);
}

#[tokio::test]
async fn payment_entry_rejected_on_sales_voucher() {
    let (engine, _db) = engine_with_db().await;
    let cp = seed_counterparty(&engine).await;
    let voucher = seed_sales_voucher(&engine, &cp, "S-001", 1000).await;

    let err = engine
        .record_legacy_entry(
            voucher.id,
            LegacyEntryKind::Payment,
            date(2026, 4, 11),
            400,
            None,
            "alice",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
}

#[tokio::test]
async fn every_mutation_leaves_an_audit_row() {
    let (engine, db) = engine_with_db().await;
    let cp = seed_counterparty(&engine).await;
    let voucher = seed_sales_voucher(&engine, &cp, "S-001", 600).await;

    let tx = engine
        .create_transaction(
            cp.id,
            TransactionKind::Deposit,
            TransactionSource::Manual,
            date(2026, 4, 12),
            600,
            None,
            None,
            "alice",
        )
        .await
        .unwrap();
    let allocation = engine
        .allocate(tx.id, voucher.id, 600, None, "alice")
        .await
        .unwrap();
    engine.delete_allocation(allocation.id, "alice").await.unwrap();

    let backend = db.get_database_backend();
    for action in [
        "voucher.create",
        "transaction.create",
        "allocation.create",
        "allocation.delete",
    ] {
        let row = db
            .query_one(Statement::from_sql_and_values(
                backend,
                "SELECT COUNT(*) AS n FROM audit_logs WHERE action = ? AND actor = ?",
                vec![action.into(), "alice".into()],
            ))
            .await
            .unwrap()
            .unwrap();
        let n: i64 = row.try_get("", "n").unwrap();
        assert_eq!(n, 1, "expected one audit row for {action}");
    }
}

#[tokio::test]
async fn auto_allocate_passes_over_ineligible_targets() {
    let (engine, _db) = engine_with_db().await;
    let cp = seed_counterparty(&engine).await;
    let in_locked_month = engine
        .create_voucher(cp.id, VoucherKind::Sales, date(2026, 5, 10), "S-MAY", 400, "alice")
        .await
        .unwrap();
    let already_paired = seed_sales_voucher(&engine, &cp, "S-DONE", 400).await;
    let open_target = seed_sales_voucher(&engine, &cp, "S-OPEN", 400).await;

    let tx = engine
        .create_transaction(
            cp.id,
            TransactionKind::Deposit,
            TransactionSource::Manual,
            date(2026, 4, 12),
            1000,
            None,
            None,
            "alice",
        )
        .await
        .unwrap();
    engine.allocate(tx.id, already_paired.id, 100, None, "alice").await.unwrap();

    // Lock May, then free the voucher axis so only the month stands in the way.
    engine.lock_period("2026-05", "alice").await.unwrap();
    engine.unlock_voucher(in_locked_month.id, "alice").await.unwrap();

    let allocations = engine
        .auto_allocate(
            tx.id,
            &[in_locked_month.id, already_paired.id, open_target.id],
            "alice",
        )
        .await
        .unwrap();

    assert_eq!(allocations.len(), 1);
    assert_eq!(allocations[0].voucher_id, open_target.id);
    assert_eq!(allocations[0].amount_minor, 400);

    let tx = engine.transaction(tx.id).await.unwrap();
    assert_eq!(tx.allocated_minor, 500);
    assert_eq!(tx.status, TransactionStatus::Partial);
}
