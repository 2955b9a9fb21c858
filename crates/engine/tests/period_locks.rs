use chrono::NaiveDate;
use sea_orm::{Database, DatabaseConnection};

use engine::{
    Counterparty, CounterpartyKind, Engine, EngineError, PaymentStatus, PeriodState,
    SettlementStatus, TransactionKind, TransactionSource, Voucher, VoucherKind,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db.clone()).build();
    (engine, db)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn seed(engine: &Engine) -> (Counterparty, Voucher) {
    let cp = engine
        .create_counterparty("Acme Trading", None, CounterpartyKind::Both, None, "alice")
        .await
        .unwrap();
    let voucher = engine
        .create_voucher(cp.id, VoucherKind::Sales, date(2026, 5, 10), "S-001", 1000, "alice")
        .await
        .unwrap();
    (cp, voucher)
}

#[tokio::test]
async fn locking_a_month_freezes_its_vouchers() {
    let (engine, _db) = engine_with_db().await;
    let (cp, voucher) = seed(&engine).await;

    let lock = engine.lock_period("2026-05", "alice").await.unwrap();
    assert_eq!(lock.state, PeriodState::Locked);
    assert_eq!(lock.locked_voucher_count, 1);

    let summary = engine.voucher(voucher.id).await.unwrap();
    assert_eq!(summary.voucher.settlement_status, SettlementStatus::Locked);
    assert_eq!(summary.voucher.payment_status, PaymentStatus::Locked);

    // No new vouchers inside the closed month.
    let err = engine
        .create_voucher(cp.id, VoucherKind::Sales, date(2026, 5, 20), "S-002", 500, "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));

    // No allocations against a frozen voucher.
    let tx = engine
        .create_transaction(
            cp.id,
            TransactionKind::Deposit,
            TransactionSource::Manual,
            date(2026, 6, 1),
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
    assert!(matches!(err, EngineError::StateConflict(_)));

    // Other months are unaffected.
    engine
        .create_voucher(cp.id, VoucherKind::Sales, date(2026, 6, 2), "S-003", 500, "alice")
        .await
        .unwrap();
}

#[tokio::test]
async fn month_lock_is_idempotent() {
    let (engine, _db) = engine_with_db().await;
    let (_cp, _voucher) = seed(&engine).await;

    let first = engine.lock_period("2026-05", "alice").await.unwrap();
    let second = engine.lock_period("2026-05", "bob").await.unwrap();
    assert_eq!(second.locked_by.as_deref(), Some("alice"));
    assert_eq!(first.id, second.id);

    let unlocked = engine.unlock_period("2026-05", "alice").await.unwrap();
    assert_eq!(unlocked.state, PeriodState::Open);
    let again = engine.unlock_period("2026-05", "alice").await.unwrap();
    assert_eq!(again.state, PeriodState::Open);
}

#[tokio::test]
async fn unlock_resets_to_zero_state_not_history() {
    let (engine, _db) = engine_with_db().await;
    let (cp, voucher) = seed(&engine).await;

    // Fully settle the voucher, then close the month.
    let tx = engine
        .create_transaction(
            cp.id,
            TransactionKind::Deposit,
            TransactionSource::Manual,
            date(2026, 5, 12),
            1000,
            None,
            None,
            "alice",
        )
        .await
        .unwrap();
    engine.allocate(tx.id, voucher.id, 1000, None, "alice").await.unwrap();
    engine.lock_period("2026-05", "alice").await.unwrap();
    engine.unlock_period("2026-05", "alice").await.unwrap();

    // Statuses go back to the literal zero-state even though the voucher
    // is fully applied; the applied sum itself is untouched.
    let summary = engine.voucher(voucher.id).await.unwrap();
    assert_eq!(summary.voucher.settlement_status, SettlementStatus::Open);
    assert_eq!(summary.voucher.payment_status, PaymentStatus::Unpaid);
    assert_eq!(summary.applied_minor, 1000);
    assert_eq!(summary.available_minor, 0);
}

#[tokio::test]
async fn relock_after_unlock_counts_the_same_vouchers() {
    let (engine, _db) = engine_with_db().await;
    let (_cp, _voucher) = seed(&engine).await;

    let lock = engine.lock_period("2026-05", "alice").await.unwrap();
    assert_eq!(lock.locked_voucher_count, 1);
    engine.unlock_period("2026-05", "alice").await.unwrap();
    let relock = engine.lock_period("2026-05", "alice").await.unwrap();
    assert_eq!(relock.locked_voucher_count, 1);
    assert_eq!(relock.state, PeriodState::Locked);
}

#[tokio::test]
async fn single_voucher_lock_is_strict() {
    let (engine, _db) = engine_with_db().await;
    let (_cp, voucher) = seed(&engine).await;

    engine.lock_voucher(voucher.id, "alice").await.unwrap();
    let err = engine.lock_voucher(voucher.id, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));

    engine.unlock_voucher(voucher.id, "alice").await.unwrap();
    let err = engine.unlock_voucher(voucher.id, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
}

#[tokio::test]
async fn batch_lock_skips_instead_of_failing() {
    let (engine, _db) = engine_with_db().await;
    let (cp, locked) = seed(&engine).await;
    let fresh = engine
        .create_voucher(cp.id, VoucherKind::Sales, date(2026, 5, 11), "S-002", 500, "alice")
        .await
        .unwrap();
    engine.lock_voucher(locked.id, "alice").await.unwrap();

    let outcome = engine
        .lock_vouchers(&[locked.id, fresh.id, Uuid::new_v4()], "alice")
        .await
        .unwrap();
    assert_eq!(outcome.success_count, 1);
    assert_eq!(outcome.skipped_count, 2);
    assert!(outcome.errors.is_empty());

    let outcome = engine
        .unlock_vouchers(&[locked.id, fresh.id], "alice")
        .await
        .unwrap();
    assert_eq!(outcome.success_count, 2);
    assert_eq!(outcome.skipped_count, 0);
}

#[tokio::test]
async fn voucher_unlock_alone_does_not_reopen_the_month() {
    let (engine, _db) = engine_with_db().await;
    let (cp, voucher) = seed(&engine).await;

    engine.lock_period("2026-05", "alice").await.unwrap();
    engine.unlock_voucher(voucher.id, "alice").await.unwrap();

    // The voucher itself is mutable again, but its trade date still sits
    // in a locked month, so allocation stays blocked.
    let tx = engine
        .create_transaction(
            cp.id,
            TransactionKind::Deposit,
            TransactionSource::Manual,
            date(2026, 6, 1),
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
    assert!(matches!(err, EngineError::StateConflict(_)));

    engine.unlock_period("2026-05", "alice").await.unwrap();
    engine.allocate(tx.id, voucher.id, 500, None, "alice").await.unwrap();
}

#[tokio::test]
async fn adjustment_voucher_carries_delta_for_locked_original() {
    let (engine, _db) = engine_with_db().await;
    let (cp, original) = seed(&engine).await;
    engine.lock_period("2026-05", "alice").await.unwrap();

    // The original is frozen, but a dated-outside adjustment against it
    // starts in the zero-state and accepts money.
    let adjustment = engine
        .create_adjustment_voucher(original.id, date(2026, 6, 3), "S-001-ADJ", 200, "alice")
        .await
        .unwrap();
    assert!(adjustment.is_adjustment);
    assert_eq!(adjustment.original_voucher_id, Some(original.id));
    assert_eq!(adjustment.settlement_status, SettlementStatus::Open);

    let tx = engine
        .create_transaction(
            cp.id,
            TransactionKind::Deposit,
            TransactionSource::Manual,
            date(2026, 6, 5),
            200,
            None,
            None,
            "alice",
        )
        .await
        .unwrap();
    engine.allocate(tx.id, adjustment.id, 200, None, "alice").await.unwrap();
    assert_eq!(
        engine.voucher(adjustment.id).await.unwrap().voucher.settlement_status,
        SettlementStatus::Settled
    );
}

#[tokio::test]
async fn unlocking_a_never_locked_month_is_a_no_op() {
    let (engine, _db) = engine_with_db().await;

    let lock = engine.unlock_period("2026-05", "alice").await.unwrap();
    assert_eq!(lock.state, PeriodState::Open);
    assert_eq!(lock.locked_voucher_count, 0);
    assert_eq!(lock.locked_by, None);

    // No row was materialised for the month.
    let err = engine.period_lock("2026-05").await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}
