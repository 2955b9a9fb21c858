use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    BankImportStatus, CounterpartyKind, Engine, EngineError, LineStatus, ParsedRow,
    TransactionKind, TransactionSource,
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

fn supplier_row() -> ParsedRow {
    ParsedRow {
        date: Some(date(2026, 3, 1)),
        description: "supplier X".to_string(),
        amount_minor: -500,
        balance_minor: Some(120_000),
        counterparty_name: Some("supplier X".to_string()),
        reference: Some("REF1".to_string()),
    }
}

#[tokio::test]
async fn alias_match_confirm_and_duplicate_reimport() {
    let (engine, _db) = engine_with_db().await;
    let cp = engine
        .create_counterparty("Y Industries", None, CounterpartyKind::Seller, None, "alice")
        .await
        .unwrap();
    engine.add_alias(cp.id, "supplier X", "alice").await.unwrap();

    let job = engine
        .register_bank_import("statement-march.xlsx", "hash-1", "alice")
        .await
        .unwrap();
    let job = engine.ingest_rows(job.id, &[supplier_row()], "alice").await.unwrap();
    assert_eq!(job.status, BankImportStatus::Parsed);
    assert_eq!(job.total_lines, 1);

    let job = engine.auto_match_import(job.id, "alice").await.unwrap();
    assert_eq!(job.status, BankImportStatus::Reviewing);
    assert_eq!(job.matched_lines, 1);
    let line = &engine.bank_import_lines(job.id, None).await.unwrap()[0];
    assert_eq!(line.status, LineStatus::Matched);
    assert_eq!(line.counterparty_id, Some(cp.id));
    assert_eq!(line.match_confidence, 100);

    let job = engine.confirm_import(job.id, "alice").await.unwrap();
    assert_eq!(job.status, BankImportStatus::Confirmed);
    assert_eq!(job.confirmed_lines, 1);

    let line = &engine.bank_import_lines(job.id, None).await.unwrap()[0];
    assert_eq!(line.status, LineStatus::Confirmed);
    let tx = engine.transaction(line.transaction_id.unwrap()).await.unwrap();
    assert_eq!(tx.kind, TransactionKind::Withdrawal);
    assert_eq!(tx.amount_minor, 500);
    assert_eq!(tx.source, TransactionSource::BankImport);
    assert_eq!(tx.bank_reference.as_deref(), Some("REF1"));

    // Same bytes again: whole-file hash blocks the upload outright.
    let err = engine
        .register_bank_import("statement-march.xlsx", "hash-1", "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    // Same row inside a different file: flagged duplicate, never
    // confirmable, no second transaction.
    let second = engine
        .register_bank_import("statement-march-copy.xlsx", "hash-2", "alice")
        .await
        .unwrap();
    let second = engine.ingest_rows(second.id, &[supplier_row()], "alice").await.unwrap();
    let line = &engine.bank_import_lines(second.id, None).await.unwrap()[0];
    assert_eq!(line.status, LineStatus::Duplicate);

    let second = engine.auto_match_import(second.id, "alice").await.unwrap();
    assert_eq!(second.matched_lines, 0);
    let second = engine.confirm_import(second.id, "alice").await.unwrap();
    assert_eq!(second.confirmed_lines, 0);

    let all = engine.list_transactions(&Default::default()).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn undated_and_zero_amount_rows_are_dropped() {
    let (engine, _db) = engine_with_db().await;
    let job = engine
        .register_bank_import("statement.xlsx", "hash-1", "alice")
        .await
        .unwrap();

    let rows = vec![
        ParsedRow {
            date: None,
            description: "header garbage".to_string(),
            amount_minor: 100,
            balance_minor: None,
            counterparty_name: None,
            reference: None,
        },
        ParsedRow {
            date: Some(date(2026, 3, 2)),
            description: "carried balance".to_string(),
            amount_minor: 0,
            balance_minor: Some(1000),
            counterparty_name: None,
            reference: None,
        },
        ParsedRow {
            date: Some(date(2026, 3, 3)),
            description: "real движение".to_string(),
            amount_minor: 250,
            balance_minor: None,
            counterparty_name: None,
            reference: None,
        },
    ];
    let job = engine.ingest_rows(job.id, &rows, "alice").await.unwrap();
    assert_eq!(job.total_lines, 1);
    let lines = engine.bank_import_lines(job.id, None).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].amount_minor, 250);
}

#[tokio::test]
async fn match_precedence_exact_name_then_substring() {
    let (engine, _db) = engine_with_db().await;
    let exact = engine
        .create_counterparty("Acme Trading", None, CounterpartyKind::Both, None, "alice")
        .await
        .unwrap();
    engine
        .create_counterparty("Bravo Logistics", None, CounterpartyKind::Both, None, "alice")
        .await
        .unwrap();

    let job = engine
        .register_bank_import("statement.xlsx", "hash-1", "alice")
        .await
        .unwrap();
    let rows = vec![
        ParsedRow {
            date: Some(date(2026, 3, 1)),
            description: "wire".to_string(),
            amount_minor: 100,
            balance_minor: None,
            counterparty_name: Some("ACME TRADING".to_string()),
            reference: None,
        },
        ParsedRow {
            date: Some(date(2026, 3, 2)),
            description: "wire".to_string(),
            amount_minor: 200,
            balance_minor: None,
            counterparty_name: Some("Bravo Logistics GmbH payment".to_string()),
            reference: None,
        },
        ParsedRow {
            date: Some(date(2026, 3, 3)),
            description: "wire".to_string(),
            amount_minor: 300,
            balance_minor: None,
            counterparty_name: Some("completely unknown".to_string()),
            reference: None,
        },
    ];
    engine.ingest_rows(job.id, &rows, "alice").await.unwrap();
    engine.auto_match_import(job.id, "alice").await.unwrap();

    let lines = engine.bank_import_lines(job.id, None).await.unwrap();
    assert_eq!(lines[0].status, LineStatus::Matched);
    assert_eq!(lines[0].counterparty_id, Some(exact.id));
    assert_eq!(lines[0].match_confidence, 100);
    assert_eq!(lines[1].status, LineStatus::Matched);
    assert_eq!(lines[1].match_confidence, 70);
    assert_eq!(lines[2].status, LineStatus::Unmatched);
}

#[tokio::test]
async fn inactive_counterparties_never_auto_match() {
    let (engine, _db) = engine_with_db().await;
    let cp = engine
        .create_counterparty("Ghost Corp", None, CounterpartyKind::Both, None, "alice")
        .await
        .unwrap();
    engine.deactivate_counterparty(cp.id, "alice").await.unwrap();

    let job = engine
        .register_bank_import("statement.xlsx", "hash-1", "alice")
        .await
        .unwrap();
    engine
        .ingest_rows(
            job.id,
            &[ParsedRow {
                date: Some(date(2026, 3, 1)),
                description: "wire".to_string(),
                amount_minor: 100,
                balance_minor: None,
                counterparty_name: Some("Ghost Corp".to_string()),
                reference: None,
            }],
            "alice",
        )
        .await
        .unwrap();
    engine.auto_match_import(job.id, "alice").await.unwrap();

    let lines = engine.bank_import_lines(job.id, None).await.unwrap();
    assert_eq!(lines[0].status, LineStatus::Unmatched);
}

#[tokio::test]
async fn manual_override_and_exclusion() {
    let (engine, _db) = engine_with_db().await;
    let cp = engine
        .create_counterparty("Acme Trading", None, CounterpartyKind::Both, None, "alice")
        .await
        .unwrap();

    let job = engine
        .register_bank_import("statement.xlsx", "hash-1", "alice")
        .await
        .unwrap();
    engine
        .ingest_rows(
            job.id,
            &[
                ParsedRow {
                    date: Some(date(2026, 3, 1)),
                    description: "opaque wire".to_string(),
                    amount_minor: 900,
                    balance_minor: None,
                    counterparty_name: None,
                    reference: None,
                },
                ParsedRow {
                    date: Some(date(2026, 3, 2)),
                    description: "bank fee".to_string(),
                    amount_minor: -30,
                    balance_minor: None,
                    counterparty_name: None,
                    reference: None,
                },
            ],
            "alice",
        )
        .await
        .unwrap();

    let lines = engine.bank_import_lines(job.id, None).await.unwrap();
    let pinned = engine.match_line(lines[0].id, cp.id, "alice").await.unwrap();
    assert_eq!(pinned.status, LineStatus::Matched);
    assert_eq!(pinned.match_confidence, 100);

    engine.exclude_line(lines[1].id, "alice").await.unwrap();
    assert_eq!(engine.bank_import(job.id).await.unwrap().matched_lines, 1);

    let job = engine.confirm_import(job.id, "alice").await.unwrap();
    assert_eq!(job.confirmed_lines, 1);
    let tx = engine.list_transactions(&Default::default()).await.unwrap();
    assert_eq!(tx.len(), 1);
    assert_eq!(tx[0].kind, TransactionKind::Deposit);
    assert_eq!(tx[0].amount_minor, 900);
}

#[tokio::test]
async fn confirm_and_delete_are_single_shot() {
    let (engine, _db) = engine_with_db().await;
    let cp = engine
        .create_counterparty("Acme Trading", None, CounterpartyKind::Both, None, "alice")
        .await
        .unwrap();

    let deletable = engine
        .register_bank_import("a.xlsx", "hash-a", "alice")
        .await
        .unwrap();
    engine.ingest_rows(deletable.id, &[supplier_row()], "alice").await.unwrap();
    engine.delete_bank_import(deletable.id, "alice").await.unwrap();
    let err = engine.bank_import(deletable.id).await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let job = engine
        .register_bank_import("b.xlsx", "hash-b", "alice")
        .await
        .unwrap();
    engine.ingest_rows(job.id, &[supplier_row()], "alice").await.unwrap();
    let lines = engine.bank_import_lines(job.id, None).await.unwrap();
    engine.match_line(lines[0].id, cp.id, "alice").await.unwrap();
    engine.confirm_import(job.id, "alice").await.unwrap();

    let err = engine.confirm_import(job.id, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
    let err = engine.delete_bank_import(job.id, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
}

#[tokio::test]
async fn failed_job_can_be_retried_by_reingesting() {
    let (engine, _db) = engine_with_db().await;
    let job = engine
        .register_bank_import("statement.xlsx", "hash-1", "alice")
        .await
        .unwrap();

    let failed = engine
        .mark_import_failed(job.id, "worker choked on sheet 2", "alice")
        .await
        .unwrap();
    assert_eq!(failed.status, BankImportStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("worker choked on sheet 2"));

    let job = engine.ingest_rows(job.id, &[supplier_row()], "alice").await.unwrap();
    assert_eq!(job.status, BankImportStatus::Parsed);
    assert_eq!(job.error, None);
}

#[tokio::test]
async fn counterparty_and_line_mutations_are_audited() {
    let (engine, db) = engine_with_db().await;
    let cp = engine
        .create_counterparty("Acme Trading", None, CounterpartyKind::Both, None, "alice")
        .await
        .unwrap();
    let alias = engine.add_alias(cp.id, "acme gmbh", "alice").await.unwrap();
    engine.remove_alias(alias.id, "alice").await.unwrap();

    let job = engine
        .register_bank_import("statement.xlsx", "hash-1", "alice")
        .await
        .unwrap();
    let rows = [
        ParsedRow {
            date: Some(date(2026, 3, 1)),
            description: "opaque wire".to_string(),
            amount_minor: 900,
            balance_minor: None,
            counterparty_name: None,
            reference: None,
        },
        ParsedRow {
            date: Some(date(2026, 3, 2)),
            description: "another wire".to_string(),
            amount_minor: -400,
            balance_minor: None,
            counterparty_name: None,
            reference: None,
        },
    ];
    engine.ingest_rows(job.id, &rows, "alice").await.unwrap();
    let lines = engine.bank_import_lines(job.id, None).await.unwrap();
    engine.match_line(lines[0].id, cp.id, "alice").await.unwrap();
    engine.exclude_line(lines[1].id, "alice").await.unwrap();
    engine.delete_bank_import(job.id, "alice").await.unwrap();
    engine.deactivate_counterparty(cp.id, "alice").await.unwrap();

    let backend = db.get_database_backend();
    for action in [
        "counterparty.create",
        "counterparty.deactivate",
        "alias.add",
        "alias.remove",
        "bank_import.ingest",
        "bank_import.line_match",
        "bank_import.line_exclude",
        "bank_import.delete",
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
