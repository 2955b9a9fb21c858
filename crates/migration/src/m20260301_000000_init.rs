//! Initial schema migration - creates all tables from scratch.
//!
//! Complete reconciliation schema:
//!
//! - `counterparties`: trading partners with a normalized match name
//! - `counterparty_aliases`: extra statement spellings, globally unique
//! - `vouchers`: AR/AP documents with derived settlement/payment status
//! - `transactions`: deposit/withdrawal money events per counterparty
//! - `allocations`: transaction-to-voucher links
//! - `nettings` / `netting_links`: set-off drafts and their vouchers
//! - `bank_import_jobs` / `bank_import_lines`: statement import pipeline
//! - `period_locks`: month-level close state
//! - `legacy_entries`: old single-entry receipts/payments
//! - `audit_logs`: before/after snapshots of every mutation

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Counterparties {
    Table,
    Id,
    Name,
    NameNorm,
    Code,
    Kind,
    Branch,
    Active,
}

#[derive(Iden)]
enum CounterpartyAliases {
    Table,
    Id,
    CounterpartyId,
    Alias,
    AliasNorm,
}

#[derive(Iden)]
enum Vouchers {
    Table,
    Id,
    CounterpartyId,
    Kind,
    TradeDate,
    VoucherNumber,
    TotalMinor,
    SettlementStatus,
    PaymentStatus,
    IsAdjustment,
    OriginalVoucherId,
    CreatedBy,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    CounterpartyId,
    Kind,
    Source,
    Status,
    OccurredOn,
    AmountMinor,
    AllocatedMinor,
    BankReference,
    Memo,
    CreatedBy,
}

#[derive(Iden)]
enum Allocations {
    Table,
    Id,
    TransactionId,
    VoucherId,
    AmountMinor,
    AllocationOrder,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum Nettings {
    Table,
    Id,
    CounterpartyId,
    NettingDate,
    AmountMinor,
    Status,
    Memo,
    DepositTransactionId,
    WithdrawalTransactionId,
    CreatedBy,
}

#[derive(Iden)]
enum NettingLinks {
    Table,
    Id,
    NettingId,
    VoucherId,
    AmountMinor,
}

#[derive(Iden)]
enum BankImportJobs {
    Table,
    Id,
    FileName,
    FileHash,
    Status,
    TotalLines,
    MatchedLines,
    ConfirmedLines,
    Error,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum BankImportLines {
    Table,
    Id,
    JobId,
    LineNo,
    OccurredOn,
    Description,
    AmountMinor,
    BalanceMinor,
    CounterpartyName,
    BankReference,
    DuplicateKey,
    Status,
    CounterpartyId,
    MatchConfidence,
    TransactionId,
}

#[derive(Iden)]
enum PeriodLocks {
    Table,
    Id,
    YearMonth,
    State,
    LockedVoucherCount,
    LockedBy,
    LockedAt,
    UnlockedBy,
    UnlockedAt,
}

#[derive(Iden)]
enum LegacyEntries {
    Table,
    Id,
    VoucherId,
    Kind,
    EntryDate,
    AmountMinor,
    Memo,
    CreatedBy,
}

#[derive(Iden)]
enum AuditLogs {
    Table,
    Id,
    Actor,
    Action,
    TargetType,
    TargetId,
    Before,
    After,
    CreatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Counterparties + aliases
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Counterparties::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Counterparties::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Counterparties::Name).string().not_null())
                    .col(ColumnDef::new(Counterparties::NameNorm).string().not_null())
                    .col(ColumnDef::new(Counterparties::Code).string())
                    .col(ColumnDef::new(Counterparties::Kind).string().not_null())
                    .col(ColumnDef::new(Counterparties::Branch).string())
                    .col(ColumnDef::new(Counterparties::Active).boolean().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-counterparties-name_norm-unique")
                    .table(Counterparties::Table)
                    .col(Counterparties::NameNorm)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CounterpartyAliases::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CounterpartyAliases::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CounterpartyAliases::CounterpartyId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CounterpartyAliases::Alias).string().not_null())
                    .col(
                        ColumnDef::new(CounterpartyAliases::AliasNorm)
                            .string()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-counterparty_aliases-counterparty_id")
                            .from(CounterpartyAliases::Table, CounterpartyAliases::CounterpartyId)
                            .to(Counterparties::Table, Counterparties::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-counterparty_aliases-alias_norm-unique")
                    .table(CounterpartyAliases::Table)
                    .col(CounterpartyAliases::AliasNorm)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Vouchers
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Vouchers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Vouchers::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Vouchers::CounterpartyId).string().not_null())
                    .col(ColumnDef::new(Vouchers::Kind).string().not_null())
                    .col(ColumnDef::new(Vouchers::TradeDate).date().not_null())
                    .col(ColumnDef::new(Vouchers::VoucherNumber).string().not_null())
                    .col(ColumnDef::new(Vouchers::TotalMinor).big_integer().not_null())
                    .col(
                        ColumnDef::new(Vouchers::SettlementStatus)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Vouchers::PaymentStatus).string().not_null())
                    .col(ColumnDef::new(Vouchers::IsAdjustment).boolean().not_null())
                    .col(ColumnDef::new(Vouchers::OriginalVoucherId).string())
                    .col(ColumnDef::new(Vouchers::CreatedBy).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-vouchers-counterparty_id")
                            .from(Vouchers::Table, Vouchers::CounterpartyId)
                            .to(Counterparties::Table, Counterparties::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-vouchers-identity-unique")
                    .table(Vouchers::Table)
                    .col(Vouchers::CounterpartyId)
                    .col(Vouchers::TradeDate)
                    .col(Vouchers::VoucherNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Transactions::CounterpartyId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Kind).string().not_null())
                    .col(ColumnDef::new(Transactions::Source).string().not_null())
                    .col(ColumnDef::new(Transactions::Status).string().not_null())
                    .col(ColumnDef::new(Transactions::OccurredOn).date().not_null())
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::AllocatedMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::BankReference).string())
                    .col(ColumnDef::new(Transactions::Memo).string())
                    .col(ColumnDef::new(Transactions::CreatedBy).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-counterparty_id")
                            .from(Transactions::Table, Transactions::CounterpartyId)
                            .to(Counterparties::Table, Counterparties::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-bank_reference-unique")
                    .table(Transactions::Table)
                    .col(Transactions::BankReference)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-counterparty_id-occurred_on")
                    .table(Transactions::Table)
                    .col(Transactions::CounterpartyId)
                    .col(Transactions::OccurredOn)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Allocations
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Allocations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Allocations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Allocations::TransactionId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Allocations::VoucherId).string().not_null())
                    .col(
                        ColumnDef::new(Allocations::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Allocations::AllocationOrder)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Allocations::CreatedBy).string().not_null())
                    .col(ColumnDef::new(Allocations::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-allocations-transaction_id")
                            .from(Allocations::Table, Allocations::TransactionId)
                            .to(Transactions::Table, Transactions::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-allocations-voucher_id")
                            .from(Allocations::Table, Allocations::VoucherId)
                            .to(Vouchers::Table, Vouchers::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-allocations-transaction_id-voucher_id-unique")
                    .table(Allocations::Table)
                    .col(Allocations::TransactionId)
                    .col(Allocations::VoucherId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Nettings + links
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Nettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Nettings::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Nettings::CounterpartyId).string().not_null())
                    .col(ColumnDef::new(Nettings::NettingDate).date().not_null())
                    .col(ColumnDef::new(Nettings::AmountMinor).big_integer().not_null())
                    .col(ColumnDef::new(Nettings::Status).string().not_null())
                    .col(ColumnDef::new(Nettings::Memo).string())
                    .col(ColumnDef::new(Nettings::DepositTransactionId).string())
                    .col(ColumnDef::new(Nettings::WithdrawalTransactionId).string())
                    .col(ColumnDef::new(Nettings::CreatedBy).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-nettings-counterparty_id")
                            .from(Nettings::Table, Nettings::CounterpartyId)
                            .to(Counterparties::Table, Counterparties::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NettingLinks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NettingLinks::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(NettingLinks::NettingId).string().not_null())
                    .col(ColumnDef::new(NettingLinks::VoucherId).string().not_null())
                    .col(
                        ColumnDef::new(NettingLinks::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-netting_links-netting_id")
                            .from(NettingLinks::Table, NettingLinks::NettingId)
                            .to(Nettings::Table, Nettings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-netting_links-voucher_id")
                            .from(NettingLinks::Table, NettingLinks::VoucherId)
                            .to(Vouchers::Table, Vouchers::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-netting_links-netting_id-voucher_id-unique")
                    .table(NettingLinks::Table)
                    .col(NettingLinks::NettingId)
                    .col(NettingLinks::VoucherId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Bank import jobs + lines
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(BankImportJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BankImportJobs::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BankImportJobs::FileName).string().not_null())
                    .col(ColumnDef::new(BankImportJobs::FileHash).string().not_null())
                    .col(ColumnDef::new(BankImportJobs::Status).string().not_null())
                    .col(
                        ColumnDef::new(BankImportJobs::TotalLines)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BankImportJobs::MatchedLines)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BankImportJobs::ConfirmedLines)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BankImportJobs::Error).string())
                    .col(ColumnDef::new(BankImportJobs::CreatedBy).string().not_null())
                    .col(
                        ColumnDef::new(BankImportJobs::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-bank_import_jobs-file_hash-unique")
                    .table(BankImportJobs::Table)
                    .col(BankImportJobs::FileHash)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BankImportLines::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BankImportLines::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BankImportLines::JobId).string().not_null())
                    .col(ColumnDef::new(BankImportLines::LineNo).integer().not_null())
                    .col(ColumnDef::new(BankImportLines::OccurredOn).date().not_null())
                    .col(
                        ColumnDef::new(BankImportLines::Description)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BankImportLines::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BankImportLines::BalanceMinor).big_integer())
                    .col(ColumnDef::new(BankImportLines::CounterpartyName).string())
                    .col(ColumnDef::new(BankImportLines::BankReference).string())
                    .col(
                        ColumnDef::new(BankImportLines::DuplicateKey)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BankImportLines::Status).string().not_null())
                    .col(ColumnDef::new(BankImportLines::CounterpartyId).string())
                    .col(
                        ColumnDef::new(BankImportLines::MatchConfidence)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BankImportLines::TransactionId).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bank_import_lines-job_id")
                            .from(BankImportLines::Table, BankImportLines::JobId)
                            .to(BankImportJobs::Table, BankImportJobs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Advisory, deliberately non-unique: duplicates are flagged, not rejected.
        manager
            .create_index(
                Index::create()
                    .name("idx-bank_import_lines-duplicate_key")
                    .table(BankImportLines::Table)
                    .col(BankImportLines::DuplicateKey)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 7. Period locks
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(PeriodLocks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PeriodLocks::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PeriodLocks::YearMonth).string().not_null())
                    .col(ColumnDef::new(PeriodLocks::State).string().not_null())
                    .col(
                        ColumnDef::new(PeriodLocks::LockedVoucherCount)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PeriodLocks::LockedBy).string())
                    .col(ColumnDef::new(PeriodLocks::LockedAt).timestamp())
                    .col(ColumnDef::new(PeriodLocks::UnlockedBy).string())
                    .col(ColumnDef::new(PeriodLocks::UnlockedAt).timestamp())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-period_locks-year_month-unique")
                    .table(PeriodLocks::Table)
                    .col(PeriodLocks::YearMonth)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 8. Legacy entries
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(LegacyEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LegacyEntries::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LegacyEntries::VoucherId).string().not_null())
                    .col(ColumnDef::new(LegacyEntries::Kind).string().not_null())
                    .col(ColumnDef::new(LegacyEntries::EntryDate).date().not_null())
                    .col(
                        ColumnDef::new(LegacyEntries::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LegacyEntries::Memo).string())
                    .col(ColumnDef::new(LegacyEntries::CreatedBy).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-legacy_entries-voucher_id")
                            .from(LegacyEntries::Table, LegacyEntries::VoucherId)
                            .to(Vouchers::Table, Vouchers::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 9. Audit logs
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(AuditLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuditLogs::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuditLogs::Actor).string().not_null())
                    .col(ColumnDef::new(AuditLogs::Action).string().not_null())
                    .col(ColumnDef::new(AuditLogs::TargetType).string().not_null())
                    .col(ColumnDef::new(AuditLogs::TargetId).string().not_null())
                    .col(ColumnDef::new(AuditLogs::Before).string())
                    .col(ColumnDef::new(AuditLogs::After).string())
                    .col(ColumnDef::new(AuditLogs::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-audit_logs-target_type-target_id")
                    .table(AuditLogs::Table)
                    .col(AuditLogs::TargetType)
                    .col(AuditLogs::TargetId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LegacyEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PeriodLocks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BankImportLines::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BankImportJobs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(NettingLinks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Nettings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Allocations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Vouchers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CounterpartyAliases::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Counterparties::Table).to_owned())
            .await?;
        Ok(())
    }
}
