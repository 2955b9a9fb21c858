//! Settlement reconciliation engine.
//!
//! Converts raw money-movement events (manual entries, imported bank
//! statement lines, inter-voucher set-offs) into balanced allocations
//! against sales/purchase vouchers, derives each voucher's settlement and
//! payment status from the full applied-money history, and enforces
//! month-level close via period locks.
//!
//! All operations live on [`Engine`]; each one runs inside a single
//! database transaction that is the unit of atomicity.

pub use aliases::CounterpartyAlias;
pub use allocations::TransactionAllocation;
pub use audit::{AuditAction, AuditRecord};
pub use bank_import_lines::{BankImportLine, LineStatus, ParsedRow, duplicate_key};
pub use bank_imports::{BankImportJob, BankImportStatus};
pub use counterparties::{Counterparty, CounterpartyKind};
pub use error::EngineError;
pub use legacy_entries::{LegacyEntry, LegacyEntryKind};
pub use netting_links::NettingVoucherLink;
pub use nettings::{NettingRecord, NettingStatus};
pub use ops::{
    BatchOutcome, Engine, EngineBuilder, NettingItem, TransactionListFilter, VoucherListFilter,
    VoucherSummary,
};
pub use period_locks::{PeriodLock, PeriodState};
pub use transactions::{
    CounterpartyTransaction, TransactionKind, TransactionSource, TransactionStatus,
};
pub use vouchers::{PaymentStatus, SettlementStatus, Voucher, VoucherKind};

mod aliases;
mod allocations;
mod audit;
mod bank_import_lines;
mod bank_imports;
mod counterparties;
mod error;
mod legacy_entries;
mod netting_links;
mod nettings;
mod ops;
mod period_locks;
mod transactions;
mod util;
mod vouchers;

type ResultEngine<T> = Result<T, EngineError>;
