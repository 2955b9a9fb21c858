//! The module contains the errors the engine can throw.
//!
//! The variants follow the failure taxonomy of the reconciliation engine:
//!
//! - [`InsufficientBalance`] for conservation violations (an allocation would
//!   exceed a transaction's or a voucher's remaining balance). The message
//!   always carries the computed available balance.
//! - [`StateConflict`] for operations against a terminal or locked state
//!   (locked voucher, already-confirmed import job, cancelled transaction).
//! - [`KeyNotFound`] when a referenced entity does not exist.
//!
//! [`InsufficientBalance`]: EngineError::InsufficientBalance
//! [`StateConflict`]: EngineError::StateConflict
//! [`KeyNotFound`]: EngineError::KeyNotFound
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Invalid name: {0}")]
    InvalidName(String),
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),
    #[error("Unbalanced set-off: {0}")]
    Unbalanced(String),
    #[error("State conflict: {0}")]
    StateConflict(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::InvalidName(a), Self::InvalidName(b)) => a == b,
            (Self::InsufficientBalance(a), Self::InsufficientBalance(b)) => a == b,
            (Self::Unbalanced(a), Self::Unbalanced(b)) => a == b,
            (Self::StateConflict(a), Self::StateConflict(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
