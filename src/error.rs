//! Error types for the marketplace core

use crate::types::{OptionId, TaskId, WorkerId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for marketplace operations
pub type MarketResult<T> = Result<T, MarketError>;

/// Errors returned by every core operation
#[derive(Debug, Error)]
pub enum MarketError {
    /// Bad input shape or size. Not retryable as-is.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown task, option, worker or requester id
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Option exists but belongs to a different task (or does not exist)
    #[error("Option {option} does not belong to task {task}")]
    InvalidOption { task: TaskId, option: OptionId },

    /// Worker already submitted for this task
    #[error("Worker {worker} already submitted for task {task}")]
    DuplicateSubmission { worker: WorkerId, task: TaskId },

    /// Payout requested with nothing pending
    #[error("No pending balance to pay out for worker {0}")]
    NoBalance(WorkerId),

    /// Another payout for the same worker has not finished yet
    #[error("Payout already in progress for worker {0}")]
    PayoutInProgress(WorkerId),

    /// External transfer definitely failed or has an unknown outcome
    #[error("Transfer error: {0}")]
    Transfer(TransferFailure),

    /// Ledger store unavailable or failing
    #[error("Storage error: {0}")]
    Storage(String),
}

impl MarketError {
    pub(crate) fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        MarketError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether repeating the exact same call may succeed.
    ///
    /// Storage failures never leave partial state behind, so the whole
    /// operation can be repeated. Transfers are only retryable when the
    /// funds were definitely not sent.
    pub fn is_retryable(&self) -> bool {
        match self {
            MarketError::Storage(_) | MarketError::PayoutInProgress(_) => true,
            MarketError::Transfer(failure) => failure.is_safe_to_retry(),
            _ => false,
        }
    }
}

impl From<rusqlite::Error> for MarketError {
    fn from(err: rusqlite::Error) -> Self {
        MarketError::Storage(err.to_string())
    }
}

impl From<TransferFailure> for MarketError {
    fn from(failure: TransferFailure) -> Self {
        MarketError::Transfer(failure)
    }
}

/// Sub-classification of a failed payout transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferFailureKind {
    /// Funds were definitely not moved (rejected, insufficient platform funds,
    /// invalid address, finalized as failed)
    NotSent,
    /// Outcome unknown (network error, timeout). Funds may have moved.
    Uncertain,
}

impl fmt::Display for TransferFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferFailureKind::NotSent => write!(f, "not sent"),
            TransferFailureKind::Uncertain => write!(f, "uncertain"),
        }
    }
}

/// Failure reported by the funds-transfer capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFailure {
    pub kind: TransferFailureKind,
    pub reason: String,
    /// Transfer id, when one was issued before the failure
    pub transfer_id: Option<String>,
}

impl TransferFailure {
    pub fn not_sent(reason: impl Into<String>) -> Self {
        Self {
            kind: TransferFailureKind::NotSent,
            reason: reason.into(),
            transfer_id: None,
        }
    }

    pub fn uncertain(reason: impl Into<String>) -> Self {
        Self {
            kind: TransferFailureKind::Uncertain,
            reason: reason.into(),
            transfer_id: None,
        }
    }

    pub fn with_transfer_id(mut self, transfer_id: impl Into<String>) -> Self {
        self.transfer_id = Some(transfer_id.into());
        self
    }

    /// "Try again" vs "contact support"
    pub fn is_safe_to_retry(&self) -> bool {
        self.kind == TransferFailureKind::NotSent
    }
}

impl fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reason, self.kind)?;
        if let Some(id) = &self.transfer_id {
            write!(f, " [transfer {}]", id)?;
        }
        Ok(())
    }
}
