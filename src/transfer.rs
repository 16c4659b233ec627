//! Funds-transfer capability
//!
//! The payout coordinator only sees this trait. A live implementation talks
//! to the chain. `SimulatedTransfer` confirms immediately and is only used
//! when payouts are explicitly simulated; `UnconfiguredTransfer` stands in for
//! a missing platform wallet and refuses every transfer.

use crate::error::TransferFailure;
use crate::types::Amount;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Identifier issued by the transfer capability (e.g. a transaction signature)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(pub String);

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Final state of a submitted transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finality {
    /// Funds arrived, transfer is final
    Confirmed,
    /// Transfer was rejected; funds did not move
    Failed(String),
    /// The capability could not tell
    Unknown(String),
}

#[async_trait]
pub trait FundsTransfer: Send + Sync {
    /// Hand a transfer to the capability.
    ///
    /// An error here means no transfer id was produced. Implementations
    /// classify it as `NotSent` (rejected before broadcast: invalid address,
    /// insufficient platform funds) or `Uncertain` (network error mid-call).
    async fn submit_transfer(
        &self,
        destination: &str,
        amount: Amount,
    ) -> Result<TransferId, TransferFailure>;

    /// Wait for the submitted transfer to finalize
    async fn await_finality(&self, transfer_id: &TransferId) -> Finality;
}

/// Transfer that confirms without moving funds
#[derive(Debug, Default, Clone)]
pub struct SimulatedTransfer;

#[async_trait]
impl FundsTransfer for SimulatedTransfer {
    async fn submit_transfer(
        &self,
        destination: &str,
        amount: Amount,
    ) -> Result<TransferId, TransferFailure> {
        warn!(
            "Simulated payout of {} to {}: no funds are moved",
            amount, destination
        );
        Ok(TransferId(format!("simulated-{}", uuid::Uuid::new_v4())))
    }

    async fn await_finality(&self, _transfer_id: &TransferId) -> Finality {
        Finality::Confirmed
    }
}

/// Live transfer without a platform wallet: nothing is ever sent
#[derive(Debug, Default, Clone)]
pub struct UnconfiguredTransfer;

#[async_trait]
impl FundsTransfer for UnconfiguredTransfer {
    async fn submit_transfer(
        &self,
        _destination: &str,
        _amount: Amount,
    ) -> Result<TransferId, TransferFailure> {
        Err(TransferFailure::not_sent("platform wallet not initialized"))
    }

    async fn await_finality(&self, _transfer_id: &TransferId) -> Finality {
        Finality::Failed("platform wallet not initialized".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_transfer_confirms() {
        let transfer = SimulatedTransfer;
        let id = transfer
            .submit_transfer("9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM", 10)
            .await
            .unwrap();
        assert!(id.0.starts_with("simulated-"));
        assert_eq!(transfer.await_finality(&id).await, Finality::Confirmed);
    }

    #[tokio::test]
    async fn test_unconfigured_transfer_never_sends() {
        let failure = UnconfiguredTransfer
            .submit_transfer("9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM", 10)
            .await
            .unwrap_err();
        assert!(failure.is_safe_to_retry());
        assert_eq!(failure.reason, "platform wallet not initialized");
    }
}
