//! Payout Coordinator
//!
//! Drives one payout attempt through
//! `Requested -> BalanceChecked -> TransferSubmitted -> {Confirmed, Failed}`.
//!
//! The external transfer is the only step that cannot be rolled back, so the
//! ledger is settled strictly after, and only on, a confirmed transfer. No
//! store lock is held while the transfer is outstanding: the attempt is
//! claimed in one short transaction and settled in another.
//!
//! Every attempt is written to the `payouts` table. A `submitted` row blocks
//! further attempts for the same worker until it resolves or goes stale.

use crate::accounts::load_worker;
use crate::config::PayoutConfig;
use crate::error::{MarketError, MarketResult, TransferFailure, TransferFailureKind};
use crate::ledger::settle_in;
use crate::storage::{is_unique_violation, LedgerStore};
use crate::transfer::{Finality, FundsTransfer, TransferId};
use crate::types::{Amount, PayoutReceipt, PayoutRecord, PayoutStatus, WorkerId};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Stage of a payout attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutStage {
    Requested,
    BalanceChecked,
    TransferSubmitted,
    Confirmed,
    Failed,
}

impl fmt::Display for PayoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PayoutStage::Requested => "requested",
            PayoutStage::BalanceChecked => "balance_checked",
            PayoutStage::TransferSubmitted => "transfer_submitted",
            PayoutStage::Confirmed => "confirmed",
            PayoutStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Claimed attempt, persisted as `submitted`
struct Claim {
    payout_id: String,
    amount: Amount,
    destination: String,
}

/// Check the balance and record a `submitted` attempt in one transaction
fn claim_attempt(
    store: &LedgerStore,
    worker_id: WorkerId,
    stale_claim_secs: u64,
) -> MarketResult<Claim> {
    let now = Utc::now().timestamp();
    let stale_before = now.saturating_sub(i64::try_from(stale_claim_secs).unwrap_or(i64::MAX));

    store.transaction(|tx| {
        let worker = load_worker(tx, worker_id)?;
        if worker.pending_amount == 0 {
            return Err(MarketError::NoBalance(worker_id));
        }

        let in_flight: Option<(String, i64)> = tx
            .query_row(
                "SELECT id, created_at FROM payouts
                 WHERE worker_id = ?1 AND status = 'submitted'",
                params![worker_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        if let Some((previous_id, created_at)) = in_flight {
            if created_at > stale_before {
                return Err(MarketError::PayoutInProgress(worker_id));
            }
            warn!(
                "Payout {} for worker {} never resolved, marking uncertain",
                previous_id, worker_id
            );
            tx.execute(
                "UPDATE payouts SET status = 'uncertain', error = ?2, updated_at = ?3
                 WHERE id = ?1",
                params![previous_id, "superseded by a newer attempt", now],
            )?;
        }

        let payout_id = uuid::Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO payouts (id, worker_id, amount, destination, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'submitted', ?5, ?5)",
            params![payout_id, worker_id, worker.pending_amount, worker.address, now],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                MarketError::PayoutInProgress(worker_id)
            } else {
                MarketError::from(e)
            }
        })?;

        Ok(Claim {
            payout_id,
            amount: worker.pending_amount,
            destination: worker.address,
        })
    })
}

pub struct PayoutCoordinator {
    store: LedgerStore,
    transfer: Arc<dyn FundsTransfer>,
    config: PayoutConfig,
}

impl PayoutCoordinator {
    pub fn new(store: LedgerStore, transfer: Arc<dyn FundsTransfer>, config: PayoutConfig) -> Self {
        Self {
            store,
            transfer,
            config,
        }
    }

    fn stage(&self, worker_id: WorkerId, stage: PayoutStage) {
        debug!("Payout for worker {}: {}", worker_id, stage);
    }

    /// Run a store closure on the blocking pool so a busy database never
    /// stalls the async runtime
    async fn on_store<T, F>(&self, f: F) -> MarketResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&LedgerStore) -> MarketResult<T> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| MarketError::Storage(format!("ledger task failed: {}", e)))?
    }

    /// Pay out the worker's whole pending balance.
    ///
    /// Fails with `NoBalance` without calling the transfer capability when
    /// nothing is pending. On `Transfer` errors the pending balance is left
    /// exactly as it was; the failure kind says whether a retry is safe.
    /// Does not retry on its own.
    pub async fn request_payout(&self, worker_id: WorkerId) -> MarketResult<PayoutReceipt> {
        self.stage(worker_id, PayoutStage::Requested);
        let stale_claim_secs = self.config.stale_claim_secs;
        let claim = self
            .on_store(move |store| claim_attempt(store, worker_id, stale_claim_secs))
            .await?;
        self.stage(worker_id, PayoutStage::BalanceChecked);

        info!(
            "Processing payout {} for worker {}: {} to {}",
            claim.payout_id, worker_id, claim.amount, claim.destination
        );

        let transfer_id = match self.submit(&claim).await {
            Ok(id) => id,
            Err(failure) => return Err(self.fail(worker_id, &claim, failure).await),
        };
        self.stage(worker_id, PayoutStage::TransferSubmitted);

        let finality = tokio::time::timeout(
            self.config.finality_timeout(),
            self.transfer.await_finality(&transfer_id),
        )
        .await
        .unwrap_or_else(|_| {
            Finality::Unknown(format!(
                "no finality after {}s",
                self.config.finality_timeout_secs
            ))
        });

        match finality {
            Finality::Confirmed => self.confirm(worker_id, claim, transfer_id).await,
            Finality::Failed(reason) => {
                let failure = TransferFailure::not_sent(reason).with_transfer_id(transfer_id.0);
                Err(self.fail(worker_id, &claim, failure).await)
            }
            Finality::Unknown(reason) => {
                let failure = TransferFailure::uncertain(reason).with_transfer_id(transfer_id.0);
                Err(self.fail(worker_id, &claim, failure).await)
            }
        }
    }

    async fn submit(&self, claim: &Claim) -> Result<TransferId, TransferFailure> {
        match tokio::time::timeout(
            self.config.finality_timeout(),
            self.transfer.submit_transfer(&claim.destination, claim.amount),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransferFailure::uncertain(format!(
                "transfer call did not return within {}s",
                self.config.finality_timeout_secs
            ))),
        }
    }

    /// Settle the ledger and close the attempt in one transaction.
    ///
    /// The funds have already moved, so a settlement failure is reported as
    /// an uncertain transfer, never as a retryable storage error. The attempt
    /// stays `submitted` and keeps new payouts out until it goes stale.
    async fn confirm(
        &self,
        worker_id: WorkerId,
        claim: Claim,
        transfer_id: TransferId,
    ) -> MarketResult<PayoutReceipt> {
        let (payout_id, amount) = (claim.payout_id.clone(), claim.amount);
        let id = transfer_id.0.clone();
        let settled = self
            .on_store(move |store| {
                store.transaction(|tx| {
                    let remaining = settle_in(tx, worker_id, amount)?;
                    tx.execute(
                        "UPDATE payouts SET status = 'confirmed', transfer_id = ?2, updated_at = ?3
                         WHERE id = ?1",
                        params![payout_id, id, Utc::now().timestamp()],
                    )?;
                    Ok(remaining)
                })
            })
            .await;

        let remaining = match settled {
            Ok(remaining) => remaining,
            Err(e) => {
                error!(
                    "Payout {} confirmed as {} but settlement failed: {}",
                    claim.payout_id, transfer_id, e
                );
                return Err(MarketError::Transfer(
                    TransferFailure::uncertain(format!(
                        "funds sent but ledger settlement failed: {}",
                        e
                    ))
                    .with_transfer_id(transfer_id.0),
                ));
            }
        };

        self.stage(worker_id, PayoutStage::Confirmed);
        info!(
            "Payout {} confirmed: {} sent to {} (transfer {})",
            claim.payout_id, claim.amount, claim.destination, transfer_id
        );

        Ok(PayoutReceipt {
            payout_id: claim.payout_id,
            worker_id,
            amount: claim.amount,
            destination: claim.destination,
            transfer_id: transfer_id.0,
            remaining_pending: remaining,
        })
    }

    /// Close the attempt without touching the balance
    async fn fail(
        &self,
        worker_id: WorkerId,
        claim: &Claim,
        failure: TransferFailure,
    ) -> MarketError {
        self.stage(worker_id, PayoutStage::Failed);
        let status = match failure.kind {
            TransferFailureKind::NotSent => PayoutStatus::Failed,
            TransferFailureKind::Uncertain => PayoutStatus::Uncertain,
        };
        warn!(
            "Payout {} for worker {} {}: {}",
            claim.payout_id, worker_id, status, failure
        );

        let payout_id = claim.payout_id.clone();
        let (transfer_id, reason) = (failure.transfer_id.clone(), failure.reason.clone());
        let recorded = self
            .on_store(move |store| {
                store.transaction(|tx| {
                    tx.execute(
                        "UPDATE payouts SET status = ?2, transfer_id = ?3, error = ?4, updated_at = ?5
                         WHERE id = ?1",
                        params![
                            payout_id,
                            status.as_str(),
                            transfer_id,
                            reason,
                            Utc::now().timestamp()
                        ],
                    )?;
                    Ok(())
                })
            })
            .await;

        // The transfer error is what the caller must act on; an unrecorded
        // attempt stays `submitted` and expires as stale.
        if let Err(e) = recorded {
            error!("Could not record failed payout {}: {}", claim.payout_id, e);
        }
        MarketError::Transfer(failure)
    }
    /// Payout attempts for a worker, newest first
    pub fn payout_history(&self, worker_id: WorkerId) -> MarketResult<Vec<PayoutRecord>> {
        self.store.read(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, worker_id, amount, destination, status, transfer_id, error, created_at, updated_at
                 FROM payouts WHERE worker_id = ?1 ORDER BY created_at DESC, rowid DESC",
            )?;
            let records = stmt
                .query_map(params![worker_id], |row| {
                    let raw: String = row.get(4)?;
                    let status = PayoutStatus::parse(&raw).ok_or_else(|| {
                        rusqlite::Error::FromSqlConversionFailure(
                            4,
                            Type::Text,
                            format!("unknown payout status '{}'", raw).into(),
                        )
                    })?;
                    Ok(PayoutRecord {
                        id: row.get(0)?,
                        worker_id: row.get(1)?,
                        amount: row.get(2)?,
                        destination: row.get(3)?,
                        status,
                        transfer_id: row.get(5)?,
                        error: row.get(6)?,
                        created_at: row.get(7)?,
                        updated_at: row.get(8)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::Accounts;
    use crate::ledger::RewardLedger;
    use crate::transfer::SimulatedTransfer;

    fn setup() -> (PayoutCoordinator, RewardLedger, WorkerId) {
        let store = LedgerStore::in_memory().unwrap();
        let worker = Accounts::new(store.clone())
            .register_worker("9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM")
            .unwrap();
        let coordinator = PayoutCoordinator::new(
            store.clone(),
            Arc::new(SimulatedTransfer),
            PayoutConfig::default(),
        );
        (coordinator, RewardLedger::new(store), worker.id)
    }

    #[tokio::test]
    async fn test_zero_balance_rejected() {
        let (coordinator, _, worker) = setup();
        assert!(matches!(
            coordinator.request_payout(worker).await,
            Err(MarketError::NoBalance(_))
        ));
        assert!(coordinator.payout_history(worker).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_simulated_payout_settles() {
        let (coordinator, ledger, worker) = setup();
        ledger.credit(worker, 10).unwrap();

        let receipt = coordinator.request_payout(worker).await.unwrap();
        assert_eq!(receipt.amount, 10);
        assert_eq!(receipt.remaining_pending, 0);
        assert_eq!(ledger.peek(worker).unwrap(), 0);
        assert_eq!(ledger.paid_total(worker).unwrap(), 10);

        let history = coordinator.payout_history(worker).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, PayoutStatus::Confirmed);
        assert_eq!(history[0].transfer_id.as_deref(), Some(receipt.transfer_id.as_str()));
    }

    #[tokio::test]
    async fn test_unknown_worker() {
        let (coordinator, _, _) = setup();
        assert!(matches!(
            coordinator.request_payout(WorkerId(42)).await,
            Err(MarketError::NotFound { .. })
        ));
    }

    fn insert_attempt(store: &LedgerStore, worker: WorkerId, id: &str, status: &str) {
        store
            .transaction(|tx| {
                tx.execute(
                    "INSERT INTO payouts (id, worker_id, amount, destination, status, created_at, updated_at)
                     VALUES (?1, ?2, 10, 'wallet', ?3, 0, 0)",
                    params![id, worker, status],
                )?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_corrupt_status_is_a_storage_error() {
        let (coordinator, _, worker) = setup();
        insert_attempt(&coordinator.store, worker, "p-1", "pending");

        match coordinator.payout_history(worker) {
            Err(MarketError::Storage(msg)) => assert!(msg.contains("unknown payout status")),
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_huge_stale_window_never_expires_claims() {
        let (mut coordinator, ledger, worker) = setup();
        coordinator.config.stale_claim_secs = u64::MAX;
        ledger.credit(worker, 10).unwrap();
        insert_attempt(&coordinator.store, worker, "old", "submitted");

        assert!(matches!(
            coordinator.request_payout(worker).await,
            Err(MarketError::PayoutInProgress(_))
        ));
        assert_eq!(ledger.peek(worker).unwrap(), 10);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(PayoutStage::TransferSubmitted.to_string(), "transfer_submitted");
        assert_eq!(PayoutStage::Confirmed.to_string(), "confirmed");
    }
}
