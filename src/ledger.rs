//! Reward Ledger
//!
//! Tracks each worker's pending (unpaid) balance and the total already paid
//! out. Every mutation is a single-row atomic update inside a store
//! transaction, never an application-level read-then-write across calls.

use crate::accounts::load_worker;
use crate::error::{MarketError, MarketResult};
use crate::storage::LedgerStore;
use crate::types::{Amount, WorkerId};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

/// Add `amount` to the pending balance, returning the new balance
pub(crate) fn credit_in(
    conn: &Connection,
    worker_id: WorkerId,
    amount: Amount,
) -> MarketResult<Amount> {
    conn.query_row(
        "UPDATE workers SET pending_amount = pending_amount + ?2
         WHERE id = ?1
         RETURNING pending_amount",
        params![worker_id, amount],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| MarketError::not_found("Worker", worker_id))
}

/// Move a confirmed payout of `amount` from pending to paid, returning what
/// is left pending
pub(crate) fn settle_in(
    conn: &Connection,
    worker_id: WorkerId,
    amount: Amount,
) -> MarketResult<Amount> {
    let pending = load_worker(conn, worker_id)?.pending_amount;
    let debit = if pending < amount {
        warn!(
            "Worker {} pending balance {} is below settled payout {}, clamping to zero",
            worker_id, pending, amount
        );
        pending
    } else {
        amount
    };
    conn.execute(
        "UPDATE workers
         SET pending_amount = pending_amount - ?2, paid_amount = paid_amount + ?3
         WHERE id = ?1",
        params![worker_id, debit, amount],
    )?;
    Ok(pending - debit)
}

#[derive(Clone)]
pub struct RewardLedger {
    store: LedgerStore,
}

impl RewardLedger {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    /// Atomically add `amount` (> 0) to the pending balance.
    ///
    /// Not idempotent: callers credit once per committed submission.
    pub fn credit(&self, worker_id: WorkerId, amount: Amount) -> MarketResult<Amount> {
        if amount == 0 {
            return Err(MarketError::Validation(
                "credit amount must be positive".to_string(),
            ));
        }
        self.store.transaction(|tx| credit_in(tx, worker_id, amount))
    }

    /// Current pending balance
    pub fn peek(&self, worker_id: WorkerId) -> MarketResult<Amount> {
        self.store
            .read(|conn| load_worker(conn, worker_id).map(|w| w.pending_amount))
    }

    /// Total confirmed payouts for the worker
    pub fn paid_total(&self, worker_id: WorkerId) -> MarketResult<Amount> {
        self.store
            .read(|conn| load_worker(conn, worker_id).map(|w| w.paid_amount))
    }

    /// Capture the pending balance and zero it in one transaction.
    ///
    /// Returns the pre-reset value, which is moved into the paid total.
    /// A zero balance is left untouched and reported as zero.
    pub fn reset_to_zero(&self, worker_id: WorkerId) -> MarketResult<Amount> {
        self.store.transaction(|tx| {
            let previous = load_worker(tx, worker_id)?.pending_amount;
            if previous > 0 {
                tx.execute(
                    "UPDATE workers SET pending_amount = 0, paid_amount = paid_amount + ?2
                     WHERE id = ?1",
                    params![worker_id, previous],
                )?;
            }
            Ok(previous)
        })
    }

    /// Deduct a confirmed payout of `amount` from the pending balance.
    ///
    /// Equivalent to `reset_to_zero` when nothing was credited while the
    /// transfer was in flight; credits that landed in the meantime stay
    /// pending. Returns the balance left after settlement.
    pub fn settle(&self, worker_id: WorkerId, amount: Amount) -> MarketResult<Amount> {
        self.store.transaction(|tx| settle_in(tx, worker_id, amount))
    }
}
