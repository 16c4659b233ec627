//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use taskvote::{
    Amount, Finality, FundsTransfer, LedgerStore, MarketConfig, Marketplace, NewTask, OptionId,
    TaskId, TransferFailure, TransferId, UserId, WorkerId,
};
use tokio::sync::Notify;

pub const REQUESTER: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";
pub const WORKER: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
pub const REWARD: Amount = 10;

/// What the fake transfer does for one payout
#[derive(Clone)]
pub enum Outcome {
    Confirm,
    /// `submit_transfer` fails, funds definitely not sent
    Reject(String),
    /// `submit_transfer` fails with an unknown outcome
    SubmitUncertain(String),
    /// Submitted, then finalized as failed
    FinalityFailed(String),
    /// Submitted, finality reported as unknown
    FinalityUnknown(String),
    /// Submitted, finality never arrives
    NeverFinalizes,
    /// Signals `submitted` after submission, confirms once `release` fires
    Gated {
        submitted: Arc<Notify>,
        release: Arc<Notify>,
    },
}

/// Fake transfer capability playing back scripted outcomes (default: confirm)
#[derive(Default)]
pub struct ScriptedTransfer {
    script: Mutex<VecDeque<Outcome>>,
    in_flight: Mutex<HashMap<String, Outcome>>,
    calls: AtomicUsize,
    sent: Mutex<Vec<(String, Amount)>>,
}

impl ScriptedTransfer {
    pub fn new(outcomes: Vec<Outcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(outcomes.into()),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(String, Amount)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl FundsTransfer for ScriptedTransfer {
    async fn submit_transfer(
        &self,
        destination: &str,
        amount: Amount,
    ) -> Result<TransferId, TransferFailure> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.script.lock().pop_front().unwrap_or(Outcome::Confirm);
        match outcome {
            Outcome::Reject(reason) => Err(TransferFailure::not_sent(reason)),
            Outcome::SubmitUncertain(reason) => Err(TransferFailure::uncertain(reason)),
            other => {
                let id = format!("sig-{}", n);
                self.sent.lock().push((destination.to_string(), amount));
                self.in_flight.lock().insert(id.clone(), other);
                Ok(TransferId(id))
            }
        }
    }

    async fn await_finality(&self, transfer_id: &TransferId) -> Finality {
        let outcome = self
            .in_flight
            .lock()
            .remove(&transfer_id.0)
            .unwrap_or(Outcome::Confirm);
        match outcome {
            Outcome::FinalityFailed(reason) => Finality::Failed(reason),
            Outcome::FinalityUnknown(reason) => Finality::Unknown(reason),
            Outcome::NeverFinalizes => std::future::pending().await,
            Outcome::Gated { submitted, release } => {
                submitted.notify_one();
                release.notified().await;
                Finality::Confirmed
            }
            _ => Finality::Confirmed,
        }
    }
}

pub fn test_config() -> MarketConfig {
    let mut config = MarketConfig::default();
    config.rewards.per_submission = REWARD;
    config.payout.finality_timeout_secs = 5;
    config
}

pub fn market_with(transfer: Arc<dyn FundsTransfer>) -> Marketplace {
    Marketplace::new(LedgerStore::in_memory().unwrap(), transfer, &test_config())
}

/// Create a task with `n` options, returning its id and option ids
pub fn create_task(market: &Marketplace, owner: UserId, title: &str, n: usize) -> (TaskId, Vec<OptionId>) {
    let images = (0..n).map(|i| format!("uploads/{}/{}.jpg", title, i)).collect();
    let task_id = market.create_task(owner, NewTask::new(title, images)).unwrap();
    let options = market
        .get_task(task_id)
        .unwrap()
        .options
        .into_iter()
        .map(|o| o.id)
        .collect();
    (task_id, options)
}

/// Requester and worker registered on a fresh market
pub fn actors(market: &Marketplace) -> (UserId, WorkerId) {
    let owner = market.register_requester(REQUESTER).unwrap();
    let worker = market.register_worker(WORKER).unwrap();
    (owner.id, worker.id)
}
