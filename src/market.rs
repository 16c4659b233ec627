//! Marketplace facade
//!
//! Wires the core components around one ledger store and one transfer
//! client. The process entry point owns both and injects them here; nothing
//! in the core creates global clients on its own.

use crate::accounts::Accounts;
use crate::assignment::AssignmentSelector;
use crate::catalog::TaskCatalog;
use crate::config::{MarketConfig, PayoutMode};
use crate::error::MarketResult;
use crate::ledger::RewardLedger;
use crate::payout::PayoutCoordinator;
use crate::storage::LedgerStore;
use crate::submission::SubmissionProcessor;
use crate::transfer::{FundsTransfer, SimulatedTransfer, UnconfiguredTransfer};
use crate::types::{
    Amount, NewTask, OptionId, PayoutReceipt, PayoutRecord, Submission, SubmitOutcome, Task,
    TaskId, TaskTally, User, UserId, Worker, WorkerId,
};
use std::sync::Arc;
use tracing::warn;

pub struct Marketplace {
    accounts: Accounts,
    catalog: TaskCatalog,
    selector: AssignmentSelector,
    submissions: SubmissionProcessor,
    ledger: RewardLedger,
    payouts: PayoutCoordinator,
}

impl Marketplace {
    pub fn new(store: LedgerStore, transfer: Arc<dyn FundsTransfer>, config: &MarketConfig) -> Self {
        Self {
            accounts: Accounts::new(store.clone()),
            catalog: TaskCatalog::new(store.clone(), config.catalog.clone()),
            selector: AssignmentSelector::new(store.clone()),
            submissions: SubmissionProcessor::new(store.clone(), config.rewards.per_submission),
            ledger: RewardLedger::new(store.clone()),
            payouts: PayoutCoordinator::new(store, transfer, config.payout.clone()),
        }
    }

    /// Connect to the configured store and pick the transfer client.
    ///
    /// `live_transfer` is used in `Live` mode; `Simulated` mode ignores it.
    /// `Live` mode without a client refuses every payout as not sent, so no
    /// balance is ever settled without a real transfer.
    pub fn from_config(
        config: &MarketConfig,
        live_transfer: Option<Arc<dyn FundsTransfer>>,
    ) -> MarketResult<Self> {
        let store = LedgerStore::connect(&config.store)?;
        let transfer: Arc<dyn FundsTransfer> = match (config.payout.mode, live_transfer) {
            (PayoutMode::Live, Some(transfer)) => transfer,
            (PayoutMode::Live, None) => {
                warn!(
                    "No transfer client configured, payouts will fail until a platform wallet is set up"
                );
                Arc::new(UnconfiguredTransfer)
            }
            (PayoutMode::Simulated, _) => Arc::new(SimulatedTransfer),
        };
        Ok(Self::new(store, transfer, config))
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    pub fn register_worker(&self, address: &str) -> MarketResult<Worker> {
        self.accounts.register_worker(address)
    }

    pub fn register_requester(&self, address: &str) -> MarketResult<User> {
        self.accounts.register_requester(address)
    }

    pub fn worker(&self, worker_id: WorkerId) -> MarketResult<Worker> {
        self.accounts.worker(worker_id)
    }

    // ------------------------------------------------------------------
    // Requester side
    // ------------------------------------------------------------------

    pub fn create_task(&self, owner_id: UserId, new_task: NewTask) -> MarketResult<TaskId> {
        self.catalog.create_task(owner_id, new_task)
    }

    pub fn get_task(&self, task_id: TaskId) -> MarketResult<Task> {
        self.catalog.get_task(task_id)
    }

    pub fn get_task_with_tally(&self, task_id: TaskId) -> MarketResult<TaskTally> {
        self.catalog.get_task_with_tally(task_id)
    }

    pub fn list_tasks_for_owner(&self, owner_id: UserId) -> MarketResult<Vec<Task>> {
        self.catalog.list_tasks_for_owner(owner_id)
    }

    // ------------------------------------------------------------------
    // Worker side
    // ------------------------------------------------------------------

    pub fn next_task_for(&self, worker_id: WorkerId) -> MarketResult<Option<Task>> {
        self.selector.next_task_for(worker_id)
    }

    pub fn submit(
        &self,
        worker_id: WorkerId,
        task_id: TaskId,
        option_id: OptionId,
    ) -> MarketResult<SubmitOutcome> {
        self.submissions.submit(worker_id, task_id, option_id)
    }

    pub fn submissions_for_worker(&self, worker_id: WorkerId) -> MarketResult<Vec<Submission>> {
        self.submissions.submissions_for_worker(worker_id)
    }

    pub fn peek(&self, worker_id: WorkerId) -> MarketResult<Amount> {
        self.ledger.peek(worker_id)
    }

    pub async fn request_payout(&self, worker_id: WorkerId) -> MarketResult<PayoutReceipt> {
        self.payouts.request_payout(worker_id).await
    }

    pub fn payout_history(&self, worker_id: WorkerId) -> MarketResult<Vec<PayoutRecord>> {
        self.payouts.payout_history(worker_id)
    }

    pub fn ledger(&self) -> &RewardLedger {
        &self.ledger
    }
}
