//! Task assignment and reward ledger engine for a micro-task voting marketplace
//!
//! Requesters post tasks made of a title and a set of image options. Workers
//! are shown one unseen task at a time, pick one option and accrue a small
//! reward, which they can later pay out to their wallet.
//!
//! ## Module Structure
//!
//! - `storage`: Ledger store (SQLite, transactional)
//! - `accounts`: Worker and requester identities
//! - `catalog`: Task and option definitions, vote tallies
//! - `assignment`: Next-task selection per worker
//! - `submission`: Exactly-once submission recording and crediting
//! - `ledger`: Pending and paid balances
//! - `transfer`: Funds-transfer capability boundary
//! - `payout`: Payout coordination and reconciliation
//! - `market`: Component wiring for the process entry point

pub mod accounts;
pub mod assignment;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod market;
pub mod payout;
pub mod storage;
pub mod submission;
pub mod transfer;
pub mod types;

pub use accounts::{validate_address, Accounts};
pub use assignment::AssignmentSelector;
pub use catalog::TaskCatalog;
pub use config::{
    CatalogConfig, MarketConfig, PayoutConfig, PayoutMode, ReconnectPolicy, RewardConfig,
    StoreConfig,
};
pub use error::{MarketError, MarketResult, TransferFailure, TransferFailureKind};
pub use ledger::RewardLedger;
pub use market::Marketplace;
pub use payout::{PayoutCoordinator, PayoutStage};
pub use storage::LedgerStore;
pub use submission::SubmissionProcessor;
pub use transfer::{Finality, FundsTransfer, SimulatedTransfer, TransferId, UnconfiguredTransfer};
pub use types::{
    Amount, NewTask, OptionId, OptionTally, PayoutReceipt, PayoutRecord, PayoutStatus, Submission,
    SubmitOutcome, Task, TaskId, TaskOption, TaskTally, User, UserId, Worker, WorkerId,
};
