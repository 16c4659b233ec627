//! Core marketplace types
//!
//! Ids are store-assigned integers. Task ids grow with creation order, which
//! the assignment selector relies on for its oldest-first rule.

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer balance in the platform currency's minor unit (lamports)
pub type Amount = u64;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                self.0.to_sql()
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

id_type!(
    /// Task identity, ascending in creation order
    TaskId
);
id_type!(
    /// Option identity, unique across all tasks
    OptionId
);
id_type!(
    /// Worker identity, derived from a wallet address at first contact
    WorkerId
);
id_type!(
    /// Requester identity
    UserId
);

/// A selectable choice within a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOption {
    pub id: OptionId,
    pub task_id: TaskId,
    /// Opaque reference to an externally stored image, returned verbatim
    pub image_url: String,
}

/// A posted task and its options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    /// Amount attached by the requester. Reserved for a future pricing
    /// model; never used as the per-vote reward.
    pub amount: Amount,
    pub owner_id: UserId,
    /// Requester's funding transaction signature, stored verbatim
    pub payment_reference: Option<String>,
    pub options: Vec<TaskOption>,
    pub created_at: i64,
}

/// Input for creating a task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    /// Image references, one per option, in display order
    pub options: Vec<String>,
    /// Falls back to the configured default task amount
    pub amount: Option<Amount>,
    pub payment_reference: Option<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            title: title.into(),
            options,
            ..Default::default()
        }
    }

    pub fn with_amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_payment_reference(mut self, reference: impl Into<String>) -> Self {
        self.payment_reference = Some(reference.into());
        self
    }
}

/// Vote count for one option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionTally {
    pub option_id: OptionId,
    pub image_url: String,
    pub count: u64,
}

/// Aggregated results of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTally {
    pub task_id: TaskId,
    pub title: String,
    pub options: Vec<OptionTally>,
}

impl TaskTally {
    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|o| o.count).sum()
    }

    /// Count for a single option, if it belongs to this task
    pub fn count_for(&self, option_id: OptionId) -> Option<u64> {
        self.options
            .iter()
            .find(|o| o.option_id == option_id)
            .map(|o| o.count)
    }
}

/// Anonymous worker account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    /// Wallet address payouts are sent to
    pub address: String,
    /// Accrued, not yet paid out
    pub pending_amount: Amount,
    /// Total confirmed payouts so far
    pub paid_amount: Amount,
}

/// Requester account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub address: String,
}

/// Immutable record of one worker's choice for one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub worker_id: WorkerId,
    pub task_id: TaskId,
    pub option_id: OptionId,
    pub amount: Amount,
    pub created_at: i64,
}

/// Result of a successful submit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub credited_amount: Amount,
    /// Pending balance right after the credit committed
    pub pending_amount: Amount,
    pub next_task: Option<Task>,
}

/// Persisted state of a payout attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    /// Transfer handed to the external capability, outcome pending
    Submitted,
    Confirmed,
    /// Definitely not sent
    Failed,
    /// Outcome unknown, needs reconciliation before trusting the balance
    Uncertain,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Submitted => "submitted",
            PayoutStatus::Confirmed => "confirmed",
            PayoutStatus::Failed => "failed",
            PayoutStatus::Uncertain => "uncertain",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "submitted" => Some(PayoutStatus::Submitted),
            "confirmed" => Some(PayoutStatus::Confirmed),
            "failed" => Some(PayoutStatus::Failed),
            "uncertain" => Some(PayoutStatus::Uncertain),
            _ => None,
        }
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit record of one payout attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRecord {
    pub id: String,
    pub worker_id: WorkerId,
    pub amount: Amount,
    pub destination: String,
    pub status: PayoutStatus,
    pub transfer_id: Option<String>,
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Returned by a confirmed payout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutReceipt {
    pub payout_id: String,
    pub worker_id: WorkerId,
    pub amount: Amount,
    pub destination: String,
    pub transfer_id: String,
    /// Pending balance after settlement (non-zero only if credits raced the transfer)
    pub remaining_pending: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_helpers() {
        let tally = TaskTally {
            task_id: TaskId(1),
            title: "Which thumbnail?".to_string(),
            options: vec![
                OptionTally {
                    option_id: OptionId(1),
                    image_url: "a.jpg".to_string(),
                    count: 3,
                },
                OptionTally {
                    option_id: OptionId(2),
                    image_url: "b.jpg".to_string(),
                    count: 0,
                },
            ],
        };
        assert_eq!(tally.total_votes(), 3);
        assert_eq!(tally.count_for(OptionId(2)), Some(0));
        assert_eq!(tally.count_for(OptionId(5)), None);
    }

    #[test]
    fn test_payout_status_round_trip_names() {
        for status in [
            PayoutStatus::Submitted,
            PayoutStatus::Confirmed,
            PayoutStatus::Failed,
            PayoutStatus::Uncertain,
        ] {
            assert_eq!(PayoutStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PayoutStatus::parse("pending"), None);
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&TaskId(42)).unwrap();
        assert_eq!(json, "42");
    }
}
