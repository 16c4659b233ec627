//! CLI subcommands

pub mod payout;
pub mod task;
pub mod worker;

use taskvote::{MarketError, TransferFailureKind};

/// Message shown to the user for a failed command
pub fn describe_error(err: &anyhow::Error) -> String {
    let Some(market_err) = err.chain().find_map(|e| e.downcast_ref::<MarketError>()) else {
        return format!("{:#}", err);
    };

    match market_err {
        MarketError::DuplicateSubmission { .. } => "Already submitted for this task".to_string(),
        MarketError::NoBalance(_) => "Nothing to pay out".to_string(),
        MarketError::PayoutInProgress(_) => {
            "A payout is already in progress, try again shortly".to_string()
        }
        MarketError::Transfer(failure) => match failure.kind {
            TransferFailureKind::NotSent => {
                format!("Payout failed, nothing was sent. Try again. ({})", failure.reason)
            }
            TransferFailureKind::Uncertain => format!(
                "Payout status unknown, your balance was kept. Contact support before retrying. ({})",
                failure
            ),
        },
        MarketError::Storage(_) => format!("{}. Try again.", market_err),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskvote::{TaskId, TransferFailure, WorkerId};

    #[test]
    fn test_describe_duplicate() {
        let err = anyhow::Error::from(MarketError::DuplicateSubmission {
            worker: WorkerId(1),
            task: TaskId(2),
        });
        assert_eq!(describe_error(&err), "Already submitted for this task");
    }

    #[test]
    fn test_describe_through_context() {
        let err = anyhow::Error::from(MarketError::NoBalance(WorkerId(1))).context("payout");
        assert_eq!(describe_error(&err), "Nothing to pay out");
    }

    #[test]
    fn test_describe_transfer_kinds() {
        let retry = anyhow::Error::from(MarketError::Transfer(TransferFailure::not_sent("rejected")));
        assert!(describe_error(&retry).contains("Try again"));

        let support =
            anyhow::Error::from(MarketError::Transfer(TransferFailure::uncertain("timeout")));
        assert!(describe_error(&support).contains("Contact support"));
    }
}
