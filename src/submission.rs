//! Submission Processor
//!
//! Records a worker's single choice for a task, credits the per-submission
//! reward and computes the next assignment, all in one store transaction.
//! Either the submission row, the credit and the read of the next task all
//! commit together, or none of them do.

use crate::accounts::load_worker;
use crate::assignment::next_task_in;
use crate::error::{MarketError, MarketResult};
use crate::ledger::credit_in;
use crate::storage::{is_unique_violation, LedgerStore};
use crate::types::{Amount, OptionId, Submission, SubmitOutcome, TaskId, WorkerId};
use rusqlite::{params, OptionalExtension};
use tracing::info;

#[derive(Clone)]
pub struct SubmissionProcessor {
    store: LedgerStore,
    reward_per_submission: Amount,
}

impl SubmissionProcessor {
    pub fn new(store: LedgerStore, reward_per_submission: Amount) -> Self {
        Self {
            store,
            reward_per_submission,
        }
    }

    pub fn reward_per_submission(&self) -> Amount {
        self.reward_per_submission
    }

    /// Record `option_id` as the worker's choice for `task_id`.
    ///
    /// Checks, in order: worker and task exist (`NotFound`), option belongs to the task
    /// (`InvalidOption`), no earlier submission for the pair
    /// (`DuplicateSubmission`). Of several concurrent calls for the same
    /// (worker, task) exactly one commits; the others credit nothing.
    pub fn submit(
        &self,
        worker_id: WorkerId,
        task_id: TaskId,
        option_id: OptionId,
    ) -> MarketResult<SubmitOutcome> {
        let reward = self.reward_per_submission;

        let outcome = self.store.transaction(|tx| {
            load_worker(tx, worker_id)?;

            let task_exists = tx
                .query_row("SELECT 1 FROM tasks WHERE id = ?1", params![task_id], |_| {
                    Ok(())
                })
                .optional()?
                .is_some();
            if !task_exists {
                return Err(MarketError::not_found("Task", task_id));
            }

            let option_task: Option<TaskId> = tx
                .query_row(
                    "SELECT task_id FROM task_options WHERE id = ?1",
                    params![option_id],
                    |row| row.get(0),
                )
                .optional()?;
            if option_task != Some(task_id) {
                return Err(MarketError::InvalidOption {
                    task: task_id,
                    option: option_id,
                });
            }

            let already_submitted = tx
                .query_row(
                    "SELECT 1 FROM submissions WHERE worker_id = ?1 AND task_id = ?2",
                    params![worker_id, task_id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if already_submitted {
                return Err(MarketError::DuplicateSubmission {
                    worker: worker_id,
                    task: task_id,
                });
            }

            // The unique index decides if another writer slipped in between
            tx.execute(
                "INSERT INTO submissions (worker_id, task_id, option_id, amount)
                 VALUES (?1, ?2, ?3, ?4)",
                params![worker_id, task_id, option_id, reward],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    MarketError::DuplicateSubmission {
                        worker: worker_id,
                        task: task_id,
                    }
                } else {
                    MarketError::from(e)
                }
            })?;

            let pending_amount = credit_in(tx, worker_id, reward)?;
            let next_task = next_task_in(tx, worker_id)?;

            Ok(SubmitOutcome {
                credited_amount: reward,
                pending_amount,
                next_task,
            })
        })?;

        info!(
            "Worker {} submitted option {} for task {} (+{}, pending {})",
            worker_id, option_id, task_id, reward, outcome.pending_amount
        );
        Ok(outcome)
    }

    /// All submissions of a worker, oldest first
    pub fn submissions_for_worker(&self, worker_id: WorkerId) -> MarketResult<Vec<Submission>> {
        self.store.read(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, worker_id, task_id, option_id, amount, created_at
                 FROM submissions WHERE worker_id = ?1 ORDER BY id ASC",
            )?;
            let submissions = stmt
                .query_map(params![worker_id], |row| {
                    Ok(Submission {
                        id: row.get(0)?,
                        worker_id: row.get(1)?,
                        task_id: row.get(2)?,
                        option_id: row.get(3)?,
                        amount: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(submissions)
        })
    }
}
