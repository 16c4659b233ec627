//! Assignment Selector
//!
//! Picks the oldest task a worker has not submitted to. The answer is derived
//! from committed submissions on every call; nothing about what a worker has
//! already been shown is remembered between calls, so a task whose
//! submission never committed simply becomes eligible again.

use crate::accounts::load_worker;
use crate::catalog::load_task;
use crate::error::MarketResult;
use crate::storage::LedgerStore;
use crate::types::{Task, TaskId, WorkerId};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

/// Oldest task (lowest id) without a submission by `worker_id`.
///
/// Evaluated against whatever `conn` can see, so inside the submission
/// transaction it already excludes the task just submitted.
pub(crate) fn next_task_in(conn: &Connection, worker_id: WorkerId) -> MarketResult<Option<Task>> {
    let next_id: Option<TaskId> = conn
        .query_row(
            "SELECT t.id FROM tasks t
             WHERE NOT EXISTS (
                 SELECT 1 FROM submissions s
                 WHERE s.task_id = t.id AND s.worker_id = ?1
             )
             ORDER BY t.id ASC
             LIMIT 1",
            params![worker_id],
            |row| row.get(0),
        )
        .optional()?;

    match next_id {
        Some(id) => load_task(conn, id),
        None => Ok(None),
    }
}

#[derive(Clone)]
pub struct AssignmentSelector {
    store: LedgerStore,
}

impl AssignmentSelector {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    /// Next task for `worker_id`, or `None` once every task is covered
    pub fn next_task_for(&self, worker_id: WorkerId) -> MarketResult<Option<Task>> {
        let task = self.store.read(|conn| {
            load_worker(conn, worker_id)?;
            next_task_in(conn, worker_id)
        })?;

        match &task {
            Some(task) => debug!("Worker {} assigned task {}", worker_id, task.id),
            None => debug!("No task available for worker {}", worker_id),
        }
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::Accounts;
    use crate::catalog::TaskCatalog;
    use crate::config::CatalogConfig;
    use crate::error::MarketError;
    use crate::types::NewTask;

    fn images() -> Vec<String> {
        vec!["a.jpg".to_string(), "b.jpg".to_string()]
    }

    #[test]
    fn test_oldest_first_and_stable() {
        let store = LedgerStore::in_memory().unwrap();
        let accounts = Accounts::new(store.clone());
        let owner = accounts
            .register_requester("7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU")
            .unwrap();
        let worker = accounts
            .register_worker("9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM")
            .unwrap();
        let catalog = TaskCatalog::new(store.clone(), CatalogConfig::default());
        let selector = AssignmentSelector::new(store);

        assert!(selector.next_task_for(worker.id).unwrap().is_none());

        let first = catalog.create_task(owner.id, NewTask::new("first", images())).unwrap();
        catalog.create_task(owner.id, NewTask::new("second", images())).unwrap();

        let picked = selector.next_task_for(worker.id).unwrap().unwrap();
        assert_eq!(picked.id, first);
        assert_eq!(picked.options.len(), 2);

        // Repeated calls without submissions return the same task
        assert_eq!(selector.next_task_for(worker.id).unwrap().unwrap().id, first);
    }

    #[test]
    fn test_unknown_worker() {
        let selector = AssignmentSelector::new(LedgerStore::in_memory().unwrap());
        assert!(matches!(
            selector.next_task_for(WorkerId(5)),
            Err(MarketError::NotFound { .. })
        ));
    }
}
