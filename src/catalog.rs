//! Task Catalog
//!
//! Owns task and option definitions. Tasks are written once, together with
//! their options, and never edited afterwards.

use crate::config::CatalogConfig;
use crate::error::{MarketError, MarketResult};
use crate::storage::LedgerStore;
use crate::types::{NewTask, OptionTally, Task, TaskId, TaskOption, TaskTally, UserId};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

/// Load a task with its options, `None` if the id is unknown
pub(crate) fn load_task(conn: &Connection, task_id: TaskId) -> MarketResult<Option<Task>> {
    let task = conn
        .query_row(
            "SELECT id, title, amount, owner_id, payment_reference, created_at
             FROM tasks WHERE id = ?1",
            params![task_id],
            |row| {
                Ok(Task {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    amount: row.get(2)?,
                    owner_id: row.get(3)?,
                    payment_reference: row.get(4)?,
                    options: Vec::new(),
                    created_at: row.get(5)?,
                })
            },
        )
        .optional()?;

    let Some(mut task) = task else {
        return Ok(None);
    };

    let mut stmt = conn.prepare_cached(
        "SELECT id, task_id, image_url FROM task_options WHERE task_id = ?1 ORDER BY id ASC",
    )?;
    task.options = stmt
        .query_map(params![task_id], |row| {
            Ok(TaskOption {
                id: row.get(0)?,
                task_id: row.get(1)?,
                image_url: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(task))
}

#[derive(Clone)]
pub struct TaskCatalog {
    store: LedgerStore,
    config: CatalogConfig,
}

impl TaskCatalog {
    pub fn new(store: LedgerStore, config: CatalogConfig) -> Self {
        Self { store, config }
    }

    fn validate(&self, new_task: &NewTask) -> MarketResult<()> {
        let title = new_task.title.trim();
        if title.is_empty() {
            return Err(MarketError::Validation("task title is empty".to_string()));
        }
        let title_len = title.chars().count();
        if title_len > self.config.max_title_len {
            return Err(MarketError::Validation(format!(
                "task title is {} characters, maximum is {}",
                title_len, self.config.max_title_len
            )));
        }

        let count = new_task.options.len();
        if count < self.config.min_options {
            return Err(MarketError::Validation(format!(
                "task needs at least {} options, got {}",
                self.config.min_options, count
            )));
        }
        if count > self.config.max_options {
            return Err(MarketError::Validation(format!(
                "task allows at most {} options, got {}",
                self.config.max_options, count
            )));
        }
        if new_task.options.iter().any(|url| url.trim().is_empty()) {
            return Err(MarketError::Validation(
                "option image reference is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Persist a task and all its options as one atomic unit
    pub fn create_task(&self, owner_id: UserId, new_task: NewTask) -> MarketResult<TaskId> {
        self.validate(&new_task)?;
        let amount = new_task.amount.unwrap_or(self.config.default_task_amount);

        let task_id = self.store.transaction(|tx| {
            let owner_exists = tx
                .query_row(
                    "SELECT 1 FROM users WHERE id = ?1",
                    params![owner_id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if !owner_exists {
                return Err(MarketError::not_found("Requester", owner_id));
            }

            tx.execute(
                "INSERT INTO tasks (title, amount, owner_id, payment_reference)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    new_task.title.trim(),
                    amount,
                    owner_id,
                    new_task.payment_reference
                ],
            )?;
            let task_id = TaskId(tx.last_insert_rowid());

            let mut stmt =
                tx.prepare_cached("INSERT INTO task_options (task_id, image_url) VALUES (?1, ?2)")?;
            for image_url in &new_task.options {
                stmt.execute(params![task_id, image_url])?;
            }
            Ok(task_id)
        })?;

        info!(
            "Created task {} with {} options for requester {}",
            task_id,
            new_task.options.len(),
            owner_id
        );
        Ok(task_id)
    }

    pub fn get_task(&self, task_id: TaskId) -> MarketResult<Task> {
        self.store
            .read(|conn| load_task(conn, task_id))?
            .ok_or_else(|| MarketError::not_found("Task", task_id))
    }

    /// Per-option submission counts, zero for options nobody picked
    pub fn get_task_with_tally(&self, task_id: TaskId) -> MarketResult<TaskTally> {
        self.store.read(|conn| {
            let title: String = conn
                .query_row(
                    "SELECT title FROM tasks WHERE id = ?1",
                    params![task_id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| MarketError::not_found("Task", task_id))?;

            let mut stmt = conn.prepare_cached(
                "SELECT o.id, o.image_url, COUNT(s.id)
                 FROM task_options o
                 LEFT JOIN submissions s ON s.option_id = o.id
                 WHERE o.task_id = ?1
                 GROUP BY o.id, o.image_url
                 ORDER BY o.id ASC",
            )?;
            let options = stmt
                .query_map(params![task_id], |row| {
                    Ok(OptionTally {
                        option_id: row.get(0)?,
                        image_url: row.get(1)?,
                        count: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(TaskTally {
                task_id,
                title,
                options,
            })
        })
    }

    /// A requester's tasks, oldest first
    pub fn list_tasks_for_owner(&self, owner_id: UserId) -> MarketResult<Vec<Task>> {
        self.store.read(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT id FROM tasks WHERE owner_id = ?1 ORDER BY id ASC")?;
            let ids = stmt
                .query_map(params![owner_id], |row| row.get::<_, TaskId>(0))?
                .collect::<Result<Vec<_>, _>>()?;

            let mut tasks = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(task) = load_task(conn, id)? {
                    tasks.push(task);
                }
            }
            Ok(tasks)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::Accounts;

    fn setup() -> (TaskCatalog, UserId) {
        let store = LedgerStore::in_memory().unwrap();
        let owner = Accounts::new(store.clone())
            .register_requester("7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU")
            .unwrap();
        (TaskCatalog::new(store, CatalogConfig::default()), owner.id)
    }

    fn images(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("uploads/1/{}.jpg", i)).collect()
    }

    #[test]
    fn test_create_and_get_task() {
        let (catalog, owner) = setup();
        let id = catalog
            .create_task(
                owner,
                NewTask::new("  Pick the best thumbnail ", images(3))
                    .with_payment_reference("5VERv8NMvzbJMEkV8xnrLkEaWRtSz9CosKDYjCJjBRnbJLgp8uirBgmQpjKhoR4tjF3ZpRzrFmBV6UjKdiSZkQUW"),
            )
            .unwrap();

        let task = catalog.get_task(id).unwrap();
        assert_eq!(task.title, "Pick the best thumbnail");
        assert_eq!(task.amount, CatalogConfig::default().default_task_amount);
        assert_eq!(task.options.len(), 3);
        assert!(task.options.iter().all(|o| o.task_id == id));
        assert_eq!(task.options[0].image_url, "uploads/1/0.jpg");
        assert!(task.payment_reference.is_some());
    }

    #[test]
    fn test_task_ids_follow_creation_order() {
        let (catalog, owner) = setup();
        let first = catalog.create_task(owner, NewTask::new("one", images(2))).unwrap();
        let second = catalog.create_task(owner, NewTask::new("two", images(2))).unwrap();
        assert!(first < second);

        let listed: Vec<_> = catalog
            .list_tasks_for_owner(owner)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(listed, vec![first, second]);
    }

    #[test]
    fn test_validation_failures() {
        let (catalog, owner) = setup();

        let cases = vec![
            NewTask::new("only one option", images(1)),
            NewTask::new("   ", images(2)),
            NewTask::new("x".repeat(257), images(2)),
            NewTask::new("too many", images(11)),
            NewTask::new("blank image", vec!["a.jpg".to_string(), " ".to_string()]),
        ];
        for case in cases {
            match catalog.create_task(owner, case.clone()) {
                Err(MarketError::Validation(_)) => {}
                other => panic!("Expected Validation for {:?}, got: {:?}", case.title, other),
            }
        }
        assert!(catalog.list_tasks_for_owner(owner).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_owner() {
        let (catalog, _) = setup();
        let result = catalog.create_task(UserId(404), NewTask::new("t", images(2)));
        assert!(matches!(result, Err(MarketError::NotFound { .. })));
    }

    #[test]
    fn test_tally_of_fresh_task_is_zero() {
        let (catalog, owner) = setup();
        let id = catalog.create_task(owner, NewTask::new("t", images(2))).unwrap();

        let tally = catalog.get_task_with_tally(id).unwrap();
        assert_eq!(tally.title, "t");
        assert_eq!(tally.options.len(), 2);
        assert!(tally.options.iter().all(|o| o.count == 0));
    }

    #[test]
    fn test_tally_unknown_task() {
        let (catalog, _) = setup();
        assert!(matches!(
            catalog.get_task_with_tally(TaskId(1)),
            Err(MarketError::NotFound { .. })
        ));
    }
}
