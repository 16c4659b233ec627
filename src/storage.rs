//! Ledger Store
//!
//! SQLite-backed durable storage for tasks, options, workers, submissions,
//! balances and payout attempts. Provides:
//! - Atomic multi-row transactions (`transaction`)
//! - A uniqueness constraint on (worker_id, task_id) for submissions
//! - Row-level atomic balance updates used by the reward ledger
//!
//! Several `LedgerStore` handles may point at the same database file; writers
//! take the database lock up front (IMMEDIATE) and wait up to the busy timeout.

use crate::config::StoreConfig;
use crate::error::{MarketError, MarketResult};
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    address TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE TABLE IF NOT EXISTS workers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    address TEXT NOT NULL UNIQUE,
    pending_amount INTEGER NOT NULL DEFAULT 0 CHECK (pending_amount >= 0),
    paid_amount INTEGER NOT NULL DEFAULT 0 CHECK (paid_amount >= 0),
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

-- AUTOINCREMENT keeps ids strictly ascending in creation order
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    amount INTEGER NOT NULL,
    owner_id INTEGER NOT NULL REFERENCES users(id),
    payment_reference TEXT,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_tasks_owner ON tasks(owner_id);

CREATE TABLE IF NOT EXISTS task_options (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id INTEGER NOT NULL REFERENCES tasks(id),
    image_url TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_options_task ON task_options(task_id);

CREATE TABLE IF NOT EXISTS submissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    worker_id INTEGER NOT NULL REFERENCES workers(id),
    task_id INTEGER NOT NULL REFERENCES tasks(id),
    option_id INTEGER NOT NULL REFERENCES task_options(id),
    amount INTEGER NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    UNIQUE (worker_id, task_id)
);

CREATE INDEX IF NOT EXISTS idx_submissions_option ON submissions(option_id);

CREATE TABLE IF NOT EXISTS payouts (
    id TEXT PRIMARY KEY,
    worker_id INTEGER NOT NULL REFERENCES workers(id),
    amount INTEGER NOT NULL,
    destination TEXT NOT NULL,
    status TEXT NOT NULL,
    transfer_id TEXT,
    error TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_payouts_worker ON payouts(worker_id);

-- At most one transfer in flight per worker
CREATE UNIQUE INDEX IF NOT EXISTS idx_payouts_in_flight
    ON payouts(worker_id) WHERE status = 'submitted';
"#;

/// Cloneable handle to the ledger database
#[derive(Clone)]
pub struct LedgerStore {
    conn: Arc<Mutex<Connection>>,
}

impl LedgerStore {
    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> MarketResult<Self> {
        Self::open_with_timeout(path.as_ref(), Duration::from_millis(5_000))
    }

    /// Create in-memory storage (for testing)
    pub fn in_memory() -> MarketResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    /// Open the configured store, retrying per the reconnect policy.
    ///
    /// Blocks the calling thread between attempts. Fails with `Storage` once
    /// the policy's attempts are exhausted.
    pub fn connect(config: &StoreConfig) -> MarketResult<Self> {
        let Some(path) = &config.path else {
            return Self::in_memory();
        };
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let policy = &config.reconnect;

        let mut last_error = None;
        for attempt in 1..=policy.max_attempts {
            match Self::open_with_timeout(path, busy_timeout) {
                Ok(store) => return Ok(store),
                Err(e) => {
                    warn!(
                        "Ledger store connection attempt {}/{} failed: {}",
                        attempt, policy.max_attempts, e
                    );
                    if attempt < policy.max_attempts {
                        std::thread::sleep(policy.delay_for(attempt));
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(MarketError::Storage(format!(
            "failed to open ledger store after {} attempts: {}",
            policy.max_attempts,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    fn open_with_timeout(path: &Path, busy_timeout: Duration) -> MarketResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                MarketError::Storage(format!("cannot create {:?}: {}", parent, e))
            })?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let store = Self::init(conn)?;
        info!("Ledger store initialized at {:?}", path);
        Ok(store)
    }

    fn init(conn: Connection) -> MarketResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a read-only closure against a consistent snapshot
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> MarketResult<T>) -> MarketResult<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `f` inside one IMMEDIATE transaction.
    ///
    /// Commits only if `f` returns `Ok`; any error rolls back everything `f`
    /// wrote.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> MarketResult<T>,
    ) -> MarketResult<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

/// True if `err` is a UNIQUE or PRIMARY KEY constraint violation
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}
