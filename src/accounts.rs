//! Worker and requester accounts
//!
//! Identities are created on first contact from a wallet address. The
//! authentication layer hands verified ids to the core, which trusts them.

use crate::error::{MarketError, MarketResult};
use crate::storage::LedgerStore;
use crate::types::{User, UserId, Worker, WorkerId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Check that `address` looks like a base58 wallet public key
pub fn validate_address(address: &str) -> MarketResult<()> {
    if !(32..=44).contains(&address.len()) {
        return Err(MarketError::Validation(format!(
            "wallet address must be 32-44 characters, got {}",
            address.len()
        )));
    }
    if let Some(c) = address.chars().find(|c| !BASE58_ALPHABET.contains(*c)) {
        return Err(MarketError::Validation(format!(
            "wallet address contains invalid character '{}'",
            c
        )));
    }
    Ok(())
}

pub(crate) fn worker_from_row(row: &Row<'_>) -> rusqlite::Result<Worker> {
    Ok(Worker {
        id: row.get(0)?,
        address: row.get(1)?,
        pending_amount: row.get(2)?,
        paid_amount: row.get(3)?,
    })
}

pub(crate) fn load_worker(conn: &Connection, worker_id: WorkerId) -> MarketResult<Worker> {
    conn.query_row(
        "SELECT id, address, pending_amount, paid_amount FROM workers WHERE id = ?1",
        params![worker_id],
        worker_from_row,
    )
    .optional()?
    .ok_or_else(|| MarketError::not_found("Worker", worker_id))
}

/// Find-or-create identities
#[derive(Clone)]
pub struct Accounts {
    store: LedgerStore,
}

impl Accounts {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    /// Return the worker for `address`, creating it with a zero balance on first contact
    pub fn register_worker(&self, address: &str) -> MarketResult<Worker> {
        validate_address(address)?;
        self.store.transaction(|tx| {
            let inserted = tx.execute(
                "INSERT INTO workers (address) VALUES (?1) ON CONFLICT(address) DO NOTHING",
                params![address],
            )?;
            let worker = tx.query_row(
                "SELECT id, address, pending_amount, paid_amount FROM workers WHERE address = ?1",
                params![address],
                worker_from_row,
            )?;
            if inserted > 0 {
                info!("Registered worker {} ({})", worker.id, address);
            }
            Ok(worker)
        })
    }

    /// Return the requester for `address`, creating it on first contact
    pub fn register_requester(&self, address: &str) -> MarketResult<User> {
        validate_address(address)?;
        self.store.transaction(|tx| {
            tx.execute(
                "INSERT INTO users (address) VALUES (?1) ON CONFLICT(address) DO NOTHING",
                params![address],
            )?;
            let user = tx.query_row(
                "SELECT id, address FROM users WHERE address = ?1",
                params![address],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        address: row.get(1)?,
                    })
                },
            )?;
            Ok(user)
        })
    }

    pub fn worker(&self, worker_id: WorkerId) -> MarketResult<Worker> {
        self.store.read(|conn| load_worker(conn, worker_id))
    }

    pub fn requester(&self, user_id: UserId) -> MarketResult<User> {
        self.store.read(|conn| {
            conn.query_row(
                "SELECT id, address FROM users WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        address: row.get(1)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| MarketError::not_found("Requester", user_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALLET: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";

    #[test]
    fn test_validate_address() {
        validate_address(WALLET).unwrap();
        assert!(validate_address("short").is_err());
        // '0' and 'O' are not in the base58 alphabet
        assert!(validate_address("0xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU").is_err());
    }

    #[test]
    fn test_register_worker_is_find_or_create() {
        let accounts = Accounts::new(LedgerStore::in_memory().unwrap());

        let first = accounts.register_worker(WALLET).unwrap();
        assert_eq!(first.pending_amount, 0);
        assert_eq!(first.paid_amount, 0);

        let again = accounts.register_worker(WALLET).unwrap();
        assert_eq!(first, again);
        assert_eq!(accounts.worker(first.id).unwrap(), first);
    }

    #[test]
    fn test_register_requester() {
        let accounts = Accounts::new(LedgerStore::in_memory().unwrap());
        let user = accounts.register_requester(WALLET).unwrap();
        assert_eq!(accounts.register_requester(WALLET).unwrap().id, user.id);
        assert_eq!(accounts.requester(user.id).unwrap().address, WALLET);
    }

    #[test]
    fn test_unknown_worker() {
        let accounts = Accounts::new(LedgerStore::in_memory().unwrap());
        match accounts.worker(WorkerId(99)) {
            Err(MarketError::NotFound { entity, id }) => {
                assert_eq!(entity, "Worker");
                assert_eq!(id, "99");
            }
            other => panic!("Expected NotFound, got: {:?}", other),
        }
    }
}
