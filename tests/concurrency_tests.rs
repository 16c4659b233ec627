//! Races between independent connections to one ledger database

mod common;

use common::*;
use std::sync::{Arc, Barrier};
use std::thread;
use taskvote::{LedgerStore, MarketError, Marketplace, SimulatedTransfer};
use tempfile::TempDir;

const THREADS: usize = 8;

fn market_at(dir: &TempDir) -> Marketplace {
    let store = LedgerStore::open(dir.path().join("ledger.db")).unwrap();
    Marketplace::new(store, Arc::new(SimulatedTransfer), &test_config())
}

#[test]
fn test_racing_duplicate_submissions_credit_once() {
    let dir = TempDir::new().unwrap();
    let market = market_at(&dir);
    let (owner, worker) = actors(&market);
    let (task, options) = create_task(&market, owner, "race", 2);

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let barrier = barrier.clone();
            let market = market_at(&dir);
            let option = options[i % options.len()];
            thread::spawn(move || {
                barrier.wait();
                market.submit(worker, task, option)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let accepted = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(MarketError::DuplicateSubmission { .. })))
        .count();

    assert_eq!(accepted, 1);
    assert_eq!(duplicates, THREADS - 1);
    assert_eq!(market.peek(worker).unwrap(), REWARD);
    assert_eq!(market.get_task_with_tally(task).unwrap().total_votes(), 1);
}

#[test]
fn test_concurrent_credits_across_tasks_are_not_lost() {
    let dir = TempDir::new().unwrap();
    let market = market_at(&dir);
    let (owner, worker) = actors(&market);
    let tasks: Vec<_> = (0..THREADS)
        .map(|i| create_task(&market, owner, &format!("t{}", i), 2))
        .collect();

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = tasks
        .into_iter()
        .map(|(task, options)| {
            let barrier = barrier.clone();
            let market = market_at(&dir);
            thread::spawn(move || {
                barrier.wait();
                market.submit(worker, task, options[0])
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(market.peek(worker).unwrap(), REWARD * THREADS as u64);
    assert_eq!(market.submissions_for_worker(worker).unwrap().len(), THREADS);
    assert!(market.next_task_for(worker).unwrap().is_none());
}
