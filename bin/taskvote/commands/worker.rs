//! Worker commands: registration, assignment, submission and balance

use crate::style::*;
use anyhow::Result;
use taskvote::{Marketplace, OptionId, Task, TaskId, WorkerId};

fn print_task(task: &Task) {
    print_key_value("Task", &task.id.to_string());
    print_key_value("Title", &task.title);
    for option in &task.options {
        print_key_value(&format!("Option {}", option.id), &option.image_url);
    }
}

pub fn register(market: &Marketplace, address: &str, json: bool) -> Result<()> {
    let worker = market.register_worker(address)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&worker)?);
        return Ok(());
    }

    print_success(&format!("Worker {} ready", worker.id));
    print_key_value("Address", &worker.address);
    print_key_value("Pending", &format_amount(worker.pending_amount));
    Ok(())
}

pub fn next_task(market: &Marketplace, worker_id: i64, json: bool) -> Result<()> {
    let task = market.next_task_for(WorkerId(worker_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&task)?);
        return Ok(());
    }

    match task {
        Some(task) => {
            print_header("Next Task");
            print_task(&task);
            println!();
        }
        None => print_info("No more tasks available right now"),
    }
    Ok(())
}

pub fn submit(
    market: &Marketplace,
    worker_id: i64,
    task_id: i64,
    option_id: i64,
    json: bool,
) -> Result<()> {
    let outcome = market.submit(WorkerId(worker_id), TaskId(task_id), OptionId(option_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    print_success("Submission recorded");
    print_key_value_colored(
        "Reward",
        &format_amount(outcome.credited_amount),
        colors::GREEN,
    );
    print_key_value("Pending", &format_amount(outcome.pending_amount));
    match &outcome.next_task {
        Some(task) => {
            print_header("Next Task");
            print_task(task);
            println!();
        }
        None => print_info("No more tasks available right now"),
    }
    Ok(())
}

pub fn balance(market: &Marketplace, worker_id: i64, json: bool) -> Result<()> {
    let worker = market.worker(WorkerId(worker_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&worker)?);
        return Ok(());
    }

    print_header(&format!("Worker {}", worker.id));
    print_key_value("Address", &worker.address);
    print_key_value_colored("Pending", &format_amount(worker.pending_amount), colors::YELLOW);
    print_key_value("Paid", &format_amount(worker.paid_amount));
    println!();
    Ok(())
}
