//! Requester commands: create tasks and read tallies

use crate::style::*;
use anyhow::Result;
use taskvote::{Marketplace, NewTask, TaskId};

pub fn create(
    market: &Marketplace,
    owner_address: &str,
    title: String,
    options: Vec<String>,
    amount: Option<u64>,
    signature: Option<String>,
    json: bool,
) -> Result<()> {
    let owner = market.register_requester(owner_address)?;

    let mut new_task = NewTask::new(title, options);
    new_task.amount = amount;
    new_task.payment_reference = signature;

    let task_id = market.create_task(owner.id, new_task)?;
    let task = market.get_task(task_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&task)?);
        return Ok(());
    }

    print_success(&format!("Task {} created", task.id));
    print_key_value("Title", &task.title);
    print_key_value("Amount", &format_amount(task.amount));
    for option in &task.options {
        print_key_value(&format!("Option {}", option.id), &option.image_url);
    }
    Ok(())
}

pub fn tally(market: &Marketplace, task_id: i64, json: bool) -> Result<()> {
    let tally = market.get_task_with_tally(TaskId(task_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tally)?);
        return Ok(());
    }

    print_header(&format!("Task {}", tally.task_id));
    print_key_value("Title", &tally.title);
    let total = tally.total_votes();
    print_key_value("Total votes", &total.to_string());
    println!();

    println!(
        "  {:<10} {:<8} {:<22} {}",
        style_bold("Option"),
        style_bold("Votes"),
        style_bold("Share"),
        style_bold("Image")
    );
    println!("  {}", style_dim(&"─".repeat(60)));

    let mut rows = tally.options.clone();
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    for row in rows {
        let share = if total == 0 {
            0.0
        } else {
            row.count as f64 / total as f64
        };
        println!(
            "  {:<10} {:<8} {} {:>5.1}% {}",
            row.option_id.to_string(),
            row.count,
            progress_bar(share, 14),
            share * 100.0,
            row.image_url
        );
    }
    println!();
    Ok(())
}
