//! Payout commands

use crate::style::*;
use anyhow::Result;
use taskvote::{Marketplace, PayoutStatus, WorkerId};

pub async fn run(market: &Marketplace, worker_id: i64, json: bool) -> Result<()> {
    let receipt = market.request_payout(WorkerId(worker_id)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&receipt)?);
        return Ok(());
    }

    print_success("Payout confirmed");
    print_key_value_colored("Amount", &format_amount(receipt.amount), colors::GREEN);
    print_key_value("Destination", &receipt.destination);
    print_key_value("Transfer", &receipt.transfer_id);
    if receipt.remaining_pending > 0 {
        print_warning(&format!(
            "{} was credited while the payout was in flight and is still pending",
            format_amount(receipt.remaining_pending)
        ));
    }
    Ok(())
}

pub fn history(market: &Marketplace, worker_id: i64, json: bool) -> Result<()> {
    let records = market.payout_history(WorkerId(worker_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    print_header(&format!("Payouts for worker {}", worker_id));
    if records.is_empty() {
        print_info("No payouts yet");
        return Ok(());
    }

    for record in &records {
        let color = match record.status {
            PayoutStatus::Confirmed => colors::GREEN,
            PayoutStatus::Submitted => colors::CYAN,
            PayoutStatus::Failed => colors::RED,
            PayoutStatus::Uncertain => colors::YELLOW,
        };
        let when = chrono::DateTime::from_timestamp(record.created_at, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        println!(
            "  {} {}{:<10}{} {} {}",
            style_dim(&when),
            color,
            record.status.as_str(),
            colors::RESET,
            format_amount(record.amount),
            record.transfer_id.as_deref().unwrap_or("-")
        );
        if let Some(error) = &record.error {
            println!("    {}", style_dim(error));
        }
    }
    println!();
    Ok(())
}
