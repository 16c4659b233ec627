//! Taskvote CLI
//!
//! Operates the marketplace core directly against a ledger database.

mod commands;
mod style;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use taskvote::{MarketConfig, Marketplace};

#[derive(Parser, Debug)]
#[command(name = "taskvote")]
#[command(about = "Micro-task voting marketplace: tasks, submissions, rewards and payouts")]
struct Cli {
    /// Ledger database file
    #[arg(long, global = true, env = "TASKVOTE_DB")]
    db: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, global = true, env = "TASKVOTE_CONFIG")]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Post a new task (requester)
    CreateTask {
        /// Requester wallet address
        #[arg(long)]
        owner: String,
        #[arg(long)]
        title: String,
        /// Image reference, repeat once per option
        #[arg(long = "option", required = true)]
        options: Vec<String>,
        /// Amount attached to the task, in minor units
        #[arg(long)]
        amount: Option<u64>,
        /// Funding transaction signature
        #[arg(long)]
        signature: Option<String>,
    },
    /// Show vote counts per option
    Tally { task_id: i64 },
    /// Find or create a worker for a wallet address
    RegisterWorker { address: String },
    /// Show the next task for a worker
    NextTask { worker_id: i64 },
    /// Record a worker's choice for a task
    Submit {
        worker_id: i64,
        task_id: i64,
        option_id: i64,
    },
    /// Show a worker's pending and paid balance
    Balance { worker_id: i64 },
    /// Pay out a worker's pending balance
    Payout { worker_id: i64 },
    /// List a worker's payout attempts
    History { worker_id: i64 },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("taskvote=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        style::print_error(&commands::describe_error(&e));
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<MarketConfig> {
    let mut config = match &cli.config {
        Some(path) => MarketConfig::load(path)?,
        None => MarketConfig::default(),
    };
    config.apply_env()?;
    if let Some(db) = &cli.db {
        config.store.path = Some(db.clone());
    }
    if config.store.path.is_none() {
        config.store.path = Some(PathBuf::from("taskvote.db"));
    }
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let market =
        Marketplace::from_config(&config, None).context("Failed to open the marketplace")?;
    let json = cli.json;

    match cli.command {
        Command::CreateTask {
            owner,
            title,
            options,
            amount,
            signature,
        } => commands::task::create(&market, &owner, title, options, amount, signature, json),
        Command::Tally { task_id } => commands::task::tally(&market, task_id, json),
        Command::RegisterWorker { address } => commands::worker::register(&market, &address, json),
        Command::NextTask { worker_id } => commands::worker::next_task(&market, worker_id, json),
        Command::Submit {
            worker_id,
            task_id,
            option_id,
        } => commands::worker::submit(&market, worker_id, task_id, option_id, json),
        Command::Balance { worker_id } => commands::worker::balance(&market, worker_id, json),
        Command::Payout { worker_id } => commands::payout::run(&market, worker_id, json).await,
        Command::History { worker_id } => commands::payout::history(&market, worker_id, json),
    }
}
