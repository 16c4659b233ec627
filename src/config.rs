//! Marketplace Configuration
//!
//! Defines the configuration for the marketplace core including:
//! - Per-submission reward
//! - Task catalog limits
//! - Payout behaviour
//! - Ledger store location and reconnection policy

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete marketplace configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Reward configuration
    pub rewards: RewardConfig,
    /// Task catalog limits
    pub catalog: CatalogConfig,
    /// Payout configuration
    pub payout: PayoutConfig,
    /// Ledger store configuration
    pub store: StoreConfig,
}

impl MarketConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: MarketConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TASKVOTE_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("TASKVOTE_DB") {
            self.store.path = Some(PathBuf::from(path));
        }
        if let Ok(reward) = std::env::var("TASKVOTE_REWARD") {
            self.rewards.per_submission = reward
                .parse()
                .with_context(|| format!("Invalid TASKVOTE_REWARD: {}", reward))?;
        }
        if let Ok(mode) = std::env::var("TASKVOTE_PAYOUT_MODE") {
            self.payout.mode = match mode.to_ascii_lowercase().as_str() {
                "live" => PayoutMode::Live,
                "simulated" => PayoutMode::Simulated,
                other => anyhow::bail!("Invalid TASKVOTE_PAYOUT_MODE: {}", other),
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.rewards.per_submission > 0,
            "rewards.per_submission must be positive"
        );
        anyhow::ensure!(
            self.catalog.min_options >= 2,
            "catalog.min_options must be at least 2"
        );
        anyhow::ensure!(
            self.catalog.max_options >= self.catalog.min_options,
            "catalog.max_options must be >= catalog.min_options"
        );
        anyhow::ensure!(
            self.catalog.max_title_len > 0,
            "catalog.max_title_len must be positive"
        );
        anyhow::ensure!(
            self.store.reconnect.max_attempts > 0,
            "store.reconnect.max_attempts must be positive"
        );
        Ok(())
    }
}

/// Reward paid for each submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Platform-wide credit per submission, in minor units
    pub per_submission: u64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            per_submission: 10_000_000, // 0.01 SOL in lamports
        }
    }
}

/// Task catalog limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Maximum title length in characters
    pub max_title_len: usize,
    /// Minimum options per task
    pub min_options: usize,
    /// Maximum options per task
    pub max_options: usize,
    /// Amount recorded on a task when the requester does not give one
    pub default_task_amount: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            max_title_len: 256,
            min_options: 2,
            max_options: 10,
            default_task_amount: 100_000_000, // 0.1 SOL
        }
    }
}

/// How payouts reach the funds-transfer capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutMode {
    /// Use the injected transfer client; without one every payout is refused
    #[default]
    Live,
    /// Confirm immediately without moving funds
    Simulated,
}

/// Payout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PayoutConfig {
    pub mode: PayoutMode,
    /// How long to wait for a submitted transfer to finalize
    pub finality_timeout_secs: u64,
    /// Age after which a `submitted` payout no longer blocks a new attempt
    pub stale_claim_secs: u64,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            mode: PayoutMode::Live,
            finality_timeout_secs: 60,
            stale_claim_secs: 600,
        }
    }
}

impl PayoutConfig {
    pub fn finality_timeout(&self) -> Duration {
        Duration::from_secs(self.finality_timeout_secs)
    }
}

/// Ledger store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file. `None` keeps everything in memory.
    pub path: Option<PathBuf>,
    /// How long a writer waits on a locked database
    pub busy_timeout_ms: u64,
    pub reconnect: ReconnectPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5_000,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Bounded retry policy for opening the ledger store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    /// Delay growth factor between attempts (1.0 = constant delay)
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 3_000,
            multiplier: 1.0,
            max_delay_ms: 30_000,
        }
    }
}

impl ReconnectPolicy {
    /// Policy that tries exactly once
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay to sleep after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let delay = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(delay as u64)
    }
}
