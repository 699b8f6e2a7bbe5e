//! Shared types for the harvest keeper.
//!
//! These types form the data model used across all modules.
//! The chain layer produces them, the pipeline stages consume them, and
//! the scheduler and status endpoint only ever read them.

use alloy::primitives::utils::format_ether;
use alloy::primitives::{Log, TxHash, U256};
use chrono::{DateTime, Utc};
use std::fmt;

// ---------------------------------------------------------------------------
// Keeper state
// ---------------------------------------------------------------------------

/// Process-lifetime counters, exclusively owned by the scheduler.
///
/// Lives in memory only. A restart resets both counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeeperState {
    harvest_count: u64,
    total_bounty_earned: U256,
    started_at: DateTime<Utc>,
}

impl Default for KeeperState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for KeeperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "harvests={} | harvested={} | up since {}",
            self.harvest_count,
            format_ether(self.total_bounty_earned),
            self.started_at.to_rfc3339(),
        )
    }
}

impl KeeperState {
    pub fn new() -> Self {
        Self {
            harvest_count: 0,
            total_bounty_earned: U256::ZERO,
            started_at: Utc::now(),
        }
    }

    /// Number of harvest transactions confirmed with a success status.
    pub fn harvest_count(&self) -> u64 {
        self.harvest_count
    }

    /// Sum of `Harvested` amounts across all successful receipts.
    pub fn total_bounty_earned(&self) -> U256 {
        self.total_bounty_earned
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Count one confirmed harvest and accumulate its reward.
    ///
    /// Only the outcome recorder calls this, and only for success receipts.
    pub(crate) fn record_harvest(&mut self, reward: U256) {
        self.harvest_count += 1;
        self.total_bounty_earned = self.total_bounty_earned.saturating_add(reward);
    }
}

// ---------------------------------------------------------------------------
// Chain-facing values
// ---------------------------------------------------------------------------

/// Result of the non-mutating `harvest()` dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationResult {
    /// The node estimated gas for the call, so it would not revert.
    Succeeded { gas_estimate: u64 },
    /// The node reported the call would revert (usually: no pending yield).
    Reverted { reason: String },
}

impl SimulationResult {
    pub fn succeeded(&self) -> bool {
        matches!(self, SimulationResult::Succeeded { .. })
    }
}

/// A confirmed harvest transaction, reduced to what the recorder needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestReceipt {
    pub tx_hash: TxHash,
    /// Receipt status flag (`true` = executed, `false` = reverted on-chain).
    pub success: bool,
    pub gas_used: u64,
    pub logs: Vec<Log>,
}

// ---------------------------------------------------------------------------
// Tick outcome
// ---------------------------------------------------------------------------

/// Pipeline stage that performs RPC work. Used to tag tick errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Preflight,
    Balance,
    Simulate,
    Submit,
    Confirm,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Preflight => write!(f, "preflight"),
            Stage::Balance => write!(f, "balance"),
            Stage::Simulate => write!(f, "simulate"),
            Stage::Submit => write!(f, "submit"),
            Stage::Confirm => write!(f, "confirm"),
        }
    }
}

/// How a single tick ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Operator balance below the gas threshold. Nothing was simulated or sent.
    SkippedInsufficientGas { balance: U256 },
    /// Dry run reverted. Expected steady state when there is no yield.
    SkippedNothingToHarvest,
    /// Receipt status success; counters updated.
    Harvested {
        tx_hash: TxHash,
        gas_used: u64,
        reward: U256,
    },
    /// Receipt status failure despite a clean dry run (lost a race).
    Reverted { tx_hash: TxHash, gas_used: u64 },
    /// Transport/RPC failure or confirmation timeout. The failing stage is
    /// carried by the error, see [`KeeperError::stage`].
    Errored { error: KeeperError },
}

impl TickOutcome {
    /// Short label used in logs and the status endpoint.
    pub fn label(&self) -> &'static str {
        match self {
            TickOutcome::SkippedInsufficientGas { .. } => "skipped_insufficient_gas",
            TickOutcome::SkippedNothingToHarvest => "skipped_nothing_to_harvest",
            TickOutcome::Harvested { .. } => "harvested",
            TickOutcome::Reverted { .. } => "reverted",
            TickOutcome::Errored { .. } => "errored",
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            TickOutcome::SkippedInsufficientGas { .. } | TickOutcome::SkippedNothingToHarvest
        )
    }
}

impl fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickOutcome::SkippedInsufficientGas { balance } => {
                write!(f, "skipped: insufficient gas ({} native)", format_ether(*balance))
            }
            TickOutcome::SkippedNothingToHarvest => write!(f, "skipped: nothing to harvest"),
            TickOutcome::Harvested { tx_hash, gas_used, reward } => write!(
                f,
                "harvested {} (tx {tx_hash}, gas {gas_used})",
                format_ether(*reward)
            ),
            TickOutcome::Reverted { tx_hash, gas_used } => {
                write!(f, "reverted on-chain (tx {tx_hash}, gas {gas_used})")
            }
            TickOutcome::Errored { error } => write!(f, "errored: {error}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Harvest attempt
// ---------------------------------------------------------------------------

/// Everything observed during one tick. Built up stage by stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestAttempt {
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
    pub gas_balance: Option<U256>,
    pub simulation: Option<SimulationResult>,
    pub tx_hash: Option<TxHash>,
    pub receipt_status: Option<bool>,
    pub gas_used: Option<u64>,
    pub reward: Option<U256>,
}

impl HarvestAttempt {
    pub fn begin(tick: u64) -> Self {
        Self {
            tick,
            timestamp: Utc::now(),
            gas_balance: None,
            simulation: None,
            tx_hash: None,
            receipt_status: None,
            gas_used: None,
            reward: None,
        }
    }

    /// Whether a transaction was broadcast during this attempt.
    pub fn submitted(&self) -> bool {
        self.tx_hash.is_some()
    }
}

/// Summary of a complete tick: the attempt record plus its final outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub attempt: HarvestAttempt,
    pub outcome: TickOutcome,
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tick #{}: {}", self.attempt.tick, self.outcome)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the keeper.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeeperError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("StackingRouter not set on engine; cannot harvest")]
    RouterUnset,

    #[error("RPC error during {stage}: {message}")]
    Rpc { stage: Stage, message: String },

    #[error("Timed out after {timeout_secs}s waiting for receipt of {tx_hash}")]
    ConfirmationTimeout { tx_hash: TxHash, timeout_secs: u64 },
}

impl KeeperError {
    /// Wrap a chain-layer error, keeping its full context chain.
    pub fn rpc(stage: Stage, err: &anyhow::Error) -> Self {
        KeeperError::Rpc {
            stage,
            message: format!("{err:#}"),
        }
    }

    /// Pipeline stage the error came from, if it came from one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            KeeperError::Rpc { stage, .. } => Some(*stage),
            KeeperError::ConfirmationTimeout { .. } => Some(Stage::Confirm),
            KeeperError::RouterUnset => Some(Stage::Preflight),
            KeeperError::Config(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
