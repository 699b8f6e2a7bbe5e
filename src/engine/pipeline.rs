//! The per-tick pipeline: gas guard → dry run → submit → confirm → record.
//!
//! Every stage may end the tick early. Nothing here returns an error: RPC
//! failures become `TickOutcome::Errored` so the scheduler keeps running.

use alloy::primitives::U256;
use std::time::Duration;
use tracing::{error, info};

use super::guard::{GasCheck, GasGuard, DEFAULT_MIN_GAS_BALANCE_WEI};
use super::recorder::Recorder;
use super::simulator;
use super::submitter::{Submitter, DEFAULT_CONFIRMATION_TIMEOUT, HARVEST_GAS_LIMIT};
use crate::chain::HarvestTarget;
use crate::config::KeeperConfig;
use crate::types::{HarvestAttempt, KeeperError, KeeperState, SimulationResult, TickOutcome, TickReport};

/// Knobs the pipeline stages need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub min_gas_balance: U256,
    pub gas_limit: u64,
    pub confirmation_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            min_gas_balance: U256::from(DEFAULT_MIN_GAS_BALANCE_WEI),
            gas_limit: HARVEST_GAS_LIMIT,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }
}

impl From<&KeeperConfig> for PipelineSettings {
    fn from(config: &KeeperConfig) -> Self {
        Self {
            min_gas_balance: config.min_gas_balance,
            gas_limit: HARVEST_GAS_LIMIT,
            confirmation_timeout: config.confirmation_timeout,
        }
    }
}

pub struct Pipeline {
    guard: GasGuard,
    submitter: Submitter,
}

impl Pipeline {
    pub fn new(settings: &PipelineSettings) -> Self {
        Self {
            guard: GasGuard::new(settings.min_gas_balance),
            submitter: Submitter::new(settings.gas_limit, settings.confirmation_timeout),
        }
    }

    /// Run one tick to completion and report what happened.
    pub async fn run_tick(
        &self,
        target: &dyn HarvestTarget,
        state: &mut KeeperState,
        tick: u64,
    ) -> TickReport {
        let mut attempt = HarvestAttempt::begin(tick);
        info!(tick, timestamp = %attempt.timestamp.to_rfc3339(), "Checking harvest opportunity...");

        let outcome = match self.run_stages(target, state, &mut attempt).await {
            Ok(outcome) => outcome,
            Err(error) => {
                error!(tick, error = %error, "Harvest failed");
                TickOutcome::Errored { error }
            }
        };

        TickReport { attempt, outcome }
    }

    async fn run_stages(
        &self,
        target: &dyn HarvestTarget,
        state: &mut KeeperState,
        attempt: &mut HarvestAttempt,
    ) -> Result<TickOutcome, KeeperError> {
        // 1. Gas guard
        let check = self.guard.check(target).await?;
        attempt.gas_balance = Some(check.balance());
        if let GasCheck::Insufficient { balance } = check {
            return Ok(TickOutcome::SkippedInsufficientGas { balance });
        }

        // 2. Dry run
        let simulation = simulator::dry_run(target).await?;
        attempt.simulation = Some(simulation.clone());
        if let SimulationResult::Reverted { .. } = simulation {
            return Ok(TickOutcome::SkippedNothingToHarvest);
        }

        // 3. Submit
        let tx_hash = self.submitter.submit(target).await?;
        attempt.tx_hash = Some(tx_hash);

        // 4. Confirm
        let receipt = self.submitter.confirm(target, tx_hash).await?;
        attempt.receipt_status = Some(receipt.success);
        attempt.gas_used = Some(receipt.gas_used);

        // 5. Record
        let outcome = Recorder::record(state, &receipt, target.engine_address());
        if let TickOutcome::Harvested { reward, .. } = &outcome {
            attempt.reward = Some(*reward);
        }
        Ok(outcome)
    }
}
