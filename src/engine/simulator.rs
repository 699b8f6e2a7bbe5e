//! Dry-run simulator.
//!
//! The keeper does not track pending yield itself; the cheapest reliable
//! signal is whether `harvest()` would revert right now.

use tracing::{debug, info};

use crate::chain::HarvestTarget;
use crate::types::{KeeperError, SimulationResult, Stage};

/// Simulate `harvest()` against current chain state.
///
/// A revert is a normal result (nothing to harvest), logged at low
/// severity. Transport failures surface as `KeeperError::Rpc`.
pub async fn dry_run(target: &dyn HarvestTarget) -> Result<SimulationResult, KeeperError> {
    let result = target
        .simulate_harvest()
        .await
        .map_err(|e| KeeperError::rpc(Stage::Simulate, &e))?;

    match &result {
        SimulationResult::Succeeded { gas_estimate } => {
            info!(gas_estimate, "Gas estimate");
        }
        SimulationResult::Reverted { reason } => {
            debug!(reason = %reason, "estimateGas reverted");
            info!("No yield to harvest (estimateGas reverted). Skipping.");
        }
    }

    Ok(result)
}
