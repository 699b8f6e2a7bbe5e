//! Startup checks against the engine contract, run once before the first tick.

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::chain::HarvestTarget;
use crate::types::{KeeperError, Stage};

/// What the keeper learned about the engine at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInfo {
    pub bounty_bps: U256,
    pub stacking_router: Address,
    /// Best-effort read; `None` if the call failed.
    pub total_assets: Option<U256>,
}

impl EngineInfo {
    /// Bounty rate as a percentage (`bps / 100`), if it fits.
    pub fn bounty_percent(&self) -> Option<Decimal> {
        u64::try_from(self.bounty_bps)
            .ok()
            .map(|bps| Decimal::from(bps) / Decimal::ONE_HUNDRED)
    }
}

/// Read `bountyBps()` and `stackingRouter()` and refuse to start if the router is unset.
///
/// RPC failures here are fatal, unlike tick-time failures.
pub async fn preflight(target: &dyn HarvestTarget) -> Result<EngineInfo, KeeperError> {
    let bounty_bps = target
        .bounty_bps()
        .await
        .map_err(|e| KeeperError::rpc(Stage::Preflight, &e))?;
    let stacking_router = target
        .stacking_router()
        .await
        .map_err(|e| KeeperError::rpc(Stage::Preflight, &e))?;

    let total_assets = match target.total_assets().await {
        Ok(assets) => Some(assets),
        Err(e) => {
            warn!(error = %e, "Could not read totalAssets()");
            None
        }
    };

    let info = EngineInfo {
        bounty_bps,
        stacking_router,
        total_assets,
    };

    match info.bounty_percent() {
        Some(pct) => info!(bounty = %format!("{pct}%"), "Bounty"),
        None => info!(bounty_bps = %bounty_bps, "Bounty"),
    }
    info!(router = %stacking_router, "Router");
    if let Some(assets) = total_assets {
        info!(total_assets = %assets, "Engine total assets");
    }

    if stacking_router == Address::ZERO {
        error!("StackingRouter not set on Engine. Cannot harvest.");
        return Err(KeeperError::RouterUnset);
    }

    Ok(info)
}
