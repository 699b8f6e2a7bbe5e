//! Chain access.
//!
//! Defines the `HarvestTarget` trait: the narrow surface of the yield
//! engine contract the keeper consumes, plus the operator balance read.
//! `EngineClient` implements it over JSON-RPC; tests substitute mocks.

pub mod abi;
pub mod engine;
pub mod events;

use alloy::primitives::{Address, TxHash, U256};
use anyhow::Result;
use async_trait::async_trait;

use crate::types::{HarvestReceipt, SimulationResult};

/// Abstraction over the deployed automation target.
///
/// Every method is a single RPC round-trip. Implementors must not retry
/// internally; the scheduler decides what happens on failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HarvestTarget: Send + Sync {
    /// Address of the engine contract being harvested.
    fn engine_address(&self) -> Address;

    /// Address that signs and pays for harvest transactions.
    fn operator_address(&self) -> Address;

    /// Native-currency balance of the operator, in wei.
    async fn operator_balance(&self) -> Result<U256>;

    /// `bountyBps()`: reward rate in basis points.
    async fn bounty_bps(&self) -> Result<U256>;

    /// `stackingRouter()`: must be non-zero for harvests to work.
    async fn stacking_router(&self) -> Result<Address>;

    /// `totalAssets()`: informational only.
    async fn total_assets(&self) -> Result<U256>;

    /// Dry-run `harvest()` without broadcasting.
    ///
    /// A node-reported revert is `Ok(SimulationResult::Reverted)`;
    /// only transport failures are `Err`.
    async fn simulate_harvest(&self) -> Result<SimulationResult>;

    /// Broadcast `harvest()` with a fixed gas limit. Returns once the node
    /// accepted the transaction.
    async fn send_harvest(&self, gas_limit: u64) -> Result<TxHash>;

    /// Wait until `tx_hash` is mined and return its receipt.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<HarvestReceipt>;
}
