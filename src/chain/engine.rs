//! JSON-RPC client for the yield engine contract.
//!
//! Wraps an alloy provider with the operator wallet attached. Only the
//! calls listed on `HarvestTarget` are exposed.

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy::rpc::json_rpc::ErrorPayload;
use alloy::transports::RpcError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::abi::IHarvestEngine::{self, IHarvestEngineInstance};
use super::HarvestTarget;
use crate::config::KeeperConfig;
use crate::types::{HarvestReceipt, SimulationResult};

/// JSON-RPC error code nodes use for `execution reverted`.
const EXECUTION_REVERTED_CODE: i64 = 3;

/// Engine contract client bound to one operator wallet.
pub struct EngineClient {
    provider: DynProvider,
    engine: IHarvestEngineInstance<DynProvider>,
    operator: Address,
}

impl EngineClient {
    /// Build a client from the resolved keeper config.
    ///
    /// No network traffic happens here; the first RPC is made by the caller.
    pub fn new(config: &KeeperConfig) -> Result<Self> {
        let signer = config.signer()?;
        let operator = signer.address();
        let wallet = EthereumWallet::from(signer);

        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(config.rpc_url.clone())
            .erased();

        let engine = IHarvestEngine::new(config.engine_address, provider.clone());

        Ok(Self {
            provider,
            engine,
            operator,
        })
    }
}

/// Split a `harvest()` gas estimate into "would revert" and "could not ask".
///
/// Only an error response that is itself a revert (code 3, or a message
/// mentioning one) means there is nothing to harvest. Rate limits, missing
/// headers and other node-side errors are failures of the dry run.
fn classify_estimate(
    estimate: Result<u64, alloy::contract::Error>,
) -> Result<SimulationResult> {
    match estimate {
        Ok(gas_estimate) => Ok(SimulationResult::Succeeded { gas_estimate }),
        Err(alloy::contract::Error::TransportError(RpcError::ErrorResp(payload)))
            if is_revert(&payload) =>
        {
            debug!(code = payload.code, message = %payload.message, "harvest() estimate reverted");
            Ok(SimulationResult::Reverted {
                reason: payload.message.to_string(),
            })
        }
        Err(e) => Err(e).context("harvest() gas estimation failed"),
    }
}

fn is_revert(payload: &ErrorPayload) -> bool {
    payload.code == EXECUTION_REVERTED_CODE
        || payload.as_revert_data().is_some()
        || payload.message.to_ascii_lowercase().contains("revert")
}

#[async_trait]
impl HarvestTarget for EngineClient {
    fn engine_address(&self) -> Address {
        *self.engine.address()
    }

    fn operator_address(&self) -> Address {
        self.operator
    }

    async fn operator_balance(&self) -> Result<U256> {
        self.provider
            .get_balance(self.operator)
            .await
            .context("Failed to fetch operator balance")
    }

    async fn bounty_bps(&self) -> Result<U256> {
        self.engine
            .bountyBps()
            .call()
            .await
            .context("bountyBps() call failed")
    }

    async fn stacking_router(&self) -> Result<Address> {
        self.engine
            .stackingRouter()
            .call()
            .await
            .context("stackingRouter() call failed")
    }

    async fn total_assets(&self) -> Result<U256> {
        self.engine
            .totalAssets()
            .call()
            .await
            .context("totalAssets() call failed")
    }

    async fn simulate_harvest(&self) -> Result<SimulationResult> {
        classify_estimate(self.engine.harvest().from(self.operator).estimate_gas().await)
    }

    async fn send_harvest(&self, gas_limit: u64) -> Result<TxHash> {
        let pending = self
            .engine
            .harvest()
            .gas(gas_limit)
            .send()
            .await
            .context("Failed to broadcast harvest() transaction")?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<HarvestReceipt> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx_hash)
            .get_receipt()
            .await
            .with_context(|| format!("Failed to confirm transaction {tx_hash}"))?;

        Ok(HarvestReceipt {
            tx_hash: receipt.transaction_hash,
            success: receipt.status(),
            gas_used: receipt.gas_used,
            logs: receipt
                .inner
                .logs()
                .iter()
                .map(|log| log.inner.clone())
                .collect(),
        })
    }
}
