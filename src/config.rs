//! Configuration loading from an optional TOML file plus environment.
//!
//! `keeper.toml` carries non-secret defaults. Environment variables (and
//! `.env`, loaded by `main`) override the file. The operator key is only
//! ever read from the environment and is held as a secret.

use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use reqwest::Url;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::guard::DEFAULT_MIN_GAS_BALANCE_WEI;
use crate::types::KeeperError;

/// Default TOML config path, overridable via `KEEPER_CONFIG`.
pub const DEFAULT_CONFIG_FILE: &str = "keeper.toml";

pub const DEFAULT_RPC_URL: &str = "https://bsc-dataseed.binance.org/";
pub const DEFAULT_INTERVAL_MS: u64 = 3_600_000;
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 300;

/// Environment variable names.
pub mod env {
    pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
    pub const ENGINE_ADDRESS: &str = "ENGINE_ADDRESS";
    pub const RPC_URL: &str = "BNB_RPC_URL";
    pub const INTERVAL_MS: &str = "INTERVAL_MS";
    pub const MIN_PROFIT_USD: &str = "MIN_PROFIT_USD";
    pub const MIN_GAS_BALANCE: &str = "MIN_GAS_BALANCE";
    pub const CONFIRMATION_TIMEOUT_SECS: &str = "CONFIRMATION_TIMEOUT_SECS";
    pub const STATUS_PORT: &str = "KEEPER_STATUS_PORT";
    pub const CONFIG_PATH: &str = "KEEPER_CONFIG";
}

// ---------------------------------------------------------------------------
// File layer
// ---------------------------------------------------------------------------

/// Shape of `keeper.toml`. Every field is optional.
#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub rpc_url: Option<String>,
    pub engine_address: Option<String>,
    pub interval_ms: Option<u64>,
    pub min_profit_usd: Option<f64>,
    /// Native-currency units as a decimal string, e.g. `"0.005"`.
    pub min_gas_balance: Option<String>,
    pub confirmation_timeout_secs: Option<u64>,
    pub status_port: Option<u16>,
}

impl FileConfig {
    /// Read the TOML file. A missing file yields `None`; a malformed one is an error.
    pub fn read(path: &str) -> Result<Option<Self>> {
        if !Path::new(path).exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: FileConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(Some(config))
    }
}

// ---------------------------------------------------------------------------
// Resolved config
// ---------------------------------------------------------------------------

/// Immutable keeper configuration.
pub struct KeeperConfig {
    pub rpc_url: Url,
    pub operator_key: SecretString,
    pub engine_address: Address,
    pub interval: Duration,
    /// Accepted and logged, never evaluated by the pipeline.
    pub min_profit_usd: Decimal,
    /// Minimum operator balance in wei.
    pub min_gas_balance: U256,
    pub confirmation_timeout: Duration,
    pub status_port: Option<u16>,
}

impl std::fmt::Debug for KeeperConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeeperConfig")
            .field("rpc_url", &self.rpc_url.as_str())
            .field("operator_key", &"[REDACTED]")
            .field("engine_address", &self.engine_address)
            .field("interval", &self.interval)
            .field("min_profit_usd", &self.min_profit_usd)
            .field("min_gas_balance", &self.min_gas_balance)
            .field("confirmation_timeout", &self.confirmation_timeout)
            .field("status_port", &self.status_port)
            .finish()
    }
}

impl KeeperConfig {
    /// Load from `path` (or `KEEPER_CONFIG`, or `keeper.toml`) plus the
    /// process environment.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let path = path
            .map(str::to_string)
            .or_else(|| std::env::var(env::CONFIG_PATH).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let file = FileConfig::read(&path)?;
        let config = Self::from_sources(file, |name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Resolve a config from a parsed file and an environment lookup.
    ///
    /// Environment values win over file values. Empty environment values
    /// count as unset.
    pub fn from_sources<F>(file: Option<FileConfig>, lookup: F) -> Result<Self, KeeperError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = file.unwrap_or_default();
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let key = var(env::PRIVATE_KEY);
        let engine = var(env::ENGINE_ADDRESS).or(file.engine_address.clone());
        let (key, engine) = match (key, engine) {
            (Some(k), Some(e)) => (k, e),
            _ => {
                return Err(KeeperError::Config(format!(
                    "Missing {} or {}. Set them in .env",
                    env::PRIVATE_KEY,
                    env::ENGINE_ADDRESS
                )))
            }
        };

        key.parse::<PrivateKeySigner>()
            .map_err(|e| KeeperError::Config(format!("Invalid {}: {e}", env::PRIVATE_KEY)))?;

        let engine_address = Address::from_str(&engine).map_err(|e| {
            KeeperError::Config(format!("Invalid {} '{engine}': {e}", env::ENGINE_ADDRESS))
        })?;

        let rpc = var(env::RPC_URL)
            .or(file.rpc_url.clone())
            .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        let rpc_url = Url::parse(&rpc)
            .map_err(|e| KeeperError::Config(format!("Invalid {} '{rpc}': {e}", env::RPC_URL)))?;

        let interval_ms = match var(env::INTERVAL_MS) {
            Some(v) => parse_number::<u64>(env::INTERVAL_MS, &v)?,
            None => file.interval_ms.unwrap_or(DEFAULT_INTERVAL_MS),
        };
        if interval_ms == 0 {
            return Err(KeeperError::Config(format!("{} must be > 0", env::INTERVAL_MS)));
        }

        let min_profit_usd = match var(env::MIN_PROFIT_USD) {
            Some(v) => Decimal::from_str(&v).map_err(|e| {
                KeeperError::Config(format!("Invalid {} '{v}': {e}", env::MIN_PROFIT_USD))
            })?,
            None => match file.min_profit_usd {
                Some(v) => Decimal::try_from(v).map_err(|e| {
                    KeeperError::Config(format!("Invalid min_profit_usd {v}: {e}"))
                })?,
                None => dec!(1.0),
            },
        };

        let min_gas_balance = match var(env::MIN_GAS_BALANCE).or(file.min_gas_balance.clone()) {
            Some(gas) => parse_ether(&gas).map_err(|e| {
                KeeperError::Config(format!("Invalid {} '{gas}': {e}", env::MIN_GAS_BALANCE))
            })?,
            None => U256::from(DEFAULT_MIN_GAS_BALANCE_WEI),
        };

        let timeout_secs = match var(env::CONFIRMATION_TIMEOUT_SECS) {
            Some(v) => parse_number::<u64>(env::CONFIRMATION_TIMEOUT_SECS, &v)?,
            None => file
                .confirmation_timeout_secs
                .unwrap_or(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
        };
        if timeout_secs == 0 {
            return Err(KeeperError::Config(format!(
                "{} must be > 0",
                env::CONFIRMATION_TIMEOUT_SECS
            )));
        }

        let status_port = match var(env::STATUS_PORT) {
            Some(v) => Some(parse_number::<u16>(env::STATUS_PORT, &v)?),
            None => file.status_port,
        };

        Ok(Self {
            rpc_url,
            operator_key: SecretString::new(key),
            engine_address,
            interval: Duration::from_millis(interval_ms),
            min_profit_usd,
            min_gas_balance,
            confirmation_timeout: Duration::from_secs(timeout_secs),
            status_port,
        })
    }

    /// Parse the operator key into a signer.
    pub fn signer(&self) -> Result<PrivateKeySigner> {
        self.operator_key
            .expose_secret()
            .parse::<PrivateKeySigner>()
            .context("Failed to parse operator private key")
    }
}

fn parse_number<T>(name: &str, value: &str) -> Result<T, KeeperError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| KeeperError::Config(format!("Invalid {name} '{value}': {e}")))
}
