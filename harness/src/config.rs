//! Per-network deployment parameters.
//!
//! The table ships with the crate (`config/networks.toml`) and can be replaced
//! by a file on disk. Lookups are pure; nothing here touches a chain.

use serde::{Deserialize, Serialize};
use solana_program::pubkey::Pubkey;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Environment variable holding the source verification credential.
pub const VERIFY_API_KEY_ENV: &str = "RAFFLE_VERIFY_API_KEY";

/// Confirmations waited for when a network does not set its own.
pub const DEFAULT_BLOCK_CONFIRMATIONS: u64 = 1;

const BUILTIN_NETWORKS: &str = include_str!("../config/networks.toml");

/// The network a deployment targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub name: String,
    pub chain_id: u64,
}

impl Network {
    pub fn new(name: impl Into<String>, chain_id: u64) -> Self {
        Self {
            name: name.into(),
            chain_id,
        }
    }

    /// The in-process test validator.
    pub fn localnet() -> Self {
        Self::new("localnet", 1337)
    }

    pub fn devnet() -> Self {
        Self::new("devnet", 103)
    }
}

/// Raffle constructor parameters for one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParams {
    pub chain_id: u64,
    pub name: String,
    /// Coordinator program id, only read on live networks
    #[serde(default)]
    pub vrf_coordinator: Option<String>,
    /// Lamports per entry
    pub entrance_fee: u64,
    /// Hex-encoded 32-byte key hash, with or without `0x`
    pub gas_lane: String,
    /// Only read on live networks
    #[serde(default)]
    pub subscription_id: Option<u64>,
    pub callback_gas_limit: u32,
    /// Seconds between draws
    pub interval: u64,
    #[serde(default)]
    pub block_confirmations: Option<u64>,
}

impl ChainParams {
    pub fn gas_lane_bytes(&self) -> Result<[u8; 32]> {
        let digits = self.gas_lane.trim_start_matches("0x");
        let bytes = hex::decode(digits)
            .map_err(|e| Error::Config(format!("{}: invalid gas lane: {}", self.name, e)))?;
        let mut gas_lane = [0u8; 32];
        if bytes.len() != gas_lane.len() {
            return Err(Error::Config(format!(
                "{}: gas lane must be 32 bytes, got {}",
                self.name,
                bytes.len()
            )));
        }
        gas_lane.copy_from_slice(&bytes);
        Ok(gas_lane)
    }

    pub fn vrf_coordinator_id(&self) -> Result<Option<Pubkey>> {
        self.vrf_coordinator
            .as_deref()
            .map(|address| {
                Pubkey::from_str(address).map_err(|e| {
                    Error::Config(format!("{}: invalid vrf_coordinator: {}", self.name, e))
                })
            })
            .transpose()
    }

    pub fn confirmations(&self) -> u64 {
        self.block_confirmations
            .unwrap_or(DEFAULT_BLOCK_CONFIRMATIONS)
            .max(1)
    }
}

/// The whole network table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network names that get the mock coordinator instead of a live one
    pub development_chains: Vec<String>,
    pub networks: Vec<ChainParams>,
}

impl NetworkConfig {
    /// The table bundled with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_NETWORKS)
    }

    /// Load the table from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (i, params) in self.networks.iter().enumerate() {
            if self.networks[..i].iter().any(|p| p.chain_id == params.chain_id) {
                return Err(Error::Config(format!(
                    "chain id {} listed twice",
                    params.chain_id
                )));
            }
            params.gas_lane_bytes()?;
            params.vrf_coordinator_id()?;
        }
        Ok(())
    }

    pub fn params(&self, chain_id: u64) -> Result<&ChainParams> {
        self.networks
            .iter()
            .find(|p| p.chain_id == chain_id)
            .ok_or_else(|| Error::Config(format!("no parameters for chain id {}", chain_id)))
    }

    pub fn params_mut(&mut self, chain_id: u64) -> Result<&mut ChainParams> {
        self.networks
            .iter_mut()
            .find(|p| p.chain_id == chain_id)
            .ok_or_else(|| Error::Config(format!("no parameters for chain id {}", chain_id)))
    }

    pub fn is_development(&self, network: &Network) -> bool {
        self.development_chains.iter().any(|name| *name == network.name)
    }
}
