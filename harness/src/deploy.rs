//! Deployment of the raffle against a VRF coordinator.
//!
//! On a development network the coordinator mock is initialized and a fresh
//! subscription is created and funded for the raffle. Live networks take the
//! coordinator and subscription from the network table. Either way the raffle
//! is constructed with the table's parameters, and the deployment waits for
//! the network's block confirmations before optionally verifying the source.

use raffle::instruction::RaffleArgs;
use solana_program::pubkey::Pubkey;
use tracing::{info, warn};

use crate::chain::LocalChain;
use crate::config::{ChainParams, Network, NetworkConfig, VERIFY_API_KEY_ENV};
use crate::contracts::{CoordinatorContract, RaffleContract};
use crate::error::{Error, Result};

/// Amount credited to a freshly created development subscription.
pub const VRF_SUB_FUND_AMOUNT: u64 = 2_000_000_000_000_000_000;

/// Flat fee the mock charges per fulfillment.
pub const BASE_FEE: u64 = 250_000_000_000_000_000;

/// Price of one unit of callback gas on the mock.
pub const GAS_PRICE_LINK: u64 = 1_000_000_000;

/// Coordinator and subscription a raffle is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleBinding {
    pub vrf_coordinator: Pubkey,
    pub subscription_id: u64,
}

/// Constructor arguments in the raffle's order: coordinator, entrance fee,
/// gas lane, subscription, callback gas limit, interval.
pub fn resolve_raffle_args(params: &ChainParams, oracle: OracleBinding) -> Result<RaffleArgs> {
    Ok(RaffleArgs {
        vrf_coordinator: oracle.vrf_coordinator,
        entrance_fee: params.entrance_fee,
        gas_lane: params.gas_lane_bytes()?,
        subscription_id: oracle.subscription_id,
        callback_gas_limit: params.callback_gas_limit,
        interval: params.interval,
    })
}

/// The binding a live network declares in the table.
pub fn live_oracle_binding(params: &ChainParams) -> Result<OracleBinding> {
    let vrf_coordinator = params.vrf_coordinator_id()?.ok_or_else(|| {
        Error::Config(format!("{}: vrf_coordinator is required", params.name))
    })?;
    let subscription_id = params.subscription_id.ok_or_else(|| {
        Error::Config(format!("{}: subscription_id is required", params.name))
    })?;
    Ok(OracleBinding {
        vrf_coordinator,
        subscription_id,
    })
}

/// Publishes a deployed raffle's source to a block explorer.
pub trait SourceVerifier {
    fn verify(&self, address: &Pubkey, args: &RaffleArgs) -> Result<()>;
}

/// Result of a deployment.
#[derive(Debug, Clone)]
pub struct RaffleDeployment {
    pub raffle: RaffleContract,
    pub coordinator: CoordinatorContract,
    pub args: RaffleArgs,
    pub network: Network,
    /// Whether the coordinator is the local mock
    pub is_mock: bool,
}

pub struct DeployOrchestrator {
    config: NetworkConfig,
    network: Network,
    verify_api_key: Option<String>,
    verifier: Option<Box<dyn SourceVerifier + Send + Sync>>,
}

impl DeployOrchestrator {
    /// The verification key is read from the environment.
    pub fn new(config: NetworkConfig, network: Network) -> Self {
        let verify_api_key = std::env::var(VERIFY_API_KEY_ENV).ok();
        Self {
            config,
            network,
            verify_api_key,
            verifier: None,
        }
    }

    pub fn with_verify_api_key(mut self, key: Option<String>) -> Self {
        self.verify_api_key = key;
        self
    }

    pub fn with_verifier(mut self, verifier: Box<dyn SourceVerifier + Send + Sync>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn is_development(&self) -> bool {
        self.config.is_development(&self.network)
    }

    /// Verification runs only on live networks with a non-empty key.
    pub fn should_verify(&self) -> bool {
        !self.is_development()
            && self
                .verify_api_key
                .as_deref()
                .map_or(false, |key| !key.trim().is_empty())
    }

    pub async fn deploy(&self, chain: &mut LocalChain) -> Result<RaffleDeployment> {
        let params = self.config.params(self.network.chain_id)?;
        let deployer = chain.deployer()?;

        let (coordinator, oracle, is_mock) = if self.is_development() {
            info!(network = %self.network.name, "local network detected, deploying mocks");
            let coordinator = CoordinatorContract::mock();
            coordinator
                .initialize(chain, &deployer, BASE_FEE, GAS_PRICE_LINK)
                .await?;
            let subscription_id = coordinator.create_subscription(chain, &deployer).await?;
            coordinator
                .fund_subscription(chain, &deployer, subscription_id, VRF_SUB_FUND_AMOUNT)
                .await?;
            info!(subscription_id, "mocks deployed");

            let oracle = OracleBinding {
                vrf_coordinator: coordinator.program_id,
                subscription_id,
            };
            (coordinator, oracle, true)
        } else {
            let oracle = live_oracle_binding(params)?;
            (CoordinatorContract::new(oracle.vrf_coordinator), oracle, false)
        };

        let args = resolve_raffle_args(params, oracle)?;
        let (raffle, receipt) = RaffleContract::initialize(chain, &deployer, args).await?;

        let confirmations = params.confirmations();
        chain.mine_blocks(confirmations - 1).await?;
        info!(
            address = %raffle.address,
            signature = %receipt.signature,
            confirmations,
            "raffle deployed"
        );

        if self.should_verify() {
            info!("Verifying...");
            match &self.verifier {
                Some(verifier) => verifier.verify(&raffle.address, &args)?,
                None => warn!(address = %raffle.address, "no source verifier configured, skipping"),
            }
        }

        Ok(RaffleDeployment {
            raffle,
            coordinator,
            args,
            network: self.network.clone(),
            is_mock,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_follow_the_table_and_binding() {
        let config = NetworkConfig::builtin().unwrap();
        let params = config.params(Network::localnet().chain_id).unwrap();
        let oracle = OracleBinding {
            vrf_coordinator: Pubkey::new_unique(),
            subscription_id: 7,
        };

        let args = resolve_raffle_args(params, oracle).unwrap();
        assert_eq!(args.vrf_coordinator, oracle.vrf_coordinator);
        assert_eq!(args.entrance_fee, params.entrance_fee);
        assert_eq!(args.gas_lane, params.gas_lane_bytes().unwrap());
        assert_eq!(args.subscription_id, 7);
        assert_eq!(args.callback_gas_limit, 500_000);
        assert_eq!(args.interval, 30);
    }

    #[test]
    fn live_binding_requires_coordinator_and_subscription() {
        let config = NetworkConfig::builtin().unwrap();
        let devnet = config.params(Network::devnet().chain_id).unwrap();
        let oracle = live_oracle_binding(devnet).unwrap();
        assert_eq!(oracle.subscription_id, 588);

        let local = config.params(Network::localnet().chain_id).unwrap();
        assert!(matches!(live_oracle_binding(local), Err(Error::Config(_))));
    }

    #[test]
    fn verification_needs_a_live_network_and_a_key() {
        let config = NetworkConfig::builtin().unwrap();
        let key = Some("key".to_string());

        let local = DeployOrchestrator::new(config.clone(), Network::localnet())
            .with_verify_api_key(key.clone());
        assert!(!local.should_verify());

        let live = DeployOrchestrator::new(config.clone(), Network::devnet());
        assert!(!live.with_verify_api_key(Some("  ".to_string())).should_verify());

        let live = DeployOrchestrator::new(config, Network::devnet()).with_verify_api_key(key);
        assert!(live.should_verify());
    }
}
