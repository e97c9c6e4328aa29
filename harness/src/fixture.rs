//! Per-test deployment: a fresh chain with the mocks and the raffle deployed
//! and the raffle registered as a consumer of its subscription.

use raffle::state::RaffleState;
use solana_sdk::signature::Keypair;
use tracing::info;

use crate::chain::LocalChain;
use crate::config::{Network, NetworkConfig};
use crate::contracts::{CoordinatorContract, RaffleContract};
use crate::deploy::{DeployOrchestrator, RaffleDeployment};
use crate::error::{Error, Result};
use crate::init_test_tracing;

pub struct TestContext {
    pub chain: LocalChain,
    pub deployment: RaffleDeployment,
    pub raffle: RaffleContract,
    pub coordinator: CoordinatorContract,
    pub deployer: Keypair,
    pub entrance_fee: u64,
    pub interval: u64,
}

impl TestContext {
    /// Deploy with the bundled table on the local network.
    pub async fn setup() -> Result<Self> {
        Self::setup_with(NetworkConfig::builtin()?, Network::localnet()).await
    }

    /// Deploy with a custom table. Only development networks are accepted,
    /// since the lifecycle needs the mock to answer requests.
    pub async fn setup_with(config: NetworkConfig, network: Network) -> Result<Self> {
        init_test_tracing();
        if !config.is_development(&network) {
            return Err(Error::Config(format!(
                "{} is not a development network",
                network.name
            )));
        }

        let mut chain = LocalChain::start().await?;
        let deployer = chain.deployer()?;
        let deployment = DeployOrchestrator::new(config, network)
            .with_verify_api_key(None)
            .deploy(&mut chain)
            .await?;

        let raffle = deployment.raffle;
        let coordinator = deployment.coordinator;
        coordinator
            .add_consumer(
                &mut chain,
                &deployer,
                deployment.args.subscription_id,
                &raffle.address,
            )
            .await?;

        let entrance_fee = raffle.entrance_fee(&mut chain).await?;
        let interval = raffle.interval(&mut chain).await?;
        info!(raffle = %raffle.address, entrance_fee, interval, "test context ready");

        Ok(Self {
            chain,
            deployment,
            raffle,
            coordinator,
            deployer,
            entrance_fee,
            interval,
        })
    }

    /// Move the clock one second past the raffle's interval.
    pub async fn pass_interval(&mut self) -> Result<()> {
        self.chain.advance_time(self.interval + 1).await
    }

    pub async fn enter(&mut self, player: &Keypair) -> Result<()> {
        let fee = self.entrance_fee;
        self.raffle.enter(&mut self.chain, player, fee).await?;
        Ok(())
    }

    pub async fn raffle_state(&mut self) -> Result<RaffleState> {
        self.raffle.raffle_state(&mut self.chain).await
    }
}
