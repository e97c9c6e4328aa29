//! Deploys the raffle against a VRF coordinator and drives its lifecycle on
//! an in-process bank.

pub mod chain;
pub mod config;
pub mod contracts;
pub mod deploy;
pub mod error;
pub mod events;
pub mod fixture;

pub use chain::{LocalChain, Simulation, TxReceipt};
pub use config::{ChainParams, Network, NetworkConfig};
pub use contracts::{requested_raffle_winner, CoordinatorContract, RaffleContract};
pub use deploy::{DeployOrchestrator, OracleBinding, RaffleDeployment, SourceVerifier};
pub use error::{ensure, Error, Result, Revert};
pub use events::{ChainEvent, Completion, EventBus, EventKind, EventListener};
pub use fixture::TestContext;

use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber once. `RUST_LOG` overrides the default
/// filter.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("raffle_harness=info,solana_runtime=warn"));
    // Already installed by an earlier test in the same binary.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
