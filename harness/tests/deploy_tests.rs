use raffle::instruction::RaffleArgs;
use raffle_harness::{
    deploy::VRF_SUB_FUND_AMOUNT,
    DeployOrchestrator, Error, LocalChain, Network, NetworkConfig, Result, SourceVerifier,
    TestContext,
};
use solana_program::pubkey::Pubkey;
use solana_sdk::signature::Signer;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct RecordingVerifier {
    calls: Arc<Mutex<Vec<(Pubkey, RaffleArgs)>>>,
    fail: bool,
}

impl SourceVerifier for RecordingVerifier {
    fn verify(&self, address: &Pubkey, args: &RaffleArgs) -> Result<()> {
        self.calls.lock().unwrap().push((*address, *args));
        if self.fail {
            return Err(Error::Verification("explorer rejected the source".to_string()));
        }
        Ok(())
    }
}

#[tokio::test]
async fn local_deploy_creates_and_funds_a_mock_subscription() {
    let mut chain = LocalChain::start().await.unwrap();
    let deployer = chain.deployer().unwrap();
    let config = NetworkConfig::builtin().unwrap();
    let params = config.params(Network::localnet().chain_id).unwrap().clone();

    let deployment = DeployOrchestrator::new(config, Network::localnet())
        .with_verify_api_key(None)
        .deploy(&mut chain)
        .await
        .unwrap();
    assert!(deployment.is_mock);
    assert_eq!(deployment.coordinator.program_id, vrf_coordinator_mock::id());

    let subscription = deployment
        .coordinator
        .subscription(&mut chain, deployment.args.subscription_id)
        .await
        .unwrap();
    assert_eq!(subscription.id, 1);
    assert_eq!(subscription.owner, deployer.pubkey());
    assert_eq!(subscription.balance, VRF_SUB_FUND_AMOUNT);
    // Registering the raffle is left to the caller.
    assert!(subscription.consumers().is_empty());

    let state = deployment.raffle.state(&mut chain).await.unwrap();
    assert_eq!(state.vrf_coordinator, vrf_coordinator_mock::id());
    assert_eq!(state.subscription_id, 1);
    assert_eq!(state.entrance_fee, params.entrance_fee);
    assert_eq!(state.gas_lane, params.gas_lane_bytes().unwrap());
    assert_eq!(state.callback_gas_limit, params.callback_gas_limit);
    assert_eq!(state.interval, params.interval);
    assert_eq!(state.authority, deployer.pubkey());
}

#[tokio::test]
async fn live_deploy_binds_the_configured_oracle_and_verifies() {
    let mut chain = LocalChain::start().await.unwrap();
    let config = NetworkConfig::builtin().unwrap();
    let params = config.params(Network::devnet().chain_id).unwrap().clone();
    let verifier = RecordingVerifier::default();

    let slot_before = chain.slot().await.unwrap();
    let deployment = DeployOrchestrator::new(config, Network::devnet())
        .with_verify_api_key(Some("explorer-key".to_string()))
        .with_verifier(Box::new(verifier.clone()))
        .deploy(&mut chain)
        .await
        .unwrap();
    let slot_after = chain.slot().await.unwrap();

    let configured = params.vrf_coordinator_id().unwrap().unwrap();
    assert!(!deployment.is_mock);
    assert_eq!(deployment.coordinator.program_id, configured);
    assert_eq!(deployment.args.vrf_coordinator, configured);
    assert_eq!(deployment.args.subscription_id, 588);
    assert!(slot_after >= slot_before + params.confirmations() - 1);

    let calls = verifier.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], (deployment.raffle.address, deployment.args));
}

#[tokio::test]
async fn live_deploy_without_a_key_skips_verification() {
    let mut chain = LocalChain::start().await.unwrap();
    let verifier = RecordingVerifier::default();

    let orchestrator = DeployOrchestrator::new(NetworkConfig::builtin().unwrap(), Network::devnet())
        .with_verify_api_key(None)
        .with_verifier(Box::new(verifier.clone()));
    assert!(!orchestrator.should_verify());

    orchestrator.deploy(&mut chain).await.unwrap();
    assert!(verifier.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn local_deploy_never_verifies() {
    let mut chain = LocalChain::start().await.unwrap();
    let verifier = RecordingVerifier::default();

    let orchestrator = DeployOrchestrator::new(NetworkConfig::builtin().unwrap(), Network::localnet())
        .with_verify_api_key(Some("explorer-key".to_string()))
        .with_verifier(Box::new(verifier.clone()));
    assert!(!orchestrator.should_verify());

    orchestrator.deploy(&mut chain).await.unwrap();
    assert!(verifier.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn verification_failure_fails_the_deploy() {
    let mut chain = LocalChain::start().await.unwrap();
    let verifier = RecordingVerifier {
        fail: true,
        ..RecordingVerifier::default()
    };

    let result = DeployOrchestrator::new(NetworkConfig::builtin().unwrap(), Network::devnet())
        .with_verify_api_key(Some("explorer-key".to_string()))
        .with_verifier(Box::new(verifier))
        .deploy(&mut chain)
        .await;
    assert!(matches!(result, Err(Error::Verification(_))));
}

#[tokio::test]
async fn unknown_network_is_rejected() {
    let mut chain = LocalChain::start().await.unwrap();
    let result = DeployOrchestrator::new(NetworkConfig::builtin().unwrap(), Network::new("goerli", 5))
        .with_verify_api_key(None)
        .deploy(&mut chain)
        .await;
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn test_context_refuses_live_networks() {
    let result = TestContext::setup_with(NetworkConfig::builtin().unwrap(), Network::devnet()).await;
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn upkeep_against_an_absent_coordinator_reports_the_missing_config() {
    let mut chain = LocalChain::start().await.unwrap();
    let keeper = chain.signer(1).unwrap();
    let deployment = DeployOrchestrator::new(NetworkConfig::builtin().unwrap(), Network::devnet())
        .with_verify_api_key(None)
        .deploy(&mut chain)
        .await
        .unwrap();

    // The live coordinator was never deployed on the local chain.
    let coordinator = deployment.coordinator;
    let result = deployment
        .raffle
        .perform_upkeep(&mut chain, &keeper, &coordinator)
        .await;
    match result {
        Err(Error::AccountNotFound(address)) => assert_eq!(address, coordinator.config_address()),
        other => panic!("unexpected {:?}", other.map(|receipt| receipt.signature)),
    }
}
