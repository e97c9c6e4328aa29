use solana_program::instruction::{AccountMeta, InstructionError};
use solana_program_test::*;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::{Transaction, TransactionError},
};

use raffle::{
    error::RaffleError,
    instruction::{enter_raffle, initialize_raffle, RaffleArgs},
    process_instruction,
    state::{Raffle, RaffleState, MAX_PLAYERS},
    utils::find_raffle_address,
};
use vrf_coordinator_mock::consumer::{raw_fulfill_random_words, RandomWordsFulfillment};
use vrf_coordinator_mock::state::find_coordinator_address;

const ENTRANCE_FEE: u64 = 10_000_000;

fn raffle_args() -> RaffleArgs {
    RaffleArgs {
        vrf_coordinator: vrf_coordinator_mock::id(),
        entrance_fee: ENTRANCE_FEE,
        gas_lane: [0xd8; 32],
        subscription_id: 1,
        callback_gas_limit: 500_000,
        interval: 30,
    }
}

// Setup program test with the raffle initialized by the payer
async fn setup() -> (BanksClient, Keypair, solana_sdk::hash::Hash, Pubkey) {
    let program_test = ProgramTest::new("raffle", raffle::id(), processor!(process_instruction));
    let (mut banks_client, payer, recent_blockhash) = program_test.start().await;

    let (raffle_pubkey, _) = find_raffle_address(&raffle::id(), &payer.pubkey());
    let ix = initialize_raffle(&raffle::id(), &payer.pubkey(), &raffle_pubkey, raffle_args()).unwrap();
    let mut transaction = Transaction::new_with_payer(&[ix], Some(&payer.pubkey()));
    transaction.sign(&[&payer], recent_blockhash);
    banks_client.process_transaction(transaction).await.unwrap();

    (banks_client, payer, recent_blockhash, raffle_pubkey)
}

async fn load_raffle(banks_client: &mut BanksClient, raffle_pubkey: Pubkey) -> Raffle {
    let account = banks_client.get_account(raffle_pubkey).await.unwrap().unwrap();
    Raffle::load(&account.data).unwrap()
}

fn custom_error(err: BanksClientError) -> u32 {
    match err.unwrap() {
        TransactionError::InstructionError(_, InstructionError::Custom(code)) => code,
        other => panic!("expected a custom program error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_initialize_raffle() {
    let (mut banks_client, payer, _, raffle_pubkey) = setup().await;

    let raffle = load_raffle(&mut banks_client, raffle_pubkey).await;
    let args = raffle_args();

    assert!(raffle.is_initialized);
    assert_eq!(raffle.authority, payer.pubkey());
    assert_eq!(raffle.vrf_coordinator, args.vrf_coordinator);
    assert_eq!(raffle.entrance_fee, args.entrance_fee);
    assert_eq!(raffle.gas_lane, args.gas_lane);
    assert_eq!(raffle.subscription_id, args.subscription_id);
    assert_eq!(raffle.callback_gas_limit, args.callback_gas_limit);
    assert_eq!(raffle.interval, args.interval);
    assert_eq!(raffle.raffle_state, RaffleState::Open);
    assert_eq!(raffle.recent_winner, Pubkey::default());
    assert!(raffle.players.is_empty());
}

#[tokio::test]
async fn test_initialize_twice_fails() {
    let (mut banks_client, payer, recent_blockhash, raffle_pubkey) = setup().await;

    let mut args = raffle_args();
    args.interval = 60;
    let ix = initialize_raffle(&raffle::id(), &payer.pubkey(), &raffle_pubkey, args).unwrap();
    let mut transaction = Transaction::new_with_payer(&[ix], Some(&payer.pubkey()));
    transaction.sign(&[&payer], recent_blockhash);

    let err = banks_client.process_transaction(transaction).await.unwrap_err();
    assert_eq!(custom_error(err), RaffleError::AlreadyInitialized as u32);
}

#[tokio::test]
async fn test_enter_raffle_records_player_and_funds_pool() {
    let (mut banks_client, payer, recent_blockhash, raffle_pubkey) = setup().await;
    let starting_lamports = banks_client.get_balance(raffle_pubkey).await.unwrap();

    let ix = enter_raffle(&raffle::id(), &payer.pubkey(), &raffle_pubkey, ENTRANCE_FEE).unwrap();
    let mut transaction = Transaction::new_with_payer(&[ix], Some(&payer.pubkey()));
    transaction.sign(&[&payer], recent_blockhash);
    banks_client.process_transaction(transaction).await.unwrap();

    let raffle = load_raffle(&mut banks_client, raffle_pubkey).await;
    assert_eq!(raffle.players, vec![payer.pubkey()]);
    assert_eq!(
        banks_client.get_balance(raffle_pubkey).await.unwrap(),
        starting_lamports + ENTRANCE_FEE
    );
}

#[tokio::test]
async fn test_enter_raffle_below_fee_fails() {
    let (mut banks_client, payer, recent_blockhash, raffle_pubkey) = setup().await;

    let ix = enter_raffle(&raffle::id(), &payer.pubkey(), &raffle_pubkey, ENTRANCE_FEE - 1).unwrap();
    let mut transaction = Transaction::new_with_payer(&[ix], Some(&payer.pubkey()));
    transaction.sign(&[&payer], recent_blockhash);

    let err = banks_client.process_transaction(transaction).await.unwrap_err();
    assert_eq!(custom_error(err), RaffleError::InsufficientPayment as u32);
    assert!(load_raffle(&mut banks_client, raffle_pubkey).await.players.is_empty());
}

#[tokio::test]
async fn test_raffle_rejects_entries_when_full() {
    let (mut banks_client, payer, recent_blockhash, raffle_pubkey) = setup().await;

    // Distinct amounts keep every transaction signature unique
    for i in 0..MAX_PLAYERS as u64 {
        let ix = enter_raffle(&raffle::id(), &payer.pubkey(), &raffle_pubkey, ENTRANCE_FEE + i).unwrap();
        let mut transaction = Transaction::new_with_payer(&[ix], Some(&payer.pubkey()));
        transaction.sign(&[&payer], recent_blockhash);
        banks_client.process_transaction(transaction).await.unwrap();
    }

    let ix = enter_raffle(&raffle::id(), &payer.pubkey(), &raffle_pubkey, ENTRANCE_FEE * 2).unwrap();
    let mut transaction = Transaction::new_with_payer(&[ix], Some(&payer.pubkey()));
    transaction.sign(&[&payer], recent_blockhash);

    let err = banks_client.process_transaction(transaction).await.unwrap_err();
    assert_eq!(custom_error(err), RaffleError::RaffleFull as u32);
    assert_eq!(
        load_raffle(&mut banks_client, raffle_pubkey).await.number_of_players(),
        MAX_PLAYERS
    );
}

#[tokio::test]
async fn test_callback_from_non_coordinator_fails() {
    let (mut banks_client, payer, recent_blockhash, raffle_pubkey) = setup().await;

    let ix = enter_raffle(&raffle::id(), &payer.pubkey(), &raffle_pubkey, ENTRANCE_FEE).unwrap();
    let mut transaction = Transaction::new_with_payer(&[ix], Some(&payer.pubkey()));
    transaction.sign(&[&payer], recent_blockhash);
    banks_client.process_transaction(transaction).await.unwrap();

    let fulfillment = RandomWordsFulfillment {
        request_id: 1,
        random_words: vec![[0u8; 32]],
    };

    // A signer that is not the coordinator config account
    let impostor = Keypair::new();
    let ix = raw_fulfill_random_words(
        &raffle::id(),
        &impostor.pubkey(),
        &raffle_pubkey,
        vec![AccountMeta::new(payer.pubkey(), false)],
        &fulfillment,
    )
    .unwrap();
    let mut transaction = Transaction::new_with_payer(&[ix], Some(&payer.pubkey()));
    transaction.sign(&[&payer, &impostor], recent_blockhash);

    let err = banks_client.process_transaction(transaction).await.unwrap_err();
    assert_eq!(custom_error(err), RaffleError::OnlyCoordinatorCanFulfill as u32);

    // The real config address, but nobody can sign for it from outside
    let (coordinator, _) = find_coordinator_address(&vrf_coordinator_mock::id());
    let mut ix = raw_fulfill_random_words(
        &raffle::id(),
        &coordinator,
        &raffle_pubkey,
        vec![AccountMeta::new(payer.pubkey(), false)],
        &fulfillment,
    )
    .unwrap();
    ix.accounts[0].is_signer = false;
    let mut transaction = Transaction::new_with_payer(&[ix], Some(&payer.pubkey()));
    transaction.sign(&[&payer], recent_blockhash);

    let err = banks_client.process_transaction(transaction).await.unwrap_err();
    assert_eq!(custom_error(err), RaffleError::OnlyCoordinatorCanFulfill as u32);

    let raffle = load_raffle(&mut banks_client, raffle_pubkey).await;
    assert_eq!(raffle.players, vec![payer.pubkey()]);
    assert_eq!(raffle.recent_winner, Pubkey::default());
}
