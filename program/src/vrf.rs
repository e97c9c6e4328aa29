// VRF coordinator integration for the raffle program
use solana_program::{
    account_info::AccountInfo,
    msg,
    program::{get_return_data, invoke_signed},
    program_error::ProgramError,
};
use std::convert::TryInto;
use vrf_coordinator_mock::instruction::{request_random_words, RandomWordsParams};

use crate::error::RaffleError;
use crate::state::{Raffle, NUM_WORDS, REQUEST_CONFIRMATIONS};
use crate::utils::RAFFLE_SEED;

/// Accounts the coordinator needs to record a request
pub struct RandomnessRequestAccounts<'a, 'b> {
    pub payer: &'b AccountInfo<'a>,
    pub raffle: &'b AccountInfo<'a>,
    pub coordinator_program: &'b AccountInfo<'a>,
    pub coordinator: &'b AccountInfo<'a>,
    pub subscription: &'b AccountInfo<'a>,
    pub request: &'b AccountInfo<'a>,
    pub system_program: &'b AccountInfo<'a>,
}

// Ask the coordinator for randomness on behalf of the raffle; the raffle PDA
// signs as the consumer. Returns the request id.
pub fn request_random_winner(
    raffle: &Raffle,
    accounts: RandomnessRequestAccounts,
) -> Result<u64, ProgramError> {
    if *accounts.coordinator_program.key != raffle.vrf_coordinator {
        msg!("Coordinator program does not match the raffle's");
        return Err(RaffleError::InvalidCoordinator.into());
    }

    let ix = request_random_words(
        accounts.coordinator_program.key,
        accounts.payer.key,
        accounts.raffle.key,
        accounts.subscription.key,
        accounts.request.key,
        RandomWordsParams {
            key_hash: raffle.gas_lane,
            subscription_id: raffle.subscription_id,
            request_confirmations: REQUEST_CONFIRMATIONS,
            callback_gas_limit: raffle.callback_gas_limit,
            num_words: NUM_WORDS,
        },
    );

    invoke_signed(
        &ix,
        &[
            accounts.payer.clone(),
            accounts.raffle.clone(),
            accounts.coordinator.clone(),
            accounts.subscription.clone(),
            accounts.request.clone(),
            accounts.system_program.clone(),
            accounts.coordinator_program.clone(),
        ],
        &[&[RAFFLE_SEED, raffle.authority.as_ref(), &[raffle.bump]]],
    )?;

    let (program_id, data) = get_return_data().ok_or(ProgramError::InvalidAccountData)?;
    if program_id != raffle.vrf_coordinator {
        return Err(ProgramError::InvalidAccountData);
    }
    let request_id = data
        .get(..8)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or(ProgramError::InvalidAccountData)?;

    msg!("VRF randomness request {} submitted", request_id);
    Ok(request_id)
}

// Get a random winner index from VRF result
pub fn get_random_winner_index(vrf_result: [u8; 32], total_players: u64) -> u64 {
    if total_players == 0 {
        return 0;
    }

    // First 8 bytes, little endian
    let mut random_bytes = [0u8; 8];
    random_bytes.copy_from_slice(&vrf_result[0..8]);
    u64::from_le_bytes(random_bytes) % total_players
}
