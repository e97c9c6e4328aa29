use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_instruction,
    sysvar::{clock::Clock, rent::Rent, Sysvar},
};
use vrf_coordinator_mock::consumer::{is_coordinator_signer, RandomWordsFulfillment};

use crate::error::RaffleError;
use crate::event::RaffleEvent;
use crate::instruction::{RaffleArgs, RaffleInstruction};
use crate::state::{Raffle, RaffleState};
use crate::utils::{find_raffle_address, prize_pool, transfer_lamports, RAFFLE_SEED};
use crate::vrf::{self, RandomnessRequestAccounts};

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::InitializeRaffle(args) => {
                msg!("Instruction: Initialize Raffle");
                Self::process_initialize_raffle(accounts, args, program_id)
            }
            RaffleInstruction::EnterRaffle { amount } => {
                msg!("Instruction: Enter Raffle");
                Self::process_enter_raffle(accounts, amount, program_id)
            }
            RaffleInstruction::CheckUpkeep => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(accounts, program_id)
            }
            RaffleInstruction::PerformUpkeep => {
                msg!("Instruction: Perform Upkeep");
                Self::process_perform_upkeep(accounts, program_id)
            }
            RaffleInstruction::FulfillRandomWords(fulfillment) => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(accounts, fulfillment, program_id)
            }
        }
    }

    fn process_initialize_raffle(
        accounts: &[AccountInfo],
        args: RaffleArgs,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !authority_info.is_signer {
            msg!("Authority must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (expected_raffle, bump) = find_raffle_address(program_id, authority_info.key);
        if *raffle_info.key != expected_raffle {
            msg!("Invalid raffle account address");
            return Err(RaffleError::InvalidRaffleAccount.into());
        }
        if raffle_info.owner == program_id {
            msg!("Raffle account is already initialized");
            return Err(RaffleError::AlreadyInitialized.into());
        }

        let rent = Rent::get()?;
        invoke_signed(
            &system_instruction::create_account(
                authority_info.key,
                raffle_info.key,
                rent.minimum_balance(Raffle::LEN),
                Raffle::LEN as u64,
                program_id,
            ),
            &[
                authority_info.clone(),
                raffle_info.clone(),
                system_program_info.clone(),
            ],
            &[&[RAFFLE_SEED, authority_info.key.as_ref(), &[bump]]],
        )?;

        let clock = Clock::get()?;
        let raffle = Raffle {
            is_initialized: true,
            bump,
            authority: *authority_info.key,
            vrf_coordinator: args.vrf_coordinator,
            entrance_fee: args.entrance_fee,
            gas_lane: args.gas_lane,
            subscription_id: args.subscription_id,
            callback_gas_limit: args.callback_gas_limit,
            interval: args.interval,
            raffle_state: RaffleState::Open,
            last_timestamp: clock.unix_timestamp,
            recent_winner: Pubkey::default(),
            players: Vec::new(),
        };
        raffle.save(&mut raffle_info.data.borrow_mut())?;

        msg!(
            "Raffle initialized: coordinator={}, entrance_fee={}, subscription_id={}, interval={}",
            args.vrf_coordinator,
            args.entrance_fee,
            args.subscription_id,
            args.interval
        );
        Ok(())
    }

    fn process_enter_raffle(accounts: &[AccountInfo], amount: u64, program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let player_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !player_info.is_signer {
            msg!("Player must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut raffle = load_raffle(raffle_info, program_id)?;

        if amount < raffle.entrance_fee {
            msg!("Paid {} but the entrance fee is {}", amount, raffle.entrance_fee);
            return Err(RaffleError::InsufficientPayment.into());
        }
        if raffle.raffle_state != RaffleState::Open {
            return Err(RaffleError::NotOpen.into());
        }
        if raffle.is_full() {
            return Err(RaffleError::RaffleFull.into());
        }

        if amount > 0 {
            invoke(
                &system_instruction::transfer(player_info.key, raffle_info.key, amount),
                &[
                    player_info.clone(),
                    raffle_info.clone(),
                    system_program_info.clone(),
                ],
            )?;
        }

        raffle.players.push(*player_info.key);
        raffle.save(&mut raffle_info.data.borrow_mut())?;

        RaffleEvent::RaffleEnter {
            player: *player_info.key,
        }
        .emit();
        Ok(())
    }

    fn process_check_upkeep(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;

        let raffle = load_raffle(raffle_info, program_id)?;
        let upkeep_needed = upkeep_needed(&raffle, raffle_info)?;

        set_return_data(&[upkeep_needed as u8]);
        RaffleEvent::UpkeepChecked { upkeep_needed }.emit();
        Ok(())
    }

    fn process_perform_upkeep(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let keeper_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let coordinator_program_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;
        let request_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        let mut raffle = load_raffle(raffle_info, program_id)?;

        if !upkeep_needed(&raffle, raffle_info)? {
            msg!(
                "Upkeep not needed: balance={}, players={}, state={}",
                raffle_info.lamports(),
                raffle.number_of_players(),
                u8::from(raffle.raffle_state)
            );
            return Err(RaffleError::UpkeepNotNeeded.into());
        }

        let request_id = vrf::request_random_winner(
            &raffle,
            RandomnessRequestAccounts {
                payer: keeper_info,
                raffle: raffle_info,
                coordinator_program: coordinator_program_info,
                coordinator: coordinator_info,
                subscription: subscription_info,
                request: request_info,
                system_program: system_program_info,
            },
        )?;

        raffle.raffle_state = RaffleState::Calculating;
        raffle.save(&mut raffle_info.data.borrow_mut())?;

        RaffleEvent::RequestedRaffleWinner { request_id }.emit();
        Ok(())
    }

    fn process_fulfill_random_words(
        accounts: &[AccountInfo],
        fulfillment: RandomWordsFulfillment,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let coordinator_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;

        let mut raffle = load_raffle(raffle_info, program_id)?;

        if !is_coordinator_signer(coordinator_info, &raffle.vrf_coordinator) {
            msg!("Callback was not signed by the VRF coordinator");
            return Err(RaffleError::OnlyCoordinatorCanFulfill.into());
        }

        let word = *fulfillment
            .random_words
            .first()
            .ok_or(RaffleError::MissingRandomWords)?;
        if raffle.players.is_empty() {
            return Err(RaffleError::NoPlayers.into());
        }
        let index = vrf::get_random_winner_index(word, raffle.number_of_players() as u64) as usize;
        let winner = *raffle.player(index).ok_or(RaffleError::NoPlayers)?;

        let winner_info = account_info_iter
            .find(|info| *info.key == winner && info.is_writable)
            .ok_or(RaffleError::WinnerAccountMissing)?;

        let rent = Rent::get()?;
        let prize = prize_pool(raffle_info.lamports(), rent.minimum_balance(raffle_info.data_len()));
        transfer_lamports(raffle_info, winner_info, prize)?;

        raffle.recent_winner = winner;
        raffle.players.clear();
        raffle.raffle_state = RaffleState::Open;
        raffle.last_timestamp = Clock::get()?.unix_timestamp;
        raffle.save(&mut raffle_info.data.borrow_mut())?;

        msg!(
            "Request {} paid {} lamports to {}",
            fulfillment.request_id,
            prize,
            winner
        );
        RaffleEvent::WinnerPicked { winner }.emit();
        Ok(())
    }
}

fn load_raffle(raffle_info: &AccountInfo, program_id: &Pubkey) -> Result<Raffle, ProgramError> {
    if raffle_info.owner != program_id {
        msg!("Raffle account must be owned by this program");
        return Err(RaffleError::InvalidRaffleAccount.into());
    }
    let raffle = Raffle::load(&raffle_info.data.borrow())?;
    if !raffle.is_initialized {
        return Err(RaffleError::InvalidRaffleAccount.into());
    }
    Ok(raffle)
}

fn upkeep_needed(raffle: &Raffle, raffle_info: &AccountInfo) -> Result<bool, ProgramError> {
    let now = Clock::get()?.unix_timestamp;
    let rent = Rent::get()?;
    let balance = prize_pool(raffle_info.lamports(), rent.minimum_balance(raffle_info.data_len()));
    Ok(raffle.upkeep_needed(now, balance))
}
