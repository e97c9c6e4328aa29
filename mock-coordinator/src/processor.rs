use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    instruction::AccountMeta,
    keccak, msg,
    program::{invoke_signed, set_return_data},
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack},
    pubkey::Pubkey,
    system_instruction,
    sysvar::{rent::Rent, Sysvar},
};

use crate::consumer::{raw_fulfill_random_words, RandomWordsFulfillment};
use crate::error::CoordinatorError;
use crate::event::CoordinatorEvent;
use crate::instruction::{CoordinatorInstruction, RandomWordsParams};
use crate::state::{
    find_coordinator_address, find_request_address, find_subscription_address, Coordinator,
    RandomnessRequest, Subscription, COORDINATOR_SEED, MAX_NUM_WORDS, REQUEST_SEED,
    SUBSCRIPTION_SEED,
};

/// Words the mock hands out for a request: keccak(request_id, index) for each index.
/// Deterministic so tests can predict the outcome of a draw.
pub fn random_words(request_id: u64, num_words: u32) -> Vec<[u8; 32]> {
    (0..num_words)
        .map(|index| {
            keccak::hashv(&[&request_id.to_le_bytes(), &index.to_le_bytes()]).to_bytes()
        })
        .collect()
}

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = CoordinatorInstruction::unpack(instruction_data)?;

        match instruction {
            CoordinatorInstruction::Initialize {
                base_fee,
                gas_price_link,
            } => {
                msg!("Instruction: Initialize");
                Self::process_initialize(program_id, accounts, base_fee, gas_price_link)
            }
            CoordinatorInstruction::CreateSubscription => {
                msg!("Instruction: Create Subscription");
                Self::process_create_subscription(program_id, accounts)
            }
            CoordinatorInstruction::FundSubscription {
                subscription_id,
                amount,
            } => {
                msg!("Instruction: Fund Subscription");
                Self::process_fund_subscription(program_id, accounts, subscription_id, amount)
            }
            CoordinatorInstruction::AddConsumer {
                subscription_id,
                consumer,
            } => {
                msg!("Instruction: Add Consumer");
                Self::process_add_consumer(program_id, accounts, subscription_id, consumer)
            }
            CoordinatorInstruction::RemoveConsumer {
                subscription_id,
                consumer,
            } => {
                msg!("Instruction: Remove Consumer");
                Self::process_remove_consumer(program_id, accounts, subscription_id, consumer)
            }
            CoordinatorInstruction::RequestRandomWords {
                key_hash,
                subscription_id,
                request_confirmations,
                callback_gas_limit,
                num_words,
            } => {
                msg!("Instruction: Request Random Words");
                Self::process_request_random_words(
                    program_id,
                    accounts,
                    RandomWordsParams {
                        key_hash,
                        subscription_id,
                        request_confirmations,
                        callback_gas_limit,
                        num_words,
                    },
                )
            }
            CoordinatorInstruction::FulfillRandomWords { request_id } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(program_id, accounts, request_id)
            }
        }
    }

    fn process_initialize(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        base_fee: u64,
        gas_price_link: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let payer_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !payer_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (expected, bump) = find_coordinator_address(program_id);
        if *coordinator_info.key != expected {
            msg!("Invalid coordinator account address");
            return Err(CoordinatorError::InvalidAccountAddress.into());
        }
        if coordinator_info.owner == program_id {
            return Err(CoordinatorError::AlreadyInitialized.into());
        }

        create_pda_account(
            payer_info,
            coordinator_info,
            system_program_info,
            program_id,
            Coordinator::LEN,
            &[COORDINATOR_SEED, &[bump]],
        )?;

        let coordinator = Coordinator::new(base_fee, gas_price_link);
        Coordinator::pack(coordinator, &mut coordinator_info.data.borrow_mut())?;

        msg!(
            "Coordinator initialized: base_fee={}, gas_price_link={}",
            base_fee,
            gas_price_link
        );
        Ok(())
    }

    fn process_create_subscription(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let owner_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !owner_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut coordinator = load_coordinator(program_id, coordinator_info)?;
        let subscription_id = coordinator
            .current_subscription_id
            .checked_add(1)
            .ok_or(CoordinatorError::Overflow)?;

        let (expected, bump) = find_subscription_address(program_id, subscription_id);
        if *subscription_info.key != expected {
            msg!("Subscription account does not match id {}", subscription_id);
            return Err(CoordinatorError::InvalidAccountAddress.into());
        }

        create_pda_account(
            owner_info,
            subscription_info,
            system_program_info,
            program_id,
            Subscription::LEN,
            &[SUBSCRIPTION_SEED, &subscription_id.to_le_bytes(), &[bump]],
        )?;

        let subscription = Subscription::new(subscription_id, *owner_info.key);
        Subscription::pack(subscription, &mut subscription_info.data.borrow_mut())?;

        coordinator.current_subscription_id = subscription_id;
        Coordinator::pack(coordinator, &mut coordinator_info.data.borrow_mut())?;

        set_return_data(&subscription_id.to_le_bytes());
        CoordinatorEvent::SubscriptionCreated {
            subscription_id,
            owner: *owner_info.key,
        }
        .emit();
        Ok(())
    }

    fn process_fund_subscription(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        subscription_id: u64,
        amount: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let subscription_info = next_account_info(account_info_iter)?;

        let mut subscription = load_subscription(program_id, subscription_info, subscription_id)?;
        let old_balance = subscription.balance;
        subscription.balance = old_balance
            .checked_add(amount)
            .ok_or(CoordinatorError::Overflow)?;
        Subscription::pack(subscription, &mut subscription_info.data.borrow_mut())?;

        CoordinatorEvent::SubscriptionFunded {
            subscription_id,
            old_balance,
            new_balance: subscription.balance,
        }
        .emit();
        Ok(())
    }

    fn process_add_consumer(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        subscription_id: u64,
        consumer: Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let owner_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;

        let mut subscription = load_subscription(program_id, subscription_info, subscription_id)?;
        check_subscription_owner(&subscription, owner_info)?;

        if !subscription.add_consumer(consumer)? {
            msg!("Consumer {} already registered", consumer);
            return Ok(());
        }
        Subscription::pack(subscription, &mut subscription_info.data.borrow_mut())?;

        CoordinatorEvent::ConsumerAdded {
            subscription_id,
            consumer,
        }
        .emit();
        Ok(())
    }

    fn process_remove_consumer(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        subscription_id: u64,
        consumer: Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let owner_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;

        let mut subscription = load_subscription(program_id, subscription_info, subscription_id)?;
        check_subscription_owner(&subscription, owner_info)?;

        subscription.remove_consumer(&consumer)?;
        Subscription::pack(subscription, &mut subscription_info.data.borrow_mut())?;

        CoordinatorEvent::ConsumerRemoved {
            subscription_id,
            consumer,
        }
        .emit();
        Ok(())
    }

    fn process_request_random_words(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        params: RandomWordsParams,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let payer_info = next_account_info(account_info_iter)?;
        let consumer_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;
        let request_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !payer_info.is_signer || !consumer_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut coordinator = load_coordinator(program_id, coordinator_info)?;
        let mut subscription =
            load_subscription(program_id, subscription_info, params.subscription_id)?;

        if !subscription.is_consumer(consumer_info.key) {
            msg!(
                "{} is not a consumer of subscription {}",
                consumer_info.key,
                params.subscription_id
            );
            return Err(CoordinatorError::InvalidConsumer.into());
        }
        if params.num_words == 0 || params.num_words > MAX_NUM_WORDS {
            return Err(CoordinatorError::NumWordsOutOfRange.into());
        }

        let request_id = coordinator.next_request_id;
        let (expected, bump) = find_request_address(program_id, request_id);
        if *request_info.key != expected {
            msg!("Request account does not match id {}", request_id);
            return Err(CoordinatorError::InvalidAccountAddress.into());
        }

        create_pda_account(
            payer_info,
            request_info,
            system_program_info,
            program_id,
            RandomnessRequest::LEN,
            &[REQUEST_SEED, &request_id.to_le_bytes(), &[bump]],
        )?;

        let request = RandomnessRequest {
            is_initialized: true,
            request_id,
            subscription_id: params.subscription_id,
            consumer: *consumer_info.key,
            callback_gas_limit: params.callback_gas_limit,
            num_words: params.num_words,
            request_confirmations: params.request_confirmations,
            key_hash: params.key_hash,
        };
        RandomnessRequest::pack(request, &mut request_info.data.borrow_mut())?;

        coordinator.next_request_id = request_id
            .checked_add(1)
            .ok_or(CoordinatorError::Overflow)?;
        Coordinator::pack(coordinator, &mut coordinator_info.data.borrow_mut())?;

        subscription.request_count = subscription
            .request_count
            .checked_add(1)
            .ok_or(CoordinatorError::Overflow)?;
        Subscription::pack(subscription, &mut subscription_info.data.borrow_mut())?;

        set_return_data(&request_id.to_le_bytes());
        CoordinatorEvent::RandomWordsRequested {
            request_id,
            subscription_id: params.subscription_id,
            request_confirmations: params.request_confirmations,
            callback_gas_limit: params.callback_gas_limit,
            num_words: params.num_words,
            sender: *consumer_info.key,
        }
        .emit();
        Ok(())
    }

    fn process_fulfill_random_words(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        request_id: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let caller_info = next_account_info(account_info_iter)?;
        let request_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let consumer_info = next_account_info(account_info_iter)?;
        let consumer_program_info = next_account_info(account_info_iter)?;
        let forwarded_infos: Vec<AccountInfo> = account_info_iter.cloned().collect();

        if !caller_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let request = load_request(program_id, request_info, request_id)?;
        let coordinator = load_coordinator(program_id, coordinator_info)?;
        let (_, coordinator_bump) = find_coordinator_address(program_id);
        let mut subscription =
            load_subscription(program_id, subscription_info, request.subscription_id)?;

        if *consumer_info.key != request.consumer
            || consumer_info.owner != consumer_program_info.key
        {
            msg!("Consumer accounts do not match request {}", request_id);
            return Err(CoordinatorError::InvalidConsumer.into());
        }

        let payment = coordinator
            .fulfillment_payment(request.callback_gas_limit)
            .ok_or(CoordinatorError::Overflow)?;
        if subscription.balance < payment {
            msg!(
                "Subscription {} holds {} but fulfillment costs {}",
                subscription.id,
                subscription.balance,
                payment
            );
            return Err(CoordinatorError::InsufficientBalance.into());
        }

        let fulfillment = RandomWordsFulfillment {
            request_id,
            random_words: random_words(request_id, request.num_words),
        };
        let forwarded_metas = forwarded_infos
            .iter()
            .map(|info| AccountMeta {
                pubkey: *info.key,
                is_signer: false,
                is_writable: info.is_writable,
            })
            .collect();
        let callback = raw_fulfill_random_words(
            consumer_program_info.key,
            coordinator_info.key,
            consumer_info.key,
            forwarded_metas,
            &fulfillment,
        )?;

        let mut callback_infos = vec![coordinator_info.clone(), consumer_info.clone()];
        callback_infos.extend(forwarded_infos);
        callback_infos.push(consumer_program_info.clone());

        invoke_signed(
            &callback,
            &callback_infos,
            &[&[COORDINATOR_SEED, &[coordinator_bump]]],
        )?;

        subscription.balance -= payment;
        Subscription::pack(subscription, &mut subscription_info.data.borrow_mut())?;

        // Close the request so it cannot be fulfilled twice
        let reclaimed = request_info.lamports();
        **caller_info.lamports.borrow_mut() = caller_info
            .lamports()
            .checked_add(reclaimed)
            .ok_or(CoordinatorError::Overflow)?;
        **request_info.lamports.borrow_mut() = 0;
        request_info.data.borrow_mut().fill(0);

        CoordinatorEvent::RandomWordsFulfilled {
            request_id,
            payment,
            success: true,
        }
        .emit();
        Ok(())
    }
}

fn create_pda_account<'a>(
    payer_info: &AccountInfo<'a>,
    new_account_info: &AccountInfo<'a>,
    system_program_info: &AccountInfo<'a>,
    owner: &Pubkey,
    space: usize,
    signer_seeds: &[&[u8]],
) -> ProgramResult {
    let rent = Rent::get()?;
    invoke_signed(
        &system_instruction::create_account(
            payer_info.key,
            new_account_info.key,
            rent.minimum_balance(space),
            space as u64,
            owner,
        ),
        &[
            payer_info.clone(),
            new_account_info.clone(),
            system_program_info.clone(),
        ],
        &[signer_seeds],
    )
}

fn load_coordinator(program_id: &Pubkey, coordinator_info: &AccountInfo) -> Result<Coordinator, ProgramError> {
    let (expected, _) = find_coordinator_address(program_id);
    if *coordinator_info.key != expected {
        return Err(CoordinatorError::InvalidAccountAddress.into());
    }
    if coordinator_info.owner != program_id {
        return Err(CoordinatorError::NotInitialized.into());
    }
    Coordinator::unpack(&coordinator_info.data.borrow())
        .map_err(|_| CoordinatorError::NotInitialized.into())
}

fn load_subscription(
    program_id: &Pubkey,
    subscription_info: &AccountInfo,
    subscription_id: u64,
) -> Result<Subscription, ProgramError> {
    let (expected, _) = find_subscription_address(program_id, subscription_id);
    if *subscription_info.key != expected {
        return Err(CoordinatorError::InvalidAccountAddress.into());
    }
    if subscription_info.owner != program_id {
        return Err(CoordinatorError::InvalidSubscription.into());
    }
    Subscription::unpack(&subscription_info.data.borrow())
        .map_err(|_| CoordinatorError::InvalidSubscription.into())
}

fn load_request(
    program_id: &Pubkey,
    request_info: &AccountInfo,
    request_id: u64,
) -> Result<RandomnessRequest, ProgramError> {
    let (expected, _) = find_request_address(program_id, request_id);
    if *request_info.key != expected {
        return Err(CoordinatorError::InvalidAccountAddress.into());
    }
    if request_info.owner != program_id || request_info.data_is_empty() {
        return Err(CoordinatorError::UnknownRequest.into());
    }
    let request = RandomnessRequest::unpack_unchecked(&request_info.data.borrow())?;
    if !request.is_initialized() || request.request_id != request_id {
        return Err(CoordinatorError::UnknownRequest.into());
    }
    Ok(request)
}

fn check_subscription_owner(subscription: &Subscription, owner_info: &AccountInfo) -> ProgramResult {
    if !owner_info.is_signer || subscription.owner != *owner_info.key {
        return Err(CoordinatorError::MustBeSubOwner.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_are_deterministic_per_request() {
        let first = random_words(1, 2);
        assert_eq!(first.len(), 2);
        assert_eq!(first, random_words(1, 2));
        assert_ne!(first[0], first[1]);
        assert_ne!(first[0], random_words(2, 1)[0]);
    }
}
