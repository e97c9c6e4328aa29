// VRF coordinator mock - Instructions
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};

use crate::error::CoordinatorError;
use crate::state::find_coordinator_address;

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub enum CoordinatorInstruction {
    /// Initialize the coordinator config with its fee settings
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Payer
    /// 1. `[writable]` Coordinator config PDA
    /// 2. `[]` System program
    Initialize {
        /// Flat premium per fulfillment
        base_fee: u64,
        /// Link per unit of callback gas
        gas_price_link: u64,
    },

    /// Create a subscription owned by the signer
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Owner (pays for the subscription account)
    /// 1. `[writable]` Coordinator config PDA
    /// 2. `[writable]` Subscription PDA for the next subscription id
    /// 3. `[]` System program
    CreateSubscription,

    /// Credit a subscription. The mock takes no tokens for this.
    ///
    /// Accounts expected:
    /// 0. `[writable]` Subscription PDA
    FundSubscription { subscription_id: u64, amount: u64 },

    /// Authorize a consumer to draw from the subscription
    ///
    /// Accounts expected:
    /// 0. `[signer]` Subscription owner
    /// 1. `[writable]` Subscription PDA
    AddConsumer {
        subscription_id: u64,
        consumer: Pubkey,
    },

    /// Revoke a consumer
    ///
    /// Accounts expected:
    /// 0. `[signer]` Subscription owner
    /// 1. `[writable]` Subscription PDA
    RemoveConsumer {
        subscription_id: u64,
        consumer: Pubkey,
    },

    /// Record a randomness request. The request id is returned as return data.
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Payer for the request account
    /// 1. `[signer]` Consumer account
    /// 2. `[writable]` Coordinator config PDA
    /// 3. `[writable]` Subscription PDA
    /// 4. `[writable]` Request PDA for the next request id
    /// 5. `[]` System program
    RequestRandomWords {
        key_hash: [u8; 32],
        subscription_id: u64,
        request_confirmations: u16,
        callback_gas_limit: u32,
        num_words: u32,
    },

    /// Produce the words for a pending request and call back into the consumer
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Caller (receives the closed request's rent)
    /// 1. `[writable]` Request PDA
    /// 2. `[writable]` Subscription PDA the request is charged to
    /// 3. `[]` Coordinator config PDA
    /// 4. `[writable]` Consumer account
    /// 5. `[]` Consumer program
    /// 6. .. Extra accounts forwarded to the consumer callback
    FulfillRandomWords { request_id: u64 },
}

impl CoordinatorInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        Self::try_from_slice(input).map_err(|_| CoordinatorError::InvalidInstruction.into())
    }
}

/// Create initialize instruction
pub fn initialize(
    program_id: &Pubkey,
    payer: &Pubkey,
    base_fee: u64,
    gas_price_link: u64,
) -> Instruction {
    let (coordinator, _) = find_coordinator_address(program_id);
    Instruction::new_with_borsh(
        *program_id,
        &CoordinatorInstruction::Initialize {
            base_fee,
            gas_price_link,
        },
        vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(coordinator, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

/// Create create_subscription instruction
pub fn create_subscription(program_id: &Pubkey, owner: &Pubkey, subscription: &Pubkey) -> Instruction {
    let (coordinator, _) = find_coordinator_address(program_id);
    Instruction::new_with_borsh(
        *program_id,
        &CoordinatorInstruction::CreateSubscription,
        vec![
            AccountMeta::new(*owner, true),
            AccountMeta::new(coordinator, false),
            AccountMeta::new(*subscription, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

/// Create fund_subscription instruction
pub fn fund_subscription(
    program_id: &Pubkey,
    subscription: &Pubkey,
    subscription_id: u64,
    amount: u64,
) -> Instruction {
    Instruction::new_with_borsh(
        *program_id,
        &CoordinatorInstruction::FundSubscription {
            subscription_id,
            amount,
        },
        vec![AccountMeta::new(*subscription, false)],
    )
}

/// Create add_consumer instruction
pub fn add_consumer(
    program_id: &Pubkey,
    owner: &Pubkey,
    subscription: &Pubkey,
    subscription_id: u64,
    consumer: &Pubkey,
) -> Instruction {
    Instruction::new_with_borsh(
        *program_id,
        &CoordinatorInstruction::AddConsumer {
            subscription_id,
            consumer: *consumer,
        },
        vec![
            AccountMeta::new_readonly(*owner, true),
            AccountMeta::new(*subscription, false),
        ],
    )
}

/// Create remove_consumer instruction
pub fn remove_consumer(
    program_id: &Pubkey,
    owner: &Pubkey,
    subscription: &Pubkey,
    subscription_id: u64,
    consumer: &Pubkey,
) -> Instruction {
    Instruction::new_with_borsh(
        *program_id,
        &CoordinatorInstruction::RemoveConsumer {
            subscription_id,
            consumer: *consumer,
        },
        vec![
            AccountMeta::new_readonly(*owner, true),
            AccountMeta::new(*subscription, false),
        ],
    )
}

/// Randomness request parameters, as a consumer passes them
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RandomWordsParams {
    pub key_hash: [u8; 32],
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

/// Create request_random_words instruction
pub fn request_random_words(
    program_id: &Pubkey,
    payer: &Pubkey,
    consumer: &Pubkey,
    subscription: &Pubkey,
    request: &Pubkey,
    params: RandomWordsParams,
) -> Instruction {
    let (coordinator, _) = find_coordinator_address(program_id);
    Instruction::new_with_borsh(
        *program_id,
        &CoordinatorInstruction::RequestRandomWords {
            key_hash: params.key_hash,
            subscription_id: params.subscription_id,
            request_confirmations: params.request_confirmations,
            callback_gas_limit: params.callback_gas_limit,
            num_words: params.num_words,
        },
        vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new_readonly(*consumer, true),
            AccountMeta::new(coordinator, false),
            AccountMeta::new(*subscription, false),
            AccountMeta::new(*request, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

/// Create fulfill_random_words instruction
#[allow(clippy::too_many_arguments)]
pub fn fulfill_random_words(
    program_id: &Pubkey,
    caller: &Pubkey,
    request: &Pubkey,
    subscription: &Pubkey,
    consumer: &Pubkey,
    consumer_program: &Pubkey,
    request_id: u64,
    forwarded: &[AccountMeta],
) -> Instruction {
    let (coordinator, _) = find_coordinator_address(program_id);
    let mut accounts = vec![
        AccountMeta::new(*caller, true),
        AccountMeta::new(*request, false),
        AccountMeta::new(*subscription, false),
        AccountMeta::new_readonly(coordinator, false),
        AccountMeta::new(*consumer, false),
        AccountMeta::new_readonly(*consumer_program, false),
    ];
    accounts.extend_from_slice(forwarded);

    Instruction::new_with_borsh(
        *program_id,
        &CoordinatorInstruction::FulfillRandomWords { request_id },
        accounts,
    )
}
