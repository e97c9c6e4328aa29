// VRF coordinator mock
// Stands in for the oracle network on local clusters: subscriptions, consumer
// registration, randomness requests and manual fulfillment.

pub mod consumer;
pub mod error;
pub mod event;
pub mod instruction;
pub mod processor;
pub mod state;

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

solana_program::declare_id!("GKVDgBudMjuMFwoXYBpCUDJx2ZeEDCtnWWN3qCFae1PT");

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::Processor::process(program_id, accounts, instruction_data)
}
