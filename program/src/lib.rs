// Interval raffle
// Players pay an entrance fee; once the interval has passed a keeper asks the
// VRF coordinator for randomness and the coordinator's callback pays the winner.

pub mod error;
pub mod event;
pub mod instruction;
pub mod processor;
pub mod state;
pub mod utils;

// VRF coordinator integration
pub mod vrf;

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

solana_program::declare_id!("D1gs94X884bMWi5U4NPJfaucbZUweiSbqoe5U9L2bKdd");

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::Processor::process(program_id, accounts, instruction_data)
}
