// Raffle Program - Instructions
use arrayref::{array_ref, array_refs};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};
use std::convert::TryInto;
use vrf_coordinator_mock::consumer::{RandomWordsFulfillment, FULFILL_RANDOM_WORDS_TAG};
use vrf_coordinator_mock::state::find_coordinator_address;

use crate::error::RaffleError;

/// Constructor arguments, in deployment order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaffleArgs {
    /// Program id of the VRF coordinator
    pub vrf_coordinator: Pubkey,
    pub entrance_fee: u64,
    pub gas_lane: [u8; 32],
    pub subscription_id: u64,
    pub callback_gas_limit: u32,
    /// Seconds between draws
    pub interval: u64,
}

impl RaffleArgs {
    const LEN: usize = 32 + 8 + 32 + 8 + 4 + 8;

    fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        if input.len() < Self::LEN {
            return Err(RaffleError::InvalidInstruction.into());
        }
        let src = array_ref![input, 0, RaffleArgs::LEN];
        let (vrf_coordinator, entrance_fee, gas_lane, subscription_id, callback_gas_limit, interval) =
            array_refs![src, 32, 8, 32, 8, 4, 8];

        Ok(Self {
            vrf_coordinator: Pubkey::new_from_array(*vrf_coordinator),
            entrance_fee: u64::from_le_bytes(*entrance_fee),
            gas_lane: *gas_lane,
            subscription_id: u64::from_le_bytes(*subscription_id),
            callback_gas_limit: u32::from_le_bytes(*callback_gas_limit),
            interval: u64::from_le_bytes(*interval),
        })
    }

    fn pack_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.vrf_coordinator.as_ref());
        buf.extend_from_slice(&self.entrance_fee.to_le_bytes());
        buf.extend_from_slice(&self.gas_lane);
        buf.extend_from_slice(&self.subscription_id.to_le_bytes());
        buf.extend_from_slice(&self.callback_gas_limit.to_le_bytes());
        buf.extend_from_slice(&self.interval.to_le_bytes());
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RaffleInstruction {
    /// Create the raffle account with its fixed parameters
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The authority, pays for the raffle account
    /// 1. `[writable]` The raffle account (PDA of the authority)
    /// 2. `[]` The system program
    InitializeRaffle(RaffleArgs),

    /// Enter the current round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The player
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The system program
    EnterRaffle {
        /// Lamports paid, at least the entrance fee
        amount: u64,
    },

    /// Evaluate the upkeep predicate. Returns one byte (0/1) as return data.
    ///
    /// Accounts expected:
    /// 0. `[]` The raffle account
    CheckUpkeep,

    /// Close the round and request randomness from the coordinator
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The keeper, pays for the request account
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The VRF coordinator program
    /// 3. `[writable]` The coordinator config account
    /// 4. `[writable]` The subscription account
    /// 5. `[writable]` The request account for the next request id
    /// 6. `[]` The system program
    PerformUpkeep,

    /// Coordinator callback delivering the random words
    ///
    /// Accounts expected:
    /// 0. `[signer]` The coordinator config account
    /// 1. `[writable]` The raffle account
    /// 2. .. `[writable]` Player accounts, the winner among them
    FulfillRandomWords(RandomWordsFulfillment),
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input
            .split_first()
            .ok_or(RaffleError::InvalidInstruction)?;

        Ok(match *tag {
            0 => Self::InitializeRaffle(RaffleArgs::unpack(rest)?),
            1 => {
                let (amount, _) = Self::unpack_u64(rest)?;
                Self::EnterRaffle { amount }
            }
            2 => Self::CheckUpkeep,
            3 => Self::PerformUpkeep,
            FULFILL_RANDOM_WORDS_TAG => {
                Self::FulfillRandomWords(RandomWordsFulfillment::unpack(rest)?)
            }
            _ => return Err(RaffleError::InvalidInstruction.into()),
        })
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Result<Vec<u8>, ProgramError> {
        let mut buf = Vec::new();
        match self {
            Self::InitializeRaffle(args) => {
                buf.push(0);
                args.pack_into(&mut buf);
            }
            Self::EnterRaffle { amount } => {
                buf.push(1);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::CheckUpkeep => buf.push(2),
            Self::PerformUpkeep => buf.push(3),
            Self::FulfillRandomWords(fulfillment) => return fulfillment.pack(),
        }
        Ok(buf)
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        if input.len() < 8 {
            return Err(RaffleError::InvalidInstruction.into());
        }
        let (bytes, rest) = input.split_at(8);
        let value = bytes
            .try_into()
            .map(u64::from_le_bytes)
            .map_err(|_| RaffleError::InvalidInstruction)?;
        Ok((value, rest))
    }
}

/// Create initialize_raffle instruction
pub fn initialize_raffle(
    program_id: &Pubkey,
    authority: &Pubkey,
    raffle_account: &Pubkey,
    args: RaffleArgs,
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::InitializeRaffle(args).pack()?;

    let accounts = vec![
        AccountMeta::new(*authority, true),
        AccountMeta::new(*raffle_account, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create enter_raffle instruction
pub fn enter_raffle(
    program_id: &Pubkey,
    player: &Pubkey,
    raffle_account: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::EnterRaffle { amount }.pack()?;

    let accounts = vec![
        AccountMeta::new(*player, true),
        AccountMeta::new(*raffle_account, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create check_upkeep instruction
pub fn check_upkeep(program_id: &Pubkey, raffle_account: &Pubkey) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::CheckUpkeep.pack()?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new_readonly(*raffle_account, false)],
        data,
    })
}

/// Create perform_upkeep instruction
pub fn perform_upkeep(
    program_id: &Pubkey,
    keeper: &Pubkey,
    raffle_account: &Pubkey,
    coordinator_program: &Pubkey,
    subscription_account: &Pubkey,
    request_account: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::PerformUpkeep.pack()?;
    let (coordinator_account, _) = find_coordinator_address(coordinator_program);

    let accounts = vec![
        AccountMeta::new(*keeper, true),
        AccountMeta::new(*raffle_account, false),
        AccountMeta::new_readonly(*coordinator_program, false),
        AccountMeta::new(coordinator_account, false),
        AccountMeta::new(*subscription_account, false),
        AccountMeta::new(*request_account, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_carries_every_constructor_argument() {
        let args = RaffleArgs {
            vrf_coordinator: Pubkey::new_unique(),
            entrance_fee: 10_000_000,
            gas_lane: [0xd8; 32],
            subscription_id: 588,
            callback_gas_limit: 500_000,
            interval: 30,
        };
        let data = RaffleInstruction::InitializeRaffle(args).pack().unwrap();

        assert_eq!(data.len(), 1 + RaffleArgs::LEN);
        assert_eq!(
            RaffleInstruction::unpack(&data).unwrap(),
            RaffleInstruction::InitializeRaffle(args)
        );
    }

    #[test]
    fn short_or_unknown_input_is_rejected() {
        let invalid: ProgramError = RaffleError::InvalidInstruction.into();
        assert_eq!(RaffleInstruction::unpack(&[]), Err(invalid.clone()));
        assert_eq!(RaffleInstruction::unpack(&[1, 0, 0]), Err(invalid.clone()));
        assert_eq!(RaffleInstruction::unpack(&[0, 1, 2, 3]), Err(invalid.clone()));
        assert_eq!(RaffleInstruction::unpack(&[9]), Err(invalid));
    }

    #[test]
    fn coordinator_callback_uses_the_reserved_tag() {
        let fulfillment = RandomWordsFulfillment {
            request_id: 2,
            random_words: vec![[1u8; 32]],
        };
        let data = RaffleInstruction::FulfillRandomWords(fulfillment.clone())
            .pack()
            .unwrap();

        assert_eq!(data[0], FULFILL_RANDOM_WORDS_TAG);
        assert_eq!(
            RaffleInstruction::unpack(&data).unwrap(),
            RaffleInstruction::FulfillRandomWords(fulfillment)
        );
    }
}
